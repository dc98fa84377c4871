//! Shared HTTP client construction policy.
//!
//! Search, asset, and download traffic each get their own client so an
//! unresponsive endpoint is bounded by its own timeout.

use reqwest::Client;

use crate::config::EndpointTimeout;
use crate::user_agent;

/// Builds a client with the shared user-agent, gzip, and the given timeouts.
///
/// Only connect and idle-read time are bounded, so a slow but steady
/// download of a large original is never aborted.
///
/// # Errors
///
/// Returns the reqwest builder error when the TLS backend or system
/// configuration cannot be initialised.
pub(crate) fn build_http_client(timeout: EndpointTimeout) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(timeout.connect)
        .read_timeout(timeout.read)
        .user_agent(user_agent::default_user_agent())
        .gzip(true)
        .build()
}
