//! User-Agent string shared by the search, asset, and download clients.

/// Product comment identifying the tool to the remote API operators.
const PRODUCT_COMMENT: &str = "image-archive-mirror";

/// Default User-Agent for every outgoing request.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("nasa-mirror/{version} ({PRODUCT_COMMENT})")
}
