//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod nasa;
pub mod raw_http;
pub mod socket_guard;
