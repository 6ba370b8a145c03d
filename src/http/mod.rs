//! Authenticated HTTP client with retry logic.

mod client;

pub use client::RetryableClient;
