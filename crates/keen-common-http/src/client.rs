// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP client with the SDK User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// SDK name reported to the ingestion service.
pub const SDK_NAME: &str = "keen-rust";
/// SDK version reported to the ingestion service.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Creates a new HTTP client builder with the SDK User-Agent header.
///
/// # Example
/// ```ignore
/// let client = keen_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a request timeout and the SDK User-Agent.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	builder().timeout(timeout).build()
}

/// Returns the SDK User-Agent string.
///
/// Format: `keen-rust/{version}`
pub fn user_agent() -> String {
	format!("{SDK_NAME}/{SDK_VERSION}")
}
