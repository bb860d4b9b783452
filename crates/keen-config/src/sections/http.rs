// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP transport configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Versioned API root; resources live under `{base_url}/projects/{project_id}`.
pub const DEFAULT_BASE_URL: &str = "https://api.keen.io/3.0";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpConfigLayer {
	pub base_url: Option<String>,
	pub request_timeout_secs: Option<u64>,
	pub retry_max_attempts: Option<u32>,
}

impl HttpConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.base_url.is_some() {
			self.base_url = other.base_url;
		}
		if other.request_timeout_secs.is_some() {
			self.request_timeout_secs = other.request_timeout_secs;
		}
		if other.retry_max_attempts.is_some() {
			self.retry_max_attempts = other.retry_max_attempts;
		}
	}

	pub fn finalize(self) -> Result<HttpConfig, ConfigError> {
		let base_url = self
			.base_url
			.unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
			.trim_end_matches('/')
			.to_string();

		if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
			return Err(ConfigError::invalid_value(
				"http.base_url",
				format!("'{base_url}' is not an http(s) URL"),
			));
		}

		let timeout_secs = self
			.request_timeout_secs
			.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
		if timeout_secs == 0 {
			return Err(ConfigError::invalid_value(
				"http.request_timeout_secs",
				"must be greater than zero",
			));
		}

		Ok(HttpConfig {
			base_url,
			request_timeout: Duration::from_secs(timeout_secs),
			retry_max_attempts: self
				.retry_max_attempts
				.unwrap_or(DEFAULT_RETRY_MAX_ATTEMPTS)
				.max(1),
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
	pub base_url: String,
	pub request_timeout: Duration,
	pub retry_max_attempts: u32,
}

impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			base_url: DEFAULT_BASE_URL.to_string(),
			request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
			retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
		}
	}
}
