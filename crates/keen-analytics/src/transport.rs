// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP transport used to reach the ingestion API.

use std::time::Duration;

use keen_common_http::RetryConfig;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;

/// Status and raw body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
	pub status: u16,
	pub body: String,
}

impl TransportResponse {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Parses the body as JSON. An empty body parses as `null`.
	pub fn json(&self) -> Result<Value, TransportError> {
		if self.body.trim().is_empty() {
			return Ok(Value::Null);
		}
		serde_json::from_str(&self.body).map_err(|e| TransportError::InvalidBody(e.to_string()))
	}
}

/// Sends JSON requests to the API.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
	async fn post(&self, url: &str, key: &str, body: &Value)
		-> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by reqwest, with retries.
pub struct HttpTransport {
	http_client: Client,
	retry_config: RetryConfig,
}

impl HttpTransport {
	pub fn new(request_timeout: Duration, retry_config: RetryConfig) -> Result<Self, TransportError> {
		let http_client = keen_common_http::new_client_with_timeout(request_timeout)?;
		Ok(Self::with_client(http_client, retry_config))
	}

	pub fn with_client(http_client: Client, retry_config: RetryConfig) -> Self {
		Self {
			http_client,
			retry_config,
		}
	}
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
	async fn post(
		&self,
		url: &str,
		key: &str,
		body: &Value,
	) -> Result<TransportResponse, TransportError> {
		debug!(url = %url, "sending request");

		let response = keen_common_http::send_with_retry(&self.retry_config, || {
			self
				.http_client
				.post(url)
				.header(reqwest::header::AUTHORIZATION, key)
				.json(body)
				.send()
		})
		.await?;

		let status = response.status().as_u16();
		let body = response.text().await?;
		debug!(url = %url, status, "received response");

		Ok(TransportResponse { status, body })
	}
}
