// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff for HTTP requests.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
	/// Response statuses that are retried by [`send_with_retry`].
	pub retryable_statuses: Vec<StatusCode>,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
			retryable_statuses: vec![
				StatusCode::TOO_MANY_REQUESTS,
				StatusCode::REQUEST_TIMEOUT,
				StatusCode::INTERNAL_SERVER_ERROR,
				StatusCode::BAD_GATEWAY,
				StatusCode::SERVICE_UNAVAILABLE,
				StatusCode::GATEWAY_TIMEOUT,
			],
		}
	}
}

impl RetryConfig {
	/// A configuration that performs exactly one attempt.
	pub fn no_retry() -> Self {
		Self {
			max_attempts: 1,
			..Self::default()
		}
	}

	/// Overrides the number of attempts, clamped to at least one.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);
		self
	}
}

/// Whether a failed request is worth another attempt.
fn is_retryable(cfg: &RetryConfig, err: &reqwest::Error) -> bool {
	if err.is_timeout() || err.is_connect() {
		return true;
	}

	err
		.status()
		.is_some_and(|status| cfg.retryable_statuses.contains(&status))
}

fn calculate_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
	let exponential_delay = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
	let capped_delay = exponential_delay.min(cfg.max_delay.as_secs_f64());

	let final_delay = if cfg.jitter {
		capped_delay * (0.5 + fastrand::f64())
	} else {
		capped_delay
	};

	Duration::from_secs_f64(final_delay)
}

/// Sends a request, retrying transport errors and retryable response statuses.
///
/// A retryable status on the final attempt is not turned into an error: the
/// last response is handed back so the caller can still read and classify
/// its body.
pub async fn send_with_retry<F, Fut>(cfg: &RetryConfig, mut f: F) -> reqwest::Result<Response>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = reqwest::Result<Response>>,
{
	let mut attempt = 0;

	loop {
		attempt += 1;
		match f().await {
			Ok(response) => {
				let status = response.status();
				if !cfg.retryable_statuses.contains(&status) || attempt >= cfg.max_attempts {
					return Ok(response);
				}

				let delay = calculate_delay(cfg, attempt - 1);
				warn!(
					status = status.as_u16(),
					attempt,
					max_attempts = cfg.max_attempts,
					delay_ms = delay.as_millis() as u64,
					"retrying after retryable status"
				);
				tokio::time::sleep(delay).await;
			}
			Err(err) => {
				if !is_retryable(cfg, &err) || attempt >= cfg.max_attempts {
					warn!(error = %err, attempt, "request failed");
					return Err(err);
				}

				let delay = calculate_delay(cfg, attempt - 1);
				warn!(
					error = %err,
					attempt,
					max_attempts = cfg.max_attempts,
					delay_ms = delay.as_millis() as u64,
					"retrying after transport error"
				);
				tokio::time::sleep(delay).await;
			}
		}
	}
}
