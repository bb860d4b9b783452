// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for the Keen SDK.
//!
//! This crate provides:
//! - A pre-configured HTTP client carrying the SDK User-Agent header
//! - Retry with exponential backoff for transient failures and retryable
//!   response statuses

mod client;
mod retry;

pub use client::{builder, new_client_with_timeout, user_agent, SDK_NAME, SDK_VERSION};
pub use retry::{send_with_retry, RetryConfig};
