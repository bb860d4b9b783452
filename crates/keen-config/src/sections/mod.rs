// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod batching;
mod http;
mod project;

pub use batching::{
	BatchingConfig, BatchingConfigLayer, CacheKind, CacheMode, DEFAULT_MAX_BATCH_SIZE,
};
pub use http::{
	HttpConfig, HttpConfigLayer, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS,
	DEFAULT_RETRY_MAX_ATTEMPTS,
};
pub use project::{ProjectConfig, ProjectConfigLayer};
