// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batching and local event cache configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on events per bulk-insert request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 2500;

/// Which local event cache, if any, the client uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
	/// Every event is sent as soon as it is added.
	#[default]
	None,
	/// Events are held in process memory until flushed.
	Memory,
	/// Events are spooled to a directory and survive restarts.
	File,
}

impl std::str::FromStr for CacheKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"none" | "off" | "disabled" => Ok(CacheKind::None),
			"memory" | "ram" => Ok(CacheKind::Memory),
			"file" | "disk" => Ok(CacheKind::File),
			other => Err(format!("unknown cache kind '{other}'")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchingConfigLayer {
	pub max_batch_size: Option<usize>,
	pub cache: Option<CacheKind>,
	pub cache_dir: Option<PathBuf>,
}

impl BatchingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.max_batch_size.is_some() {
			self.max_batch_size = other.max_batch_size;
		}
		if other.cache.is_some() {
			self.cache = other.cache;
		}
		if other.cache_dir.is_some() {
			self.cache_dir = other.cache_dir;
		}
	}

	pub fn finalize(self) -> Result<BatchingConfig, ConfigError> {
		let max_batch_size = self.max_batch_size.unwrap_or(DEFAULT_MAX_BATCH_SIZE);
		if max_batch_size == 0 {
			return Err(ConfigError::invalid_value(
				"batching.max_batch_size",
				"must be at least 1",
			));
		}

		let cache = match self.cache.unwrap_or_default() {
			CacheKind::None => CacheMode::None,
			CacheKind::Memory => CacheMode::Memory,
			CacheKind::File => {
				let dir = self
					.cache_dir
					.or_else(default_cache_dir)
					.ok_or_else(|| {
						ConfigError::Validation(
							"cache = \"file\" needs batching.cache_dir (no platform data dir found)"
								.to_string(),
						)
					})?;
				CacheMode::File(dir)
			}
		};

		Ok(BatchingConfig {
			max_batch_size,
			cache,
		})
	}
}

fn default_cache_dir() -> Option<PathBuf> {
	dirs::data_dir().map(|p| p.join("keen").join("queue"))
}

/// Resolved local cache choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheMode {
	#[default]
	None,
	Memory,
	File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchingConfig {
	pub max_batch_size: usize,
	pub cache: CacheMode,
}

impl Default for BatchingConfig {
	fn default() -> Self {
		Self {
			max_batch_size: DEFAULT_MAX_BATCH_SIZE,
			cache: CacheMode::None,
		}
	}
}
