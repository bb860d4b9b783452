// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the Keen SDK.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file, and `KEEN_*` environment variables
//! - Type-safe, validated sections for the project, HTTP transport and batching
//! - [`ApiKey`], a key wrapper that is redacted in every printed form
//!
//! # Usage
//!
//! ```ignore
//! use keen_config::load_config;
//!
//! let config = load_config()?;
//! println!("sending to project {}", config.project.project_id);
//! ```

pub mod error;
pub mod layer;
pub mod secret;
pub mod sections;
pub mod sources;

use std::path::PathBuf;

pub use error::ConfigError;
pub use layer::KeenConfigLayer;
pub use secret::{ApiKey, REDACTED};
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct KeenConfig {
	pub project: ProjectConfig,
	pub http: HttpConfig,
	pub batching: BatchingConfig,
}

impl KeenConfig {
	/// Configuration for `project` with every other setting at its default.
	pub fn for_project(project: ProjectConfig) -> Self {
		Self {
			project,
			http: HttpConfig::default(),
			batching: BatchingConfig::default(),
		}
	}
}

/// Load configuration with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`KEEN_*`)
/// 2. Config file (`$XDG_CONFIG_HOME/keen/client.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<KeenConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource)];
	if let Some(toml) = TomlSource::user_default() {
		sources.push(Box::new(toml));
	}
	sources.push(Box::new(EnvSource::new()));
	load_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<KeenConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge the given sources in precedence order and finalize the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<KeenConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = KeenConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: KeenConfigLayer) -> Result<KeenConfig, ConfigError> {
	let project = layer.project.unwrap_or_default().finalize()?;
	let http = layer.http.unwrap_or_default().finalize()?;
	let batching = layer.batching.unwrap_or_default().finalize()?;

	info!(
		project_id = %project.project_id,
		base_url = %http.base_url,
		write_key_configured = project.write_key.is_some(),
		max_batch_size = batching.max_batch_size,
		cache = ?batching.cache,
		"Keen configuration loaded"
	);

	Ok(KeenConfig {
		project,
		http,
		batching,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn env(pairs: &[(&str, &str)]) -> Box<dyn ConfigSource> {
		let vars: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		Box::new(EnvSource::with_lookup(move |name| vars.get(name).cloned()))
	}

	#[test]
	fn environment_overrides_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("client.toml");
		std::fs::write(
			&path,
			"[project]\nproject_id = \"file-project\"\nwrite_key = \"file-key\"\n\n[batching]\nmax_batch_size = 10\n",
		)
		.unwrap();

		let config = load_from_sources(vec![
			env(&[("KEEN_WRITE_KEY", "env-key")]),
			Box::new(TomlSource::new(&path)),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.project.project_id, "file-project");
		assert_eq!(config.project.write_key.as_ref().unwrap().expose(), "env-key");
		assert_eq!(config.batching.max_batch_size, 10);
		assert_eq!(config.http.base_url, DEFAULT_BASE_URL);
	}

	#[test]
	fn missing_project_id_fails() {
		let err = load_from_sources(vec![Box::new(DefaultsSource), env(&[])]).unwrap_err();
		assert!(matches!(err, ConfigError::MissingField(_)));
	}

	#[test]
	fn for_project_uses_defaults() {
		let config = KeenConfig::for_project(ProjectConfig::new("p").with_write_key("w"));
		assert_eq!(config.batching.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
		assert_eq!(config.batching.cache, CacheMode::None);
	}

	#[test]
	fn debug_output_hides_keys() {
		let config = KeenConfig::for_project(
			ProjectConfig::new("p")
				.with_write_key("write-secret")
				.with_master_key("master-secret"),
		);
		let debug = format!("{config:?}");
		assert!(!debug.contains("write-secret"));
		assert!(!debug.contains("master-secret"));
	}
}
