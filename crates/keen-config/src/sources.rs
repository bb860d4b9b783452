// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file, and environment variables.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::KeenConfigLayer;
use crate::secret::ApiKey;
use crate::sections::{BatchingConfigLayer, CacheKind, HttpConfigLayer, ProjectConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<KeenConfigLayer, ConfigError>;
}

/// Built-in defaults. Every field is left unset; finalization fills the
/// documented defaults.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<KeenConfigLayer, ConfigError> {
		Ok(KeenConfigLayer::default())
	}
}

/// TOML file source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$XDG_CONFIG_HOME/keen/client.toml` (or the platform equivalent).
	pub fn user_default() -> Option<Self> {
		dirs::config_dir().map(|dir| Self::new(dir.join("keen").join("client.toml")))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<KeenConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(KeenConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable source.
///
/// Convention: `KEEN_<FIELD>`, e.g. `KEEN_PROJECT_ID`, `KEEN_WRITE_KEY`.
pub struct EnvSource {
	lookup: EnvLookup,
}

impl EnvSource {
	/// Reads from the process environment.
	pub fn new() -> Self {
		Self::with_lookup(|name| std::env::var(name).ok())
	}

	/// Reads through a custom lookup, e.g. a fixed map in tests.
	pub fn with_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String> + Send + Sync + 'static,
	{
		Self {
			lookup: Box::new(lookup),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.trim().is_empty())
	}

	fn parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T: std::str::FromStr,
		T::Err: std::fmt::Display,
	{
		match self.var(name) {
			Some(v) => v
				.trim()
				.parse()
				.map(Some)
				.map_err(|e| ConfigError::invalid_value(name, format!("'{v}': {e}"))),
			None => Ok(None),
		}
	}

	fn key(&self, name: &str) -> Option<ApiKey> {
		self.var(name).map(ApiKey::new)
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<KeenConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(KeenConfigLayer {
			project: Some(ProjectConfigLayer {
				project_id: self.var("KEEN_PROJECT_ID"),
				write_key: self.key("KEEN_WRITE_KEY"),
				read_key: self.key("KEEN_READ_KEY"),
				master_key: self.key("KEEN_MASTER_KEY"),
			}),
			http: Some(HttpConfigLayer {
				base_url: self.var("KEEN_BASE_URL"),
				request_timeout_secs: self.parsed("KEEN_REQUEST_TIMEOUT_SECS")?,
				retry_max_attempts: self.parsed("KEEN_RETRY_MAX_ATTEMPTS")?,
			}),
			batching: Some(BatchingConfigLayer {
				max_batch_size: self.parsed("KEEN_MAX_BATCH_SIZE")?,
				cache: self.parsed::<CacheKind>("KEEN_CACHE")?,
				cache_dir: self.var("KEEN_CACHE_DIR").map(PathBuf::from),
			}),
		})
	}
}
