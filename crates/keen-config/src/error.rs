// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

/// Errors that can occur while loading and validating client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// The config file exists but could not be read.
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The config file is not valid TOML for the expected shape.
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// A value could not be parsed.
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	/// A required field was not provided by any source.
	#[error("missing required field: {0}")]
	MissingField(String),

	/// Cross-field validation failed.
	#[error("validation error: {0}")]
	Validation(String),
}

impl ConfigError {
	pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			key: key.into(),
			message: message.into(),
		}
	}
}
