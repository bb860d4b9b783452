// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project identity and keys.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::secret::ApiKey;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProjectConfigLayer {
	pub project_id: Option<String>,
	pub write_key: Option<ApiKey>,
	pub read_key: Option<ApiKey>,
	pub master_key: Option<ApiKey>,
}

impl ProjectConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.project_id.is_some() {
			self.project_id = other.project_id;
		}
		if other.write_key.is_some() {
			self.write_key = other.write_key;
		}
		if other.read_key.is_some() {
			self.read_key = other.read_key;
		}
		if other.master_key.is_some() {
			self.master_key = other.master_key;
		}
	}

	pub fn finalize(self) -> Result<ProjectConfig, ConfigError> {
		let project_id = self
			.project_id
			.map(|id| id.trim().to_string())
			.filter(|id| !id.is_empty())
			.ok_or_else(|| ConfigError::MissingField("project.project_id".to_string()))?;

		Ok(ProjectConfig {
			project_id,
			write_key: self.write_key.filter(|k| !k.is_empty()),
			read_key: self.read_key.filter(|k| !k.is_empty()),
			master_key: self.master_key.filter(|k| !k.is_empty()),
		})
	}
}

/// Credentials for one project.
///
/// Only the write key is used for event submission; read and master keys are
/// carried so a single config file can describe the whole project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
	pub project_id: String,
	pub write_key: Option<ApiKey>,
	pub read_key: Option<ApiKey>,
	pub master_key: Option<ApiKey>,
}

impl ProjectConfig {
	pub fn new(project_id: impl Into<String>) -> Self {
		Self {
			project_id: project_id.into(),
			write_key: None,
			read_key: None,
			master_key: None,
		}
	}

	pub fn with_write_key(mut self, key: impl Into<ApiKey>) -> Self {
		self.write_key = Some(key.into());
		self
	}

	pub fn with_read_key(mut self, key: impl Into<ApiKey>) -> Self {
		self.read_key = Some(key.into());
		self
	}

	pub fn with_master_key(mut self, key: impl Into<ApiKey>) -> Self {
		self.master_key = Some(key.into());
		self
	}
}
