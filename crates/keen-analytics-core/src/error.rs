// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local validation errors, raised before any network activity.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("invalid collection name '{name}': {reason}")]
	InvalidCollectionName { name: String, reason: &'static str },

	#[error("invalid property name '{name}': {reason}")]
	InvalidPropertyName { name: String, reason: &'static str },

	#[error("event must be a JSON object, got {0}")]
	NotAnObject(&'static str),

	#[error("invalid 'keen' metadata: {0}")]
	InvalidMetadata(String),

	#[error("event could not be serialized: {0}")]
	Serialization(String),

	/// A global property could not be evaluated for this event.
	#[error("global property '{name}' failed: {reason}")]
	GlobalProperty { name: String, reason: String },
}

impl ValidationError {
	/// Whether this is a failed global property rather than malformed input.
	pub fn is_global_property(&self) -> bool {
		matches!(self, ValidationError::GlobalProperty { .. })
	}
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
	match value {
		serde_json::Value::Null => "null",
		serde_json::Value::Bool(_) => "a boolean",
		serde_json::Value::Number(_) => "a number",
		serde_json::Value::String(_) => "a string",
		serde_json::Value::Array(_) => "an array",
		serde_json::Value::Object(_) => "an object",
	}
}
