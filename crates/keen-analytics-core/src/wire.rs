// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request and response shapes of the event ingestion endpoints.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::api_error::ApiError;

/// One entry of a bulk-insert response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemResult {
	pub success: bool,
	#[serde(default)]
	pub error: Option<ItemError>,
}

impl ItemResult {
	/// The classified rejection, or `None` for an accepted item.
	pub fn rejection(&self) -> Option<ApiError> {
		if self.success {
			return None;
		}
		Some(match &self.error {
			Some(err) => ApiError::classify(&err.name, err.description.clone()),
			None => ApiError::unspecified(),
		})
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemError {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub description: String,
}

/// Builds `{ "<collection>": [ ...events ] }`.
pub fn bulk_insert_body<'a, I>(collection: &str, events: I) -> Value
where
	I: IntoIterator<Item = &'a Map<String, Value>>,
{
	let items = events.into_iter().cloned().map(Value::Object).collect();
	let mut body = Map::new();
	body.insert(collection.to_string(), Value::Array(items));
	Value::Object(body)
}

/// Returns the classified error if `body` is a generic error envelope,
/// i.e. carries a non-null `error_code`.
pub fn error_envelope(body: &Value) -> Option<ApiError> {
	let code = match body.get("error_code")? {
		Value::Null => return None,
		Value::String(code) => code.clone(),
		other => other.to_string(),
	};
	let message = match body.get("message") {
		Some(Value::String(m)) => m.clone(),
		Some(Value::Null) | None => String::new(),
		Some(other) => other.to_string(),
	};
	Some(ApiError::classify(&code, message))
}

/// Why a bulk-insert response could not be paired with its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShapeError {
	MissingCollection,
	LengthMismatch { expected: usize, actual: usize },
	MalformedEntry { index: usize, message: String },
}

impl std::fmt::Display for ResponseShapeError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ResponseShapeError::MissingCollection => {
				f.write_str("response has no result array for the collection")
			}
			ResponseShapeError::LengthMismatch { expected, actual } => {
				write!(f, "expected {expected} results, got {actual}")
			}
			ResponseShapeError::MalformedEntry { index, message } => {
				write!(f, "result {index} is malformed: {message}")
			}
		}
	}
}

/// Extracts the per-item results for `collection`, requiring exactly
/// `expected` entries.
pub fn bulk_insert_results(
	body: &Value,
	collection: &str,
	expected: usize,
) -> Result<Vec<ItemResult>, ResponseShapeError> {
	let entries = body
		.get(collection)
		.and_then(Value::as_array)
		.ok_or(ResponseShapeError::MissingCollection)?;

	if entries.len() != expected {
		return Err(ResponseShapeError::LengthMismatch {
			expected,
			actual: entries.len(),
		});
	}

	entries
		.iter()
		.enumerate()
		.map(|(index, entry)| {
			ItemResult::deserialize(entry).map_err(|e| ResponseShapeError::MalformedEntry {
				index,
				message: e.to_string(),
			})
		})
		.collect()
}
