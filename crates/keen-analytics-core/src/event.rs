// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event records and the property-name rule for global properties.

use serde_json::{Map, Value};

use crate::api_error::ApiError;
use crate::collection::CollectionName;
use crate::error::ValidationError;

/// Reserved metadata section of every event.
pub const KEEN_NAMESPACE: &str = "keen";

/// Maximum length of a property name, in characters.
pub const MAX_PROPERTY_NAME_LEN: usize = 256;

/// A prepared event bound for one collection.
///
/// `error` is filled in by the submission step when the server rejects the
/// event, and only then.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
	collection: CollectionName,
	payload: Map<String, Value>,
	error: Option<ApiError>,
}

impl EventRecord {
	pub fn new(collection: CollectionName, payload: Map<String, Value>) -> Self {
		Self {
			collection,
			payload,
			error: None,
		}
	}

	pub fn collection(&self) -> &CollectionName {
		&self.collection
	}

	pub fn payload(&self) -> &Map<String, Value> {
		&self.payload
	}

	pub fn into_payload(self) -> Map<String, Value> {
		self.payload
	}

	pub fn error(&self) -> Option<&ApiError> {
		self.error.as_ref()
	}

	/// Records the server's rejection. Returns `false` (and keeps the first
	/// error) if one was already recorded.
	pub fn set_error(&mut self, error: ApiError) -> bool {
		if self.error.is_some() {
			return false;
		}
		self.error = Some(error);
		true
	}
}

/// Checks a single property name.
pub fn validate_property_name(name: &str) -> Result<(), ValidationError> {
	let reason = if name.is_empty() {
		Some("must not be empty")
	} else if name.chars().count() > MAX_PROPERTY_NAME_LEN {
		Some("must be at most 256 characters")
	} else if name.starts_with('$') {
		Some("must not start with '$'")
	} else if name.contains('.') {
		Some("must not contain '.'")
	} else {
		None
	};

	match reason {
		Some(reason) => Err(ValidationError::InvalidPropertyName {
			name: name.to_string(),
			reason,
		}),
		None => Ok(()),
	}
}
