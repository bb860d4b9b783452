// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turns raw event input into the payload that is queued or sent.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::addon::AddOn;
use crate::error::{json_kind, ValidationError};
use crate::event::KEEN_NAMESPACE;
use crate::properties::GlobalProperties;

pub const TIMESTAMP_KEY: &str = "timestamp";
pub const ADDONS_KEY: &str = "addons";

/// Formats `at` the way the API expects `keen.timestamp`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Prepares one event payload. Performs no I/O.
///
/// Global properties are attached, the `keen` section created if missing,
/// `add_ons` appended to `keen.addons`, and `keen.timestamp` stamped with
/// `now` unless already present. Event keys are passed through as given;
/// the server reports names it refuses per event.
pub fn prepare_payload(
	mut payload: Map<String, Value>,
	globals: &GlobalProperties,
	add_ons: &[AddOn],
	now: DateTime<Utc>,
) -> Result<Map<String, Value>, ValidationError> {
	globals.apply(&mut payload)?;

	let keen = match payload
		.entry(KEEN_NAMESPACE)
		.or_insert_with(|| Value::Object(Map::new()))
	{
		Value::Object(keen) => keen,
		other => {
			return Err(ValidationError::InvalidMetadata(format!(
				"'keen' must be an object, got {}",
				json_kind(other)
			)))
		}
	};

	if !add_ons.is_empty() {
		match keen
			.entry(ADDONS_KEY)
			.or_insert_with(|| Value::Array(Vec::new()))
		{
			Value::Array(list) => list.extend(add_ons.iter().map(AddOn::to_value)),
			other => {
				return Err(ValidationError::InvalidMetadata(format!(
					"'keen.addons' must be an array, got {}",
					json_kind(other)
				)))
			}
		}
	}

	if !keen.contains_key(TIMESTAMP_KEY) {
		keen.insert(
			TIMESTAMP_KEY.to_string(),
			Value::String(format_timestamp(now)),
		);
	}

	Ok(payload)
}
