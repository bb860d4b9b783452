// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the Keen SDK.

use std::path::PathBuf;

use keen_analytics_core::{ApiError, EventRecord, ValidationError};
use thiserror::Error;

use crate::batch::RejectedEvent;

/// Failure to reach the server or to read its answer.
#[derive(Debug, Error)]
pub enum TransportError {
	#[error("HTTP request failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("response body is not valid JSON: {0}")]
	InvalidBody(String),
}

/// Failure of the local event queue's storage.
#[derive(Debug, Error)]
pub enum QueueError {
	#[error("queue storage error at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("queued event could not be encoded: {0}")]
	Encode(#[from] serde_json::Error),
}

/// Keen SDK errors.
#[derive(Debug, Error)]
pub enum KeenError {
	/// Malformed input, caught before any network activity.
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("no write key configured")]
	MissingKey,

	/// A global property could not be evaluated.
	#[error("global property '{name}' failed: {reason}")]
	GlobalProperty { name: String, reason: String },

	#[error("no event queue configured")]
	NoEventQueue,

	#[error("client has been shut down")]
	ClientShutdown,

	#[error(transparent)]
	Queue(#[from] QueueError),

	#[error("transport failure: {0}")]
	Transport(#[from] TransportError),

	/// Non-2xx response without an error envelope.
	#[error("server error ({status}): {message}")]
	ServerError { status: u16, message: String },

	#[error("API error: {0}")]
	Api(#[from] ApiError),

	#[error("unexpected bulk insert response: {0}")]
	ResponseMismatch(String),

	/// Some events of an otherwise successful submission were rejected.
	#[error("{} event(s) rejected by the server", .0.len())]
	PartialBatchFailure(Vec<RejectedEvent>),

	/// A batch failed outright part way through a multi-batch submission.
	/// `undelivered` holds every record that was taken for submission but
	/// not accepted, including the failed batch.
	#[error("submission aborted with {} undelivered event(s): {source}", .undelivered.len())]
	SubmissionAborted {
		source: Box<KeenError>,
		undelivered: Vec<EventRecord>,
		rejected: Vec<RejectedEvent>,
	},
}

impl KeenError {
	pub fn is_invalid_argument(&self) -> bool {
		matches!(self, KeenError::InvalidArgument(_) | KeenError::MissingKey)
	}

	/// The classified server error behind this failure, if any.
	pub fn api_error(&self) -> Option<&ApiError> {
		match self {
			KeenError::Api(e) => Some(e),
			KeenError::SubmissionAborted { source, .. } => source.api_error(),
			_ => None,
		}
	}

	/// Events the server rejected individually.
	pub fn rejected(&self) -> &[RejectedEvent] {
		match self {
			KeenError::PartialBatchFailure(rejected) => rejected,
			KeenError::SubmissionAborted { rejected, .. } => rejected,
			_ => &[],
		}
	}
}

impl From<ValidationError> for KeenError {
	fn from(err: ValidationError) -> Self {
		match err {
			ValidationError::GlobalProperty { name, reason } => {
				KeenError::GlobalProperty { name, reason }
			}
			other => KeenError::InvalidArgument(other.to_string()),
		}
	}
}

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, KeenError>;

#[cfg(test)]
mod tests {
	use super::*;
	use keen_analytics_core::CollectionName;
	use serde_json::Map;

	fn record() -> EventRecord {
		EventRecord::new(CollectionName::parse("purchases").unwrap(), Map::new())
	}

	#[test]
	fn validation_errors_map_to_invalid_argument() {
		let err: KeenError = ValidationError::NotAnObject("null").into();
		assert!(err.is_invalid_argument());
	}

	#[test]
	fn global_property_failures_keep_their_kind() {
		let err: KeenError = ValidationError::GlobalProperty {
			name: "clock".to_string(),
			reason: "provider failed".to_string(),
		}
		.into();
		assert!(matches!(err, KeenError::GlobalProperty { ref name, .. } if name == "clock"));
		assert!(!err.is_invalid_argument());
	}

	#[test]
	fn api_error_is_found_through_abort() {
		let err = KeenError::SubmissionAborted {
			source: Box::new(KeenError::Api(ApiError::InvalidApiKey("bad".to_string()))),
			undelivered: vec![record()],
			rejected: Vec::new(),
		};
		assert_eq!(
			err.api_error(),
			Some(&ApiError::InvalidApiKey("bad".to_string()))
		);
		assert!(err.to_string().contains("1 undelivered"));
	}

	#[test]
	fn rejected_is_empty_for_other_errors() {
		assert!(KeenError::NoEventQueue.rejected().is_empty());
	}
}
