// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Classification of error codes returned by the ingestion API.

use thiserror::Error;
use tracing::warn;

/// A server-reported error, keyed by the wire error code.
///
/// Codes the client does not know are preserved verbatim in
/// [`ApiError::Unknown`] so newer server versions stay representable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
	#[error("invalid API key: {0}")]
	InvalidApiKey(String),

	#[error("resource not found: {0}")]
	ResourceNotFound(String),

	#[error("namespace type error: {0}")]
	NamespaceType(String),

	#[error("invalid event: {0}")]
	InvalidEvent(String),

	#[error("lists of non-primitives not allowed: {0}")]
	ListsOfNonPrimitivesNotAllowed(String),

	#[error("invalid batch: {0}")]
	InvalidBatch(String),

	#[error("internal server error: {0}")]
	InternalServerError(String),

	#[error("invalid keen namespace property: {0}")]
	InvalidKeenNamespaceProperty(String),

	#[error("invalid property name: {0}")]
	InvalidPropertyName(String),

	#[error("unknown API error '{code}': {message}")]
	Unknown { code: String, message: String },
}

impl ApiError {
	/// Maps a wire error code and message to a typed error.
	pub fn classify(code: &str, message: impl Into<String>) -> Self {
		let message = message.into();
		match code {
			"InvalidApiKeyError" => ApiError::InvalidApiKey(message),
			"ResourceNotFoundError" => ApiError::ResourceNotFound(message),
			"NamespaceTypeError" => ApiError::NamespaceType(message),
			"InvalidEventError" => ApiError::InvalidEvent(message),
			"ListsOfNonPrimitivesNotAllowedError" => {
				ApiError::ListsOfNonPrimitivesNotAllowed(message)
			}
			"InvalidBatchError" => ApiError::InvalidBatch(message),
			"InternalServerError" => ApiError::InternalServerError(message),
			"InvalidKeenNamespaceProperty" => ApiError::InvalidKeenNamespaceProperty(message),
			"InvalidPropertyNameError" => ApiError::InvalidPropertyName(message),
			other => {
				warn!(code = other, message = %message, "unhandled error code");
				ApiError::Unknown {
					code: other.to_string(),
					message,
				}
			}
		}
	}

	/// Error used when a rejected item carried no error object.
	pub fn unspecified() -> Self {
		ApiError::Unknown {
			code: String::new(),
			message: String::new(),
		}
	}

	/// The wire error code.
	pub fn code(&self) -> &str {
		match self {
			ApiError::InvalidApiKey(_) => "InvalidApiKeyError",
			ApiError::ResourceNotFound(_) => "ResourceNotFoundError",
			ApiError::NamespaceType(_) => "NamespaceTypeError",
			ApiError::InvalidEvent(_) => "InvalidEventError",
			ApiError::ListsOfNonPrimitivesNotAllowed(_) => "ListsOfNonPrimitivesNotAllowedError",
			ApiError::InvalidBatch(_) => "InvalidBatchError",
			ApiError::InternalServerError(_) => "InternalServerError",
			ApiError::InvalidKeenNamespaceProperty(_) => "InvalidKeenNamespaceProperty",
			ApiError::InvalidPropertyName(_) => "InvalidPropertyNameError",
			ApiError::Unknown { code, .. } => code,
		}
	}

	pub fn message(&self) -> &str {
		match self {
			ApiError::InvalidApiKey(m)
			| ApiError::ResourceNotFound(m)
			| ApiError::NamespaceType(m)
			| ApiError::InvalidEvent(m)
			| ApiError::ListsOfNonPrimitivesNotAllowed(m)
			| ApiError::InvalidBatch(m)
			| ApiError::InternalServerError(m)
			| ApiError::InvalidKeenNamespaceProperty(m)
			| ApiError::InvalidPropertyName(m) => m,
			ApiError::Unknown { message, .. } => message,
		}
	}
}
