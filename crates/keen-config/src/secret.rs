// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Project API keys that never show up in logs or config dumps.
//!
//! Debug, Display and Serialize all print [`REDACTED`]; the key is zeroed on
//! drop and only reachable through [`ApiKey::expose`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Placeholder printed instead of a key.
pub const REDACTED: &str = "[REDACTED]";

/// A write, read or master key for a project.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey {
	inner: String,
}

impl ApiKey {
	pub fn new(key: impl Into<String>) -> Self {
		Self { inner: key.into() }
	}

	/// Returns the raw key for use in an `Authorization` header.
	pub fn expose(&self) -> &str {
		&self.inner
	}

	pub fn is_empty(&self) -> bool {
		self.inner.trim().is_empty()
	}
}

impl fmt::Debug for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("ApiKey").field(&REDACTED).finish()
	}
}

impl fmt::Display for ApiKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for ApiKey {
	fn from(key: String) -> Self {
		Self::new(key)
	}
}

impl From<&str> for ApiKey {
	fn from(key: &str) -> Self {
		Self::new(key)
	}
}

impl Serialize for ApiKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

impl<'de> Deserialize<'de> for ApiKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		String::deserialize(deserializer).map(Self::new)
	}
}
