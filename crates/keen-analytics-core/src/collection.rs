// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collection names and the process-wide cache of names already validated.

use std::collections::HashSet;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length of a collection name, in characters.
pub const MAX_COLLECTION_NAME_LEN: usize = 64;

/// A validated collection name.
///
/// Non-empty, at most [`MAX_COLLECTION_NAME_LEN`] ASCII characters, does not
/// start with `_` and contains no `$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
	pub fn parse(name: impl Into<String>) -> Result<Self, ValidationError> {
		let name = name.into();
		check_collection_name(&name)?;
		Ok(Self(name))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

fn check_collection_name(name: &str) -> Result<(), ValidationError> {
	let reason = if name.is_empty() {
		Some("must not be empty")
	} else if !name.is_ascii() {
		Some("must contain only ASCII characters")
	} else if name.len() > MAX_COLLECTION_NAME_LEN {
		Some("must be at most 64 characters")
	} else if name.starts_with('_') {
		Some("must not start with '_'")
	} else if name.contains('$') {
		Some("must not contain '$'")
	} else {
		None
	};

	match reason {
		Some(reason) => Err(ValidationError::InvalidCollectionName {
			name: name.to_string(),
			reason,
		}),
		None => Ok(()),
	}
}

impl TryFrom<String> for CollectionName {
	type Error = ValidationError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}

impl From<CollectionName> for String {
	fn from(name: CollectionName) -> Self {
		name.0
	}
}

impl AsRef<str> for CollectionName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for CollectionName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Set of collection names that have already passed validation.
///
/// Entries are only ever added. Two threads racing on the same new name both
/// validate it and both insert; the outcome is identical.
#[derive(Debug, Default)]
pub struct CollectionNameCache {
	known: RwLock<HashSet<String>>,
}

impl CollectionNameCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Validates `name`, consulting and then populating the cache.
	pub fn validate(&self, name: &str) -> Result<CollectionName, ValidationError> {
		{
			let known = self.known.read().unwrap_or_else(|e| e.into_inner());
			if known.contains(name) {
				return Ok(CollectionName(name.to_string()));
			}
		}

		let validated = CollectionName::parse(name)?;
		self.known
			.write()
			.unwrap_or_else(|e| e.into_inner())
			.insert(name.to_string());
		Ok(validated)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.known
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.contains(name)
	}

	pub fn len(&self) -> usize {
		self.known.read().unwrap_or_else(|e| e.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
