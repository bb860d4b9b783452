// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event property builders and global properties attached to every event.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{json_kind, ValidationError};
use crate::event::validate_property_name;

/// Error type returned by deferred global property providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A provider evaluated once per prepared event.
pub type PropertyProvider = Arc<dyn Fn() -> Result<Option<Value>, BoxError> + Send + Sync>;

/// A builder for constructing event properties.
///
/// # Example
///
/// ```
/// use keen_analytics_core::Properties;
///
/// let props = Properties::new()
///     .insert("item", "golden gate bridge")
///     .insert("price", 6.5)
///     .insert("gift", true);
/// assert_eq!(props.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Properties {
	inner: Map<String, Value>,
}

impl Properties {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	/// Inserts a key-value pair. Later inserts of the same key win.
	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Merges `other` into this one; keys from `other` take precedence.
	pub fn merge(mut self, other: Properties) -> Self {
		self.inner.extend(other.inner);
		self
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}

	pub fn into_value(self) -> Value {
		Value::Object(self.inner)
	}
}

impl From<Properties> for Value {
	fn from(props: Properties) -> Self {
		props.into_value()
	}
}

impl From<Map<String, Value>> for Properties {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}

/// Value of a global property: fixed, or computed for each event.
#[derive(Clone)]
pub enum GlobalPropertyValue {
	Static(Value),
	Deferred(PropertyProvider),
}

impl GlobalPropertyValue {
	pub fn deferred<F>(provider: F) -> Self
	where
		F: Fn() -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
	{
		GlobalPropertyValue::Deferred(Arc::new(provider))
	}

	/// Produces the value for one event. Deferred providers run exactly once.
	fn resolve(&self, name: &str) -> Result<Value, ValidationError> {
		let fail = |reason: String| ValidationError::GlobalProperty {
			name: name.to_string(),
			reason,
		};

		match self {
			GlobalPropertyValue::Static(value) => Ok(value.clone()),
			GlobalPropertyValue::Deferred(provider) => match provider() {
				Ok(Some(Value::Null)) | Ok(None) => Err(fail("provider returned no value".to_string())),
				Ok(Some(value)) => Ok(value),
				Err(e) => Err(fail(format!("provider failed: {e}"))),
			},
		}
	}
}

impl fmt::Debug for GlobalPropertyValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			GlobalPropertyValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
			GlobalPropertyValue::Deferred(_) => f.write_str("Deferred(..)"),
		}
	}
}

impl From<Value> for GlobalPropertyValue {
	fn from(value: Value) -> Self {
		GlobalPropertyValue::Static(value)
	}
}

#[derive(Debug, Clone)]
pub struct GlobalProperty {
	pub name: String,
	pub value: GlobalPropertyValue,
}

/// Ordered registry of global properties.
#[derive(Debug, Clone, Default)]
pub struct GlobalProperties {
	entries: Vec<GlobalProperty>,
}

impl GlobalProperties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `name`. Re-registering replaces the value and keeps the
	/// original position.
	pub fn set(
		&mut self,
		name: impl Into<String>,
		value: impl Into<GlobalPropertyValue>,
	) -> Result<(), ValidationError> {
		let name = name.into();
		validate_property_name(&name)?;
		let value = value.into();

		match self.entries.iter_mut().find(|p| p.name == name) {
			Some(existing) => existing.value = value,
			None => self.entries.push(GlobalProperty { name, value }),
		}
		Ok(())
	}

	/// Removes `name`, returning whether it was registered.
	pub fn remove(&mut self, name: &str) -> bool {
		let before = self.entries.len();
		self.entries.retain(|p| p.name != name);
		self.entries.len() != before
	}

	pub fn names(&self) -> Vec<String> {
		self.entries.iter().map(|p| p.name.clone()).collect()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Evaluates every property in registration order and adds it to
	/// `payload`. Keys already present in `payload` are kept.
	pub fn apply(&self, payload: &mut Map<String, Value>) -> Result<(), ValidationError> {
		for property in &self.entries {
			validate_property_name(&property.name)?;
			let value = property.value.resolve(&property.name)?;
			if !payload.contains_key(&property.name) {
				payload.insert(property.name.clone(), value);
			}
		}
		Ok(())
	}
}

/// Converts raw event input into a JSON object.
pub fn to_event_object<T: Serialize + ?Sized>(
	raw: &T,
) -> Result<Map<String, Value>, ValidationError> {
	match serde_json::to_value(raw).map_err(|e| ValidationError::Serialization(e.to_string()))? {
		Value::Object(map) => Ok(map),
		other => Err(ValidationError::NotAnObject(json_kind(&other))),
	}
}
