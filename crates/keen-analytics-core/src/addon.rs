// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side data enrichment directives, written under `keen.addons`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One enrichment directive.
///
/// `input` maps the add-on's parameter names to property paths in the event;
/// `output` names the property the server writes the result to.
///
/// ```
/// use keen_analytics_core::AddOn;
///
/// let geo = AddOn::ip_to_geo("ip_address", "ip_geo_info");
/// assert_eq!(geo.name, "keen:ip_to_geo");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOn {
	pub name: String,
	pub input: Map<String, Value>,
	pub output: String,
}

impl AddOn {
	pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			input: Map::new(),
			output: output.into(),
		}
	}

	/// Adds an input parameter (builder pattern).
	pub fn with_input(mut self, param: impl Into<String>, property: impl Into<Value>) -> Self {
		self.input.insert(param.into(), property.into());
		self
	}

	pub fn ip_to_geo(ip_property: &str, output: impl Into<String>) -> Self {
		Self::new("keen:ip_to_geo", output).with_input("ip", ip_property)
	}

	pub fn ua_parser(ua_property: &str, output: impl Into<String>) -> Self {
		Self::new("keen:ua_parser", output).with_input("ua_string", ua_property)
	}

	pub fn url_parser(url_property: &str, output: impl Into<String>) -> Self {
		Self::new("keen:url_parser", output).with_input("url", url_property)
	}

	pub fn referrer_parser(
		referrer_property: &str,
		page_property: &str,
		output: impl Into<String>,
	) -> Self {
		Self::new("keen:referrer_parser", output)
			.with_input("referrer_url", referrer_property)
			.with_input("page_url", page_property)
	}

	pub fn datetime_parser(datetime_property: &str, output: impl Into<String>) -> Self {
		Self::new("keen:date_time_parser", output).with_input("date_time", datetime_property)
	}

	pub fn to_value(&self) -> Value {
		let mut obj = Map::new();
		obj.insert("name".to_string(), Value::String(self.name.clone()));
		obj.insert("input".to_string(), Value::Object(self.input.clone()));
		obj.insert("output".to_string(), Value::String(self.output.clone()));
		Value::Object(obj)
	}
}
