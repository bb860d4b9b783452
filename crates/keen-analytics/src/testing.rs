// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::TransportError;
use crate::transport::{Transport, TransportResponse};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
	pub url: String,
	pub key: String,
	pub body: Value,
}

type Responder = Box<dyn Fn(&RecordedRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;

/// Answers from a script of canned responses, then from a fallback.
pub(crate) struct MockTransport {
	requests: Mutex<Vec<RecordedRequest>>,
	script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
	fallback: Responder,
}

impl MockTransport {
	/// Accepts every event of every bulk request.
	pub fn accepting() -> Self {
		Self::with_fallback(|request| {
			let body = match request.body.as_object() {
				Some(obj) if !request.url.contains("/events/") => {
					let mut out = serde_json::Map::new();
					for (collection, items) in obj {
						let count = items.as_array().map_or(0, Vec::len);
						out.insert(
							collection.clone(),
							Value::Array(vec![serde_json::json!({"success": true}); count]),
						);
					}
					Value::Object(out).to_string()
				}
				_ => "{\"created\": true}".to_string(),
			};
			Ok(TransportResponse { status: 200, body })
		})
	}

	pub fn with_fallback<F>(fallback: F) -> Self
	where
		F: Fn(&RecordedRequest) -> Result<TransportResponse, TransportError> + Send + Sync + 'static,
	{
		Self {
			requests: Mutex::new(Vec::new()),
			script: Mutex::new(VecDeque::new()),
			fallback: Box::new(fallback),
		}
	}

	/// Queues a response for the next unanswered request.
	pub fn respond(self, status: u16, body: Value) -> Self {
		self
			.script
			.lock()
			.unwrap()
			.push_back(Ok(TransportResponse {
				status,
				body: body.to_string(),
			}));
		self
	}

	pub fn fail_with(self, error: TransportError) -> Self {
		self.script.lock().unwrap().push_back(Err(error));
		self
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.requests.lock().unwrap().clone()
	}

	/// Event counts of each bulk request for `collection`, in order.
	pub fn batch_sizes(&self, collection: &str) -> Vec<usize> {
		self
			.requests()
			.iter()
			.filter_map(|r| r.body.get(collection).and_then(Value::as_array).map(Vec::len))
			.collect()
	}
}

#[async_trait::async_trait]
impl Transport for MockTransport {
	async fn post(
		&self,
		url: &str,
		key: &str,
		body: &Value,
	) -> Result<TransportResponse, TransportError> {
		let request = RecordedRequest {
			url: url.to_string(),
			key: key.to_string(),
			body: body.clone(),
		};
		self.requests.lock().unwrap().push(request.clone());

		let scripted = self.script.lock().unwrap().pop_front();
		match scripted {
			Some(response) => response,
			None => (self.fallback)(&request),
		}
	}
}
