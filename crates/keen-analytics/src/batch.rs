// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Grouping events into bounded batches and submitting them.

use std::fmt;
use std::sync::Arc;

use keen_analytics_core::wire::{bulk_insert_body, bulk_insert_results, error_envelope};
use keen_analytics_core::{ApiError, CollectionName, EventRecord};
use keen_config::ApiKey;
use tracing::{debug, warn};

use crate::error::{KeenError, Result};
use crate::transport::{Transport, TransportResponse};

/// An event the server refused, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedEvent {
	pub event: EventRecord,
	pub error: ApiError,
}

/// Events bound for one collection, submitted in one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
	pub collection: CollectionName,
	pub items: Vec<EventRecord>,
}

/// A batch that failed as a whole. Ownership of the events is handed back.
pub struct BatchFailure {
	pub error: KeenError,
	pub events: Vec<EventRecord>,
}

impl fmt::Debug for BatchFailure {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BatchFailure")
			.field("error", &self.error)
			.field("events", &self.events.len())
			.finish()
	}
}

/// Per-collection groups, kept in first-seen order.
///
/// A group is handed out as soon as it reaches `max_batch_size`.
#[derive(Debug)]
pub struct BatchAccumulator {
	max_batch_size: usize,
	groups: Vec<Batch>,
}

impl BatchAccumulator {
	pub fn new(max_batch_size: usize) -> Self {
		Self {
			max_batch_size: max_batch_size.max(1),
			groups: Vec::new(),
		}
	}

	/// Adds `record`, returning its group if that group is now full.
	pub fn push(&mut self, record: EventRecord) -> Option<Batch> {
		let index = match self
			.groups
			.iter()
			.position(|g| &g.collection == record.collection())
		{
			Some(index) => index,
			None => {
				self.groups.push(Batch {
					collection: record.collection().clone(),
					items: Vec::new(),
				});
				self.groups.len() - 1
			}
		};

		let group = &mut self.groups[index];
		group.items.push(record);
		if group.items.len() >= self.max_batch_size {
			return Some(Batch {
				collection: group.collection.clone(),
				items: std::mem::take(&mut group.items),
			});
		}
		None
	}

	/// Remaining non-empty groups in first-seen order.
	pub fn finish(self) -> Vec<Batch> {
		self
			.groups
			.into_iter()
			.filter(|g| !g.items.is_empty())
			.collect()
	}

	/// Every record still held, for hand-back after an abort.
	pub fn into_records(self) -> Vec<EventRecord> {
		self.groups.into_iter().flat_map(|g| g.items).collect()
	}

	pub fn pending(&self) -> usize {
		self.groups.iter().map(|g| g.items.len()).sum()
	}
}

/// Splits `items` for one collection into batches of at most `max_batch_size`.
pub fn chunk(collection: &CollectionName, items: Vec<EventRecord>, max_batch_size: usize) -> Vec<Batch> {
	let mut accumulator = BatchAccumulator::new(max_batch_size);
	let mut batches = Vec::new();
	for item in items {
		debug_assert_eq!(item.collection(), collection);
		batches.extend(accumulator.push(item));
	}
	batches.extend(accumulator.finish());
	batches
}

/// Submits events to the ingestion endpoints of one project.
pub struct BatchSubmitter {
	transport: Arc<dyn Transport>,
	base_url: String,
	project_id: String,
	write_key: ApiKey,
}

impl BatchSubmitter {
	pub fn new(
		transport: Arc<dyn Transport>,
		base_url: impl Into<String>,
		project_id: impl Into<String>,
		write_key: ApiKey,
	) -> Self {
		Self {
			transport,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			project_id: project_id.into(),
			write_key,
		}
	}

	fn resource_url(&self, resource: &str) -> String {
		format!(
			"{}/projects/{}/{}",
			self.base_url,
			urlencoding::encode(&self.project_id),
			resource
		)
	}

	fn events_url(&self) -> String {
		self.resource_url("events")
	}

	fn collection_url(&self, collection: &CollectionName) -> String {
		self.resource_url(&format!("events/{}", urlencoding::encode(collection.as_str())))
	}

	/// Sends one batch to the bulk-insert endpoint.
	///
	/// On success, returns the events the server rejected individually, in
	/// submission order. Any failure of the request as a whole returns the
	/// batch untouched.
	pub async fn submit(&self, batch: Batch) -> std::result::Result<Vec<RejectedEvent>, BatchFailure> {
		let Batch { collection, items } = batch;
		let body = bulk_insert_body(collection.as_str(), items.iter().map(EventRecord::payload));

		debug!(collection = %collection, count = items.len(), "submitting batch");

		let results = match self.post_bulk(&collection, items.len(), &body).await {
			Ok(results) => results,
			Err(error) => {
				warn!(collection = %collection, count = items.len(), error = %error, "batch failed");
				return Err(BatchFailure {
					error,
					events: items,
				});
			}
		};

		let mut rejected = Vec::new();
		for (mut event, result) in items.into_iter().zip(results) {
			if let Some(error) = result.rejection() {
				event.set_error(error.clone());
				rejected.push(RejectedEvent { event, error });
			}
		}

		if !rejected.is_empty() {
			warn!(collection = %collection, rejected = rejected.len(), "server rejected events");
		}
		Ok(rejected)
	}

	async fn post_bulk(
		&self,
		collection: &CollectionName,
		expected: usize,
		body: &serde_json::Value,
	) -> Result<Vec<keen_analytics_core::ItemResult>> {
		let response = self
			.transport
			.post(&self.events_url(), self.write_key.expose(), body)
			.await?;
		let json = check_response(&response)?;

		bulk_insert_results(&json, collection.as_str(), expected)
			.map_err(|e| KeenError::ResponseMismatch(e.to_string()))
	}

	/// Sends one event to its collection endpoint. A rejection is the error.
	pub async fn send_single(&self, record: &EventRecord) -> Result<()> {
		let url = self.collection_url(record.collection());
		debug!(collection = %record.collection(), "sending single event");

		let body = serde_json::Value::Object(record.payload().clone());
		let response = self
			.transport
			.post(&url, self.write_key.expose(), &body)
			.await?;
		if !response.is_success() {
			check_response(&response)?;
		}

		// Any 2xx is an accepted event; the body only matters if it is an
		// error envelope.
		match response.json().ok().as_ref().and_then(error_envelope) {
			Some(error) => Err(KeenError::Api(error)),
			None => Ok(()),
		}
	}
}

/// Parses the body and turns error envelopes and non-2xx statuses into errors.
fn check_response(response: &TransportResponse) -> Result<serde_json::Value> {
	let json = response.json()?;
	if let Some(error) = error_envelope(&json) {
		return Err(KeenError::Api(error));
	}
	if !response.is_success() {
		return Err(KeenError::ServerError {
			status: response.status,
			message: response.body.clone(),
		});
	}
	Ok(json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::TransportError;
	use crate::testing::MockTransport;
	use proptest::prelude::*;
	use serde_json::{json, Map, Value};

	fn name(s: &str) -> CollectionName {
		CollectionName::parse(s).unwrap()
	}

	fn event(collection: &str, label: &str) -> EventRecord {
		let mut payload = Map::new();
		payload.insert("id".to_string(), json!(label));
		EventRecord::new(name(collection), payload)
	}

	fn submitter(transport: Arc<MockTransport>) -> BatchSubmitter {
		BatchSubmitter::new(transport, "https://api.keen.io/3.0/", "proj1", ApiKey::new("wk"))
	}

	fn batch(collection: &str, labels: &[&str]) -> Batch {
		Batch {
			collection: name(collection),
			items: labels.iter().map(|l| event(collection, l)).collect(),
		}
	}

	fn labels(batch: &Batch) -> Vec<String> {
		batch
			.items
			.iter()
			.map(|e| e.payload()["id"].as_str().unwrap().to_string())
			.collect()
	}

	#[test]
	fn accumulator_flushes_full_groups() {
		let mut acc = BatchAccumulator::new(2);
		assert!(acc.push(event("purchases", "e1")).is_none());
		let full = acc.push(event("purchases", "e2")).unwrap();
		assert_eq!(labels(&full), vec!["e1", "e2"]);
		assert!(acc.push(event("purchases", "e3")).is_none());

		let rest = acc.finish();
		assert_eq!(rest.len(), 1);
		assert_eq!(labels(&rest[0]), vec!["e3"]);
	}

	#[test]
	fn accumulator_keeps_first_seen_order() {
		let mut acc = BatchAccumulator::new(10);
		acc.push(event("b", "1"));
		acc.push(event("a", "2"));
		acc.push(event("b", "3"));
		assert_eq!(acc.pending(), 3);

		let groups = acc.finish();
		let order: Vec<&str> = groups.iter().map(|g| g.collection.as_str()).collect();
		assert_eq!(order, vec!["b", "a"]);
		assert_eq!(labels(&groups[0]), vec!["1", "3"]);
	}

	#[tokio::test]
	async fn submit_posts_bulk_body_to_events_endpoint() {
		let transport = Arc::new(MockTransport::accepting());
		let rejected = submitter(transport.clone())
			.submit(batch("purchases", &["e1", "e2"]))
			.await
			.unwrap();

		assert!(rejected.is_empty());
		let requests = transport.requests();
		assert_eq!(requests.len(), 1);
		assert_eq!(requests[0].url, "https://api.keen.io/3.0/projects/proj1/events");
		assert_eq!(requests[0].key, "wk");
		assert_eq!(
			requests[0].body,
			json!({"purchases": [{"id": "e1"}, {"id": "e2"}]})
		);
	}

	#[tokio::test]
	async fn mixed_response_yields_one_rejection() {
		let transport = Arc::new(MockTransport::accepting().respond(
			200,
			json!({"purchases": [
				{"success": true},
				{"success": false, "error": {"name": "InvalidEventError", "description": "bad shape"}}
			]}),
		));

		let rejected = submitter(transport)
			.submit(batch("purchases", &["e1", "e2"]))
			.await
			.unwrap();

		assert_eq!(rejected.len(), 1);
		assert_eq!(rejected[0].event.payload()["id"], "e2");
		assert_eq!(rejected[0].error, ApiError::InvalidEvent("bad shape".to_string()));
		assert_eq!(rejected[0].event.error(), Some(&rejected[0].error));
	}

	#[tokio::test]
	async fn error_envelope_fails_whole_batch() {
		let transport = Arc::new(MockTransport::accepting().respond(
			401,
			json!({"error_code": "InvalidApiKeyError", "message": "bad key"}),
		));

		let failure = submitter(transport)
			.submit(batch("purchases", &["e1", "e2"]))
			.await
			.unwrap_err();

		assert_eq!(
			failure.error.api_error(),
			Some(&ApiError::InvalidApiKey("bad key".to_string()))
		);
		assert_eq!(failure.events.len(), 2);
	}

	#[tokio::test]
	async fn error_envelope_wins_even_with_success_status() {
		let transport = Arc::new(MockTransport::accepting().respond(
			200,
			json!({"error_code": "InvalidBatchError", "message": "too big"}),
		));
		let failure = submitter(transport)
			.submit(batch("purchases", &["e1"]))
			.await
			.unwrap_err();
		assert!(matches!(failure.error, KeenError::Api(ApiError::InvalidBatch(_))));
	}

	#[tokio::test]
	async fn non_2xx_without_envelope_is_server_error() {
		let transport = Arc::new(MockTransport::accepting().respond(503, json!({"status": "down"})));
		let failure = submitter(transport)
			.submit(batch("purchases", &["e1"]))
			.await
			.unwrap_err();
		assert!(matches!(failure.error, KeenError::ServerError { status: 503, .. }));
	}

	#[tokio::test]
	async fn transport_failure_returns_batch() {
		let transport = Arc::new(
			MockTransport::accepting().fail_with(TransportError::InvalidBody("eof".to_string())),
		);
		let failure = submitter(transport)
			.submit(batch("purchases", &["e1", "e2", "e3"]))
			.await
			.unwrap_err();
		assert!(matches!(failure.error, KeenError::Transport(_)));
		assert_eq!(failure.events.len(), 3);
	}

	#[tokio::test]
	async fn unparsable_body_is_transport_failure() {
		let transport = Arc::new(MockTransport::with_fallback(|_| {
			Ok(TransportResponse {
				status: 200,
				body: "<html>".to_string(),
			})
		}));
		let failure = submitter(transport)
			.submit(batch("purchases", &["e1"]))
			.await
			.unwrap_err();
		assert!(matches!(failure.error, KeenError::Transport(TransportError::InvalidBody(_))));
	}

	#[tokio::test]
	async fn short_result_array_is_a_mismatch() {
		let transport = Arc::new(
			MockTransport::accepting().respond(200, json!({"purchases": [{"success": true}]})),
		);
		let failure = submitter(transport)
			.submit(batch("purchases", &["e1", "e2"]))
			.await
			.unwrap_err();
		assert!(matches!(failure.error, KeenError::ResponseMismatch(_)));
		assert_eq!(failure.events.len(), 2);
	}

	#[tokio::test]
	async fn send_single_posts_to_collection_endpoint() {
		let transport = Arc::new(MockTransport::accepting());
		submitter(transport.clone())
			.send_single(&event("page views", "e1"))
			.await
			.unwrap();
		let requests = transport.requests();
		assert_eq!(
			requests[0].url,
			"https://api.keen.io/3.0/projects/proj1/events/page%20views"
		);
		assert_eq!(requests[0].body, json!({"id": "e1"}));
	}

	#[tokio::test]
	async fn send_single_surfaces_rejection() {
		let transport = Arc::new(MockTransport::accepting().respond(
			400,
			json!({"error_code": "InvalidPropertyNameError", "message": "no dots"}),
		));
		let err = submitter(transport)
			.send_single(&event("purchases", "e1"))
			.await
			.unwrap_err();
		assert_eq!(
			err.api_error(),
			Some(&ApiError::InvalidPropertyName("no dots".to_string()))
		);
	}

	#[tokio::test]
	async fn send_single_accepts_any_success_body() {
		for body in ["Created", "<html>ok</html>", ""] {
			let transport = Arc::new(MockTransport::with_fallback(move |_| {
				Ok(TransportResponse {
					status: 201,
					body: body.to_string(),
				})
			}));
			submitter(transport)
				.send_single(&event("purchases", "e1"))
				.await
				.unwrap();
		}
	}

	#[tokio::test]
	async fn send_single_success_status_with_envelope_fails() {
		let transport = Arc::new(MockTransport::accepting().respond(
			200,
			json!({"error_code": "InvalidEventError", "message": "bad shape"}),
		));
		let err = submitter(transport)
			.send_single(&event("purchases", "e1"))
			.await
			.unwrap_err();
		assert!(matches!(err, KeenError::Api(ApiError::InvalidEvent(_))));
	}

	proptest! {
		#[test]
		fn chunks_respect_bound_and_keep_everything(count in 0usize..50, max in 1usize..8) {
			let collection = name("purchases");
			let items: Vec<EventRecord> =
				(0..count).map(|i| event("purchases", &i.to_string())).collect();

			let batches = chunk(&collection, items, max);
			prop_assert!(batches.iter().all(|b| !b.items.is_empty() && b.items.len() <= max));

			let flattened: Vec<String> = batches.iter().flat_map(labels).collect();
			let expected: Vec<String> = (0..count).map(|i| i.to_string()).collect();
			prop_assert_eq!(flattened, expected);
		}

		#[test]
		fn accumulator_bounds_mixed_collections(
			picks in proptest::collection::vec(0usize..3, 0..60),
			max in 1usize..6,
		) {
			const COLLECTIONS: [&str; 3] = ["alpha", "beta", "gamma"];
			let mut acc = BatchAccumulator::new(max);
			let mut batches = Vec::new();
			for (i, pick) in picks.iter().enumerate() {
				batches.extend(acc.push(event(COLLECTIONS[*pick], &i.to_string())));
			}
			batches.extend(acc.finish());

			for b in &batches {
				prop_assert!(!b.items.is_empty() && b.items.len() <= max);
				prop_assert!(b.items.iter().all(|e| e.collection() == &b.collection));
			}

			for (index, collection) in COLLECTIONS.iter().enumerate() {
				let sent: Vec<String> = batches
					.iter()
					.filter(|b| b.collection.as_str() == *collection)
					.flat_map(labels)
					.collect();
				let expected: Vec<String> = picks
					.iter()
					.enumerate()
					.filter(|(_, pick)| **pick == index)
					.map(|(i, _)| i.to_string())
					.collect();
				prop_assert_eq!(sent, expected);
			}
		}

		#[test]
		fn rejection_pairs_positionally(outcomes in proptest::collection::vec(any::<bool>(), 1..20)) {
			let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
			let entries: Vec<Value> = outcomes
				.iter()
				.map(|ok| {
					if *ok {
						json!({"success": true})
					} else {
						json!({"success": false, "error": {"name": "InvalidEventError", "description": "x"}})
					}
				})
				.collect();
			let transport = Arc::new(
				MockTransport::accepting().respond(200, json!({ "purchases": entries })),
			);
			let labels_in: Vec<String> = (0..outcomes.len()).map(|i| i.to_string()).collect();
			let refs: Vec<&str> = labels_in.iter().map(String::as_str).collect();

			let rejected = rt
				.block_on(submitter(transport).submit(batch("purchases", &refs)))
				.unwrap();

			let rejected_ids: Vec<String> = rejected
				.iter()
				.map(|r| r.event.payload()["id"].as_str().unwrap().to_string())
				.collect();
			let expected: Vec<String> = outcomes
				.iter()
				.enumerate()
				.filter(|(_, ok)| !**ok)
				.map(|(i, _)| i.to_string())
				.collect();
			prop_assert_eq!(rejected_ids, expected);
		}
	}
}
