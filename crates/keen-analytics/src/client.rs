// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Keen client: event preparation, routing and cache draining.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;
use keen_analytics_core::{
	prepare_payload, to_event_object, AddOn, CollectionName, CollectionNameCache, EventRecord,
	GlobalProperties, GlobalPropertyValue,
};
use keen_common_http::RetryConfig;
use keen_config::{ApiKey, CacheMode, KeenConfig, DEFAULT_BASE_URL, DEFAULT_MAX_BATCH_SIZE};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::batch::{chunk, BatchAccumulator, BatchFailure, BatchSubmitter, RejectedEvent};
use crate::error::{KeenError, Result};
use crate::flush::FlushTask;
use crate::queue::{EventQueue, FileEventQueue, MemoryEventQueue};
use crate::transport::{HttpTransport, Transport};

/// Builder for constructing a [`KeenClient`].
pub struct KeenClientBuilder {
	project_id: Option<String>,
	write_key: Option<ApiKey>,
	base_url: String,
	request_timeout: Duration,
	retry_config: RetryConfig,
	max_batch_size: usize,
	queue: Option<Arc<dyn EventQueue>>,
	transport: Option<Arc<dyn Transport>>,
	global_properties: GlobalProperties,
}

impl KeenClientBuilder {
	pub fn new() -> Self {
		Self {
			project_id: None,
			write_key: None,
			base_url: DEFAULT_BASE_URL.to_string(),
			request_timeout: Duration::from_secs(keen_config::DEFAULT_REQUEST_TIMEOUT_SECS),
			retry_config: RetryConfig::default(),
			max_batch_size: DEFAULT_MAX_BATCH_SIZE,
			queue: None,
			transport: None,
			global_properties: GlobalProperties::new(),
		}
	}

	pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
		self.project_id = Some(project_id.into());
		self
	}

	pub fn write_key(mut self, key: impl Into<ApiKey>) -> Self {
		self.write_key = Some(key.into());
		self
	}

	/// Sets the API base URL, e.g. `https://api.keen.io/3.0`.
	pub fn base_url(mut self, url: impl Into<String>) -> Self {
		self.base_url = url.into();
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn retry_config(mut self, config: RetryConfig) -> Self {
		self.retry_config = config;
		self
	}

	pub fn max_batch_size(mut self, size: usize) -> Self {
		self.max_batch_size = size;
		self
	}

	/// Buffers events in `queue` instead of sending them immediately.
	pub fn event_queue(mut self, queue: Arc<dyn EventQueue>) -> Self {
		self.queue = Some(queue);
		self
	}

	/// Replaces the HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Registers a global property. Fails for an invalid property name.
	pub fn global_property(
		mut self,
		name: impl Into<String>,
		value: impl Into<GlobalPropertyValue>,
	) -> Result<Self> {
		self.global_properties.set(name, value)?;
		Ok(self)
	}

	pub fn build(self) -> Result<KeenClient> {
		let project_id = self
			.project_id
			.map(|id| id.trim().to_string())
			.filter(|id| !id.is_empty())
			.ok_or_else(|| KeenError::InvalidArgument("project id is required".to_string()))?;

		let base_url = self.base_url.trim().trim_end_matches('/').to_string();
		if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
			return Err(KeenError::InvalidArgument(format!(
				"base URL must be http(s): '{base_url}'"
			)));
		}

		if self.max_batch_size == 0 {
			return Err(KeenError::InvalidArgument(
				"max batch size must be at least 1".to_string(),
			));
		}

		let transport: Arc<dyn Transport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(HttpTransport::new(self.request_timeout, self.retry_config)?),
		};

		let submitter = self
			.write_key
			.filter(|key| !key.is_empty())
			.map(|key| BatchSubmitter::new(transport, base_url.clone(), project_id.clone(), key));

		info!(
			project_id = %project_id,
			base_url = %base_url,
			write_key_configured = submitter.is_some(),
			queued = self.queue.is_some(),
			max_batch_size = self.max_batch_size,
			"Keen client initialized"
		);

		Ok(KeenClient {
			inner: Arc::new(ClientInner {
				project_id,
				submitter,
				max_batch_size: self.max_batch_size,
				queue: self.queue,
				collections: CollectionNameCache::new(),
				globals: RwLock::new(self.global_properties),
				drain_lock: Mutex::new(()),
				closed: AtomicBool::new(false),
			}),
		})
	}
}

impl Default for KeenClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ClientInner {
	project_id: String,
	submitter: Option<BatchSubmitter>,
	max_batch_size: usize,
	queue: Option<Arc<dyn EventQueue>>,
	collections: CollectionNameCache,
	globals: RwLock<GlobalProperties>,
	drain_lock: Mutex<()>,
	closed: AtomicBool,
}

/// Client for recording events to one Keen project.
///
/// Without an event queue every `add_event*` call is sent immediately. With
/// one, events are stored locally and sent by [`KeenClient::send_cached_events`]
/// (or a [`FlushTask`]).
///
/// # Example
///
/// ```ignore
/// use keen_analytics::{KeenClient, Properties};
///
/// let client = KeenClient::builder()
///     .project_id("5011efa95f546f2ce2000000")
///     .write_key("write-key")
///     .build()?;
///
/// client
///     .add_event("purchases", &Properties::new().insert("item", "golden gate"), &[])
///     .await?;
/// ```
#[derive(Clone)]
pub struct KeenClient {
	inner: Arc<ClientInner>,
}

impl KeenClient {
	pub fn builder() -> KeenClientBuilder {
		KeenClientBuilder::new()
	}

	/// Builds a client from resolved configuration.
	pub fn from_config(config: &KeenConfig) -> Result<Self> {
		let mut builder = Self::builder()
			.project_id(config.project.project_id.clone())
			.base_url(config.http.base_url.clone())
			.request_timeout(config.http.request_timeout)
			.retry_config(RetryConfig::default().with_max_attempts(config.http.retry_max_attempts))
			.max_batch_size(config.batching.max_batch_size);

		if let Some(key) = &config.project.write_key {
			builder = builder.write_key(key.clone());
		}

		builder = match &config.batching.cache {
			CacheMode::None => builder,
			CacheMode::Memory => builder.event_queue(Arc::new(MemoryEventQueue::new())),
			CacheMode::File(dir) => builder.event_queue(Arc::new(FileEventQueue::open(dir)?)),
		};

		builder.build()
	}

	pub fn project_id(&self) -> &str {
		&self.inner.project_id
	}

	pub fn max_batch_size(&self) -> usize {
		self.inner.max_batch_size
	}

	pub fn has_event_queue(&self) -> bool {
		self.inner.queue.is_some()
	}

	/// Registers or replaces a property attached to every prepared event.
	pub fn set_global_property(
		&self,
		name: impl Into<String>,
		value: impl Into<GlobalPropertyValue>,
	) -> Result<()> {
		self.write_globals().set(name, value)?;
		Ok(())
	}

	/// Returns whether `name` was registered.
	pub fn remove_global_property(&self, name: &str) -> bool {
		self.write_globals().remove(name)
	}

	/// Registered global property names, in registration order.
	pub fn global_property_names(&self) -> Vec<String> {
		self.read_globals().names()
	}

	/// Builds the payload that would be stored or sent for `event`.
	///
	/// Performs no I/O and does not require a write key.
	pub fn prepare_event<T>(&self, collection: &str, event: &T, add_ons: &[AddOn]) -> Result<EventRecord>
	where
		T: Serialize + ?Sized,
	{
		let collection = self.inner.collections.validate(collection)?;
		let globals = self.read_globals().clone();
		prepare(&collection, event, &globals, add_ons)
	}

	/// Records one event.
	///
	/// With an event queue the event is stored and no request is made.
	/// Otherwise it is sent to the collection endpoint and a server rejection
	/// is returned as the error.
	pub async fn add_event<T>(&self, collection: &str, event: &T, add_ons: &[AddOn]) -> Result<()>
	where
		T: Serialize + ?Sized,
	{
		self.check_closed()?;
		let collection = self.inner.collections.validate(collection)?;
		let submitter = self.submitter()?;

		let globals = self.read_globals().clone();
		let record = prepare(&collection, event, &globals, add_ons)?;

		match &self.inner.queue {
			Some(queue) => {
				queue.add(record)?;
				debug!(collection = %collection, "queued event");
				Ok(())
			}
			None => submitter.send_single(&record).await,
		}
	}

	/// Records many events for one collection.
	///
	/// Every event is prepared before anything is stored or sent: if one
	/// preparation fails the call fails and nothing happens. Without an event
	/// queue the events are sent in batches of at most `max_batch_size`;
	/// individual rejections are returned together as
	/// [`KeenError::PartialBatchFailure`].
	pub async fn add_events<T>(&self, collection: &str, events: &[T], add_ons: &[AddOn]) -> Result<()>
	where
		T: Serialize,
	{
		self.check_closed()?;
		let collection = self.inner.collections.validate(collection)?;
		let submitter = self.submitter()?;

		let globals = self.read_globals().clone();
		let records = events
			.iter()
			.map(|event| prepare(&collection, event, &globals, add_ons))
			.collect::<Result<Vec<_>>>()?;

		if records.is_empty() {
			return Ok(());
		}

		if let Some(queue) = &self.inner.queue {
			let count = records.len();
			for record in records {
				queue.add(record)?;
			}
			debug!(collection = %collection, count, "queued events");
			return Ok(());
		}

		let mut pending = chunk(&collection, records, self.inner.max_batch_size).into_iter();
		let mut rejected = Vec::new();
		let mut delivered_any = false;

		while let Some(batch) = pending.next() {
			match submitter.submit(batch).await {
				Ok(batch_rejected) => {
					delivered_any = true;
					rejected.extend(batch_rejected);
				}
				Err(failure) => {
					if !delivered_any {
						return Err(failure.error);
					}
					let rest = pending.flat_map(|b| b.items).collect();
					return Err(aborted(failure, rest, rejected));
				}
			}
		}

		partial_failure(rejected)
	}

	/// Sends every queued event, grouped per collection in batches of at
	/// most `max_batch_size`.
	///
	/// Drains are serialized: a second caller waits for the first to finish.
	/// Rejected events are reported in [`KeenError::PartialBatchFailure`] and
	/// are not queued again.
	pub async fn send_cached_events(&self) -> Result<()> {
		self.check_closed()?;
		self.drain_queue().await
	}

	async fn drain_queue(&self) -> Result<()> {
		let queue = self.inner.queue.as_ref().ok_or(KeenError::NoEventQueue)?;
		let submitter = match self.submitter() {
			Ok(submitter) => submitter,
			Err(_) if queue.is_empty() => return Ok(()),
			Err(e) => return Err(e),
		};

		let _drain = self.inner.drain_lock.lock().await;

		let mut accumulator = BatchAccumulator::new(self.inner.max_batch_size);
		let mut rejected = Vec::new();
		let mut drained = 0usize;
		let mut batches = 0usize;

		loop {
			let record = match queue.try_take() {
				Ok(Some(record)) => record,
				Ok(None) => break,
				Err(e) => {
					let held = accumulator.into_records();
					if held.is_empty() && rejected.is_empty() {
						return Err(e);
					}
					return Err(KeenError::SubmissionAborted {
						source: Box::new(e),
						undelivered: held,
						rejected,
					});
				}
			};
			drained += 1;

			if let Some(batch) = accumulator.push(record) {
				batches += 1;
				match submitter.submit(batch).await {
					Ok(batch_rejected) => rejected.extend(batch_rejected),
					Err(failure) => {
						return Err(aborted(failure, accumulator.into_records(), rejected));
					}
				}
			}
		}

		let mut remaining = accumulator.finish().into_iter();
		while let Some(batch) = remaining.next() {
			batches += 1;
			match submitter.submit(batch).await {
				Ok(batch_rejected) => rejected.extend(batch_rejected),
				Err(failure) => {
					let rest = remaining.flat_map(|b| b.items).collect();
					return Err(aborted(failure, rest, rejected));
				}
			}
		}

		if drained > 0 {
			info!(
				count = drained,
				batches,
				rejected = rejected.len(),
				"sent cached events"
			);
		}

		partial_failure(rejected)
	}

	/// Number of events waiting in the event queue.
	pub fn queued_len(&self) -> usize {
		self.inner.queue.as_ref().map_or(0, |q| q.len())
	}

	/// Sends cached events every `interval` on a background task.
	pub fn spawn_flush_task(&self, interval: Duration) -> FlushTask {
		FlushTask::spawn(self.clone(), interval)
	}

	/// Flushes the event queue, if any, and closes the client.
	///
	/// Operations after shutdown fail with [`KeenError::ClientShutdown`].
	/// Calling it again is a no-op.
	pub async fn shutdown(&self) -> Result<()> {
		if self.inner.closed.swap(true, Ordering::SeqCst) {
			return Ok(());
		}

		info!(project_id = %self.inner.project_id, "Shutting down Keen client");

		let result = match &self.inner.queue {
			Some(_) => self.drain_queue().await,
			None => Ok(()),
		};

		if let Err(e) = &result {
			warn!(error = %e, "final flush failed during shutdown");
		}
		info!("Keen client shutdown complete");
		result
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	fn check_closed(&self) -> Result<()> {
		if self.inner.closed.load(Ordering::SeqCst) {
			return Err(KeenError::ClientShutdown);
		}
		Ok(())
	}

	fn submitter(&self) -> Result<&BatchSubmitter> {
		self.inner.submitter.as_ref().ok_or(KeenError::MissingKey)
	}

	fn read_globals(&self) -> std::sync::RwLockReadGuard<'_, GlobalProperties> {
		self.inner.globals.read().unwrap_or_else(|e| e.into_inner())
	}

	fn write_globals(&self) -> std::sync::RwLockWriteGuard<'_, GlobalProperties> {
		self.inner.globals.write().unwrap_or_else(|e| e.into_inner())
	}
}

fn prepare<T>(
	collection: &CollectionName,
	event: &T,
	globals: &GlobalProperties,
	add_ons: &[AddOn],
) -> Result<EventRecord>
where
	T: Serialize + ?Sized,
{
	let raw = to_event_object(event)?;
	let payload = prepare_payload(raw, globals, add_ons, Utc::now())?;
	Ok(EventRecord::new(collection.clone(), payload))
}

fn aborted(failure: BatchFailure, rest: Vec<EventRecord>, rejected: Vec<RejectedEvent>) -> KeenError {
	let BatchFailure { error, mut events } = failure;
	events.extend(rest);
	KeenError::SubmissionAborted {
		source: Box::new(error),
		undelivered: events,
		rejected,
	}
}

fn partial_failure(rejected: Vec<RejectedEvent>) -> Result<()> {
	if rejected.is_empty() {
		Ok(())
	} else {
		Err(KeenError::PartialBatchFailure(rejected))
	}
}
