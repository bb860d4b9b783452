// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local event queues.
//!
//! A queue holds prepared events until [`crate::KeenClient::send_cached_events`]
//! drains it. Every operation takes one coarse lock, so each call is atomic
//! with respect to the others.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use keen_analytics_core::{CollectionName, EventRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{KeenError, QueueError, Result};

/// FIFO store of prepared events.
pub trait EventQueue: Send + Sync {
	/// Appends `record`. Records that already carry a submission error are
	/// refused; a record is never queued twice.
	fn add(&self, record: EventRecord) -> Result<()>;

	/// Removes and returns the oldest record, without waiting.
	fn try_take(&self) -> Result<Option<EventRecord>>;

	fn clear(&self) -> Result<()>;

	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

fn check_queueable(record: &EventRecord) -> Result<()> {
	match record.error() {
		Some(err) => Err(KeenError::InvalidArgument(format!(
			"event already failed submission ({}) and cannot be queued",
			err.code()
		))),
		None => Ok(()),
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// In-process queue. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryEventQueue {
	events: Mutex<VecDeque<EventRecord>>,
}

impl MemoryEventQueue {
	pub fn new() -> Self {
		Self::default()
	}
}

impl EventQueue for MemoryEventQueue {
	fn add(&self, record: EventRecord) -> Result<()> {
		check_queueable(&record)?;
		lock(&self.events).push_back(record);
		Ok(())
	}

	fn try_take(&self) -> Result<Option<EventRecord>> {
		Ok(lock(&self.events).pop_front())
	}

	fn clear(&self) -> Result<()> {
		lock(&self.events).clear();
		Ok(())
	}

	fn len(&self) -> usize {
		lock(&self.events).len()
	}
}

#[derive(Serialize, Deserialize)]
struct StoredEvent {
	collection: CollectionName,
	payload: Map<String, Value>,
}

const EVENT_EXT: &str = "json";
const CORRUPT_EXT: &str = "corrupt";

/// Directory-backed queue that survives restarts.
///
/// Each event is one JSON file named by a UUIDv7, so lexical order of the
/// file names is insertion order. Files are owner-only on unix.
///
/// The directory is listed once, on open; after that the queue tracks its
/// files itself. A directory must not be shared by two open queues.
#[derive(Debug)]
pub struct FileEventQueue {
	dir: PathBuf,
	pending: Mutex<VecDeque<PathBuf>>,
}

impl FileEventQueue {
	/// Opens (creating if needed) the queue directory and indexes the
	/// events already stored in it.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
		let dir = dir.into();
		fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;
		let pending = list_event_files(&dir)?;
		debug!(dir = %dir.display(), pending = pending.len(), "opened file event queue");
		Ok(Self {
			dir,
			pending: Mutex::new(pending),
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	fn read_event(path: &Path) -> std::result::Result<EventRecord, String> {
		let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
		let stored: StoredEvent = serde_json::from_str(&content).map_err(|e| e.to_string())?;
		Ok(EventRecord::new(stored.collection, stored.payload))
	}

	fn quarantine(path: &Path) {
		let target = path.with_extension(CORRUPT_EXT);
		if let Err(e) = fs::rename(path, &target) {
			warn!(path = %path.display(), error = %e, "failed to set aside unreadable queued event");
		}
	}
}

fn list_event_files(dir: &Path) -> Result<VecDeque<PathBuf>> {
	let entries = fs::read_dir(dir).map_err(|source| io_error(dir, source))?;
	let mut files: Vec<PathBuf> = entries
		.filter_map(|entry| entry.ok().map(|e| e.path()))
		.filter(|path| path.extension().is_some_and(|ext| ext == EVENT_EXT))
		.collect();
	files.sort();
	Ok(files.into())
}

fn io_error(path: &Path, source: std::io::Error) -> KeenError {
	KeenError::Queue(QueueError::Io {
		path: path.to_path_buf(),
		source,
	})
}

fn remove_entry(path: &Path) -> Result<()> {
	match fs::remove_file(path) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(source) => Err(io_error(path, source)),
	}
}

impl EventQueue for FileEventQueue {
	fn add(&self, record: EventRecord) -> Result<()> {
		check_queueable(&record)?;
		let collection = record.collection().clone();
		let stored = StoredEvent {
			collection,
			payload: record.into_payload(),
		};
		let bytes = serde_json::to_vec(&stored).map_err(QueueError::from)?;

		let mut pending = lock(&self.pending);

		let id = uuid7::uuid7();
		let tmp = self.dir.join(format!(".{id}.tmp"));
		let path = self.dir.join(format!("{id}.{EVENT_EXT}"));

		let mut opts = OpenOptions::new();
		opts.create_new(true).write(true);
		#[cfg(unix)]
		opts.mode(0o600);
		let mut file = opts.open(&tmp).map_err(|source| io_error(&tmp, source))?;
		file
			.write_all(&bytes)
			.and_then(|_| file.sync_all())
			.map_err(|source| io_error(&tmp, source))?;
		drop(file);

		fs::rename(&tmp, &path).map_err(|source| io_error(&path, source))?;
		pending.push_back(path);
		Ok(())
	}

	fn try_take(&self) -> Result<Option<EventRecord>> {
		let mut pending = lock(&self.pending);

		while let Some(path) = pending.pop_front() {
			match Self::read_event(&path) {
				Ok(record) => {
					if let Err(e) = remove_entry(&path) {
						pending.push_front(path);
						return Err(e);
					}
					return Ok(Some(record));
				}
				Err(e) => {
					warn!(path = %path.display(), error = %e, "skipping unreadable queued event");
					Self::quarantine(&path);
				}
			}
		}

		Ok(None)
	}

	fn clear(&self) -> Result<()> {
		let mut pending = lock(&self.pending);
		while let Some(path) = pending.pop_front() {
			if let Err(e) = remove_entry(&path) {
				pending.push_front(path);
				return Err(e);
			}
		}
		Ok(())
	}

	fn len(&self) -> usize {
		lock(&self.pending).len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keen_analytics_core::ApiError;
	use proptest::prelude::*;
	use serde_json::json;
	use std::collections::HashSet;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;
	use std::thread;

	fn event(collection: &str, n: i64) -> EventRecord {
		let mut payload = Map::new();
		payload.insert("n".to_string(), json!(n));
		EventRecord::new(CollectionName::parse(collection).unwrap(), payload)
	}

	fn take_all(queue: &dyn EventQueue) -> Vec<i64> {
		let mut out = Vec::new();
		while let Some(record) = queue.try_take().unwrap() {
			out.push(record.payload()["n"].as_i64().unwrap());
		}
		out
	}

	#[test]
	fn memory_queue_is_fifo() {
		let queue = MemoryEventQueue::new();
		for n in 0..5 {
			queue.add(event("purchases", n)).unwrap();
		}
		assert_eq!(queue.len(), 5);
		assert_eq!(take_all(&queue), vec![0, 1, 2, 3, 4]);
		assert!(queue.is_empty());
	}

	#[test]
	fn failed_events_are_refused() {
		let mut failed = event("purchases", 1);
		failed.set_error(ApiError::InvalidEvent("bad".to_string()));

		let memory = MemoryEventQueue::new();
		assert!(memory.add(failed.clone()).unwrap_err().is_invalid_argument());
		assert!(memory.is_empty());

		let dir = tempfile::tempdir().unwrap();
		let file = FileEventQueue::open(dir.path()).unwrap();
		assert!(file.add(failed).unwrap_err().is_invalid_argument());
		assert!(file.is_empty());
	}

	#[test]
	fn clear_empties_queue() {
		let queue = MemoryEventQueue::new();
		queue.add(event("a", 1)).unwrap();
		queue.clear().unwrap();
		assert!(queue.try_take().unwrap().is_none());
	}

	#[test]
	fn file_queue_is_fifo_and_persistent() {
		let dir = tempfile::tempdir().unwrap();
		{
			let queue = FileEventQueue::open(dir.path()).unwrap();
			for n in 0..4 {
				queue.add(event("signups", n)).unwrap();
			}
		}

		let reopened = FileEventQueue::open(dir.path()).unwrap();
		assert_eq!(reopened.len(), 4);
		let first = reopened.try_take().unwrap().unwrap();
		assert_eq!(first.collection().as_str(), "signups");
		assert_eq!(take_all(&reopened), vec![1, 2, 3]);
	}

	#[test]
	fn file_queue_preserves_payload_order() {
		let dir = tempfile::tempdir().unwrap();
		let queue = FileEventQueue::open(dir.path()).unwrap();
		let mut payload = Map::new();
		payload.insert("zeta".to_string(), json!(1));
		payload.insert("alpha".to_string(), json!(2));
		queue
			.add(EventRecord::new(CollectionName::parse("c").unwrap(), payload))
			.unwrap();

		let taken = queue.try_take().unwrap().unwrap();
		let keys: Vec<&String> = taken.payload().keys().collect();
		assert_eq!(keys, vec!["zeta", "alpha"]);
	}

	#[test]
	fn file_queue_skips_unreadable_files() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("00000000-0000-0000-0000-000000000000.json"), "not json").unwrap();
		let queue = FileEventQueue::open(dir.path()).unwrap();
		assert_eq!(queue.len(), 1);
		queue.add(event("c", 7)).unwrap();

		assert_eq!(take_all(&queue), vec![7]);
		assert!(dir
			.path()
			.join("00000000-0000-0000-0000-000000000000.corrupt")
			.exists());
	}

	#[cfg(unix)]
	#[test]
	fn file_queue_entries_are_owner_only() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let queue = FileEventQueue::open(dir.path()).unwrap();
		queue.add(event("c", 1)).unwrap();

		let path = list_event_files(dir.path()).unwrap().pop_front().unwrap();
		let mode = fs::metadata(path).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}

	#[test]
	fn file_queue_clear_removes_stored_events() {
		let dir = tempfile::tempdir().unwrap();
		let queue = FileEventQueue::open(dir.path()).unwrap();
		for n in 0..3 {
			queue.add(event("c", n)).unwrap();
		}
		queue.clear().unwrap();

		assert!(queue.is_empty());
		assert!(list_event_files(dir.path()).unwrap().is_empty());
		assert_eq!(FileEventQueue::open(dir.path()).unwrap().len(), 0);
	}

	#[test]
	fn file_queue_drains_many_events_in_order() {
		let dir = tempfile::tempdir().unwrap();
		let queue = FileEventQueue::open(dir.path()).unwrap();
		for n in 0..500 {
			queue.add(event("bulk", n)).unwrap();
		}
		assert_eq!(take_all(&queue), (0..500).collect::<Vec<_>>());
		assert!(list_event_files(dir.path()).unwrap().is_empty());
	}

	const PRODUCERS: i64 = 4;
	const PER_PRODUCER: i64 = 50;
	const CONSUMERS: usize = 3;

	fn producer_event(producer: i64, n: i64) -> EventRecord {
		let mut payload = Map::new();
		payload.insert("p".to_string(), json!(producer));
		payload.insert("n".to_string(), json!(n));
		EventRecord::new(CollectionName::parse("concurrent").unwrap(), payload)
	}

	/// Runs producers and consumers on OS threads and returns what each
	/// consumer took, in take order, as `(producer, n)` pairs.
	fn exchange_concurrently(queue: Arc<dyn EventQueue>) -> Vec<Vec<(i64, i64)>> {
		let done = Arc::new(AtomicBool::new(false));

		let consumers: Vec<_> = (0..CONSUMERS)
			.map(|_| {
				let queue = Arc::clone(&queue);
				let done = Arc::clone(&done);
				thread::spawn(move || {
					let mut taken = Vec::new();
					loop {
						match queue.try_take().unwrap() {
							Some(record) => taken.push((
								record.payload()["p"].as_i64().unwrap(),
								record.payload()["n"].as_i64().unwrap(),
							)),
							None if done.load(Ordering::SeqCst) && queue.is_empty() => break,
							None => thread::yield_now(),
						}
					}
					taken
				})
			})
			.collect();

		let producers: Vec<_> = (0..PRODUCERS)
			.map(|producer| {
				let queue = Arc::clone(&queue);
				thread::spawn(move || {
					for n in 0..PER_PRODUCER {
						queue.add(producer_event(producer, n)).unwrap();
					}
				})
			})
			.collect();

		for producer in producers {
			producer.join().unwrap();
		}
		done.store(true, Ordering::SeqCst);

		consumers.into_iter().map(|c| c.join().unwrap()).collect()
	}

	fn assert_exchange_is_exact(per_consumer: Vec<Vec<(i64, i64)>>) {
		for taken in &per_consumer {
			for producer in 0..PRODUCERS {
				let seen: Vec<i64> = taken
					.iter()
					.filter(|(p, _)| *p == producer)
					.map(|(_, n)| *n)
					.collect();
				assert!(
					seen.windows(2).all(|w| w[0] < w[1]),
					"producer {producer} events taken out of order: {seen:?}"
				);
			}
		}

		let all: Vec<(i64, i64)> = per_consumer.into_iter().flatten().collect();
		let unique: HashSet<(i64, i64)> = all.iter().copied().collect();
		assert_eq!(unique.len(), all.len(), "an event was taken twice");

		let expected: HashSet<(i64, i64)> = (0..PRODUCERS)
			.flat_map(|p| (0..PER_PRODUCER).map(move |n| (p, n)))
			.collect();
		assert_eq!(unique, expected);
	}

	#[test]
	fn memory_queue_concurrent_exchange_is_exact() {
		let queue = Arc::new(MemoryEventQueue::new());
		assert_exchange_is_exact(exchange_concurrently(queue.clone()));
		assert!(queue.is_empty());
	}

	#[test]
	fn file_queue_concurrent_exchange_is_exact() {
		let dir = tempfile::tempdir().unwrap();
		let queue = Arc::new(FileEventQueue::open(dir.path()).unwrap());
		assert_exchange_is_exact(exchange_concurrently(queue.clone()));
		assert!(queue.is_empty());
		assert!(list_event_files(dir.path()).unwrap().is_empty());
	}

	#[derive(Debug, Clone)]
	enum Op {
		Add(i64),
		Take,
	}

	fn op() -> impl Strategy<Value = Op> {
		prop_oneof![any::<i64>().prop_map(Op::Add), Just(Op::Take)]
	}

	proptest! {
		#[test]
		fn taken_values_follow_insertion_order(ops in proptest::collection::vec(op(), 0..64)) {
			let queue = MemoryEventQueue::new();
			let mut added = Vec::new();
			let mut taken = Vec::new();

			for op in ops {
				match op {
					Op::Add(n) => {
						queue.add(event("p", n)).unwrap();
						added.push(n);
					}
					Op::Take => {
						if let Some(record) = queue.try_take().unwrap() {
							taken.push(record.payload()["n"].as_i64().unwrap());
						}
					}
				}
			}

			prop_assert_eq!(&taken[..], &added[..taken.len()]);
			prop_assert_eq!(queue.is_empty(), taken.len() == added.len());
		}
	}
}
