// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Rust SDK for the Keen event ingestion API.
//!
//! This crate provides a client for recording events:
//!
//! - **Direct sends**: without a local queue every event is sent as it is added
//! - **Cached sends**: events are stored in an [`EventQueue`] (memory or disk)
//!   and sent in per-collection batches by [`KeenClient::send_cached_events`]
//! - **Global properties**: static or computed values attached to every event
//! - **Per-event reporting**: server rejections come back as [`RejectedEvent`]s
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keen_analytics::{KeenClient, MemoryEventQueue, Properties};
//!
//! let client = KeenClient::builder()
//!     .project_id("5011efa95f546f2ce2000000")
//!     .write_key("write-key")
//!     .event_queue(Arc::new(MemoryEventQueue::new()))
//!     .build()?;
//!
//! client.add_event("purchases", &Properties::new().insert("item", "golden gate"), &[]).await?;
//!
//! match client.send_cached_events().await {
//!     Ok(()) => {}
//!     Err(e) => for rejected in e.rejected() {
//!         eprintln!("{}: {}", rejected.event.collection(), rejected.error);
//!     },
//! }
//!
//! client.shutdown().await?;
//! ```

mod batch;
mod client;
mod error;
mod flush;
mod queue;
mod transport;

#[cfg(test)]
mod testing;

pub use batch::{chunk, Batch, BatchAccumulator, BatchFailure, BatchSubmitter, RejectedEvent};
pub use client::{KeenClient, KeenClientBuilder};
pub use error::{KeenError, QueueError, Result, TransportError};
pub use flush::FlushTask;
pub use queue::{EventQueue, FileEventQueue, MemoryEventQueue};
pub use transport::{HttpTransport, Transport, TransportResponse};

pub use keen_analytics_core::{
	AddOn, ApiError, CollectionName, EventRecord, GlobalPropertyValue, Properties,
};
pub use keen_common_http::RetryConfig;
pub use keen_config::{ApiKey, KeenConfig};
