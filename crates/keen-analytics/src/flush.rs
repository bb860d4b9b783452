// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background task that periodically sends cached events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::client::KeenClient;
use crate::error::KeenError;

/// Handle to a running flush loop. See [`KeenClient::spawn_flush_task`].
pub struct FlushTask {
	stop: Arc<Notify>,
	handle: JoinHandle<()>,
}

impl FlushTask {
	pub(crate) fn spawn(client: KeenClient, interval: Duration) -> Self {
		let stop = Arc::new(Notify::new());
		let signal = Arc::clone(&stop);
		let handle = tokio::spawn(async move {
			run(client, interval, signal).await;
		});
		Self { stop, handle }
	}

	/// Stops the loop after one final flush and waits for it to finish.
	pub async fn stop(self) {
		self.stop.notify_one();
		if let Err(e) = self.handle.await {
			error!(error = %e, "Error waiting for flush task to complete");
		}
	}

	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}

async fn run(client: KeenClient, interval: Duration, stop: Arc<Notify>) {
	info!(
		interval_ms = interval.as_millis() as u64,
		"Starting Keen flush task"
	);

	loop {
		tokio::select! {
			_ = tokio::time::sleep(interval) => {
				if !flush_once(&client).await {
					break;
				}
			}
			_ = stop.notified() => {
				flush_once(&client).await;
				break;
			}
		}
	}

	info!("Keen flush task stopped");
}

/// Returns `false` once the client can no longer flush.
async fn flush_once(client: &KeenClient) -> bool {
	match client.send_cached_events().await {
		Ok(()) => true,
		Err(KeenError::ClientShutdown) => {
			debug!("client shut down, ending flush task");
			false
		}
		Err(KeenError::NoEventQueue) => {
			debug!("client has no event queue, ending flush task");
			false
		}
		Err(e) => {
			error!(
				error = %e,
				rejected = e.rejected().len(),
				"Failed to flush cached events"
			);
			true
		}
	}
}
