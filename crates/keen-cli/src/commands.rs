// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use keen_analytics::{KeenClient, KeenConfig, KeenError};
use keen_config::{BatchingConfigLayer, CacheKind, CacheMode};
use serde_json::Value;
use tracing::info;

pub async fn send(config: &KeenConfig, collection: &str, event: &str) -> Result<()> {
	let event = parse_event(event)?;
	let client = direct_client(config)?;
	client
		.add_event(collection, &event, &[])
		.await
		.map_err(report)?;
	println!("sent 1 event to '{collection}'");
	Ok(())
}

pub async fn send_batch(config: &KeenConfig, collection: &str, file: &Path) -> Result<()> {
	let content = std::fs::read_to_string(file)
		.with_context(|| format!("failed to read {}", file.display()))?;
	let events = parse_json_lines(&content)?;
	if events.is_empty() {
		bail!("{} contains no events", file.display());
	}

	let client = direct_client(config)?;
	client
		.add_events(collection, &events, &[])
		.await
		.map_err(report)?;
	println!("sent {} events to '{collection}'", events.len());
	Ok(())
}

pub async fn queue(config: &KeenConfig, collection: &str, event: &str) -> Result<()> {
	let event = parse_event(event)?;
	let client = queued_client(config)?;
	client
		.add_event(collection, &event, &[])
		.await
		.map_err(report)?;
	println!("queued 1 event ({} pending)", client.queued_len());
	Ok(())
}

pub async fn flush(config: &KeenConfig) -> Result<()> {
	let client = queued_client(config)?;
	let pending = client.queued_len();
	if pending == 0 {
		println!("queue is empty");
		return Ok(());
	}

	info!(pending, "flushing queued events");
	client.send_cached_events().await.map_err(report)?;
	println!("sent {pending} queued events");
	Ok(())
}

fn direct_client(config: &KeenConfig) -> Result<KeenClient> {
	let mut config = config.clone();
	config.batching.cache = CacheMode::None;
	KeenClient::from_config(&config).context("failed to create client")
}

fn queued_client(config: &KeenConfig) -> Result<KeenClient> {
	let mut config = config.clone();
	config.batching.cache = file_cache(&config.batching.cache)?;
	KeenClient::from_config(&config).context("failed to open event queue")
}

/// The configured file cache, or the default queue directory.
fn file_cache(configured: &CacheMode) -> Result<CacheMode> {
	if let CacheMode::File(dir) = configured {
		return Ok(CacheMode::File(dir.clone()));
	}
	let layer = BatchingConfigLayer {
		cache: Some(CacheKind::File),
		..Default::default()
	};
	Ok(layer.finalize()?.cache)
}

fn parse_event(raw: &str) -> Result<Value> {
	let value: Value = serde_json::from_str(raw).context("event is not valid JSON")?;
	if !value.is_object() {
		bail!("event must be a JSON object");
	}
	Ok(value)
}

fn parse_json_lines(content: &str) -> Result<Vec<Value>> {
	content
		.lines()
		.enumerate()
		.filter(|(_, line)| !line.trim().is_empty())
		.map(|(index, line)| {
			serde_json::from_str(line).with_context(|| format!("line {} is not valid JSON", index + 1))
		})
		.collect()
}

/// Prints per-event failures and converts the error for the caller.
fn report(err: KeenError) -> anyhow::Error {
	for rejected in err.rejected() {
		eprintln!(
			"rejected [{}] {}: {}",
			rejected.event.collection(),
			Value::Object(rejected.event.payload().clone()),
			rejected.error
		);
	}
	if let KeenError::SubmissionAborted { undelivered, .. } = &err {
		eprintln!("{} event(s) were not delivered", undelivered.len());
	}
	anyhow!(err)
}
