// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keen_config::{load_config, load_config_with_file, KeenConfig};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "keen", version, about = "Send events to a Keen project", long_about = None)]
struct Args {
	/// Path to custom configuration file
	#[arg(short, long, env = "KEEN_CONFIG")]
	config: Option<PathBuf>,

	/// Log level (RUST_LOG takes precedence)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Output logs as JSON
	#[arg(long)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Send one event immediately
	Send {
		/// Destination collection
		collection: String,
		/// Event as a JSON object
		event: String,
	},
	/// Send every event of a JSON Lines file, in batches
	SendBatch {
		/// Destination collection
		collection: String,
		/// File with one JSON object per line
		file: PathBuf,
	},
	/// Store one event in the on-disk queue without sending it
	Queue {
		/// Destination collection
		collection: String,
		/// Event as a JSON object
		event: String,
	},
	/// Send every event in the on-disk queue
	Flush,
}

fn init_tracing(level: &str, json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::new(format!(
			"keen={level},keen_analytics={level},keen_config={level}"
		))
	});

	if json {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().compact().with_writer(std::io::stderr))
			.init();
	}
}

fn load(args: &Args) -> Result<KeenConfig> {
	match &args.config {
		Some(path) => load_config_with_file(path)
			.with_context(|| format!("failed to load configuration from {}", path.display())),
		None => load_config().context("failed to load configuration"),
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();
	init_tracing(&args.log_level, args.json_logs);

	let config = load(&args)?;
	info!(project_id = %config.project.project_id, "starting keen");

	match args.command {
		Command::Send { collection, event } => commands::send(&config, &collection, &event).await,
		Command::SendBatch { collection, file } => {
			commands::send_batch(&config, &collection, &file).await
		}
		Command::Queue { collection, event } => commands::queue(&config, &collection, &event).await,
		Command::Flush => commands::flush(&config).await,
	}
}
