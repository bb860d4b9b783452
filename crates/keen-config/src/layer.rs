// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by a single source.

use serde::Deserialize;

use crate::sections::{BatchingConfigLayer, HttpConfigLayer, ProjectConfigLayer};

/// One source's view of the configuration. Absent fields defer to
/// lower-precedence sources.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct KeenConfigLayer {
	pub project: Option<ProjectConfigLayer>,
	pub http: Option<HttpConfigLayer>,
	pub batching: Option<BatchingConfigLayer>,
}

impl KeenConfigLayer {
	/// Overlays `other` on top of `self`.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.project, other.project, ProjectConfigLayer::merge);
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.batching, other.batching, BatchingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	let Some(overlay) = other else {
		return;
	};
	match base {
		Some(existing) => merge(existing, overlay),
		None => *base = Some(overlay),
	}
}
