// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Keen event ingestion SDK.
//!
//! This crate holds everything that does not touch the network:
//!
//! - [`EventRecord`] and [`CollectionName`] with its validation cache
//! - Global property-name rules and event preparation ([`prepare_payload`])
//! - Global properties, static or computed per event
//! - [`AddOn`] enrichment descriptors
//! - [`ApiError`] classification of server error codes
//! - Wire shapes of the bulk-insert endpoint

pub mod addon;
pub mod api_error;
pub mod collection;
pub mod error;
pub mod event;
pub mod prepare;
pub mod properties;
pub mod wire;

pub use addon::AddOn;
pub use api_error::ApiError;
pub use collection::{CollectionName, CollectionNameCache, MAX_COLLECTION_NAME_LEN};
pub use error::ValidationError;
pub use event::{validate_property_name, EventRecord, KEEN_NAMESPACE, MAX_PROPERTY_NAME_LEN};
pub use prepare::{format_timestamp, prepare_payload};
pub use properties::{
	to_event_object, BoxError, GlobalProperties, GlobalProperty, GlobalPropertyValue, Properties,
	PropertyProvider,
};
pub use wire::{ItemError, ItemResult, ResponseShapeError};
