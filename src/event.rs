// Copyright (c) 2025 - Cowboy AI, Inc.
//! Canonical event record and codec (C1).
//!
//! Every domain event, once appended, is wrapped in an [`EventRecord`]. The
//! record is the sole wire/storage shape; aggregates, the event store, and
//! the bus all exchange `EventRecord<P>` values, never the bare payload.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Metadata carried alongside every event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// When the store durably accepted the event (assigned by the store, not the caller).
    pub stored_at: DateTime<Utc>,
    /// Groups every event caused by the same originating command.
    pub correlation_id: Uuid,
    /// Direct parent event, if any.
    pub causation_id: Option<Uuid>,
}

impl EventMetadata {
    pub fn new(stored_at: DateTime<Utc>, correlation_id: Uuid, causation_id: Option<Uuid>) -> Self {
        Self { stored_at, correlation_id, causation_id }
    }
}

/// Implemented by every event payload type so the generic store/bus/codec
/// machinery can stamp the wire-level `eventType` and `schemaVersion` without
/// each component re-declaring a parallel enum of event names.
pub trait DomainEvent: Clone + std::fmt::Debug + Serialize + DeserializeOwned + Send + Sync {
    /// Symbolic name from the closed per-context event-type set, e.g. `"BookCreated"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version for forward evolution. Defaults to 1; override
    /// when a payload shape changes and register an [`crate::versioning::Upcaster`].
    fn schema_version(&self) -> u32 {
        1
    }
}

/// Immutable, once-appended event record — the canonical wire/storage shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord<P> {
    pub aggregate_id: Uuid,
    pub event_type: String,
    /// 1-based, per-aggregate, contiguous.
    pub version: u64,
    /// Monotonically increasing, store-wide.
    pub global_version: u64,
    pub timestamp: DateTime<Utc>,
    pub schema_version: u32,
    pub payload: P,
    pub metadata: EventMetadata,
}

impl<P: DomainEvent> EventRecord<P> {
    /// Build a record for a not-yet-appended event; the store fills in
    /// `version`, `global_version`, and `metadata.stored_at` at append time.
    pub fn pending(aggregate_id: Uuid, timestamp: DateTime<Utc>, payload: P, correlation_id: Uuid, causation_id: Option<Uuid>) -> Self {
        let event_type = payload.event_type().to_string();
        let schema_version = payload.schema_version();
        Self {
            aggregate_id,
            event_type,
            version: 0,
            global_version: 0,
            timestamp,
            schema_version,
            payload,
            metadata: EventMetadata::new(timestamp, correlation_id, causation_id),
        }
    }
}
