// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event store abstraction (C2).
//!
//! Append-only, per-aggregate log with optimistic concurrency control and a
//! store-wide monotonic `global_version`. See [`memory`] for the in-memory
//! reference implementation used by tests and [`nats`] for the JetStream-backed
//! one used in production.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::LibraryResult;
use crate::event::{DomainEvent, EventRecord};

pub mod memory;
pub mod nats;

pub use memory::InMemoryEventStore;
pub use nats::NatsEventStore;

/// Append-only event log for aggregates of payload type `P`.
#[async_trait]
pub trait EventStore<P: DomainEvent>: Send + Sync {
    /// Append `events` to `aggregate_id`'s stream.
    ///
    /// Fails with `ConcurrencyConflict` if `expected_version` does not match
    /// the aggregate's current stored version, and with `DuplicateEvent` if a
    /// concurrent writer wins the race between the version check and the
    /// write. Returns the committed records, in order, with `version` and
    /// `global_version` assigned.
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<P>,
        expected_version: u64,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        causation_id: Option<Uuid>,
    ) -> LibraryResult<Vec<EventRecord<P>>>;

    /// Load every event for `aggregate_id`, in ascending `version` order.
    /// An empty result means the aggregate is unknown.
    async fn load(&self, aggregate_id: Uuid) -> LibraryResult<Vec<EventRecord<P>>>;

    /// Resolve an aggregate id from a natural key by scanning `Created`
    /// events of `event_type` for the first payload matching `predicate`,
    /// most-recent lifecycle first. Operates over full history, including
    /// soft-deleted aggregates (see DESIGN.md's natural-key decision).
    async fn find_latest_by_predicate(
        &self,
        event_type: &str,
        predicate: &(dyn Fn(P) -> bool + Send + Sync),
    ) -> LibraryResult<Option<Uuid>>;

    /// Atomically reserve `n` global sequence numbers, returning the first.
    async fn reserve_global_versions(&self, n: u64) -> LibraryResult<u64>;

    /// Optional snapshot hook. This core's implementations never persist a
    /// snapshot; every rehydration replays the full stream (see §9).
    async fn snapshot(&self, _aggregate_id: Uuid, _version: u64, _state: &str) -> LibraryResult<()> {
        Ok(())
    }

    /// Optional snapshot hook. Always `Ok(None)` in this core.
    async fn load_snapshot(&self, _aggregate_id: Uuid) -> LibraryResult<Option<String>> {
        Ok(None)
    }
}
