// Copyright (c) 2025 - Cowboy AI, Inc.
//! Command handlers (C7) and the cross-context reservation saga (C8).
//!
//! Every command follows the standard shape from §4.6: load, rehydrate,
//! call the domain method, append with retry-on-`ConcurrencyConflict`, then
//! publish. [`execute_with_retry`] is the shared step 3-7 loop; each
//! `command::<context>` module supplies the per-command closure and the
//! publish/projection wiring around it.

pub mod book;
pub mod reservation;
pub mod wallet;

use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::errors::LibraryResult;
use crate::event::{DomainEvent, EventRecord};
use crate::event_store::EventStore;
use crate::subjects::BoundedContext;

/// Minimal command acknowledgement (§4.6 return discipline): never the full
/// aggregate, only enough to let the caller re-read through a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandAck {
    pub aggregate_id: Uuid,
    pub version: u64,
}

/// Jittered exponential backoff for retrying a `ConcurrencyConflict`/`DuplicateEvent`.
fn jittered_backoff(attempt: u32) -> Duration {
    let base_ms = 20u64.saturating_mul(1u64 << attempt.min(10));
    let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 2 + 1);
    Duration::from_millis(base_ms + jitter_ms)
}

/// Runs steps 3-7 of §4.6: load the stream, hand it to `try_command` to
/// rehydrate and produce the next event, append it, and retry from the top
/// on a retriable conflict up to `max_retry` times with jittered backoff.
///
/// `try_command` receives the freshly loaded event stream (empty if the
/// aggregate does not exist yet) and returns the one event to append.
pub async fn execute_with_retry<P, S, F>(
    store: &S,
    aggregate_id: Uuid,
    correlation_id: Uuid,
    causation_id: Option<Uuid>,
    max_retry: u32,
    mut try_command: F,
) -> LibraryResult<(CommandAck, EventRecord<P>)>
where
    P: DomainEvent,
    S: EventStore<P>,
    F: FnMut(&[EventRecord<P>]) -> LibraryResult<P>,
{
    let mut attempt = 0;
    loop {
        let events = store.load(aggregate_id).await?;
        let expected_version = events.last().map(|e| e.version).unwrap_or(0);
        let event = try_command(&events)?;

        match store.append(aggregate_id, vec![event], expected_version, Utc::now(), correlation_id, causation_id).await {
            Ok(mut committed) => {
                let record = committed.pop().expect("append always returns exactly the events it was given");
                let ack = CommandAck { aggregate_id, version: record.version };
                return Ok((ack, record));
            }
            Err(err) if err.is_retriable() && attempt < max_retry => {
                attempt += 1;
                tokio::time::sleep(jittered_backoff(attempt)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Publishes the full [`EventRecord`] (not just the bare payload) so that
/// downstream handlers — especially saga steps reacting across contexts —
/// can recover `aggregate_id`, `version`, and correlation metadata without a
/// side-channel lookup.
pub async fn publish_record<P: DomainEvent>(bus: &dyn EventBus, context: BoundedContext, record: &EventRecord<P>) -> LibraryResult<()> {
    let payload = serde_json::to_vec(record)?;
    bus.publish(context, record.aggregate_id, &record.event_type, payload).await
}

/// Publishes a transient, non-aggregate saga message (e.g.
/// `BookValidationRequested`) that has no event-store record of its own.
pub async fn publish_message<T: serde::Serialize>(bus: &dyn EventBus, context: BoundedContext, aggregate_id: Uuid, event_type: &str, message: &T) -> LibraryResult<()> {
    let payload = serde_json::to_vec(message)?;
    bus.publish(context, aggregate_id, event_type, payload).await
}
