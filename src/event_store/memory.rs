// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory event store, the reference implementation exercised by unit,
//! property, and scenario tests (no live NATS server required).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::errors::{LibraryError, LibraryResult};
use crate::event::{DomainEvent, EventRecord};
use crate::event_store::EventStore;

#[derive(Default)]
pub struct InMemoryEventStore<P> {
    streams: Mutex<HashMap<Uuid, Vec<EventRecord<P>>>>,
    global_counter: AtomicU64,
}

impl<P> InMemoryEventStore<P> {
    pub fn new() -> Self {
        Self { streams: Mutex::new(HashMap::new()), global_counter: AtomicU64::new(0) }
    }
}

#[async_trait]
impl<P: DomainEvent + 'static> EventStore<P> for InMemoryEventStore<P> {
    async fn append(
        &self,
        aggregate_id: Uuid,
        events: Vec<P>,
        expected_version: u64,
        timestamp: DateTime<Utc>,
        correlation_id: Uuid,
        causation_id: Option<Uuid>,
    ) -> LibraryResult<Vec<EventRecord<P>>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut streams = self.streams.lock().map_err(|_| LibraryError::Internal("event store lock poisoned".to_string()))?;
        let stream = streams.entry(aggregate_id).or_default();
        let current_version = stream.last().map(|r| r.version).unwrap_or(0);

        if current_version != expected_version {
            return Err(LibraryError::ConcurrencyConflict { expected: expected_version, actual: current_version });
        }

        let count = events.len() as u64;
        let start_global = self.global_counter.fetch_add(count, Ordering::SeqCst) + 1;

        let mut committed = Vec::with_capacity(events.len());
        for (i, payload) in events.into_iter().enumerate() {
            let version = expected_version + i as u64 + 1;
            let global_version = start_global + i as u64;

            if stream.iter().any(|r| r.version == version) {
                return Err(LibraryError::DuplicateEvent { aggregate_id: aggregate_id.to_string(), version });
            }

            let mut record = EventRecord::pending(aggregate_id, timestamp, payload, correlation_id, causation_id);
            record.version = version;
            record.global_version = global_version;
            stream.push(record.clone());
            committed.push(record);
        }

        Ok(committed)
    }

    async fn load(&self, aggregate_id: Uuid) -> LibraryResult<Vec<EventRecord<P>>> {
        let streams = self.streams.lock().map_err(|_| LibraryError::Internal("event store lock poisoned".to_string()))?;
        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn find_latest_by_predicate(
        &self,
        event_type: &str,
        predicate: &(dyn Fn(P) -> bool + Send + Sync),
    ) -> LibraryResult<Option<Uuid>> {
        let candidates: Vec<(Uuid, EventRecord<P>)> = {
            let streams = self.streams.lock().map_err(|_| LibraryError::Internal("event store lock poisoned".to_string()))?;
            streams.iter().filter_map(|(id, records)| records.first().map(|created| (*id, created.clone()))).collect()
        };

        let mut best: Option<(DateTime<Utc>, Uuid)> = None;
        for (id, created) in candidates {
            if created.event_type == event_type && predicate(created.payload.clone()) {
                match &best {
                    Some((ts, _)) if *ts >= created.timestamp => {}
                    _ => best = Some((created.timestamp, id)),
                }
            }
        }
        Ok(best.map(|(_, id)| id))
    }

    async fn reserve_global_versions(&self, n: u64) -> LibraryResult<u64> {
        Ok(self.global_counter.fetch_add(n, Ordering::SeqCst) + 1)
    }
}
