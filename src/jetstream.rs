// Copyright (c) 2025 - Cowboy AI, Inc.

//! JetStream provisioning for the library event store.
//!
//! This module configures and idempotently creates the single JetStream
//! stream backing the durable event log (C2) and the durable consumers
//! (C4) that replay or subscribe to it.

use async_nats::jetstream::{self, stream::Stream};
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::errors::{LibraryError, LibraryResult};

/// Configuration for the library events JetStream stream.
#[derive(Debug, Clone)]
pub struct JetStreamConfig {
    pub stream_name: String,
    /// Subjects this stream captures (defaults to `library.>`).
    pub subjects: Vec<String>,
    pub max_age: Duration,
    pub max_bytes: i64,
    pub storage: StorageType,
    pub replicas: usize,
    pub retention: RetentionPolicy,
}

impl Default for JetStreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "LIBRARY_EVENTS".to_string(),
            subjects: vec!["library.>".to_string()],
            max_age: Duration::from_secs(0), // 0 = unlimited; event log is the source of truth
            max_bytes: 10 * 1024 * 1024 * 1024,
            storage: StorageType::File,
            replicas: 1,
            retention: RetentionPolicy::Limits,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    File,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    Limits,
    Interest,
    WorkQueue,
}

/// Idempotently create or fetch the library events stream.
pub async fn get_or_create_library_stream(jetstream: jetstream::Context, config: JetStreamConfig) -> LibraryResult<Stream> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };
    let retention = match config.retention {
        RetentionPolicy::Limits => jetstream::stream::RetentionPolicy::Limits,
        RetentionPolicy::Interest => jetstream::stream::RetentionPolicy::Interest,
        RetentionPolicy::WorkQueue => jetstream::stream::RetentionPolicy::WorkQueue,
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.subjects,
        max_age: config.max_age,
        max_bytes: config.max_bytes,
        storage,
        num_replicas: config.replicas,
        retention,
        ..Default::default()
    };

    jetstream
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| LibraryError::StorageFailure(e.to_string()))
}

/// Durable consumer configuration shared by event-store replay and the event bus.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub name: String,
    pub filter_subject: Option<String>,
    pub deliver_policy: DeliverPolicy,
    pub ack_policy: AckPolicy,
    pub max_ack_pending: i64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            name: "library-consumer".to_string(),
            filter_subject: None,
            deliver_policy: DeliverPolicy::All,
            ack_policy: AckPolicy::Explicit,
            max_ack_pending: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverPolicy {
    All,
    New,
    ByStartSequence(u64),
    ByStartTime(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    Explicit,
    None,
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_library_stream() {
        let config = JetStreamConfig::default();
        assert_eq!(config.stream_name, "LIBRARY_EVENTS");
        assert_eq!(config.subjects, vec!["library.>"]);
        assert_eq!(config.storage, StorageType::File);
        assert_eq!(config.retention, RetentionPolicy::Limits);
    }

    #[test]
    fn consumer_config_defaults_to_explicit_ack() {
        let config = ConsumerConfig::default();
        assert_eq!(config.ack_policy, AckPolicy::Explicit);
        assert_eq!(config.deliver_policy, DeliverPolicy::All);
    }
}
