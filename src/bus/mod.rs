// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event bus (C4): at-least-once pub/sub over bounded-context event streams.
//!
//! Handlers are type-erased so the bus trait stays object-safe — a command
//! handler or saga step is wired up as `Arc<dyn EventHandler>` rather than a
//! generic type parameter.

pub mod memory;
pub mod nats;

pub use memory::InMemoryEventBus;
pub use nats::NatsEventBus;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::LibraryResult;
use crate::subjects::BoundedContext;

/// Reacts to one delivered event. Implementations must be idempotent under
/// redelivery — the bus guarantees at-least-once, never exactly-once.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event_type: &str, payload: &[u8]) -> LibraryResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub details: String,
}

impl HealthStatus {
    pub fn healthy(details: impl Into<String>) -> Self {
        HealthStatus { status: "healthy".to_string(), details: details.into() }
    }

    pub fn unhealthy(details: impl Into<String>) -> Self {
        HealthStatus { status: "unhealthy".to_string(), details: details.into() }
    }
}

/// Pub/sub boundary shared by every bounded context (§4.3).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Provisions any durable transport state (streams, consumers). Safe to
    /// call multiple times.
    async fn init(&self) -> LibraryResult<()>;

    /// Register `handler` for exactly one event type within `context`.
    async fn subscribe(&self, context: BoundedContext, event_type: &str, handler: Arc<dyn EventHandler>) -> LibraryResult<()>;

    /// Register the same `handler` for every type in `event_types`.
    async fn subscribe_all(&self, context: BoundedContext, event_types: &[&str], handler: Arc<dyn EventHandler>) -> LibraryResult<()> {
        for event_type in event_types {
            self.subscribe(context, event_type, handler.clone()).await?;
        }
        Ok(())
    }

    async fn unsubscribe(&self, context: BoundedContext, event_type: &str) -> LibraryResult<()>;

    /// Idempotently bind the service consumer to `event_types` even with no
    /// active subscriber yet, so events are never dropped before a handler
    /// is registered.
    async fn bind_event_types(&self, context: BoundedContext, event_types: &[&str]) -> LibraryResult<()>;

    /// Publish `payload` (already-serialized event) for `event_type`,
    /// returning after the broker/JetStream ack.
    async fn publish(&self, context: BoundedContext, aggregate_id: Uuid, event_type: &str, payload: Vec<u8>) -> LibraryResult<()>;

    /// Begin delivering to registered handlers. Must be called after every
    /// subscription is set up.
    async fn start_consuming(&self) -> LibraryResult<()>;

    /// Stop consuming, drain in-flight handlers, and close the transport.
    async fn shutdown(&self) -> LibraryResult<()>;

    async fn check_health(&self) -> LibraryResult<HealthStatus>;
}
