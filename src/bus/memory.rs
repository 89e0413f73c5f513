// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-memory [`EventBus`] used by tests and single-process wiring.
//!
//! There is no backlog: `publish` dispatches directly to whatever handlers
//! are registered at call time. `start_consuming`/`shutdown` only toggle the
//! flag surfaced by `check_health`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use uuid::Uuid;

use crate::bus::{EventBus, EventHandler, HealthStatus};
use crate::errors::{LibraryError, LibraryResult};
use crate::subjects::BoundedContext;

type HandlerMap = RwLock<HashMap<(BoundedContext, String), Vec<Arc<dyn EventHandler>>>>;

#[derive(Default)]
pub struct InMemoryEventBus {
    handlers: HandlerMap,
    consuming: AtomicBool,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn handlers_for(&self, context: BoundedContext, event_type: &str) -> LibraryResult<Vec<Arc<dyn EventHandler>>> {
        let handlers = self.handlers.read().map_err(|_| LibraryError::Internal("bus lock poisoned".to_string()))?;
        Ok(handlers.get(&(context, event_type.to_string())).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn init(&self) -> LibraryResult<()> {
        Ok(())
    }

    async fn subscribe(&self, context: BoundedContext, event_type: &str, handler: Arc<dyn EventHandler>) -> LibraryResult<()> {
        let mut handlers = self.handlers.write().map_err(|_| LibraryError::Internal("bus lock poisoned".to_string()))?;
        handlers.entry((context, event_type.to_string())).or_default().push(handler);
        Ok(())
    }

    async fn unsubscribe(&self, context: BoundedContext, event_type: &str) -> LibraryResult<()> {
        let mut handlers = self.handlers.write().map_err(|_| LibraryError::Internal("bus lock poisoned".to_string()))?;
        handlers.remove(&(context, event_type.to_string()));
        Ok(())
    }

    async fn bind_event_types(&self, context: BoundedContext, event_types: &[&str]) -> LibraryResult<()> {
        let mut handlers = self.handlers.write().map_err(|_| LibraryError::Internal("bus lock poisoned".to_string()))?;
        for event_type in event_types {
            handlers.entry((context, event_type.to_string())).or_default();
        }
        Ok(())
    }

    async fn publish(&self, context: BoundedContext, _aggregate_id: Uuid, event_type: &str, payload: Vec<u8>) -> LibraryResult<()> {
        for handler in self.handlers_for(context, event_type)? {
            if let Err(err) = handler.handle(event_type, &payload).await {
                tracing::warn!(event_type, error = %err, "handler failed, synthesizing failure event");
                let failed_type = format!("{event_type}Failed");
                let failure_payload = serde_json::json!({
                    "originalEventType": event_type,
                    "errorKind": format!("{:?}", err.kind()),
                    "errorMessage": err.to_string(),
                })
                .to_string()
                .into_bytes();
                for failed_handler in self.handlers_for(context, &failed_type)? {
                    let _ = failed_handler.handle(&failed_type, &failure_payload).await;
                }
            }
        }
        Ok(())
    }

    async fn start_consuming(&self) -> LibraryResult<()> {
        self.consuming.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> LibraryResult<()> {
        self.consuming.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn check_health(&self) -> LibraryResult<HealthStatus> {
        if self.consuming.load(Ordering::SeqCst) {
            Ok(HealthStatus::healthy("in-memory bus consuming"))
        } else {
            Ok(HealthStatus::unhealthy("in-memory bus not consuming"))
        }
    }
}
