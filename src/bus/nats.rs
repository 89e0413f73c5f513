// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream-backed [`EventBus`].
//!
//! One durable pull consumer per bounded context fans out to every handler
//! registered for the delivered message's event type (the last subject
//! token). At-least-once: a message is acked only after every handler for
//! its type has run; a handler failure publishes a synthesized
//! `<Type>Failed` event and still acks the original, so one bad handler
//! never becomes a poison-message loop.

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::bus::{EventBus, EventHandler, HealthStatus};
use crate::errors::{LibraryError, LibraryResult};
use crate::jetstream::{get_or_create_library_stream, JetStreamConfig};
use crate::nats::{NatsClient, NatsConfig};
use crate::subjects::{BoundedContext, SubjectBuilder};

type HandlerMap = Arc<RwLock<HashMap<(BoundedContext, String), Vec<Arc<dyn EventHandler>>>>>;

pub struct NatsEventBus {
    #[allow(dead_code)] // kept alive for the connection's lifetime; jetstream holds its own clone
    client: NatsClient,
    jetstream: jetstream::Context,
    stream: Stream,
    handlers: HandlerMap,
    consumer_tasks: AsyncMutex<Vec<JoinHandle<()>>>,
}

const CONTEXTS: [BoundedContext; 3] = [BoundedContext::Book, BoundedContext::Wallet, BoundedContext::Reservation];

impl NatsEventBus {
    pub async fn connect(nats_url: &str) -> LibraryResult<Self> {
        Self::connect_with_config(nats_url, JetStreamConfig::default()).await
    }

    pub async fn connect_with_config(nats_url: &str, config: JetStreamConfig) -> LibraryResult<Self> {
        let client = NatsClient::new(NatsConfig { servers: vec![nats_url.to_string()], ..NatsConfig::default() }).await?;
        let jetstream = jetstream::new(client.inner().clone());
        let stream = get_or_create_library_stream(jetstream.clone(), config).await?;
        Ok(NatsEventBus { client, jetstream, stream, handlers: Arc::new(RwLock::new(HashMap::new())), consumer_tasks: AsyncMutex::new(Vec::new()) })
    }

    async fn ensure_consumer(&self, context: BoundedContext) -> LibraryResult<PullConsumer> {
        let filter_subject = SubjectBuilder::new().context(context).build_context_wildcard();
        let durable_name = format!("library-bus-{context}");
        self.stream
            .get_or_create_consumer(
                &durable_name,
                jetstream::consumer::pull::Config {
                    durable_name: Some(durable_name.clone()),
                    filter_subject,
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| LibraryError::BusFailure(e.to_string()))
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn init(&self) -> LibraryResult<()> {
        for context in CONTEXTS {
            self.ensure_consumer(context).await?;
        }
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
        self.ensure_consumer(context).await?;
        let mut handlers = self.handlers.write().map_err(|_| LibraryError::Internal("bus lock poisoned".to_string()))?;
        for event_type in event_types {
            handlers.entry((context, event_type.to_string())).or_default();
        }
        Ok(())
    }

    async fn publish(&self, context: BoundedContext, aggregate_id: Uuid, event_type: &str, payload: Vec<u8>) -> LibraryResult<()> {
        let subject = SubjectBuilder::new().context(context).aggregate_id(aggregate_id).event_type(event_type).build();
        self.jetstream
            .publish(subject, payload.into())
            .await
            .map_err(|e| LibraryError::BusFailure(e.to_string()))?
            .await
            .map_err(|e| LibraryError::BusFailure(e.to_string()))?;
        Ok(())
    }

    async fn start_consuming(&self) -> LibraryResult<()> {
        let mut tasks = self.consumer_tasks.lock().await;
        for context in CONTEXTS {
            let consumer = self.ensure_consumer(context).await?;
            let handlers = self.handlers.clone();
            let jetstream = self.jetstream.clone();

            let task = tokio::spawn(async move {
                let mut messages = match consumer.messages().await {
                    Ok(messages) => messages,
                    Err(err) => {
                        tracing::error!(%context, error = %err, "failed to start consuming");
                        return;
                    }
                };

                while let Some(delivered) = messages.next().await {
                    let message = match delivered {
                        Ok(message) => message,
                        Err(err) => {
                            tracing::error!(%context, error = %err, "consumer message error");
                            continue;
                        }
                    };

                    let event_type = message.subject.rsplit('.').next().unwrap_or_default().to_string();
                    let matched = {
                        let guard = match handlers.read() {
                            Ok(guard) => guard,
                            Err(_) => {
                                tracing::error!("bus handler map poisoned");
                                continue;
                            }
                        };
                        guard.get(&(context, event_type.clone())).cloned().unwrap_or_default()
                    };

                    for handler in &matched {
                        if let Err(err) = handler.handle(&event_type, &message.payload).await {
                            tracing::warn!(event_type = %event_type, error = %err, "handler failed, publishing failure event");
                            let failed_type = format!("{event_type}Failed");
                            let failure_payload = serde_json::json!({
                                "originalEventType": event_type,
                                "errorKind": format!("{:?}", err.kind()),
                                "errorMessage": err.to_string(),
                            })
                            .to_string()
                            .into_bytes();
                            let subject = SubjectBuilder::new().context(context).event_type(failed_type).build();
                            if let Err(publish_err) = jetstream.publish(subject, failure_payload.into()).await {
                                tracing::error!(error = %publish_err, "failed to publish failure event");
                            }
                        }
                    }

                    if let Err(err) = message.ack().await {
                        tracing::error!(error = ?err, "failed to ack message");
                    }
                }
            });
            tasks.push(task);
        }
        Ok(())
    }

    async fn shutdown(&self) -> LibraryResult<()> {
        let mut tasks = self.consumer_tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        Ok(())
    }

    async fn check_health(&self) -> LibraryResult<HealthStatus> {
        match self.stream.clone().info().await {
            Ok(_) => Ok(HealthStatus::healthy("connected to NATS, stream reachable")),
            Err(err) => Ok(HealthStatus::unhealthy(format!("stream unreachable: {err}"))),
        }
    }
}
