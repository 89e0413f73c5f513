//! NATS client abstraction for messaging infrastructure.

use async_nats::{Client, ConnectOptions, Subscriber};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::errors::{LibraryError, LibraryResult};

/// Configuration for NATS connection.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub servers: Vec<String>,
    pub name: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "cim-library-core".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// NATS client wrapper providing domain-specific operations.
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    pub async fn new(config: NatsConfig) -> LibraryResult<Self> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| LibraryError::BusFailure(e.to_string()))?;

        info!(servers = ?config.servers, "connected to NATS");

        Ok(Self { client })
    }

    pub async fn publish<T>(&self, subject: &str, message: &T) -> LibraryResult<()>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| LibraryError::BusFailure(e.to_string()))?;

        debug!(subject, "published message");
        Ok(())
    }

    pub async fn subscribe(&self, subject: &str) -> LibraryResult<Subscriber> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| LibraryError::BusFailure(e.to_string()))?;

        info!(subject, "subscribed");
        Ok(subscriber)
    }

    pub async fn request<T, R>(&self, subject: &str, request: &T) -> LibraryResult<R>
    where
        T: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let payload = serde_json::to_vec(request)?;

        let response = self
            .client
            .request(subject.to_string(), payload.into())
            .await
            .map_err(|e| LibraryError::BusFailure(e.to_string()))?;

        let result: R = serde_json::from_slice(&response.payload)?;
        Ok(result)
    }

    /// Escape hatch for advanced operations (JetStream context construction etc).
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Handles messages delivered from a NATS subscription.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    type Message: for<'de> Deserialize<'de> + Send;

    async fn handle(&self, message: Self::Message) -> LibraryResult<()>;
    fn subject(&self) -> &str;
}

/// Runs [`MessageHandler`]s against live subscriptions.
pub struct MessageProcessor {
    client: NatsClient,
}

impl MessageProcessor {
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }

    pub async fn run_handler<H>(&self, handler: Arc<H>) -> LibraryResult<()>
    where
        H: MessageHandler<Message = serde_json::Value> + 'static,
    {
        let subject = handler.subject().to_string();
        let mut subscriber = self.client.subscribe(&subject).await?;

        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<serde_json::Value>(&msg.payload) {
                    Ok(payload) => {
                        if let Err(e) = handler.handle(payload).await {
                            error!(subject = %subject, error = %e, "handler failed");
                        }
                    }
                    Err(e) => {
                        error!(subject = %subject, error = %e, "failed to deserialize message");
                    }
                }
            }
        });

        Ok(())
    }
}
