use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;
use tracing::info;

use super::{Bus, BusMessage, Subscription};
use crate::error::BoxError;

#[derive(Debug, Error)]
#[error("nats {op} failed: {source}")]
pub struct NatsBusError {
    op: &'static str,
    #[source]
    source: BoxError,
}

impl NatsBusError {
    fn new<E: std::error::Error + Send + Sync + 'static>(op: &'static str, err: E) -> Self {
        Self {
            op,
            source: Box::new(err),
        }
    }
}

/// Bus backed by an injected NATS client
#[derive(Clone, Debug)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }

    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, NatsBusError> {
        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .map_err(|e| NatsBusError::new("connect", e))?;

        info!(url = %url, "connected to NATS");
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

#[async_trait]
impl Bus for NatsBus {
    type Error = NatsBusError;

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| NatsBusError::new("publish", e))?;

        // Core NATS has no per-message ack; flush waits for the server.
        self.client
            .flush()
            .await
            .map_err(|e| NatsBusError::new("flush", e))
    }

    async fn subscribe(&self, subject: &str) -> Result<Subscription, Self::Error> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| NatsBusError::new("subscribe", e))?;

        Ok(subscriber
            .map(|msg| BusMessage {
                subject: msg.subject.to_string(),
                payload: msg.payload.to_vec(),
            })
            .boxed())
    }
}
