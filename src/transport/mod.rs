//! Message transports.
//!
//! The internal bus is anything implementing [`Bus`]: [`LocalBus`] inside one
//! process, [`nats::NatsBus`] across processes. Bridges own their client
//! handles; nothing here is global.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ingest::IngestRouter;
use crate::store::Store;

pub mod local;
#[cfg(feature = "mqtt")]
pub mod mqtt;
#[cfg(feature = "nats")]
pub mod nats;

pub use local::LocalBus;

/// Default bus subject carrying relayed envelopes
pub const DEFAULT_SUBJECT: &str = "mainflux/core/out";

#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

pub type Subscription = BoxStream<'static, BusMessage>;

#[async_trait]
pub trait Bus: Clone + Debug + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Publish and wait until the transport has taken the message.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), Self::Error>;

    async fn subscribe(&self, subject: &str) -> Result<Subscription, Self::Error>;
}

/// `<prefix>/channels/<channel>`
pub fn channel_topic(prefix: &str, channel: &str) -> String {
    format!("{}/channels/{}", prefix, channel)
}

/// The channel id is the last segment of a topic
pub fn channel_from_topic(topic: &str) -> Option<&str> {
    topic.rsplit('/').next().filter(|s| !s.is_empty())
}

/// Subscribe to `subject`, then spawn [`run_bus_bridge`] on the subscription.
///
/// Returns once the subscription is live, so envelopes published after
/// this call are never missed.
pub async fn spawn_bus_bridge<S, B>(
    bus: &B,
    subject: &str,
    router: IngestRouter<S, B>,
) -> Result<JoinHandle<()>, B::Error>
where
    S: Store,
    B: Bus,
{
    let subscription = bus.subscribe(subject).await?;
    info!(subject = %subject, "bus bridge subscribed");
    Ok(tokio::spawn(run_bus_bridge(subscription, subject.to_string(), router)))
}

/// Feed every envelope of `subscription` to the router, one task per message.
/// Runs until the subscription ends.
pub async fn run_bus_bridge<S, B>(mut subscription: Subscription, subject: String, router: IngestRouter<S, B>)
where
    S: Store,
    B: Bus,
{
    while let Some(msg) = subscription.next().await {
        debug!(subject = %msg.subject, bytes = msg.payload.len(), "bus message");
        let router = router.clone();
        tokio::spawn(async move {
            router.handle_bus_payload(&msg.payload).await;
        });
    }

    warn!(subject = %subject, "bus subscription closed");
}
