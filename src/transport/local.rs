use std::convert::Infallible;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use super::{Bus, BusMessage, Subscription};

/// In-process bus over a tokio broadcast channel.
///
/// Messages published while nobody is subscribed are dropped.
#[derive(Clone, Debug)]
pub struct LocalBus {
    tx: broadcast::Sender<BusMessage>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Bus for LocalBus {
    type Error = Infallible;

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        let _ = self.tx.send(BusMessage {
            subject: subject.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<Subscription, Self::Error> {
        let subject = subject.to_string();
        let rx = self.tx.subscribe();

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => return Some((msg, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "local bus subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .filter(move |msg| futures::future::ready(msg.subject == subject));

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_bus_filters_by_subject() {
        let bus = LocalBus::new(16);
        let mut sub = bus.subscribe("a").await.unwrap();

        bus.publish("b", b"skip".to_vec()).await.unwrap();
        bus.publish("a", b"take".to_vec()).await.unwrap();

        let msg = sub.next().await.unwrap();
        assert_eq!(msg.subject, "a");
        assert_eq!(msg.payload, b"take");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = LocalBus::default();
        tokio_test::assert_ok!(bus.publish("x", vec![1]).await);
    }
}
