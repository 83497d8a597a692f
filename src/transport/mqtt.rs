//! MQTT bridge.
//!
//! Devices publish raw SenML on `<prefix>/channels/<id>`. The bridge relays
//! it through the ingest router and fans relayed envelopes from other
//! transports back out on the same topic. Those come back to us through
//! our own subscription; they carry `relayed = true` and are dropped.

use std::time::Duration;

use futures::StreamExt;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{debug, error, info, warn};

use super::{Bus, channel_from_topic, channel_topic};
use crate::error::{Error, Result};
use crate::ingest::{Envelope, IngestOutcome, IngestRouter};
use crate::models::Protocol;
use crate::store::Store;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub fn options(host: &str, port: u16, client_id: &str, keep_alive: Duration) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(keep_alive);
    options.set_clean_session(true);
    options
}

#[derive(Clone)]
pub struct MqttBridge<S, B> {
    client: AsyncClient,
    prefix: String,
    router: IngestRouter<S, B>,
}

impl<S: Store, B: Bus> MqttBridge<S, B> {
    pub fn new<P: Into<String>>(client: AsyncClient, prefix: P, router: IngestRouter<S, B>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            router,
        }
    }

    /// `<prefix>/channels/+`
    pub fn subscription_filter(&self) -> String {
        channel_topic(&self.prefix, "+")
    }

    /// Ingest one inbound publish. Returns `None` for our own echoes.
    pub async fn handle_publish(&self, topic: &str, payload: &[u8]) -> Result<Option<IngestOutcome>> {
        if let Ok(envelope) = Envelope::from_bytes(payload) {
            if envelope.relayed {
                debug!(topic = %topic, "dropping relayed echo");
                return Ok(None);
            }
        }

        let channel = channel_from_topic(topic)
            .ok_or_else(|| Error::Decode(format!("no channel in topic '{}'", topic)))?;

        let envelope = Envelope::new(channel, "", Protocol::Mqtt, payload.to_vec());
        self.router.ingest(envelope).await.map(Some)
    }

    /// Topic a relayed envelope should be delivered on, if any.
    /// MQTT-origin envelopes already reached subscribers.
    pub fn outbound_topic(&self, envelope: &Envelope) -> Option<String> {
        (envelope.relayed && envelope.protocol != Protocol::Mqtt)
            .then(|| channel_topic(&self.prefix, &envelope.channel))
    }

    pub async fn deliver(&self, envelope: &Envelope) -> Result<bool> {
        let Some(topic) = self.outbound_topic(envelope) else {
            return Ok(false);
        };

        self.client
            .publish(topic.as_str(), QoS::AtLeastOnce, false, envelope.to_bytes()?)
            .await
            .map_err(Error::transport)?;

        debug!(topic = %topic, "delivered envelope");
        Ok(true)
    }

    /// Drive the MQTT event loop and the outbound bus subscription until
    /// the bus subscription ends.
    pub async fn run(self, mut eventloop: EventLoop, bus: B, subject: &str) -> Result<()> {
        let mut outbound = bus.subscribe(subject).await.map_err(Error::transport)?;
        let filter = self.subscription_filter();
        info!(filter = %filter, subject = %subject, "mqtt bridge started");

        loop {
            tokio::select! {
                msg = outbound.next() => {
                    let Some(msg) = msg else {
                        warn!(subject = %subject, "bus subscription closed, stopping mqtt bridge");
                        return Ok(());
                    };
                    match Envelope::from_bytes(&msg.payload) {
                        // The client queue only drains while the event loop is polled
                        Ok(envelope) => {
                            let bridge = self.clone();
                            tokio::spawn(async move {
                                if let Err(e) = bridge.deliver(&envelope).await {
                                    warn!(channel = %envelope.channel, error = %e, "mqtt delivery failed");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "undecodable bus message"),
                    }
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let bridge = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = bridge.handle_publish(&publish.topic, &publish.payload).await {
                                warn!(topic = %publish.topic, error = %e, "mqtt message rejected");
                            }
                        });
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                        // Clean sessions lose subscriptions on reconnect
                        if let Err(e) = self.client.subscribe(filter.as_str(), QoS::AtLeastOnce).await {
                            error!(filter = %filter, error = %e, "mqtt subscribe failed");
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "mqtt connection error");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        }
    }
}
