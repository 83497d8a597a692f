//! Ingestion routing and loop prevention.
//!
//! Every message enters as an [`Envelope`]. Envelopes that have not been
//! relayed yet are validated and published once on the internal bus with
//! `relayed = true`. Relayed envelopes are persisted and never published
//! again. Since the bus bridge is the only place relayed envelopes come
//! from, each accepted message is stored exactly once no matter which
//! transport it arrived on.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mainflux_senml::{Format, SenMLPack};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::models::{Channel, Message, Protocol, new_id, now_rfc3339};
use crate::normalizer::{self, Origin};
use crate::store::{Collection, Query, Store, StoreExt, UpdateOp};
use crate::transport::Bus;

/// Bus wire format. `payload` is SenML JSON, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub channel: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(with = "base64_payload")]
    pub payload: Vec<u8>,
    #[serde(default)]
    pub relayed: bool,
}

impl Envelope {
    pub fn new<C, P>(channel: C, publisher: P, protocol: Protocol, payload: Vec<u8>) -> Self
    where
        C: Into<String>,
        P: Into<String>,
    {
        Self {
            channel: channel.into(),
            publisher: publisher.into(),
            protocol,
            payload,
            relayed: false,
        }
    }

    pub fn relayed(mut self) -> Self {
        self.relayed = true;
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Decode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Decode(format!("bad envelope: {}", e)))
    }

    fn origin(&self) -> Origin<'_> {
        Origin {
            channel: &self.channel,
            publisher: &self.publisher,
            protocol: self.protocol,
        }
    }
}

mod base64_payload {
    use super::*;

    pub fn serialize<S: Serializer>(payload: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// What [`IngestRouter::ingest`] did with an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Published on the bus for persistence and delivery
    Relayed(usize),
    /// Written to the channel log
    Persisted(usize),
}

impl IngestOutcome {
    pub fn count(&self) -> usize {
        match self {
            IngestOutcome::Relayed(n) | IngestOutcome::Persisted(n) => *n,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestRouter<S, B> {
    store: S,
    bus: B,
    subject: String,
    message_log: bool,
}

impl<S: Store, B: Bus> IngestRouter<S, B> {
    pub fn new<T: Into<String>>(store: S, bus: B, subject: T) -> Self {
        Self {
            store,
            bus,
            subject: subject.into(),
            message_log: true,
        }
    }

    /// Also write entries to the flat `messages` collection
    pub fn with_message_log(mut self, enabled: bool) -> Self {
        self.message_log = enabled;
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Entry point for HTTP submissions.
    ///
    /// The channel must exist. CBOR bodies are re-encoded as SenML JSON so
    /// every envelope on the bus carries the same payload format.
    pub async fn accept_http(
        &self,
        channel: &str,
        publisher: &str,
        format: Format,
        payload: &[u8],
    ) -> Result<IngestOutcome> {
        let query = Query::by_id(channel).slice("entries", 0);
        if self
            .store
            .get_with::<Value>(Collection::Channels, &query)
            .await?
            .is_none()
        {
            return Err(Error::channel_not_found(channel));
        }

        let payload = match format {
            Format::Json => payload.to_vec(),
            Format::Cbor => SenMLPack::decode(payload, Format::Cbor)?.to_json_bytes()?,
        };

        self.ingest(Envelope::new(channel, publisher, Protocol::Http, payload))
            .await
    }

    /// Normalize an envelope and either relay or persist it.
    pub async fn ingest(&self, envelope: Envelope) -> Result<IngestOutcome> {
        let messages = normalizer::normalize(&envelope.payload, Format::Json, envelope.origin())?;
        let count = messages.len();

        if envelope.relayed {
            self.persist(&envelope.channel, messages).await?;
            return Ok(IngestOutcome::Persisted(count));
        }

        let channel = envelope.channel.clone();
        let bytes = envelope.relayed().to_bytes()?;
        self.bus
            .publish(&self.subject, bytes)
            .await
            .map_err(Error::transport)?;

        debug!(channel = %channel, count, subject = %self.subject, "relayed message");
        Ok(IngestOutcome::Relayed(count))
    }

    /// Append entries to the channel log and bump `updated`.
    ///
    /// The channel log is authoritative. Once it holds the entries, a failed
    /// message log insert is logged and skipped rather than returned.
    pub async fn persist(&self, channel: &str, messages: Vec<Message>) -> Result<()> {
        let entries = messages
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::store)?;

        let ops = [
            UpdateOp::push("entries", entries),
            UpdateOp::set("updated", now_rfc3339()),
        ];
        if !self.store.modify(Collection::Channels, channel, &ops).await? {
            return Err(Error::channel_not_found(channel));
        }

        if self.message_log {
            let mut missing = 0;
            for message in &messages {
                if let Err(e) = self.store.put(Collection::Messages, &new_id(), message).await {
                    missing += 1;
                    warn!(channel = %channel, name = %message.name, t = message.time, error = %e, "message log insert failed");
                }
            }
            if missing > 0 {
                warn!(channel = %channel, missing, total = messages.len(), "message log is missing entries");
            }
        }

        info!(channel = %channel, count = messages.len(), "persisted entries");
        Ok(())
    }

    /// Bus bridge boundary: failures are logged, never returned.
    pub async fn handle_bus_payload(&self, payload: &[u8]) {
        let envelope = match Envelope::from_bytes(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping undecodable bus message");
                return;
            }
        };

        let channel = envelope.channel.clone();
        if let Err(e) = self.ingest(envelope).await {
            warn!(channel = %channel, error = %e, "bus message not ingested");
        }
    }

    /// Messages of one channel with `start <= t <= end`, oldest first.
    ///
    /// Reads the flat message log when it is kept, the channel's own entry
    /// log otherwise.
    pub async fn messages(&self, channel: &str, start: f64, end: f64) -> Result<Vec<Message>> {
        if self.message_log {
            let query = Query::all()
                .eq("channel", channel)
                .range("t", start, end)
                .sort_by("t", false);
            return self.store.list(Collection::Messages, &query).await;
        }

        let doc: Channel = self
            .store
            .get(Collection::Channels, channel)
            .await?
            .ok_or_else(|| Error::channel_not_found(channel))?;

        let mut entries: Vec<Message> = doc
            .entries
            .into_iter()
            .filter(|m| m.time >= start && m.time <= end)
            .collect();
        entries.sort_by(|a, b| a.time.total_cmp(&b.time));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChannelFields;
    use crate::store::memory::MemStoreError;
    use crate::store::MemStore;
    use crate::transport::LocalBus;
    use futures::StreamExt;

    const PAYLOAD: &[u8] = br#"[{"bn":"room1/","bt":1000,"n":"temp","v":21.5,"t":5}]"#;

    async fn setup() -> (MemStore, LocalBus, IngestRouter<MemStore, LocalBus>) {
        let store = MemStore::new();
        let bus = LocalBus::new(16);
        let channel = ChannelFields::default().into_channel("c1".into(), now_rfc3339());
        store.put(Collection::Channels, "c1", &channel).await.unwrap();
        let router = IngestRouter::new(store.clone(), bus.clone(), "test/out");
        (store, bus, router)
    }

    async fn entries(store: &MemStore) -> Vec<Message> {
        let channel: Channel = store.get(Collection::Channels, "c1").await.unwrap().unwrap();
        channel.entries
    }

    #[test]
    fn test_envelope_wire_format() {
        let env = Envelope::new("c1", "p", Protocol::Mqtt, b"[]".to_vec()).relayed();
        let value: Value = serde_json::from_slice(&env.to_bytes().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "channel": "c1",
                "publisher": "p",
                "protocol": "mqtt",
                "payload": "W10=",
                "relayed": true
            })
        );
        assert_eq!(Envelope::from_bytes(&env.to_bytes().unwrap()).unwrap(), env);
    }

    #[test]
    fn test_envelope_defaults() {
        let env = Envelope::from_bytes(br#"{"channel":"c1","payload":"W10="}"#).unwrap();
        assert!(!env.relayed);
        assert_eq!(env.protocol, Protocol::Http);
    }

    #[tokio::test]
    async fn test_unrelayed_message_is_published_not_persisted() {
        let (store, bus, router) = setup().await;
        let mut sub = bus.subscribe("test/out").await.unwrap();

        let outcome = router
            .ingest(Envelope::new("c1", "", Protocol::Mqtt, PAYLOAD.to_vec()))
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Relayed(1));
        assert!(entries(&store).await.is_empty());

        let env = Envelope::from_bytes(&sub.next().await.unwrap().payload).unwrap();
        assert!(env.relayed);
        assert_eq!(env.protocol, Protocol::Mqtt);
        assert_eq!(env.payload, PAYLOAD);
    }

    #[tokio::test]
    async fn test_relayed_message_is_persisted_not_published() {
        let (store, bus, router) = setup().await;
        let mut sub = bus.subscribe("test/out").await.unwrap();

        let outcome = router
            .ingest(Envelope::new("c1", "", Protocol::Http, PAYLOAD.to_vec()).relayed())
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Persisted(1));

        let stored = entries(&store).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "room1/temp");
        assert_eq!(stored[0].time, 1005.0);

        bus.publish("test/out", b"marker".to_vec()).await.unwrap();
        assert_eq!(sub.next().await.unwrap().payload, b"marker");

        let logged = router.messages("c1", 0.0, 2000.0).await.unwrap();
        assert_eq!(logged.len(), 1);
    }

    #[tokio::test]
    async fn test_http_requires_existing_channel() {
        let (_store, _bus, router) = setup().await;
        let err = router
            .accept_http("missing", "", Format::Json, PAYLOAD)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "channel", .. }));
    }

    #[tokio::test]
    async fn test_http_rejects_bad_senml() {
        let (_store, _bus, router) = setup().await;
        let err = router
            .accept_http("c1", "", Format::Json, b"{\"nope\":true}")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_http_cbor_is_reencoded_as_json() {
        let (_store, bus, router) = setup().await;
        let mut sub = bus.subscribe("test/out").await.unwrap();

        let pack = SenMLPack::from_json_bytes(PAYLOAD).unwrap();
        router
            .accept_http("c1", "cli", Format::Cbor, &pack.to_cbor().unwrap())
            .await
            .unwrap();

        let env = Envelope::from_bytes(&sub.next().await.unwrap().payload).unwrap();
        assert_eq!(SenMLPack::from_json_bytes(&env.payload).unwrap(), pack);
        assert_eq!(env.publisher, "cli");
    }

    #[tokio::test]
    async fn test_persist_to_missing_channel() {
        let (store, _bus, router) = setup().await;
        let err = router
            .ingest(Envelope::new("gone", "", Protocol::Nats, PAYLOAD.to_vec()).relayed())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(store.count(Collection::Messages).await, 0);
    }

    #[tokio::test]
    async fn test_message_log_can_be_disabled() {
        let (store, _bus, router) = setup().await;
        let router = router.with_message_log(false);
        router
            .ingest(Envelope::new("c1", "", Protocol::Http, PAYLOAD.to_vec()).relayed())
            .await
            .unwrap();
        assert_eq!(entries(&store).await.len(), 1);
        assert_eq!(store.count(Collection::Messages).await, 0);

        assert_eq!(router.messages("c1", 1000.0, 1005.0).await.unwrap().len(), 1);
        assert!(router.messages("c1", 0.0, 1004.0).await.unwrap().is_empty());
    }

    /// Rejects message log inserts for one measurement name
    #[derive(Debug, Clone)]
    struct RejectingLog {
        inner: MemStore,
        reject: &'static str,
    }

    #[async_trait::async_trait]
    impl Store for RejectingLog {
        type Error = MemStoreError;

        async fn find(&self, collection: Collection, query: &Query) -> std::result::Result<Vec<Value>, Self::Error> {
            self.inner.find(collection, query).await
        }

        async fn insert(&self, collection: Collection, id: &str, doc: Value) -> std::result::Result<(), Self::Error> {
            if collection == Collection::Messages && doc["n"] == self.reject {
                return Err(MemStoreError::Duplicate(id.to_string()));
            }
            self.inner.insert(collection, id, doc).await
        }

        async fn update(&self, collection: Collection, id: &str, ops: &[UpdateOp]) -> std::result::Result<bool, Self::Error> {
            self.inner.update(collection, id, ops).await
        }

        async fn remove(&self, collection: Collection, id: &str) -> std::result::Result<bool, Self::Error> {
            self.inner.remove(collection, id).await
        }
    }

    #[tokio::test]
    async fn test_message_log_failure_keeps_remaining_entries() {
        let (inner, bus, _) = setup().await;
        let store = RejectingLog {
            inner: inner.clone(),
            reject: "s/b",
        };
        let router = IngestRouter::new(store, bus, "test/out");

        let payload = br#"[{"bn":"s/","bt":100,"n":"a","v":1},{"n":"b","v":2},{"n":"c","v":3}]"#;
        let outcome = router
            .ingest(Envelope::new("c1", "", Protocol::Http, payload.to_vec()).relayed())
            .await
            .unwrap();
        assert_eq!(outcome, IngestOutcome::Persisted(3));

        assert_eq!(entries(&inner).await.len(), 3);
        let logged: Vec<Message> = inner
            .list(Collection::Messages, &Query::all().sort_by("n", false))
            .await
            .unwrap();
        let names: Vec<_> = logged.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["s/a", "s/c"]);
    }
}
