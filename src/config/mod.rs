use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::transport::DEFAULT_SUBJECT;

#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP listen address
    pub http_addr: SocketAddr,

    /// MQTT bridge, disabled when `None`
    pub mqtt: Option<MqttConfig>,

    /// NATS bus; the in-process bus is used when `None`
    pub nats: Option<NatsConfig>,

    /// sled database directory; in-memory storage when `None`
    pub store_path: Option<PathBuf>,

    /// Also write persisted entries to the flat messages collection
    pub message_log: bool,

    /// Buffer size of the in-process bus
    pub bus_capacity: usize,
}

impl Config {
    /// Subject relayed envelopes travel on
    pub fn subject(&self) -> &str {
        self.nats
            .as_ref()
            .map(|nats| nats.subject.as_str())
            .unwrap_or(DEFAULT_SUBJECT)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 7070)),
            mqtt: None,
            nats: None,
            store_path: None,
            message_log: true,
            bus_capacity: 1024,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Topics are `<topic_prefix>/channels/<id>`
    pub topic_prefix: String,
    pub keep_alive: Duration,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "mainflux".to_string(),
            topic_prefix: "mainflux".to_string(),
            keep_alive: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NatsConfig {
    pub url: String,
    pub subject: String,
    pub connect_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}
