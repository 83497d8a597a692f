//! Mainflux gateway server.
//!
//! ```bash
//! # In-memory store, in-process bus, HTTP only
//! mainflux-server
//!
//! # NATS bus and MQTT bridge
//! MF_NATS_URL=nats://localhost:4222 MF_MQTT_HOST=localhost mainflux-server
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mainflux::api::{self, AppState};
use mainflux::config::{Config, MqttConfig, NatsConfig};
use mainflux::error::BoxError;
use mainflux::ingest::IngestRouter;
use mainflux::store::{MemStore, Store};
use mainflux::transport::{self, Bus, DEFAULT_SUBJECT, LocalBus};

/// IoT message gateway
#[derive(Parser, Debug)]
#[command(name = "mainflux-server")]
#[command(version)]
struct Args {
    /// HTTP listen address
    #[arg(long, env = "MF_HTTP_ADDR", default_value = "0.0.0.0:7070")]
    http_addr: SocketAddr,

    /// sled database directory (in-memory store when absent)
    #[arg(long, env = "MF_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Do not keep the flat message log
    #[arg(long, env = "MF_NO_MESSAGE_LOG")]
    no_message_log: bool,

    /// In-process bus capacity
    #[arg(long, env = "MF_BUS_CAPACITY", default_value = "1024")]
    bus_capacity: usize,

    /// NATS server URL (in-process bus when absent)
    #[arg(long, env = "MF_NATS_URL")]
    nats_url: Option<String>,

    /// Subject carrying relayed envelopes
    #[arg(long, env = "MF_NATS_SUBJECT", default_value = DEFAULT_SUBJECT)]
    nats_subject: String,

    /// MQTT broker host (bridge disabled when absent)
    #[arg(long, env = "MF_MQTT_HOST")]
    mqtt_host: Option<String>,

    #[arg(long, env = "MF_MQTT_PORT", default_value = "1883")]
    mqtt_port: u16,

    #[arg(long, env = "MF_MQTT_CLIENT_ID", default_value = "mainflux")]
    mqtt_client_id: String,

    #[arg(long, env = "MF_MQTT_PREFIX", default_value = "mainflux")]
    mqtt_prefix: String,

    /// MQTT keep alive in seconds
    #[arg(long, env = "MF_MQTT_KEEP_ALIVE", default_value = "30")]
    mqtt_keep_alive: u64,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            http_addr: args.http_addr,
            mqtt: args.mqtt_host.map(|host| MqttConfig {
                host,
                port: args.mqtt_port,
                client_id: args.mqtt_client_id,
                topic_prefix: args.mqtt_prefix,
                keep_alive: Duration::from_secs(args.mqtt_keep_alive),
            }),
            nats: args.nats_url.map(|url| NatsConfig {
                url,
                subject: args.nats_subject,
                ..Default::default()
            }),
            store_path: args.store_path,
            message_log: !args.no_message_log,
            bus_capacity: args.bus_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = Config::from(Args::parse());
    info!("Mainflux gateway v{}", env!("CARGO_PKG_VERSION"));

    match config.store_path.clone() {
        #[cfg(feature = "sled-store")]
        Some(path) => {
            info!(path = %path.display(), "using sled store");
            let store = mainflux::store::SledStore::open(&path)?;
            with_store(config, store).await
        }
        #[cfg(not(feature = "sled-store"))]
        Some(path) => {
            warn!(path = %path.display(), "built without sled-store, using in-memory store");
            with_store(config, MemStore::new()).await
        }
        None => with_store(config, MemStore::new()).await,
    }
}

async fn with_store<S: Store>(config: Config, store: S) -> Result<(), BoxError> {
    #[cfg(feature = "nats")]
    {
        if let Some(nats) = &config.nats {
            info!(url = %nats.url, subject = %nats.subject, "using nats bus");
            let bus = transport::nats::NatsBus::connect(&nats.url, nats.connect_timeout).await?;
            return run(config, store, bus).await;
        }
    }

    #[cfg(not(feature = "nats"))]
    {
        if config.nats.is_some() {
            warn!("built without nats, using in-process bus");
        }
    }

    let bus = LocalBus::new(config.bus_capacity);
    run(config, store, bus).await
}

async fn run<S: Store, B: Bus>(config: Config, store: S, bus: B) -> Result<(), BoxError> {
    let subject = config.subject().to_string();
    let ingest = IngestRouter::new(store.clone(), bus.clone(), subject.clone())
        .with_message_log(config.message_log);

    // Subscribed before the listener accepts its first message
    transport::spawn_bus_bridge(&bus, &subject, ingest.clone()).await?;

    #[cfg(feature = "mqtt")]
    {
        if let Some(mqtt) = &config.mqtt {
            let options = transport::mqtt::options(&mqtt.host, mqtt.port, &mqtt.client_id, mqtt.keep_alive);
            let (client, eventloop) = rumqttc::AsyncClient::new(options, 64);
            let bridge = transport::mqtt::MqttBridge::new(client, mqtt.topic_prefix.clone(), ingest.clone());
            let (bus, subject) = (bus.clone(), subject.clone());

            info!(host = %mqtt.host, port = mqtt.port, "starting mqtt bridge");
            tokio::spawn(async move {
                if let Err(e) = bridge.run(eventloop, bus, &subject).await {
                    error!(error = %e, "mqtt bridge failed");
                }
            });
        }
    }

    #[cfg(not(feature = "mqtt"))]
    {
        if config.mqtt.is_some() {
            warn!("built without mqtt, bridge disabled");
        }
    }

    let router = api::router(AppState::new(store, ingest));
    mainflux::serve::serve(config.http_addr, router, shutdown_signal()).await?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
