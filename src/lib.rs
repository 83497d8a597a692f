//! Mainflux IoT message gateway.
//!
//! Devices and applications exchange SenML telemetry through channels over
//! HTTP, MQTT and an internal bus. Incoming packs are normalized into
//! self-contained [`models::Message`]s, relayed once over the bus and then
//! persisted in the channel's entry log. [`relations::RelationshipManager`]
//! keeps the device/channel membership graph symmetric.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalizer;
pub mod relations;
pub mod router;
pub mod routing;
pub mod serve;
pub mod store;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{Error, Result};
pub use ingest::{Envelope, IngestOutcome, IngestRouter};
pub use relations::RelationshipManager;
pub use router::{ApiRequest, ApiResponse, ApiRouter};
pub use routing::RouterBuilder;

pub use mainflux_senml as senml;

#[cfg(test)]
#[macro_use]
extern crate lazy_static;
