//! # Mainflux SenML
//!
//! Sensor Measurement Lists ([RFC 8428](https://tools.ietf.org/html/rfc8428))
//! as consumed by the Mainflux gateway.
//!
//! Devices send compact packs in which base fields (`bn`, `bt`, `bu`)
//! apply to every following record. The gateway stores each measurement
//! fully resolved, so this crate provides:
//!
//! - **Decoding**: JSON record arrays, the older `{"bn":..,"e":[..]}` object
//!   layout, and CBOR
//! - **Normalization**: a single pass resolving names, units and absolute times
//!
//! ## Quick Start
//!
//! ```rust
//! use mainflux_senml::{Format, SenMLPack, normalize_at};
//!
//! let payload = br#"{"bn":"room1/","bt":1000,"e":[{"n":"temp","v":21.5,"t":5}]}"#;
//! let pack = SenMLPack::decode(payload, Format::Json).unwrap();
//! let resolved = normalize_at(&pack.records, 1_700_000_000);
//!
//! assert_eq!(resolved[0].name, "room1/temp");
//! assert_eq!(resolved[0].time, 1005.0);
//! ```

pub mod error;
pub mod normalize;
pub mod pack;
pub mod record;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "cbor")]
pub mod cbor;

pub use error::{Result, SenMLError};
pub use normalize::{NormalizedRecord, Normalizer, normalize, normalize_at};
pub use pack::{Format, SenMLPack};
pub use record::{SenMLRecord, SenMLValue};

/// SenML media types
pub mod content_type {
    pub const SENML_JSON: &str = "application/senml+json";
    pub const SENSML_JSON: &str = "application/sensml+json";
    pub const SENML_CBOR: &str = "application/senml+cbor";
    pub const SENSML_CBOR: &str = "application/sensml+cbor";
}
