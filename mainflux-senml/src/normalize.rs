//! SenML normalization - converting packs to resolved form
//!
//! Normalization is a single forward pass. Base values declared by a record
//! are carried to every following record until overridden, and every record
//! carrying `v`, `vs` or `vb` comes out as a self-contained
//! [`NormalizedRecord`] with an absolute time.
//!
//! Time resolution: `bt + t` when that sum is positive. A non-positive sum
//! means the sensor had no clock and sent an offset from "now", so the
//! record time becomes `floor(now) + t`.

use crate::SenMLRecord;
use serde::{Deserialize, Serialize};

/// A fully resolved SenML record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Running base name followed by the record's own name
    pub name: String,
    /// Base name in force when the record was read
    pub base_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Absolute time in seconds since the UNIX epoch
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Running base state for one normalization pass.
///
/// The state never outlives the pass; create a new `Normalizer` per pack.
#[derive(Debug, Clone)]
pub struct Normalizer {
    base_name: String,
    base_time: f64,
    base_unit: String,
    now: f64,
}

impl Normalizer {
    /// Start a pass whose relative times resolve against `now` (UNIX seconds)
    pub fn new(now: i64) -> Self {
        Self {
            base_name: String::new(),
            base_time: 0.0,
            base_unit: String::new(),
            now: now as f64,
        }
    }

    /// Start a pass against the current wall clock
    pub fn now() -> Self {
        Self::new(time::OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Fold `record` into the running state and resolve it.
    ///
    /// Returns `None` for records that only declare base values.
    pub fn resolve(&mut self, record: &SenMLRecord) -> Option<NormalizedRecord> {
        if let Some(bt) = record.bt {
            self.base_time = bt;
        }
        if let Some(bu) = record.bu.as_deref().filter(|bu| !bu.is_empty()) {
            self.base_unit = bu.to_string();
        }
        if let Some(bn) = record.bn.as_deref().filter(|bn| !bn.is_empty()) {
            self.base_name = bn.to_string();
        }

        if !record.has_value() {
            return None;
        }

        let offset = record.t.unwrap_or(0.0);
        let mut time = self.base_time + offset;
        if time <= 0.0 {
            time = self.now.floor() + offset;
        }

        let unit = record
            .u
            .as_deref()
            .filter(|u| !u.is_empty())
            .or_else(|| Some(self.base_unit.as_str()).filter(|bu| !bu.is_empty()))
            .map(str::to_string);

        Some(NormalizedRecord {
            name: format!("{}{}", self.base_name, record.n.as_deref().unwrap_or_default()),
            base_name: self.base_name.clone(),
            unit,
            time,
            value: record.v,
            string_value: record.vs.clone(),
            bool_value: record.vb,
            data_value: record.vd.clone(),
            sum: record.s,
            update_time: record.ut,
            link: record.l.clone(),
        })
    }
}

/// Normalize `records` resolving relative times against `now` (UNIX seconds)
pub fn normalize_at(records: &[SenMLRecord], now: i64) -> Vec<NormalizedRecord> {
    let mut normalizer = Normalizer::new(now);
    records
        .iter()
        .filter_map(|record| normalizer.resolve(record))
        .collect()
}

/// Normalize `records` against the current wall clock
pub fn normalize(records: &[SenMLRecord]) -> Vec<NormalizedRecord> {
    normalize_at(records, time::OffsetDateTime::now_utc().unix_timestamp())
}
