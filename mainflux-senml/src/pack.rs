//! SenML Pack - collection of SenML records

use crate::{Result, SenMLError, SenMLRecord};
use serde::{Deserialize, Deserializer, Serialize};

/// A SenML Pack is an ordered array of SenML records.
///
/// Packs always serialize as the RFC 8428 array. Decoding additionally
/// accepts the older object layout `{"bn":..,"bt":..,"bu":..,"bver":..,"e":[..]}`,
/// whose base fields become a leading base-only record.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct SenMLPack {
    /// Array of SenML records
    pub records: Vec<SenMLRecord>,
}

/// Media formats a pack can be decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Cbor,
}

impl Format {
    /// Pick the decoder for a `Content-Type` value. Anything that is not
    /// SenML CBOR is treated as JSON.
    pub fn from_content_type(content_type: &str) -> Self {
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        if media_type.eq_ignore_ascii_case(crate::content_type::SENML_CBOR)
            || media_type.eq_ignore_ascii_case(crate::content_type::SENSML_CBOR)
            || media_type.eq_ignore_ascii_case("application/cbor")
        {
            Format::Cbor
        } else {
            Format::Json
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WirePack {
    Records(Vec<SenMLRecord>),
    Legacy(LegacyPack),
}

#[derive(Deserialize)]
struct LegacyPack {
    #[serde(default)]
    bn: Option<String>,
    #[serde(default)]
    bt: Option<f64>,
    #[serde(default)]
    bu: Option<String>,
    #[serde(default)]
    bver: Option<i32>,
    e: Vec<SenMLRecord>,
}

impl From<LegacyPack> for SenMLPack {
    fn from(legacy: LegacyPack) -> Self {
        let base = SenMLRecord {
            bn: legacy.bn,
            bt: legacy.bt,
            bu: legacy.bu,
            bver: legacy.bver,
            ..Default::default()
        };

        let mut records = Vec::with_capacity(legacy.e.len() + 1);
        if base.has_base_values() {
            records.push(base);
        }
        records.extend(legacy.e);
        Self { records }
    }
}

impl<'de> Deserialize<'de> for SenMLPack {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match WirePack::deserialize(deserializer) {
            Ok(WirePack::Records(records)) => Ok(Self { records }),
            Ok(WirePack::Legacy(legacy)) => Ok(legacy.into()),
            Err(_) => Err(serde::de::Error::custom(
                "expected an array of SenML records or an object with an \"e\" array",
            )),
        }
    }
}

impl SenMLPack {
    /// Create a new empty pack
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Add a record to this pack
    pub fn add_record(&mut self, record: SenMLRecord) {
        self.records.push(record);
    }

    /// Add multiple records to this pack
    pub fn add_records<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = SenMLRecord>,
    {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SenMLRecord> {
        self.records.iter()
    }

    /// Number of records normalization will emit
    pub fn value_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_value()).count()
    }

    /// Validate every record. An empty pack is valid.
    pub fn validate(&self) -> Result<()> {
        for (i, record) in self.records.iter().enumerate() {
            record.validate().map_err(|e| {
                SenMLError::validation(format!("Invalid record at index {}: {}", i, e))
            })?;
        }
        Ok(())
    }

    /// Decode and validate a payload in the given format
    pub fn decode(bytes: &[u8], format: Format) -> Result<Self> {
        let pack = match format {
            #[cfg(feature = "json")]
            Format::Json => Self::from_json_bytes(bytes)?,
            #[cfg(feature = "cbor")]
            Format::Cbor => Self::from_cbor(bytes)?,
            #[allow(unreachable_patterns)]
            other => {
                return Err(SenMLError::invalid_data(format!(
                    "{:?} support is not enabled",
                    other
                )));
            }
        };
        pack.validate()?;
        Ok(pack)
    }
}

impl FromIterator<SenMLRecord> for SenMLPack {
    fn from_iter<I: IntoIterator<Item = SenMLRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SenMLPack {
    type Item = SenMLRecord;
    type IntoIter = std::vec::IntoIter<SenMLRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a SenMLPack {
    type Item = &'a SenMLRecord;
    type IntoIter = std::slice::Iter<'a, SenMLRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
