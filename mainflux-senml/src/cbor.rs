//! CBOR serialization support for SenML

use crate::{Result, SenMLError, SenMLPack};

impl SenMLPack {
    /// Serialize to CBOR bytes
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        ciborium::ser::into_writer(self, &mut buffer)
            .map_err(|e| SenMLError::serialization(e.to_string()))?;
        Ok(buffer)
    }

    /// Deserialize from CBOR bytes
    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| SenMLError::deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::{SenMLPack, SenMLRecord};

    #[test]
    fn test_cbor_is_array_major_type() {
        let mut pack = SenMLPack::new();
        pack.add_record(SenMLRecord::with_value("temp", 1.0));
        let bytes = pack.to_cbor().unwrap();
        assert_eq!(bytes.first().map(|b| b >> 5), Some(4));
    }

    #[test]
    fn test_truncated_cbor_fails() {
        let mut pack = SenMLPack::new();
        pack.add_record(SenMLRecord::with_string_value("state", "open"));
        let bytes = pack.to_cbor().unwrap();
        assert!(SenMLPack::from_cbor(&bytes[..bytes.len() - 2]).is_err());
    }
}
