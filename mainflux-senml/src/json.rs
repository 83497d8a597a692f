//! JSON serialization support for SenML

use crate::{Result, SenMLError, SenMLPack};

impl SenMLPack {
    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SenMLError::serialization(e.to_string()))
    }

    /// Serialize SenML pack to JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| SenMLError::serialization(e.to_string()))
    }

    /// Deserialize from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_bytes(json.as_bytes())
    }

    /// Deserialize SenML pack from JSON bytes
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| SenMLError::deserialization(e.to_string()))
    }
}
