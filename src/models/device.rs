use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{check_lengths, parse_body};
use crate::error::Result;
use crate::store::UpdateOp;

/// A device and the channels it is plugged into.
///
/// `channels` mirrors `Channel::devices`; it is only changed through the
/// relationship manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub online: bool,
    pub created: String,
    pub updated: String,
}

/// Mutable device fields accepted on create and update
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl DeviceFields {
    pub const READ_ONLY: &'static [&'static str] =
        &["id", "created", "updated", "channels", "online"];

    pub fn parse(body: &[u8]) -> Result<Self> {
        let fields: Self = parse_body(body, Self::READ_ONLY)?;
        check_lengths(fields.name.as_deref(), fields.description.as_deref())?;
        Ok(fields)
    }

    pub fn into_device(self, id: String, now: String) -> Device {
        Device {
            id,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_default(),
            channels: Vec::new(),
            online: false,
            created: now.clone(),
            updated: now,
        }
    }

    /// Field assignments for an update, always bumping `updated`
    pub fn into_ops(self, now: String) -> Vec<UpdateOp> {
        let mut ops = Vec::new();
        if let Some(name) = self.name {
            ops.push(UpdateOp::set("name", name));
        }
        if let Some(description) = self.description {
            ops.push(UpdateOp::set("description", description));
        }
        if let Some(metadata) = self.metadata {
            ops.push(UpdateOp::set("metadata", Value::Object(metadata)));
        }
        ops.push(UpdateOp::set("updated", json!(now)));
        ops
    }
}
