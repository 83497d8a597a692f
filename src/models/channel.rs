use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{Message, check_lengths, parse_body};
use crate::error::Result;
use crate::store::UpdateOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Protected,
    Public,
}

/// A named message pipe. `entries` is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub entries: Vec<Message>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created: String,
    pub updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

impl ChannelFields {
    pub const READ_ONLY: &'static [&'static str] = &[
        "id",
        "created",
        "updated",
        "devices",
        "entries",
        "visibility",
        "owner",
    ];

    pub fn parse(body: &[u8]) -> Result<Self> {
        let fields: Self = parse_body(body, Self::READ_ONLY)?;
        check_lengths(fields.name.as_deref(), fields.description.as_deref())?;
        Ok(fields)
    }

    pub fn into_channel(self, id: String, now: String) -> Channel {
        Channel {
            id,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            visibility: Visibility::Private,
            owner: String::new(),
            devices: Vec::new(),
            entries: Vec::new(),
            metadata: self.metadata.unwrap_or_default(),
            created: now.clone(),
            updated: now,
        }
    }

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
