use std::fmt;

use mainflux_senml::NormalizedRecord;
use serde::{Deserialize, Serialize};

/// Transport a message entered the gateway through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Mqtt,
    Nats,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Mqtt => write!(f, "mqtt"),
            Protocol::Nats => write!(f, "nats"),
        }
    }
}

/// One resolved measurement as persisted in a channel's entry log and in
/// the flat message log. Measurement fields keep their SenML labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub channel: String,
    pub publisher: String,
    pub protocol: Protocol,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "t")]
    pub time: f64,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(rename = "vs", default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(rename = "vb", default, skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    #[serde(rename = "vd", default, skip_serializing_if = "Option::is_none")]
    pub data_value: Option<String>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(rename = "ut", default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<f64>,
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Ingestion wall-clock time, RFC3339
    pub timestamp: String,
}

impl Message {
    /// Stamp a resolved record with its channel and origin.
    ///
    /// `publisher` wins when non-empty; otherwise the record's base name
    /// identifies the sending stream.
    pub fn from_record(
        record: NormalizedRecord,
        channel: &str,
        publisher: &str,
        protocol: Protocol,
        timestamp: &str,
    ) -> Self {
        let publisher = if publisher.is_empty() {
            record.base_name
        } else {
            publisher.to_string()
        };

        Self {
            channel: channel.to_string(),
            publisher,
            protocol,
            name: record.name,
            unit: record.unit,
            time: record.time,
            value: record.value,
            string_value: record.string_value,
            bool_value: record.bool_value,
            data_value: record.data_value,
            sum: record.sum,
            update_time: record.update_time,
            link: record.link,
            timestamp: timestamp.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mainflux_senml::{SenMLRecord, normalize_at};
    use serde_json::json;

    fn resolved() -> NormalizedRecord {
        let records = vec![SenMLRecord::with_value("temp", 21.5)
            .with_base_name("room1/")
            .with_base_time(1000.0)
            .with_time(5.0)];
        normalize_at(&records, 0).remove(0)
    }

    #[test]
    fn test_publisher_falls_back_to_base_name() {
        let msg = Message::from_record(resolved(), "c1", "", Protocol::Http, "ts");
        assert_eq!(msg.publisher, "room1/");
        let msg = Message::from_record(resolved(), "c1", "client-7", Protocol::Mqtt, "ts");
        assert_eq!(msg.publisher, "client-7");
    }

    #[test]
    fn test_document_uses_senml_labels() {
        let msg = Message::from_record(resolved(), "c1", "", Protocol::Http, "ts");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "channel": "c1",
                "publisher": "room1/",
                "protocol": "http",
                "n": "room1/temp",
                "t": 1005.0,
                "v": 21.5,
                "timestamp": "ts"
            })
        );
    }
}
