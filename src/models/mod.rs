//! Documents stored by the gateway and the typed request bodies that create
//! or change them.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use time::{OffsetDateTime, UtcOffset, format_description::well_known::Rfc3339};

use crate::error::{Error, Result};

pub mod channel;
pub mod device;
pub mod message;

pub use channel::{Channel, ChannelFields, Visibility};
pub use device::{Device, DeviceFields};
pub use message::{Message, Protocol};

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_DESCRIPTION_LEN: usize = 256;

/// Current UTC time as RFC3339
pub fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

/// RFC3339 in UTC with all nine fraction digits, so that string order is
/// time order.
pub fn format_rfc3339(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    let nanos = at.nanosecond();
    at.replace_nanosecond(0)
        .ok()
        .and_then(|seconds| seconds.format(&Rfc3339).ok())
        .map(|seconds| format!("{}.{:09}Z", seconds.trim_end_matches('Z'), nanos))
        .unwrap_or_default()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Decode a JSON object body into `T`, rejecting `read_only` keys with a
/// dedicated message before serde reports any other unknown field.
pub fn parse_body<T: DeserializeOwned>(body: &[u8], read_only: &[&str]) -> Result<T> {
    let value: Value = if body.is_empty() {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(body).map_err(|e| Error::Decode(format!("cannot decode body: {}", e)))?
    };

    let object = value
        .as_object()
        .ok_or_else(|| Error::Decode("body must be a JSON object".to_string()))?;

    if let Some(field) = object.keys().find(|k| read_only.contains(&k.as_str())) {
        return Err(Error::Validation(format!("{} is read-only", field)));
    }

    serde_json::from_value(value).map_err(|e| Error::Validation(e.to_string()))
}

/// Decode a JSON array of ids
pub fn parse_ids(body: &[u8]) -> Result<Vec<String>> {
    serde_json::from_slice(body)
        .map_err(|e| Error::Decode(format!("expected a JSON array of ids: {}", e)))
}

pub(crate) fn check_lengths(name: Option<&str>, description: Option<&str>) -> Result<()> {
    if name.is_some_and(|n| n.chars().count() > MAX_NAME_LEN) {
        return Err(Error::Validation(format!("max name size {}", MAX_NAME_LEN)));
    }
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(Error::Validation(format!(
            "max description size {}",
            MAX_DESCRIPTION_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids(br#"["a","b"]"#).unwrap(), vec!["a", "b"]);
        assert!(matches!(parse_ids(br#"{"a":1}"#), Err(Error::Decode(_))));
        assert!(matches!(parse_ids(br#"[1,2]"#), Err(Error::Decode(_))));
    }

    #[test]
    fn test_parse_body_rejects_non_objects() {
        let res: Result<DeviceFields> = parse_body(b"[1]", &[]);
        assert!(matches!(res, Err(Error::Decode(_))));
    }

    #[test]
    fn test_timestamp_is_rfc3339() {
        let now = now_rfc3339();
        assert!(OffsetDateTime::parse(&now, &Rfc3339).is_ok());
    }

    #[test]
    fn test_timestamp_string_order_is_time_order() {
        let whole = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(format_rfc3339(whole), "2023-11-14T22:13:20.000000000Z");

        let later = [
            time::Duration::nanoseconds(123_400_000),
            time::Duration::nanoseconds(123_450_000),
            time::Duration::milliseconds(500),
            time::Duration::seconds(1),
        ];
        let mut previous = format_rfc3339(whole);
        for offset in later {
            let current = format_rfc3339(whole + offset);
            assert!(previous < current, "{} !< {}", previous, current);
            assert_eq!(OffsetDateTime::parse(&current, &Rfc3339).unwrap(), whole + offset);
            previous = current;
        }
    }
}
