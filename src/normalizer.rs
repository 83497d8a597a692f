//! Turns a raw SenML payload into channel messages ready to persist.

use mainflux_senml::{Format, Normalizer, SenMLPack};
use time::OffsetDateTime;

use crate::error::Result;
use crate::models::{Message, Protocol, now_rfc3339};

/// Where a payload came from and where it is going
#[derive(Debug, Clone, Copy)]
pub struct Origin<'a> {
    pub channel: &'a str,
    pub publisher: &'a str,
    pub protocol: Protocol,
}

/// Decode `payload` and resolve it against the current wall clock.
pub fn normalize(payload: &[u8], format: Format, origin: Origin<'_>) -> Result<Vec<Message>> {
    normalize_at(payload, format, origin, OffsetDateTime::now_utc().unix_timestamp())
}

/// Decode `payload` and resolve relative times against `now` (UNIX seconds).
pub fn normalize_at(
    payload: &[u8],
    format: Format,
    origin: Origin<'_>,
    now: i64,
) -> Result<Vec<Message>> {
    let pack = SenMLPack::decode(payload, format)?;
    let timestamp = now_rfc3339();

    let mut normalizer = Normalizer::new(now);
    Ok(pack
        .iter()
        .filter_map(|record| normalizer.resolve(record))
        .map(|record| {
            Message::from_record(
                record,
                origin.channel,
                origin.publisher,
                origin.protocol,
                &timestamp,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const ORIGIN: Origin<'static> = Origin {
        channel: "c1",
        publisher: "",
        protocol: Protocol::Http,
    };

    #[test]
    fn test_legacy_pack_resolves() {
        let msgs = normalize_at(
            br#"{"bn":"room1/","bt":1000,"e":[{"n":"temp","v":21.5,"t":5}]}"#,
            Format::Json,
            ORIGIN,
            1_700_000_000,
        )
        .unwrap();

        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].name, "room1/temp");
        assert_eq!(msgs[0].time, 1005.0);
        assert_eq!(msgs[0].value, Some(21.5));
        assert_eq!(msgs[0].channel, "c1");
        assert_eq!(msgs[0].publisher, "room1/");
    }

    #[test]
    fn test_relative_time() {
        let msgs = normalize_at(
            br#"[{"n":"lux","v":300,"t":-3}]"#,
            Format::Json,
            ORIGIN,
            1_700_000_000,
        )
        .unwrap();
        assert_eq!(msgs[0].time, 1_699_999_997.0);
    }

    #[test]
    fn test_base_records_only() {
        let msgs = normalize_at(br#"[{"bn":"x/"},{"bt":10}]"#, Format::Json, ORIGIN, 0).unwrap();
        assert!(msgs.is_empty());
    }

    #[test]
    fn test_malformed_payload() {
        let err = normalize_at(b"{oops", Format::Json, ORIGIN, 0).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
