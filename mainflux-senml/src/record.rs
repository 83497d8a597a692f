//! SenML Record types and values

use serde::{Deserialize, Serialize};

/// A SenML Record represents a single sensor measurement, a base-value
/// declaration, or both.
///
/// Base fields (`bn`, `bt`, `bu`, `bver`) apply to the record carrying them
/// and to every following record of the same pack until overridden.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SenMLRecord {
    /// Base Name - prefix for this and following record names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bn: Option<String>,

    /// Base Time - added to this and following record times
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bt: Option<f64>,

    /// Base Unit - used when a record carries no unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bu: Option<String>,

    /// Base Version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bver: Option<i32>,

    /// Name - identifies the sensor or parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// Unit - SI unit or custom unit string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub u: Option<String>,

    /// Value - numeric measurement value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,

    /// String Value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs: Option<String>,

    /// Boolean Value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vb: Option<bool>,

    /// Data Value - base64 text, carried opaque
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vd: Option<String>,

    /// Sum - integrated sum of values over time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<f64>,

    /// Time - relative to base time, or absolute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,

    /// Update Time - maximum time before next update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ut: Option<f64>,

    /// Link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l: Option<String>,
}

/// Union type for SenML values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SenMLValue {
    Number(f64),
    String(String),
    Boolean(bool),
    /// Binary data as carried on the wire (base64 text)
    Data(String),
}

impl SenMLRecord {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record with a numeric value
    pub fn with_value<S: Into<String>>(name: S, value: f64) -> Self {
        Self {
            n: Some(name.into()),
            v: Some(value),
            ..Default::default()
        }
    }

    /// Create a record with a string value
    pub fn with_string_value<S: Into<String>, V: Into<String>>(name: S, value: V) -> Self {
        Self {
            n: Some(name.into()),
            vs: Some(value.into()),
            ..Default::default()
        }
    }

    /// Create a record with a boolean value
    pub fn with_bool_value<S: Into<String>>(name: S, value: bool) -> Self {
        Self {
            n: Some(name.into()),
            vb: Some(value),
            ..Default::default()
        }
    }

    /// Create a record with already encoded binary data
    pub fn with_data_value<S: Into<String>, D: Into<String>>(name: S, data: D) -> Self {
        Self {
            n: Some(name.into()),
            vd: Some(data.into()),
            ..Default::default()
        }
    }

    /// Create a record that only declares base values
    pub fn base() -> Self {
        Self::default()
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.n = Some(name.into());
        self
    }

    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.u = Some(unit.into());
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.t = Some(time);
        self
    }

    pub fn with_sum(mut self, sum: f64) -> Self {
        self.s = Some(sum);
        self
    }

    pub fn with_base_name<S: Into<String>>(mut self, name: S) -> Self {
        self.bn = Some(name.into());
        self
    }

    pub fn with_base_time(mut self, time: f64) -> Self {
        self.bt = Some(time);
        self
    }

    pub fn with_base_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.bu = Some(unit.into());
        self
    }

    /// Get the primary value from this record
    pub fn value(&self) -> Option<SenMLValue> {
        if let Some(v) = self.v {
            Some(SenMLValue::Number(v))
        } else if let Some(ref vs) = self.vs {
            Some(SenMLValue::String(vs.clone()))
        } else if let Some(vb) = self.vb {
            Some(SenMLValue::Boolean(vb))
        } else {
            self.vd.clone().map(SenMLValue::Data)
        }
    }

    /// Whether normalization emits this record.
    ///
    /// Only `v`, a non-empty `vs` and `vb` count; a record with nothing but
    /// `vd`, `s` or an empty `vs` is treated as a base declaration.
    pub fn has_value(&self) -> bool {
        self.v.is_some() || self.vs.as_deref().is_some_and(|vs| !vs.is_empty()) || self.vb.is_some()
    }

    /// Whether this record declares any base field
    pub fn has_base_values(&self) -> bool {
        self.bn.is_some() || self.bt.is_some() || self.bu.is_some() || self.bver.is_some()
    }

    /// Check numeric fields are finite and times are sane
    pub fn validate(&self) -> crate::Result<()> {
        let finite = [
            ("bt", self.bt),
            ("v", self.v),
            ("s", self.s),
            ("t", self.t),
        ];
        for (field, value) in finite {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(crate::SenMLError::invalid_field_value(
                        field,
                        value.to_string(),
                    ));
                }
            }
        }

        if let Some(ut) = self.ut {
            if !ut.is_finite() || ut < 0.0 {
                return Err(crate::SenMLError::invalid_field_value("ut", ut.to_string()));
            }
        }

        Ok(())
    }
}

impl From<SenMLValue> for SenMLRecord {
    fn from(value: SenMLValue) -> Self {
        match value {
            SenMLValue::Number(n) => Self {
                v: Some(n),
                ..Default::default()
            },
            SenMLValue::String(s) => Self {
                vs: Some(s),
                ..Default::default()
            },
            SenMLValue::Boolean(b) => Self {
                vb: Some(b),
                ..Default::default()
            },
            SenMLValue::Data(d) => Self {
                vd: Some(d),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = SenMLRecord::with_value("temperature", 22.5);
        assert_eq!(record.n, Some("temperature".to_string()));
        assert_eq!(record.v, Some(22.5));
        assert!(record.has_value());
    }

    #[test]
    fn test_record_with_unit() {
        let record = SenMLRecord::with_value("temperature", 22.5).with_unit("Cel");
        assert_eq!(record.u, Some("Cel".to_string()));
    }

    #[test]
    fn test_data_and_sum_are_not_values() {
        assert!(!SenMLRecord::with_data_value("blob", "aGVsbG8=").has_value());
        assert!(!SenMLRecord::new().with_name("energy").with_sum(3.0).has_value());
    }

    #[test]
    fn test_empty_string_value_is_not_a_value() {
        assert!(!SenMLRecord::with_string_value("state", "").has_value());
        assert!(SenMLRecord::with_string_value("state", "open").has_value());
    }

    #[test]
    fn test_base_only_record() {
        let record = SenMLRecord::base()
            .with_base_name("urn:dev:1/")
            .with_base_time(1000.0);
        assert!(record.has_base_values());
        assert!(!record.has_value());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_record_validation() {
        assert!(SenMLRecord::with_value("temp", 25.0).validate().is_ok());
        assert!(SenMLRecord::with_value("temp", f64::NAN).validate().is_err());

        let mut record = SenMLRecord::with_value("temp", 1.0);
        record.ut = Some(-1.0);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_value_precedence() {
        let mut record = SenMLRecord::with_value("x", 1.0);
        record.vb = Some(true);
        assert_eq!(record.value(), Some(SenMLValue::Number(1.0)));
    }
}
