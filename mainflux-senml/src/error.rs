//! Error types for SenML operations

use thiserror::Error;

/// Result type alias for SenML operations
pub type Result<T> = std::result::Result<T, SenMLError>;

/// Errors that can occur while decoding or checking SenML data
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SenMLError {
    /// Payload is not a SenML pack in any accepted layout
    #[error("Invalid SenML data: {message}")]
    InvalidData { message: String },

    /// A field carries a value SenML does not allow
    #[error("Invalid value for field '{field}': {value}")]
    InvalidFieldValue { field: String, value: String },

    /// Validation error
    #[error("Validation failed: {message}")]
    ValidationError { message: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Deserialization error
    #[error("Deserialization error: {message}")]
    DeserializationError { message: String },
}

impl SenMLError {
    /// Create an invalid data error
    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create an invalid field value error
    pub fn invalid_field_value<F: Into<String>, V: Into<String>>(field: F, value: V) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    pub fn deserialization<S: Into<String>>(message: S) -> Self {
        Self::DeserializationError {
            message: message.into(),
        }
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for SenMLError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::deserialization(err.to_string())
        } else {
            Self::serialization(err.to_string())
        }
    }
}

#[cfg(feature = "cbor")]
impl From<ciborium::de::Error<std::io::Error>> for SenMLError {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        Self::deserialization(err.to_string())
    }
}

#[cfg(feature = "cbor")]
impl From<ciborium::ser::Error<std::io::Error>> for SenMLError {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SenMLError::invalid_data("test message");
        assert!(matches!(err, SenMLError::InvalidData { .. }));
        assert_eq!(err.to_string(), "Invalid SenML data: test message");
    }

    #[test]
    fn test_field_value_error() {
        let err = SenMLError::invalid_field_value("bt", "NaN");
        assert_eq!(err.to_string(), "Invalid value for field 'bt': NaN");
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_syntax_maps_to_deserialization() {
        let err: SenMLError = serde_json::from_str::<Vec<u8>>("[1,").unwrap_err().into();
        assert!(matches!(err, SenMLError::DeserializationError { .. }));
    }
}
