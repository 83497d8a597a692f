//! Gateway error taxonomy and its mapping onto HTTP status codes.

use axum::http::StatusCode;
use mainflux_senml::SenMLError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed JSON or SenML payload
    #[error("decode error: {0}")]
    Decode(String),

    /// Typed request body rejected
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid query parameter '{name}': {value}")]
    BadQuery { name: String, value: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("store error: {0}")]
    Store(#[source] BoxError),

    /// A cascade stopped half way; the device/channel graph is one-sided
    /// until the call is replayed.
    #[error("relationship drift during {step}: {source}")]
    ConsistencyDrift {
        step: String,
        #[source]
        source: Box<Error>,
    },

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

impl Error {
    pub fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Error::Store(Box::new(err))
    }

    pub fn transport<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Error::Transport(Box::new(err))
    }

    pub fn device_not_found<S: Into<String>>(id: S) -> Self {
        Error::NotFound {
            kind: "device",
            id: id.into(),
        }
    }

    pub fn channel_not_found<S: Into<String>>(id: S) -> Self {
        Error::NotFound {
            kind: "channel",
            id: id.into(),
        }
    }

    pub fn drift<S: Into<String>>(step: S, source: Error) -> Self {
        Error::ConsistencyDrift {
            step: step.into(),
            source: Box::new(source),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Decode(_) | Error::Validation(_) | Error::BadQuery { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Store(_) | Error::ConsistencyDrift { .. } | Error::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<SenMLError> for Error {
    fn from(err: SenMLError) -> Self {
        Error::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::from(SenMLError::invalid_data("x")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::device_not_found("d1").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::drift("unplug device d1", Error::channel_not_found("c1")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(Error::channel_not_found("c9").to_string(), "channel c9 not found");
    }
}
