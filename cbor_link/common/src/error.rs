use std::net::SocketAddr;

use api::SinkError;

/// Failures that leave a source without a usable listener.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid connection string '{input}': expected ip:port")]
    InvalidEndpoint { input: String },
    #[error("failed to bind UDP socket to {endpoint}: {source}")]
    Bind {
        endpoint: SocketAddr,
        source: std::io::Error,
    },
    #[error("failed to spawn receive thread: {0}")]
    Spawn(std::io::Error),
}

/// A datagram that could not be turned into a frame.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed CBOR payload: {0}")]
    Cbor(String),
    #[error("payload is not a CBOR map")]
    NotAMap,
    #[error("missing field '{field}'")]
    MissingField { field: &'static str },
    #[error("field '{field}' has the wrong shape, expected {expected}")]
    WrongShape {
        field: &'static str,
        expected: &'static str,
    },
}

impl DecodeError {
    /// The top-level field the error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field } | Self::WrongShape { field, .. } => Some(*field),
            Self::Cbor(_) | Self::NotAMap => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("frame for subject '{subject}' is missing declared property '{property}'")]
    MissingProperty { subject: String, property: String },
    #[error(transparent)]
    Sink(#[from] SinkError),
}
