// ABOUTME: Connection error types with the SNAFU pattern.
// ABOUTME: Unifies endpoint detection and client setup failures for programmatic handling.

use snafu::Snafu;

use super::detection::DetectionError;
use super::transport::TransportError;

/// Failure to obtain a working engine client.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("engine detection failed: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("engine connection failed: {source}"))]
    Connection { source: TransportError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    /// No engine endpoint could be found.
    NoEngineFound,
    /// The configured or `DOCKER_HOST` address is not usable.
    InvalidHost,
    /// The client could not reach the endpoint.
    ConnectionFailed,
    /// The engine answered with an error.
    EngineError,
}

impl ConnectError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ConnectErrorKind {
        match self {
            ConnectError::Detection { source } => match source {
                DetectionError::NoEngineFound => ConnectErrorKind::NoEngineFound,
                DetectionError::InvalidHost(_) => ConnectErrorKind::InvalidHost,
            },
            ConnectError::Connection { source } => match source {
                TransportError::Connection(_) => ConnectErrorKind::ConnectionFailed,
                TransportError::Status { .. } | TransportError::Decode(_) => {
                    ConnectErrorKind::EngineError
                }
            },
        }
    }

    /// Returns connection error details if this is a connection failure.
    pub fn connection_details(&self) -> Option<&str> {
        match self {
            ConnectError::Connection {
                source: TransportError::Connection(msg),
            } => Some(msg),
            _ => None,
        }
    }
}

impl From<DetectionError> for ConnectError {
    fn from(source: DetectionError) -> Self {
        ConnectError::Detection { source }
    }
}

impl From<TransportError> for ConnectError {
    fn from(source: TransportError) -> Self {
        ConnectError::Connection { source }
    }
}
