// ABOUTME: Error taxonomy for a pull: transport, remote (classified), timeout, cancel.
// ABOUTME: Classifies engine HTTP statuses and in-stream error markers into RemoteErrorKind.

use crate::engine::TransportError;
use crate::types::ImageRef;
use std::fmt;
use std::time::Duration;

/// How the engine reported a failed pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// The engine answered 404: the repository or tag does not exist.
    NotFound,
    /// The engine answered 500, e.g. the registry rejected the credentials.
    Internal,
    /// Any other rejection, including an error marker inside the progress stream.
    Client,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteErrorKind::NotFound => write!(f, "not found"),
            RemoteErrorKind::Internal => write!(f, "internal server error"),
            RemoteErrorKind::Client => write!(f, "client error"),
        }
    }
}

impl RemoteErrorKind {
    /// Classification for an HTTP status the engine answered a pull with.
    pub fn from_status(status_code: u16) -> Self {
        match status_code {
            404 => RemoteErrorKind::NotFound,
            500 => RemoteErrorKind::Internal,
            _ => RemoteErrorKind::Client,
        }
    }
}

/// Why a pull did not complete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PullError {
    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("pull of {reference} failed ({kind}): {message}")]
    Remote {
        reference: ImageRef,
        kind: RemoteErrorKind,
        message: String,
    },

    #[error("pull of {reference} did not finish within {after:?}")]
    Timeout { reference: ImageRef, after: Duration },

    #[error("pull of {reference} was cancelled")]
    Cancelled { reference: ImageRef },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullErrorKind {
    Transport,
    Remote(RemoteErrorKind),
    Timeout,
    Cancelled,
}

impl PullError {
    /// Classify a transport failure seen while pulling `reference`.
    ///
    /// HTTP statuses are the engine rejecting the pull, so they become
    /// `Remote`. Everything else stays a transport error.
    pub fn from_transport(reference: &ImageRef, err: TransportError) -> Self {
        match err {
            TransportError::Status {
                status_code,
                message,
            } => PullError::Remote {
                reference: reference.clone(),
                kind: RemoteErrorKind::from_status(status_code),
                message,
            },
            other => PullError::Transport(other),
        }
    }

    pub fn remote(reference: &ImageRef, kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        PullError::Remote {
            reference: reference.clone(),
            kind,
            message: message.into(),
        }
    }

    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> PullErrorKind {
        match self {
            PullError::Transport(_) => PullErrorKind::Transport,
            PullError::Remote { kind, .. } => PullErrorKind::Remote(*kind),
            PullError::Timeout { .. } => PullErrorKind::Timeout,
            PullError::Cancelled { .. } => PullErrorKind::Cancelled,
        }
    }

    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            PullError::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.remote_kind() == Some(RemoteErrorKind::NotFound)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PullError::Timeout { .. })
    }
}

impl From<TransportError> for PullError {
    fn from(err: TransportError) -> Self {
        PullError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ImageRef {
        ImageRef::parse("xvxcv/foo").unwrap()
    }

    fn status(code: u16) -> TransportError {
        TransportError::Status {
            status_code: code,
            message: "pull access denied".to_string(),
        }
    }

    #[test]
    fn statuses_map_to_remote_kinds() {
        assert!(PullError::from_transport(&image(), status(404)).is_not_found());
        assert_eq!(
            PullError::from_transport(&image(), status(500)).remote_kind(),
            Some(RemoteErrorKind::Internal)
        );
        assert_eq!(
            PullError::from_transport(&image(), status(401)).remote_kind(),
            Some(RemoteErrorKind::Client)
        );
    }

    #[test]
    fn connection_failures_stay_transport_errors() {
        let err = PullError::from_transport(
            &image(),
            TransportError::Connection("connection reset".to_string()),
        );
        assert_eq!(err.kind(), PullErrorKind::Transport);
        assert!(err.remote_kind().is_none());
    }

    #[test]
    fn display_names_image_and_kind() {
        let err = PullError::from_transport(&image(), status(404));
        assert_eq!(
            err.to_string(),
            "pull of xvxcv/foo:latest failed (not found): pull access denied"
        );
    }
}
