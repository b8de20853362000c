// ABOUTME: The transport seam between the pull core and an engine connection.
// ABOUTME: Opens pull streams of decoded frames and answers the few request/response calls.

use super::version::{ApiVersion, EngineVersionInfo};
use crate::pull::PullFrame;
use crate::types::{ImageId, ImageRef, RegistryCredentials};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Frames of one pull, in the order the engine sent them.
///
/// Dropping the stream closes the underlying connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<PullFrame, TransportError>> + Send>>;

/// Connection to a container engine's remote API.
///
/// Implementations own HTTP and byte framing. Turning frames into progress
/// events and deciding when a pull is finished belongs to the pull core.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start pulling `reference`. The request is issued when the stream is first polled.
    fn open_pull(
        &self,
        reference: &ImageRef,
        credentials: Option<&RegistryCredentials>,
    ) -> FrameStream;

    /// Engine version, mode, and image count.
    async fn engine_info(&self) -> Result<EngineInfo, TransportError>;

    /// Check the engine answers at all.
    async fn ping(&self) -> Result<(), TransportError>;

    /// Look up a local image.
    async fn inspect_image(&self, reference: &ImageRef) -> Result<ImageDetails, TransportError>;

    /// Delete a local image.
    async fn remove_image(&self, reference: &ImageRef, force: bool)
    -> Result<(), TransportError>;
}

/// Failures reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure: refused, reset, DNS, timeouts.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The engine answered with a non-success HTTP status.
    #[error("engine returned {status_code}: {message}")]
    Status { status_code: u16, message: String },

    /// A response or frame could not be decoded.
    #[error("malformed engine response: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransportError::Status {
                status_code: 404,
                ..
            }
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

/// Engine metadata from the info and version endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    /// Engine name (e.g., "Docker", "Podman").
    pub name: String,
    /// Engine release version.
    pub server_version: String,
    /// Remote API version.
    pub api_version: ApiVersion,
    /// Whether the engine is an active swarm node.
    pub cluster_mode: bool,
    /// Whether pulls report failures as HTTP statuses.
    pub status_errors: bool,
    /// Number of local images.
    pub images: u64,
    /// Operating system.
    pub os: String,
    /// Architecture.
    pub arch: String,
}

impl From<&EngineInfo> for EngineVersionInfo {
    fn from(info: &EngineInfo) -> Self {
        Self {
            api_version: info.api_version,
            cluster_mode: info.cluster_mode,
            status_errors: info.status_errors,
        }
    }
}

/// A local image as reported by inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetails {
    pub id: ImageId,
    pub repo_tags: Vec<String>,
    /// Size in bytes.
    pub size: u64,
    pub os: String,
    pub architecture: String,
}
