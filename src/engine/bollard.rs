// ABOUTME: Bollard-backed transport for Docker and Podman engines.
// ABOUTME: Podman pulls over a Unix socket go through the libpod API instead.

use super::libpod;
use super::transport::{EngineInfo, FrameStream, ImageDetails, Transport, TransportError};
use super::types::{EngineAddress, EngineConfig, EngineKind, Endpoint};
use super::version::ApiVersion;
use crate::pull::PullFrame;
use crate::types::{ImageId, ImageRef, RegistryCredentials};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{CreateImageInfo, LocalNodeState};
use bollard::query_parameters::{CreateImageOptions, RemoveImageOptions};
use futures::StreamExt;

fn map_error(e: bollard::errors::Error) -> TransportError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => TransportError::Status {
            status_code,
            message,
        },
        other => TransportError::Connection(other.to_string()),
    }
}

/// Pull stream items from bollard. Errors the engine embeds mid-stream stay frames.
fn map_pull_item(item: Result<CreateImageInfo, bollard::errors::Error>) -> Result<PullFrame, TransportError> {
    match item {
        Ok(info) => frame_from_info(&info),
        Err(bollard::errors::Error::DockerStreamError { error }) => Ok(PullFrame::error(error)),
        Err(e) => Err(map_error(e)),
    }
}

/// Re-read bollard's model through its wire form so both transports share one frame type.
fn frame_from_info(info: &CreateImageInfo) -> Result<PullFrame, TransportError> {
    serde_json::to_value(info)
        .and_then(serde_json::from_value)
        .map_err(|e| TransportError::Decode(format!("unexpected pull progress shape: {}", e)))
}

/// Transport over the Docker-compatible API via bollard.
pub struct BollardTransport {
    client: Docker,
    kind: EngineKind,
    socket_path: Option<String>,
}

impl BollardTransport {
    pub fn new(client: Docker, kind: EngineKind) -> Self {
        Self {
            client,
            kind,
            socket_path: None,
        }
    }

    /// Connect to a resolved endpoint.
    ///
    /// Bollard connects lazily, so this only fails on a malformed address.
    pub fn connect(endpoint: &Endpoint, config: &EngineConfig) -> Result<Self, TransportError> {
        let timeout = config.timeout.as_secs();
        let client = match &endpoint.address {
            EngineAddress::Unix(path) => {
                Docker::connect_with_unix(path, timeout, bollard::API_DEFAULT_VERSION)
            }
            EngineAddress::Http(url) => {
                Docker::connect_with_http(url, timeout, bollard::API_DEFAULT_VERSION)
            }
        }
        .map_err(|e| TransportError::Connection(e.to_string()))?;

        tracing::debug!(engine = %endpoint.kind, address = %endpoint.address, "engine client ready");
        Ok(Self {
            client,
            kind: endpoint.kind,
            socket_path: endpoint.socket_path().map(str::to_string),
        })
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Socket for libpod pulls; only Podman reached over a Unix socket has one.
    fn libpod_socket(&self) -> Option<&str> {
        match self.kind {
            EngineKind::Podman => self.socket_path.as_deref(),
            EngineKind::Docker => None,
        }
    }
}

#[async_trait]
impl Transport for BollardTransport {
    fn open_pull(
        &self,
        reference: &ImageRef,
        credentials: Option<&RegistryCredentials>,
    ) -> FrameStream {
        let image = reference.to_string();

        // libpod honours tlsVerify=false, so plain-HTTP registries work on Podman
        if let Some(socket) = self.libpod_socket() {
            let auth = credentials.map(RegistryCredentials::to_registry_auth_header);
            return libpod::pull(socket.to_string(), image, auth);
        }

        let options = CreateImageOptions {
            from_image: Some(image),
            ..Default::default()
        };
        let credentials = credentials.map(RegistryCredentials::to_docker_credentials);
        let frames = self
            .client
            .create_image(Some(options), None, credentials)
            .map(map_pull_item);
        Box::pin(frames)
    }

    async fn engine_info(&self) -> Result<EngineInfo, TransportError> {
        let version = self.client.version().await.map_err(map_error)?;
        let info = self.client.info().await.map_err(map_error)?;

        let api_version: ApiVersion = version
            .api_version
            .as_deref()
            .ok_or_else(|| TransportError::Decode("engine did not report an API version".into()))?
            .parse()
            .map_err(|e| TransportError::Decode(format!("{}", e)))?;

        let cluster_mode = info
            .swarm
            .as_ref()
            .and_then(|swarm| swarm.local_node_state.as_ref())
            .is_some_and(|state| matches!(state, LocalNodeState::ACTIVE));

        Ok(EngineInfo {
            name: match self.kind {
                EngineKind::Docker => "Docker".to_string(),
                EngineKind::Podman => "Podman".to_string(),
            },
            server_version: info.server_version.or(version.version).unwrap_or_default(),
            api_version,
            cluster_mode,
            status_errors: self.libpod_socket().is_none(),
            images: info.images.unwrap_or(0).max(0) as u64,
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.client.ping().await.map_err(map_error)?;
        Ok(())
    }

    async fn inspect_image(&self, reference: &ImageRef) -> Result<ImageDetails, TransportError> {
        let image = self
            .client
            .inspect_image(&reference.to_string())
            .await
            .map_err(map_error)?;

        Ok(ImageDetails {
            id: ImageId::new(image.id.unwrap_or_default()),
            repo_tags: image.repo_tags.unwrap_or_default(),
            size: image.size.unwrap_or(0).max(0) as u64,
            os: image.os.unwrap_or_default(),
            architecture: image.architecture.unwrap_or_default(),
        })
    }

    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), TransportError> {
        let options = RemoveImageOptions {
            force,
            ..Default::default()
        };
        self.client
            .remove_image(&reference.to_string(), Some(options), None)
            .await
            .map_err(map_error)?;
        Ok(())
    }
}
