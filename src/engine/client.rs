// ABOUTME: Engine handle that dispatches pull commands onto a transport.
// ABOUTME: Starting a pull never blocks; completion is observed through the returned handle.

use super::bollard::BollardTransport;
use super::detection::detect_local;
use super::error::ConnectError;
use super::transport::{EngineInfo, ImageDetails, Transport, TransportError};
use super::types::EngineConfig;
use super::version::{EngineVersionInfo, VersionOracle};
use crate::pull::{PullCommand, PullError, PullHandle, PullOptions};
use crate::types::ImageRef;
use async_trait::async_trait;
use std::sync::Arc;

/// A connected container engine.
#[derive(Clone)]
pub struct Engine {
    transport: Arc<dyn Transport>,
    options: PullOptions,
}

impl Engine {
    /// Wrap an existing transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            options: PullOptions::default(),
        }
    }

    pub fn with_pull_options(self, options: PullOptions) -> Self {
        Self { options, ..self }
    }

    /// Resolve an endpoint from `config` and the environment, then connect.
    pub fn connect(config: &EngineConfig) -> Result<Self, ConnectError> {
        let endpoint = detect_local(Some(config))?;
        tracing::info!(engine = %endpoint.kind, address = %endpoint.address, "using container engine");
        let transport = BollardTransport::connect(&endpoint, config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Connect to whatever engine the local environment points at.
    pub fn connect_local() -> Result<Self, ConnectError> {
        Self::connect(&EngineConfig::default())
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn pull_options(&self) -> &PullOptions {
        &self.options
    }

    /// Start `command` and return at once with a handle to its completion.
    ///
    /// Must be called inside a tokio runtime.
    pub fn pull(&self, command: PullCommand) -> PullHandle {
        let stream = command.start(self.transport.as_ref());
        PullHandle::attach(stream, &self.options)
    }

    /// Pull and wait up to the configured timeout.
    pub async fn pull_and_wait(&self, command: PullCommand) -> Result<PullHandle, PullError> {
        let handle = self.pull(command);
        handle.await_completion(self.options.timeout).await?;
        Ok(handle)
    }

    pub async fn info(&self) -> Result<EngineInfo, TransportError> {
        self.transport.engine_info().await
    }

    pub async fn ping(&self) -> Result<(), TransportError> {
        self.transport.ping().await
    }

    pub async fn inspect_image(&self, reference: &ImageRef) -> Result<ImageDetails, TransportError> {
        self.transport.inspect_image(reference).await
    }

    pub async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), TransportError> {
        self.transport.remove_image(reference, force).await
    }

    /// Remove an image, treating "not present" as success.
    ///
    /// Returns whether an image was actually removed.
    pub async fn remove_image_if_exists(
        &self,
        reference: &ImageRef,
        force: bool,
    ) -> Result<bool, TransportError> {
        match self.transport.remove_image(reference, force).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                tracing::debug!(image = %reference, "image not present, nothing to remove");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VersionOracle for Engine {
    async fn version(&self) -> Result<EngineVersionInfo, TransportError> {
        let info = self.transport.engine_info().await?;
        Ok(EngineVersionInfo::from(&info))
    }
}
