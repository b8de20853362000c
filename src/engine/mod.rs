// ABOUTME: Container engine access: endpoint detection, transports, and the pull dispatcher.
// ABOUTME: Also holds the version-dependent error expectations for failed pulls.

mod bollard;
mod client;
mod detection;
pub mod error;
mod libpod;
pub mod policy;
mod transport;
mod types;
mod version;

pub use self::bollard::BollardTransport;
pub use client::Engine;
pub use detection::{DetectionError, detect_local, parse_host};
pub use error::{ConnectError, ConnectErrorKind};
pub use policy::{ErrorThresholds, PullFailureCause, expected_pull_failure};
pub use transport::{EngineInfo, FrameStream, ImageDetails, Transport, TransportError};
pub use types::{Endpoint, EngineAddress, EngineConfig, EngineKind};
pub use version::{ApiVersion, EngineVersionInfo, ParseApiVersionError, VersionOracle};
