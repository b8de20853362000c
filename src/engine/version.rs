// ABOUTME: Engine API versions and the version/mode oracle.
// ABOUTME: ApiVersion ordering plus the VersionOracle trait backing error-policy decisions.

use super::transport::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A remote API version such as `1.43`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    major: u32,
    minor: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid API version: {0:?}")]
pub struct ParseApiVersionError(String);

impl ApiVersion {
    /// First version that answers a pull of a missing repository with 404.
    pub const V1_26: ApiVersion = ApiVersion::new(1, 26);
    /// First version that reports registry auth failures as a server error.
    pub const V1_30: ApiVersion = ApiVersion::new(1, 30);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn is_at_least(&self, other: ApiVersion) -> bool {
        *self >= other
    }
}

impl FromStr for ApiVersion {
    type Err = ParseApiVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseApiVersionError(s.to_string());
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (major, minor) = trimmed.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = ParseApiVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What the error policy needs to know about an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineVersionInfo {
    /// Remote API version the engine speaks.
    pub api_version: ApiVersion,
    /// Whether the engine is an active swarm node.
    pub cluster_mode: bool,
    /// Whether a failed pull is answered with an HTTP error status. The
    /// libpod pull endpoint always answers 200 and reports failures in-stream.
    pub status_errors: bool,
}

/// Reports the engine's protocol version and cluster mode.
///
/// Every call reflects the engine at call time. Callers that need a stable
/// answer across several decisions must keep the result themselves.
#[async_trait]
pub trait VersionOracle: Send + Sync {
    /// Current API version and cluster mode.
    async fn version(&self) -> Result<EngineVersionInfo, TransportError>;

    /// Whether the engine is currently running in swarm mode.
    async fn is_cluster_mode(&self) -> Result<bool, TransportError> {
        Ok(self.version().await?.cluster_mode)
    }
}
