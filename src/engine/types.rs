// ABOUTME: Engine endpoint definitions for Docker and Podman.
// ABOUTME: Includes EngineKind, the resolved Endpoint, and the EngineConfig override block.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The container engine behind an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Docker,
    Podman,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Docker => write!(f, "docker"),
            EngineKind::Podman => write!(f, "podman"),
        }
    }
}

/// Where the engine API is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAddress {
    /// Path to a Unix socket.
    Unix(String),
    /// `tcp://` or `http://` address.
    Http(String),
}

impl fmt::Display for EngineAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineAddress::Unix(path) => write!(f, "unix://{}", path),
            EngineAddress::Http(addr) => f.write_str(addr),
        }
    }
}

/// A resolved engine endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// The engine type detected or configured.
    pub kind: EngineKind,
    /// How to reach it.
    pub address: EngineAddress,
}

impl Endpoint {
    /// Socket path, when the endpoint is a Unix socket.
    pub fn socket_path(&self) -> Option<&str> {
        match &self.address {
            EngineAddress::Unix(path) => Some(path),
            EngineAddress::Http(_) => None,
        }
    }
}

/// Explicit engine settings (overrides auto-detection).
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Explicit engine type.
    #[serde(default)]
    pub runtime: Option<EngineKind>,
    /// Explicit socket path.
    #[serde(default)]
    pub socket: Option<String>,
    /// Explicit `tcp://` or `http://` address; wins over `socket`.
    #[serde(default)]
    pub host: Option<String>,
    /// Per-request timeout for the HTTP client.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runtime: None,
            socket: None,
            host: None,
            timeout: default_request_timeout(),
        }
    }
}
