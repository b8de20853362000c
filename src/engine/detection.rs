// ABOUTME: Engine endpoint detection on the local system.
// ABOUTME: Honors explicit config, then DOCKER_HOST, then Podman and Docker sockets.

use super::types::{EngineAddress, EngineConfig, EngineKind, Endpoint};
use std::path::Path;

/// Error during endpoint detection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DetectionError {
    #[error("no container engine found (checked DOCKER_HOST, Podman and Docker sockets)")]
    NoEngineFound,

    #[error("unsupported engine host: {0}")]
    InvalidHost(String),
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Resolve the engine endpoint to connect to.
///
/// Resolution order:
/// 1. `config.host`, then `config.socket`, then `config.runtime`'s default socket
/// 2. `DOCKER_HOST` (`unix://`, `tcp://` or `http://`)
/// 3. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 4. Rootful Podman socket (`/run/podman/podman.sock`)
/// 5. Docker socket (`/var/run/docker.sock`)
pub fn detect_local(config: Option<&EngineConfig>) -> Result<Endpoint, DetectionError> {
    if let Some(endpoint) = config.map(from_config).transpose()?.flatten() {
        return Ok(endpoint);
    }

    if let Ok(host) = std::env::var("DOCKER_HOST")
        && !host.trim().is_empty()
    {
        let runtime = config.and_then(|c| c.runtime);
        return parse_host(host.trim(), runtime);
    }

    if let Some(uid) = get_uid() {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless_socket).exists() {
            return Ok(unix(EngineKind::Podman, rootless_socket));
        }
    }

    if Path::new(ROOTFUL_PODMAN).exists() {
        return Ok(unix(EngineKind::Podman, ROOTFUL_PODMAN.to_string()));
    }

    if Path::new(DOCKER_SOCKET).exists() {
        return Ok(unix(EngineKind::Docker, DOCKER_SOCKET.to_string()));
    }

    Err(DetectionError::NoEngineFound)
}

fn from_config(config: &EngineConfig) -> Result<Option<Endpoint>, DetectionError> {
    if let Some(ref host) = config.host {
        return parse_host(host, config.runtime).map(Some);
    }
    if let Some(ref socket) = config.socket {
        let kind = config.runtime.unwrap_or_else(|| guess_kind(socket));
        return Ok(Some(unix(kind, socket.clone())));
    }
    Ok(config
        .runtime
        .map(|kind| unix(kind, default_socket_path(kind).to_string())))
}

/// Parse a `DOCKER_HOST`-style address.
pub fn parse_host(host: &str, runtime: Option<EngineKind>) -> Result<Endpoint, DetectionError> {
    if let Some(path) = host.strip_prefix("unix://") {
        if path.is_empty() {
            return Err(DetectionError::InvalidHost(host.to_string()));
        }
        let kind = runtime.unwrap_or_else(|| guess_kind(path));
        return Ok(unix(kind, path.to_string()));
    }
    if host.starts_with("tcp://") || host.starts_with("http://") {
        return Ok(Endpoint {
            kind: runtime.unwrap_or(EngineKind::Docker),
            address: EngineAddress::Http(host.to_string()),
        });
    }
    Err(DetectionError::InvalidHost(host.to_string()))
}

fn unix(kind: EngineKind, path: String) -> Endpoint {
    Endpoint {
        kind,
        address: EngineAddress::Unix(path),
    }
}

fn guess_kind(socket: &str) -> EngineKind {
    if socket.contains("podman") {
        EngineKind::Podman
    } else {
        EngineKind::Docker
    }
}

fn default_socket_path(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::Docker => DOCKER_SOCKET,
        EngineKind::Podman => ROOTFUL_PODMAN,
    }
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}
