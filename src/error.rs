// ABOUTME: Application-wide error types for hoist.
// ABOUTME: Wraps config failures and the library's engine and pull errors for the CLI.

use crate::engine::{ConnectError, TransportError};
use crate::pull::PullError;
use crate::types::ParseImageRefError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid image reference: {0}")]
    ImageRef(#[from] ParseImageRefError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Pull(#[from] PullError),

    #[error("engine request failed: {0}")]
    Engine(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
