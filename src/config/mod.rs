// ABOUTME: Configuration types and parsing for hoist.yml.
// ABOUTME: Engine selection, pull tuning, error thresholds, and registry logins.

mod env_value;

pub use env_value::EnvValue;

use crate::engine::{EngineConfig, ErrorThresholds};
use crate::error::{Error, Result};
use crate::pull::PullOptions;
use crate::types::{ImageRef, RegistryCredentials};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "hoist.yml";
pub const CONFIG_FILENAME_ALT: &str = "hoist.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".hoist/config.yml";

/// Registry host images without an explicit registry are pulled from.
pub const DEFAULT_REGISTRY: &str = "docker.io";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub pull: PullOptions,

    #[serde(default)]
    pub thresholds: ErrorThresholds,

    #[serde(default)]
    pub registries: Vec<RegistryEntry>,
}

/// Login for one registry.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    pub server: String,
    pub username: String,
    pub password: EnvValue,
    #[serde(default)]
    pub email: Option<String>,
}

impl RegistryEntry {
    pub fn to_credentials(&self) -> Result<RegistryCredentials> {
        let credentials =
            RegistryCredentials::new(&self.username, self.password.resolve()?, &self.server);
        Ok(match self.email {
            Some(ref email) => credentials.with_email(email),
            None => credentials,
        })
    }

    fn matches(&self, registry: &str) -> bool {
        normalize_server(&self.server) == normalize_server(registry)
    }
}

/// `https://index.docker.io/v1/` and `docker.io` name the same registry.
fn normalize_server(server: &str) -> &str {
    let host = server
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host);
    match host {
        "index.docker.io" | "registry-1.docker.io" => DEFAULT_REGISTRY,
        other => other,
    }
}

impl ClientConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Path of the first config file present in `dir`.
    pub fn find(dir: &Path) -> Option<PathBuf> {
        [CONFIG_FILENAME, CONFIG_FILENAME_ALT, CONFIG_FILENAME_DIR]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => Self::load(&path),
            None => Err(Error::ConfigNotFound(dir.to_path_buf())),
        }
    }

    /// Like [`discover`](Self::discover), but a missing file yields defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.pull.timeout.is_zero() {
            return Err(Error::InvalidConfig("pull.timeout must be positive".into()));
        }
        if let Some(entry) = self.registries.iter().find(|r| r.server.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "registry entry for user {} has an empty server",
                entry.username
            )));
        }
        Ok(())
    }

    /// Credentials configured for the registry `image` lives in.
    pub fn credentials_for(&self, image: &ImageRef) -> Result<Option<RegistryCredentials>> {
        let registry = image.registry().unwrap_or(DEFAULT_REGISTRY);
        self.registries
            .iter()
            .find(|entry| entry.matches(registry))
            .map(RegistryEntry::to_credentials)
            .transpose()
    }
}
