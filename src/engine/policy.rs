// ABOUTME: Version-dependent expectations for how a failed pull is reported.
// ABOUTME: Pure function over (API version, cluster mode) used by callers, never by the dispatcher.

use super::version::{ApiVersion, EngineVersionInfo};
use crate::pull::RemoteErrorKind;
use serde::Deserialize;

/// Why a pull is expected to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullFailureCause {
    /// The repository does not exist.
    ImageNotFound,
    /// The registry requires credentials and none were sent.
    MissingCredentials,
    /// Credentials were sent but the registry rejected them.
    RejectedCredentials,
}

impl PullFailureCause {
    pub const ALL: [PullFailureCause; 3] = [
        PullFailureCause::ImageNotFound,
        PullFailureCause::MissingCredentials,
        PullFailureCause::RejectedCredentials,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PullFailureCause::ImageNotFound => "image not found",
            PullFailureCause::MissingCredentials => "missing credentials",
            PullFailureCause::RejectedCredentials => "rejected credentials",
        }
    }
}

/// API versions at which engines started reporting pull failures strictly.
///
/// Below a threshold, on a swarm node, or when pulls go through libpod, the
/// failure only shows up as an error marker inside the progress stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ErrorThresholds {
    /// From this version a missing repository is answered with 404.
    #[serde(default = "default_not_found")]
    pub not_found: ApiVersion,
    /// From this version a registry auth failure is answered with 500.
    #[serde(default = "default_auth")]
    pub auth: ApiVersion,
}

fn default_not_found() -> ApiVersion {
    ApiVersion::V1_26
}

fn default_auth() -> ApiVersion {
    ApiVersion::V1_30
}

impl Default for ErrorThresholds {
    fn default() -> Self {
        Self {
            not_found: default_not_found(),
            auth: default_auth(),
        }
    }
}

impl ErrorThresholds {
    /// The classification a failed pull should carry on this engine.
    pub fn expected_kind(
        &self,
        engine: &EngineVersionInfo,
        cause: PullFailureCause,
    ) -> RemoteErrorKind {
        if engine.cluster_mode || !engine.status_errors {
            return RemoteErrorKind::Client;
        }
        match cause {
            PullFailureCause::ImageNotFound if engine.api_version >= self.not_found => {
                RemoteErrorKind::NotFound
            }
            PullFailureCause::MissingCredentials | PullFailureCause::RejectedCredentials
                if engine.api_version >= self.auth =>
            {
                RemoteErrorKind::Internal
            }
            _ => RemoteErrorKind::Client,
        }
    }

    /// Expected classification for every cause, in [`PullFailureCause::ALL`] order.
    pub fn expectations(
        &self,
        engine: &EngineVersionInfo,
    ) -> [(PullFailureCause, RemoteErrorKind); 3] {
        PullFailureCause::ALL.map(|cause| (cause, self.expected_kind(engine, cause)))
    }
}

/// [`ErrorThresholds::expected_kind`] with the default thresholds.
pub fn expected_pull_failure(
    engine: &EngineVersionInfo,
    cause: PullFailureCause,
) -> RemoteErrorKind {
    ErrorThresholds::default().expected_kind(engine, cause)
}
