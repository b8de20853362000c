// ABOUTME: Progress events decoded from pull frames.
// ABOUTME: Splits each frame into a progress update or an embedded error marker.

use super::frame::PullFrame;
use crate::types::LayerId;
use std::fmt;

/// Byte counters for a layer download or extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressDetail {
    pub current: Option<u64>,
    pub total: Option<u64>,
}

/// One status update from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Status text, e.g. "Pulling fs layer" or "Digest: sha256:...".
    pub status: String,
    /// Layer the status refers to, if any.
    pub layer: Option<LayerId>,
    /// Engine-rendered progress bar.
    pub progress: Option<String>,
    pub detail: Option<ProgressDetail>,
}

const DIGEST_PREFIX: &str = "Digest: ";
const UP_TO_DATE_PREFIX: &str = "Status: Image is up to date";
const DOWNLOADED_PREFIX: &str = "Status: Downloaded newer image";

impl ProgressEvent {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            layer: None,
            progress: None,
            detail: None,
        }
    }

    pub fn with_layer(self, layer: impl Into<String>) -> Self {
        Self {
            layer: Some(LayerId::new(layer.into())),
            ..self
        }
    }

    /// Manifest digest announced near the end of a pull.
    pub fn digest(&self) -> Option<&str> {
        self.status.strip_prefix(DIGEST_PREFIX).map(str::trim)
    }

    /// The engine already had the newest image.
    pub fn is_up_to_date(&self) -> bool {
        self.status.starts_with(UP_TO_DATE_PREFIX)
    }

    /// The final status line of a pull that fetched something new.
    pub fn is_download_finished(&self) -> bool {
        self.status.starts_with(DOWNLOADED_PREFIX)
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref layer) = self.layer {
            write!(f, "{}: ", layer.short())?;
        }
        f.write_str(&self.status)?;
        if let Some(ref progress) = self.progress {
            write!(f, " {}", progress)?;
        }
        Ok(())
    }
}

/// An error the engine embedded in the progress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMarker {
    pub code: Option<i64>,
    pub message: String,
}

/// One decoded unit of a pull stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullEvent {
    Progress(ProgressEvent),
    Error(ErrorMarker),
}

impl From<PullFrame> for PullEvent {
    fn from(frame: PullFrame) -> Self {
        let PullFrame {
            status,
            id,
            progress,
            progress_detail,
            error,
            error_detail,
        } = frame;

        if error.is_some() || error_detail.is_some() {
            let (code, detail_message) = error_detail
                .map(|d| (d.code, d.message))
                .unwrap_or((None, None));
            let message = detail_message
                .or(error)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "engine reported an unspecified error".to_string());
            return PullEvent::Error(ErrorMarker { code, message });
        }

        PullEvent::Progress(ProgressEvent {
            status: status.unwrap_or_default(),
            layer: id.filter(|id| !id.is_empty()).map(LayerId::new),
            progress: progress.filter(|p| !p.is_empty()),
            detail: progress_detail
                .filter(|d| d.current.is_some() || d.total.is_some())
                .map(|d| ProgressDetail {
                    current: d.current,
                    total: d.total,
                }),
        })
    }
}
