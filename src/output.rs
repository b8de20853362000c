// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes, including pull progress.

use crate::engine::{EngineInfo, PullFailureCause};
use crate::pull::RemoteErrorKind;
use crate::pull::ProgressEvent;
use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print one pull progress event.
    pub fn pull_event(&self, event: &ProgressEvent) {
        match self.mode {
            OutputMode::Normal => println!("{event}"),
            OutputMode::Quiet => {}
            OutputMode::Json => print_json(&ProgressRecord {
                event: "progress",
                status: &event.status,
                layer: event.layer.as_ref().map(|l| l.as_str()),
                current: event.detail.and_then(|d| d.current),
                total: event.detail.and_then(|d| d.total),
            }),
        }
    }

    /// Print engine details and how it is expected to report failed pulls.
    pub fn engine_info(
        &self,
        info: &EngineInfo,
        failures: &[(PullFailureCause, RemoteErrorKind)],
    ) {
        match self.mode {
            OutputMode::Normal => {
                println!("Engine:       {} {}", info.name, info.server_version);
                println!("API version:  {}", info.api_version);
                println!("Swarm:        {}", if info.cluster_mode { "active" } else { "inactive" });
                println!("Images:       {}", info.images);
                println!("Platform:     {}/{}", info.os, info.arch);
                println!("Pull failures:");
                for (cause, kind) in failures {
                    println!("  {:<22}{}", cause.label(), kind);
                }
            }
            OutputMode::Quiet => println!("{}", info.api_version),
            OutputMode::Json => print_json(&InfoRecord {
                event: "info",
                name: &info.name,
                server_version: &info.server_version,
                api_version: info.api_version.to_string(),
                cluster_mode: info.cluster_mode,
                images: info.images,
                os: &info.os,
                arch: &info.arch,
                failures: failures
                    .iter()
                    .map(|(cause, kind)| FailureRecord {
                        cause: cause.label(),
                        kind: kind.to_string(),
                    })
                    .collect(),
            }),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => print_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn print_json<T: Serialize>(record: &T) {
    if let Ok(json) = serde_json::to_string(record) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct ProgressRecord<'a> {
    event: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    layer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u64>,
}

#[derive(Serialize)]
struct InfoRecord<'a> {
    event: &'a str,
    name: &'a str,
    server_version: &'a str,
    api_version: String,
    cluster_mode: bool,
    images: u64,
    os: &'a str,
    arch: &'a str,
    failures: Vec<FailureRecord>,
}

#[derive(Serialize)]
struct FailureRecord {
    cause: &'static str,
    kind: String,
}
