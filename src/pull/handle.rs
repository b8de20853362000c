// ABOUTME: Completion tracking for a running pull.
// ABOUTME: A background consumer drains the stream; callers await a terminal state with a bound.

use super::command::PullStream;
use super::error::{PullError, RemoteErrorKind};
use super::event::{PullEvent, ProgressEvent};
use crate::engine::TransportError;
use crate::types::ImageRef;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outcome of a stream that ended before any progress event arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyStreamPolicy {
    /// Treat it as a successful pull.
    #[default]
    Complete,
    /// Treat it as a client error.
    Fail,
}

fn default_pull_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Tuning for pulls started by an [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullOptions {
    /// Bound used by `pull_and_wait`.
    #[serde(default = "default_pull_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default)]
    pub empty_stream: EmptyStreamPolicy,
}

impl Default for PullOptions {
    fn default() -> Self {
        Self {
            timeout: default_pull_timeout(),
            empty_stream: EmptyStreamPolicy::default(),
        }
    }
}

/// Where a pull is in its lifecycle. Leaves `Running` at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullState {
    Running,
    Completed,
    Failed(PullError),
}

impl PullState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PullState::Running)
    }
}

/// What the consumer observed so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSummary {
    pub events: usize,
    pub last_event: Option<ProgressEvent>,
    pub digest: Option<String>,
    pub up_to_date: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PullSummary {
    fn started_now() -> Self {
        Self {
            events: 0,
            last_event: None,
            digest: None,
            up_to_date: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn record(&mut self, event: ProgressEvent) {
        self.events += 1;
        if let Some(digest) = event.digest() {
            self.digest = Some(digest.to_string());
        }
        if event.is_up_to_date() {
            self.up_to_date = true;
        }
        self.last_event = Some(event);
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_event.as_ref().map(|e| e.status.as_str())
    }
}

/// Move out of `Running`. Returns false if another path settled first.
fn settle(state: &watch::Sender<PullState>, outcome: PullState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        *current = outcome;
        true
    })
}

/// Clears the active flag when the consumer task ends, however it ends.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Consumer {
    stream: PullStream,
    state: Arc<watch::Sender<PullState>>,
    summary: Arc<Mutex<PullSummary>>,
    cancel: CancellationToken,
    empty_stream: EmptyStreamPolicy,
    _active: ActiveGuard,
}

impl Consumer {
    async fn run(mut self) {
        let reference = self.stream.reference().clone();

        let outcome = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break None,
                next = self.stream.next() => next,
            };
            match next {
                Some(Ok(PullEvent::Progress(event))) => {
                    tracing::debug!(image = %reference, "{}", event);
                    self.summary.lock().record(event);
                }
                Some(Ok(PullEvent::Error(marker))) => {
                    break Some(PullState::Failed(PullError::remote(
                        &reference,
                        RemoteErrorKind::Client,
                        marker.message,
                    )));
                }
                Some(Err(err)) => {
                    break Some(PullState::Failed(PullError::from_transport(&reference, err)));
                }
                None => break Some(self.end_of_stream(&reference)),
            }
        };

        self.stream.close();
        self.summary.lock().finished_at = Some(Utc::now());

        match outcome {
            Some(outcome) => {
                match &outcome {
                    PullState::Failed(err) => tracing::warn!(image = %reference, "pull failed: {}", err),
                    _ => tracing::info!(image = %reference, "pull completed"),
                }
                settle(&self.state, outcome);
            }
            None => tracing::debug!(image = %reference, "pull consumer stopped"),
        }
    }

    fn end_of_stream(&self, reference: &ImageRef) -> PullState {
        if self.summary.lock().events > 0 {
            return PullState::Completed;
        }
        match self.empty_stream {
            EmptyStreamPolicy::Complete => {
                tracing::warn!(image = %reference, "pull stream ended without progress events, treating as complete");
                PullState::Completed
            }
            EmptyStreamPolicy::Fail => {
                tracing::warn!(image = %reference, "pull stream ended without progress events");
                PullState::Failed(PullError::remote(
                    reference,
                    RemoteErrorKind::Client,
                    "stream ended without any progress events",
                ))
            }
        }
    }
}

/// A running pull whose completion can be awaited.
///
/// Dropping the handle stops the consumer and closes the stream.
#[derive(Debug)]
pub struct PullHandle {
    reference: ImageRef,
    state: Arc<watch::Sender<PullState>>,
    summary: Arc<Mutex<PullSummary>>,
    cancel: CancellationToken,
    consumer: Mutex<Option<JoinHandle<()>>>,
    active: Arc<AtomicBool>,
}

impl PullHandle {
    /// Spawn a consumer for `stream`. Must be called inside a tokio runtime.
    pub fn attach(stream: PullStream, options: &PullOptions) -> Self {
        let reference = stream.reference().clone();
        let (state, _) = watch::channel(PullState::Running);
        let state = Arc::new(state);
        let summary = Arc::new(Mutex::new(PullSummary::started_now()));
        let cancel = CancellationToken::new();
        let active = Arc::new(AtomicBool::new(true));

        let consumer = Consumer {
            stream,
            state: Arc::clone(&state),
            summary: Arc::clone(&summary),
            cancel: cancel.clone(),
            empty_stream: options.empty_stream,
            _active: ActiveGuard(Arc::clone(&active)),
        };
        tracing::info!(image = %reference, "pull started");
        let task = tokio::spawn(consumer.run());

        Self {
            reference,
            state,
            summary,
            cancel,
            consumer: Mutex::new(Some(task)),
            active,
        }
    }

    pub fn reference(&self) -> &ImageRef {
        &self.reference
    }

    pub fn state(&self) -> PullState {
        self.state.borrow().clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    pub fn summary(&self) -> PullSummary {
        self.summary.lock().clone()
    }

    /// Whether the consumer task is still running.
    pub fn consumer_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// The outcome if the pull has finished.
    pub fn outcome(&self) -> Option<Result<(), PullError>> {
        match &*self.state.borrow() {
            PullState::Running => None,
            PullState::Completed => Some(Ok(())),
            PullState::Failed(err) => Some(Err(err.clone())),
        }
    }

    /// Wait up to `timeout` for the pull to finish.
    ///
    /// On expiry the pull is settled as timed out, the consumer is stopped,
    /// and the stream is closed before this returns. Calling again after a
    /// terminal state returns the same outcome immediately.
    pub async fn await_completion(&self, timeout: Duration) -> Result<(), PullError> {
        let mut updates = self.state.subscribe();
        let finished = tokio::time::timeout(timeout, updates.wait_for(PullState::is_terminal))
            .await
            .is_ok();

        if !finished {
            tracing::warn!(image = %self.reference, ?timeout, "pull did not finish in time, cancelling");
            settle(
                &self.state,
                PullState::Failed(PullError::Timeout {
                    reference: self.reference.clone(),
                    after: timeout,
                }),
            );
            self.cancel.cancel();
        }

        self.join_consumer().await;
        self.outcome().unwrap_or_else(|| {
            Err(PullError::Timeout {
                reference: self.reference.clone(),
                after: timeout,
            })
        })
    }

    /// Stop the pull. No effect on the outcome if it already finished.
    pub async fn cancel(&self) {
        let cancelled = settle(
            &self.state,
            PullState::Failed(PullError::Cancelled {
                reference: self.reference.clone(),
            }),
        );
        if cancelled {
            tracing::info!(image = %self.reference, "pull cancelled");
        }
        self.cancel.cancel();
        self.join_consumer().await;
    }

    async fn join_consumer(&self) {
        let task = self.consumer.lock().take();
        let Some(task) = task else {
            return;
        };
        if let Err(err) = task.await {
            tracing::error!(image = %self.reference, "pull consumer failed: {}", err);
            settle(
                &self.state,
                PullState::Failed(PullError::Transport(TransportError::Connection(format!(
                    "pull consumer stopped: {}",
                    err
                )))),
            );
        }
    }
}

impl Drop for PullHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
