// ABOUTME: Tests for pull completion tracking against a scripted transport.
// ABOUTME: Covers ordering, idempotent waits, timeout teardown, empty streams, and cancellation.

mod support;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use hoist::engine::{
    ApiVersion, Engine, EngineInfo, FrameStream, ImageDetails, Transport, TransportError,
};
use hoist::pull::{
    EmptyStreamPolicy, PullCommand, PullError, PullErrorKind, PullFrame, PullOptions, PullState,
    RemoteErrorKind,
};
use hoist::types::{ImageRef, RegistryCredentials};
use proptest::prelude::*;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
enum Step {
    Frame(PullFrame),
    Fail(TransportError),
}

fn status(text: &str) -> Step {
    Step::Frame(PullFrame::status(text))
}

fn marker(text: &str) -> Step {
    Step::Frame(PullFrame::error(text))
}

/// Counts drops so tests can see the connection was released.
struct Tracked {
    inner: FrameStream,
    drops: Arc<AtomicUsize>,
}

impl Stream for Tracked {
    type Item = Result<PullFrame, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Replays a fixed script for every pull. Optionally never ends after the script.
struct ScriptedTransport {
    script: Vec<Step>,
    hang: bool,
    opens: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            hang: false,
            opens: Arc::new(AtomicUsize::new(0)),
            drops: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn hanging(self) -> Self {
        Self { hang: true, ..self }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn open_pull(
        &self,
        _reference: &ImageRef,
        _credentials: Option<&RegistryCredentials>,
    ) -> FrameStream {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let items: Vec<_> = self
            .script
            .iter()
            .cloned()
            .map(|step| match step {
                Step::Frame(frame) => Ok(frame),
                Step::Fail(err) => Err(err),
            })
            .collect();
        let inner: FrameStream = if self.hang {
            Box::pin(stream::iter(items).chain(stream::pending()))
        } else {
            Box::pin(stream::iter(items))
        };
        Box::pin(Tracked {
            inner,
            drops: Arc::clone(&self.drops),
        })
    }

    async fn engine_info(&self) -> Result<EngineInfo, TransportError> {
        Ok(EngineInfo {
            name: "Fake".to_string(),
            server_version: "0.0.0".to_string(),
            api_version: ApiVersion::new(1, 41),
            cluster_mode: false,
            status_errors: true,
            images: 0,
            os: "linux".to_string(),
            arch: "amd64".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn inspect_image(&self, reference: &ImageRef) -> Result<ImageDetails, TransportError> {
        Err(TransportError::Status {
            status_code: 404,
            message: format!("No such image: {}", reference),
        })
    }

    async fn remove_image(&self, reference: &ImageRef, _force: bool) -> Result<(), TransportError> {
        Err(TransportError::Status {
            status_code: 404,
            message: format!("No such image: {}", reference),
        })
    }
}

struct Fixture {
    engine: Engine,
    opens: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

fn fixture(transport: ScriptedTransport) -> Fixture {
    fixture_with(transport, PullOptions::default())
}

fn fixture_with(transport: ScriptedTransport, options: PullOptions) -> Fixture {
    support::init_tracing();
    let opens = Arc::clone(&transport.opens);
    let drops = Arc::clone(&transport.drops);
    Fixture {
        engine: Engine::new(Arc::new(transport)).with_pull_options(options),
        opens,
        drops,
    }
}

fn command() -> PullCommand {
    PullCommand::new(ImageRef::parse("hackmann/empty").unwrap())
}

/// Poll until `check` holds or a second passes.
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn progress_then_end_completes() {
    let f = fixture(ScriptedTransport::new(vec![
        status("Pulling from hackmann/empty"),
        status("Digest: sha256:1a2b3c"),
        status("Status: Downloaded newer image for hackmann/empty:latest"),
    ]));

    let handle = f.engine.pull(command());
    handle.await_completion(WAIT).await.expect("pull should complete");

    let summary = handle.summary();
    assert_eq!(summary.events, 3);
    assert_eq!(summary.digest.as_deref(), Some("sha256:1a2b3c"));
    assert!(summary.finished_at.is_some());
    assert_eq!(handle.state(), PullState::Completed);
    assert!(!handle.consumer_active());
    assert_eq!(f.drops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_marker_after_progress_fails() {
    let f = fixture(ScriptedTransport::new(vec![
        status("Pulling fs layer"),
        status("Downloading"),
        marker("manifest for hackmann/empty:latest not found"),
    ]));

    let handle = f.engine.pull(command());
    let err = handle.await_completion(WAIT).await.unwrap_err();

    assert_eq!(err.kind(), PullErrorKind::Remote(RemoteErrorKind::Client));
    assert!(err.to_string().contains("manifest for hackmann/empty:latest not found"));
    assert_eq!(handle.summary().events, 2);
    assert_eq!(f.drops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn frames_after_an_error_are_not_consumed() {
    let f = fixture(ScriptedTransport::new(vec![
        marker("unauthorized: authentication required"),
        status("Downloading"),
    ]));

    let handle = f.engine.pull(command());
    assert!(handle.await_completion(WAIT).await.is_err());
    assert_eq!(handle.summary().events, 0);
}

#[tokio::test]
async fn repeated_waits_return_the_same_outcome() {
    let f = fixture(ScriptedTransport::new(vec![
        status("Downloading"),
        marker("toomanyrequests"),
    ]));

    let handle = f.engine.pull(command());
    let first = handle.await_completion(WAIT).await;
    let second = handle.await_completion(Duration::from_millis(1)).await;

    assert!(first.is_err());
    assert_eq!(first, second);
    assert_eq!(f.opens.load(Ordering::SeqCst), 1);
    assert_eq!(f.drops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn timeout_is_bounded_and_tears_down_the_consumer() {
    let f = fixture(ScriptedTransport::new(vec![status("Waiting")]).hanging());

    let handle = f.engine.pull(command());
    let started = Instant::now();
    let err = handle
        .await_completion(Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2));
    assert!(!handle.consumer_active());
    assert_eq!(f.drops.load(Ordering::SeqCst), 1);
    assert!(matches!(
        handle.state(),
        PullState::Failed(PullError::Timeout { .. })
    ));

    // A later wait reports the same timeout instead of waiting again.
    let again = handle.await_completion(WAIT).await.unwrap_err();
    assert!(again.is_timeout());
}

#[tokio::test]
async fn pull_returns_before_the_stream_ends() {
    let f = fixture(ScriptedTransport::new(vec![]).hanging());

    let handle = f.engine.pull(command());
    assert!(!handle.is_terminal());
    assert!(handle.outcome().is_none());

    handle.cancel().await;
}

#[tokio::test]
async fn empty_stream_completes_by_default() {
    let f = fixture(ScriptedTransport::new(vec![]));

    let handle = f.engine.pull(command());
    handle.await_completion(WAIT).await.expect("empty stream is a success");
    assert_eq!(handle.summary().events, 0);
}

#[tokio::test]
async fn empty_stream_can_be_treated_as_failure() {
    let options = PullOptions {
        empty_stream: EmptyStreamPolicy::Fail,
        ..PullOptions::default()
    };
    let f = fixture_with(ScriptedTransport::new(vec![]), options);

    let handle = f.engine.pull(command());
    let err = handle.await_completion(WAIT).await.unwrap_err();
    assert_eq!(err.remote_kind(), Some(RemoteErrorKind::Client));
}

#[tokio::test]
async fn engine_statuses_are_classified() {
    let cases = [
        (404, PullErrorKind::Remote(RemoteErrorKind::NotFound)),
        (500, PullErrorKind::Remote(RemoteErrorKind::Internal)),
        (401, PullErrorKind::Remote(RemoteErrorKind::Client)),
    ];

    for (status_code, expected) in cases {
        let f = fixture(ScriptedTransport::new(vec![Step::Fail(TransportError::Status {
            status_code,
            message: "rejected".to_string(),
        })]));
        let err = f
            .engine
            .pull(command())
            .await_completion(WAIT)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), expected, "status {status_code}");
    }
}

#[tokio::test]
async fn connection_failures_stay_transport_errors() {
    let f = fixture(ScriptedTransport::new(vec![
        status("Downloading"),
        Step::Fail(TransportError::Connection("connection reset by peer".to_string())),
    ]));

    let err = f
        .engine
        .pull(command())
        .await_completion(WAIT)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), PullErrorKind::Transport);
    assert_eq!(f.drops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_settles_and_closes() {
    let f = fixture(ScriptedTransport::new(vec![status("Downloading")]).hanging());

    let handle = f.engine.pull(command());
    handle.cancel().await;

    assert!(matches!(
        handle.state(),
        PullState::Failed(PullError::Cancelled { .. })
    ));
    assert!(!handle.consumer_active());
    assert_eq!(f.drops.load(Ordering::SeqCst), 1);

    // Cancelling a finished pull changes nothing.
    handle.cancel().await;
    assert!(matches!(
        handle.await_completion(WAIT).await,
        Err(PullError::Cancelled { .. })
    ));
}

#[tokio::test]
async fn dropping_the_handle_releases_the_stream() {
    let f = fixture(ScriptedTransport::new(vec![]).hanging());

    let handle = f.engine.pull(command());
    drop(handle);

    let drops = Arc::clone(&f.drops);
    assert!(eventually(move || drops.load(Ordering::SeqCst) == 1).await);
}

#[tokio::test]
async fn pull_and_wait_uses_the_configured_timeout() {
    let options = PullOptions {
        timeout: Duration::from_millis(50),
        ..PullOptions::default()
    };
    let f = fixture_with(ScriptedTransport::new(vec![]).hanging(), options);

    let err = f.engine.pull_and_wait(command()).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn remove_if_exists_ignores_missing_images() {
    let f = fixture(ScriptedTransport::new(vec![]));
    let removed = f
        .engine
        .remove_image_if_exists(&ImageRef::parse("hackmann/empty").unwrap(), true)
        .await
        .expect("missing image is not an error");
    assert!(!removed);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any run of progress frames followed by a marker fails, whatever came before.
    #[test]
    fn trailing_marker_always_fails(statuses in prop::collection::vec("[a-zA-Z ]{1,20}", 0..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let count = statuses.len();
        let mut script: Vec<Step> = statuses.iter().map(|s| status(s)).collect();
        script.push(marker("denied"));

        let outcome = rt.block_on(async move {
            let f = fixture(ScriptedTransport::new(script));
            let handle = f.engine.pull(command());
            let result = handle.await_completion(WAIT).await;
            (result, handle.summary().events, f.drops.load(Ordering::SeqCst))
        });

        let failed_as_client = matches!(
            outcome.0,
            Err(PullError::Remote { kind: RemoteErrorKind::Client, .. })
        );
        prop_assert!(failed_as_client, "unexpected outcome: {:?}", outcome.0);
        prop_assert_eq!(outcome.1, count);
        prop_assert_eq!(outcome.2, 1);
    }
}
