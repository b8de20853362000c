// ABOUTME: Integration tests against the local Docker or Podman engine.
// ABOUTME: Pulls a tiny public image and checks how a missing image is reported.

mod support;

use hoist::engine::{PullFailureCause, VersionOracle, expected_pull_failure};
use hoist::pull::{PullCommand, PullError, PullState};
use hoist::types::ImageRef;
use std::time::Duration;

const PUBLIC_IMAGE: &str = "hackmann/empty";
const MISSING_IMAGE: &str = "xvxcv/foo";

#[tokio::test]
async fn engine_info_reports_version() {
    support::init_tracing();
    let engine = require_engine!();

    let info = engine.info().await.expect("info should succeed");
    assert!(!info.server_version.is_empty());
    assert!(info.api_version >= hoist::engine::ApiVersion::new(1, 0));

    let version = engine.version().await.expect("version should succeed");
    assert_eq!(version.api_version, info.api_version);
}

#[tokio::test]
async fn pull_public_image() {
    support::init_tracing();
    let engine = require_engine!();
    let image = ImageRef::parse(PUBLIC_IMAGE).unwrap();

    engine
        .remove_image_if_exists(&image, true)
        .await
        .expect("cleanup should succeed");
    let images_before = engine.info().await.expect("info should succeed").images;

    let handle = engine.pull(PullCommand::new(image.clone()));
    handle
        .await_completion(Duration::from_secs(60))
        .await
        .expect("pull should complete");

    assert_eq!(handle.state(), PullState::Completed);
    let summary = handle.summary();
    assert!(summary.events > 0, "expected progress events");
    assert!(summary.finished_at.is_some());

    let images_after = engine.info().await.expect("info should succeed").images;
    assert!(
        images_after >= images_before,
        "image count dropped from {images_before} to {images_after}"
    );

    let details = engine
        .inspect_image(&image)
        .await
        .expect("pulled image should be present");
    assert!(
        details
            .repo_tags
            .iter()
            .any(|tag| tag.contains(PUBLIC_IMAGE)),
        "tags: {:?}",
        details.repo_tags
    );
}

#[tokio::test]
async fn pulling_again_is_up_to_date() {
    support::init_tracing();
    let engine = require_engine!();
    let image = ImageRef::parse(PUBLIC_IMAGE).unwrap();

    engine
        .pull_and_wait(PullCommand::new(image.clone()))
        .await
        .expect("first pull should complete");
    let handle = engine
        .pull_and_wait(PullCommand::new(image))
        .await
        .expect("second pull should complete");

    assert_eq!(handle.state(), PullState::Completed);
}

#[tokio::test]
async fn missing_image_fails_with_version_dependent_kind() {
    support::init_tracing();
    let engine = require_engine!();
    let version = engine.version().await.expect("version should succeed");
    let expected = expected_pull_failure(&version, PullFailureCause::ImageNotFound);

    let handle = engine.pull(PullCommand::new(ImageRef::parse(MISSING_IMAGE).unwrap()));
    let err = handle
        .await_completion(Duration::from_secs(60))
        .await
        .expect_err("pull of a missing image should fail");

    assert!(
        matches!(err, PullError::Remote { .. }),
        "expected a remote error, got {err:?}"
    );
    assert_eq!(err.remote_kind(), Some(expected), "error: {err}");
    assert!(
        matches!(handle.state(), PullState::Failed(PullError::Remote { .. })),
        "state: {:?}",
        handle.state()
    );
}

#[tokio::test]
async fn removing_a_missing_image_reports_false() {
    let engine = require_engine!();
    let image = ImageRef::parse("hoist-test/never-pulled:none").unwrap();

    let removed = engine
        .remove_image_if_exists(&image, false)
        .await
        .expect("missing image is not an error");
    assert!(!removed);
}
