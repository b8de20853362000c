// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup, a local-engine probe, and the private registry container.

use hoist::engine::Engine;
use std::sync::Once;

// Each test binary only uses some of these modules, so allow dead_code.
#[allow(dead_code)]
pub mod registry_container;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("hoist=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Local engine that answers a ping, if any.
#[allow(dead_code)]
pub async fn local_engine() -> Option<Engine> {
    let engine = Engine::connect_local().ok()?;
    engine.ping().await.ok()?;
    Some(engine)
}

/// Skip the test if no local engine is reachable.
#[macro_export]
macro_rules! require_engine {
    () => {
        match support::local_engine().await {
            Some(engine) => engine,
            None => {
                eprintln!("Skipping test: no local container engine found");
                return;
            }
        }
    };
}
