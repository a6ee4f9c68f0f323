pub mod builders;
pub mod fake_fetcher;

use std::sync::{Arc, Once};
use std::time::Duration;

use mergequeue::provider::StaticTokenProvider;
use mergequeue::{MergeQueueConfig, Scheduler, StatusSnapshot};
use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{ConfigBuilder, pull_request};
pub use fake_fetcher::FakeFetcher;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Scheduler wired to `fetcher` and a fixed test credential.
pub fn scheduler_with(config: MergeQueueConfig, fetcher: Arc<FakeFetcher>) -> Scheduler {
    Scheduler::new(config, fetcher, Arc::new(StaticTokenProvider::new("test-token")))
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `status()` until `done` holds, failing the test after 5 seconds.
pub async fn wait_for_status<F>(scheduler: &Scheduler, done: F) -> StatusSnapshot
where
    F: Fn(&StatusSnapshot) -> bool,
{
    with_timeout(async {
        loop {
            let snap = scheduler.status();
            if done(&snap) {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
}
