use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mergequeue::provider::{AccessToken, ProviderError, ProviderFuture, PullRequestFetcher};
use mergequeue::types::{MergeStatus, PrNumber, PullRequestInfo};

use crate::builders::pull_request;

/// What the fake returns for one PR.
#[derive(Debug, Clone)]
enum Script {
    Status(MergeStatus),
    Fail(ProviderError),
    /// Answer with a different PR number.
    Mismatch(PrNumber),
    Panic,
    /// Never resolve.
    Hang,
}

/// A fake fetcher that:
/// - answers every PR as `Mergeable` unless scripted otherwise
/// - records which PRs were fetched, in call order
/// - tracks how many fetches were in flight at once
#[derive(Debug)]
pub struct FakeFetcher {
    scripts: HashMap<PrNumber, Script>,
    latency: Duration,
    calls: Mutex<Vec<PrNumber>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_status(mut self, pr: PrNumber, status: MergeStatus) -> Self {
        self.scripts.insert(pr, Script::Status(status));
        self
    }

    pub fn with_error(mut self, pr: PrNumber, err: ProviderError) -> Self {
        self.scripts.insert(pr, Script::Fail(err));
        self
    }

    pub fn with_mismatch(mut self, pr: PrNumber, returned: PrNumber) -> Self {
        self.scripts.insert(pr, Script::Mismatch(returned));
        self
    }

    pub fn with_panic(mut self, pr: PrNumber) -> Self {
        self.scripts.insert(pr, Script::Panic);
        self
    }

    pub fn with_hang(mut self, pr: PrNumber) -> Self {
        self.scripts.insert(pr, Script::Hang);
        self
    }

    /// PR numbers fetched so far, in call order.
    pub fn calls(&self) -> Vec<PrNumber> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of fetches observed running at the same time.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight_calls(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

impl Default for FakeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight gauge even when the fetch future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a AtomicUsize, high_water: &AtomicUsize) -> Self {
        let now = gauge.fetch_add(1, Ordering::SeqCst) + 1;
        high_water.fetch_max(now, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PullRequestFetcher for FakeFetcher {
    fn fetch_pull_request<'a>(
        &'a self,
        pr_number: PrNumber,
        token: &'a AccessToken,
    ) -> ProviderFuture<'a, PullRequestInfo> {
        Box::pin(async move {
            assert!(!token.expose().is_empty(), "fetch called without a credential");
            self.calls.lock().unwrap().push(pr_number);
            let _gauge = InFlight::enter(&self.in_flight, &self.max_in_flight);

            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let script = self
                .scripts
                .get(&pr_number)
                .cloned()
                .unwrap_or(Script::Status(MergeStatus::Mergeable));

            match script {
                Script::Status(status) => Ok(pull_request(pr_number, status)),
                Script::Fail(err) => Err(err),
                Script::Mismatch(returned) => Ok(pull_request(returned, MergeStatus::Mergeable)),
                Script::Panic => panic!("scripted panic while fetching PR #{pr_number}"),
                Script::Hang => std::future::pending().await,
            }
        })
    }
}
