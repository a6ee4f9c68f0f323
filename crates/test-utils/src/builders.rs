use std::time::Duration;

use mergequeue::MergeQueueConfig;
use mergequeue::errors::Result;
use mergequeue::types::{MergeStatus, PrNumber, Priority, PullRequestInfo};

/// Builder for `MergeQueueConfig` with test-friendly defaults: a roomy
/// queue, a fast dispatch tick and a rate limit high enough to never bite.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    max_queue_size: usize,
    max_concurrent_jobs: usize,
    processing_interval: Duration,
    rate_limit_requests: u32,
    rate_limit_interval: Duration,
    max_priority: Option<Priority>,
    drain_timeout: Option<Duration>,
    history_limit: Option<usize>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_queue_size: 100,
            max_concurrent_jobs: 4,
            processing_interval: Duration::from_millis(10),
            rate_limit_requests: 10_000,
            rate_limit_interval: Duration::from_secs(1),
            max_priority: None,
            drain_timeout: None,
            history_limit: None,
        }
    }

    pub fn max_queue_size(mut self, n: usize) -> Self {
        self.max_queue_size = n;
        self
    }

    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.max_concurrent_jobs = n;
        self
    }

    pub fn processing_interval(mut self, d: Duration) -> Self {
        self.processing_interval = d;
        self
    }

    pub fn rate_limit(mut self, requests: u32, interval: Duration) -> Self {
        self.rate_limit_requests = requests;
        self.rate_limit_interval = interval;
        self
    }

    pub fn max_priority(mut self, p: Priority) -> Self {
        self.max_priority = Some(p);
        self
    }

    pub fn drain_timeout(mut self, d: Duration) -> Self {
        self.drain_timeout = Some(d);
        self
    }

    pub fn history_limit(mut self, n: usize) -> Self {
        self.history_limit = Some(n);
        self
    }

    pub fn try_build(self) -> Result<MergeQueueConfig> {
        let mut config = MergeQueueConfig::new(
            self.max_queue_size,
            self.max_concurrent_jobs,
            self.processing_interval,
            self.rate_limit_requests,
            self.rate_limit_interval,
        )?;
        if let Some(p) = self.max_priority {
            config = config.with_max_priority(p);
        }
        if let Some(d) = self.drain_timeout {
            config = config.with_drain_timeout(d)?;
        }
        if let Some(n) = self.history_limit {
            config = config.with_history_limit(n)?;
        }
        Ok(config)
    }

    pub fn build(self) -> MergeQueueConfig {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A pull request targeting `main` with the given merge status.
pub fn pull_request(number: PrNumber, merge_status: MergeStatus) -> PullRequestInfo {
    PullRequestInfo {
        number,
        title: format!("Test PR #{number}"),
        base_branch: "main".to_string(),
        head_branch: format!("feature/{number}"),
        author: "tester".to_string(),
        merge_status,
    }
}
