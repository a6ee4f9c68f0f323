// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{MergeJob, PrNumber, Priority, PullRequestInfo};

/// Default upper bound for job priorities (`0..=10`).
pub const DEFAULT_MAX_PRIORITY: Priority = 10;

/// Default time `stop()` waits for in-flight jobs.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of terminal job ids kept in `processed_order`.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Upper bound for `max_concurrent_jobs`; each slot is a worker task.
pub const MAX_CONCURRENT_JOBS: usize = 4096;

/// Validated engine configuration.
///
/// Immutable once built: the only way to obtain one is
/// [`MergeQueueConfig::new`] (or the TOML loader, which goes through it), so
/// every instance satisfies the positivity invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeQueueConfig {
    pub(crate) max_queue_size: usize,
    pub(crate) max_concurrent_jobs: usize,
    pub(crate) processing_interval: Duration,
    pub(crate) rate_limit_requests: u32,
    pub(crate) rate_limit_interval: Duration,
    pub(crate) max_priority: Priority,
    pub(crate) drain_timeout: Duration,
    pub(crate) history_limit: usize,
}

impl MergeQueueConfig {
    /// Hard cap on queued plus in-flight jobs.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Size of the worker pool.
    pub fn max_concurrent_jobs(&self) -> usize {
        self.max_concurrent_jobs
    }

    /// Dispatch-loop cadence, also the backoff when nothing is admissible.
    pub fn processing_interval(&self) -> Duration {
        self.processing_interval
    }

    /// Token-bucket capacity.
    pub fn rate_limit_requests(&self) -> u32 {
        self.rate_limit_requests
    }

    /// Token-bucket refill period.
    pub fn rate_limit_interval(&self) -> Duration {
        self.rate_limit_interval
    }

    pub fn max_priority(&self) -> Priority {
        self.max_priority
    }

    pub fn drain_timeout(&self) -> Duration {
        self.drain_timeout
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }
}

/// Configuration file as read from TOML, before validation.
///
/// ```toml
/// [queue]
/// max_queue_size = 100
/// max_concurrent_jobs = 5
/// processing_interval = "100ms"
/// rate_limit_requests = 30
/// rate_limit_interval = "1m"
///
/// [[job]]
/// pr = 42
/// priority = 1
///
/// [pull_request.42]
/// title = "Add feature"
/// base = "main"
/// head = "feature/x"
/// author = "octo"
/// status = "mergeable"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub queue: RawQueueSection,

    /// Jobs to submit at startup, in file order.
    #[serde(default)]
    pub job: Vec<RawJob>,

    /// Pull request manifest served by the offline fetcher, keyed by number.
    #[serde(default)]
    pub pull_request: BTreeMap<String, RawPullRequest>,
}

/// `[queue]` section.
///
/// Counts are signed so that negative values surface as validation errors
/// with a useful message instead of TOML type errors.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQueueSection {
    pub max_queue_size: i64,
    pub max_concurrent_jobs: i64,
    /// Duration string, e.g. `"100ms"`.
    pub processing_interval: String,
    pub rate_limit_requests: i64,
    /// Duration string, e.g. `"1m"`.
    pub rate_limit_interval: String,

    #[serde(default)]
    pub max_priority: Option<i64>,
    #[serde(default)]
    pub drain_timeout: Option<String>,
    #[serde(default)]
    pub history_limit: Option<i64>,
}

/// `[[job]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJob {
    pub pr: i64,
    #[serde(default)]
    pub priority: i64,
}

/// `[pull_request.<number>]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPullRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_base")]
    pub base: String,
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_base() -> String {
    "main".to_string()
}

fn default_status() -> String {
    "pending".to_string()
}

/// Validated configuration file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub queue: MergeQueueConfig,
    pub jobs: Vec<MergeJob>,
    pub pull_requests: BTreeMap<PrNumber, PullRequestInfo>,
}
