// src/exec/mod.rs

//! Job execution layer.
//!
//! This module owns the worker pool that runs admitted merge jobs and
//! reports their outcome to the [`StatusTracker`](crate::status::StatusTracker).
//!
//! - [`pool`] spawns the fixed set of worker tasks sharing one handoff
//!   channel.
//! - [`job_runner`] processes a single job: credential lookup, pull request
//!   fetch, merge eligibility, terminal bookkeeping.

pub mod job_runner;
pub mod pool;

use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio_util::sync::CancellationToken;

use crate::engine::PriorityJobQueue;
use crate::provider::{PullRequestFetcher, TokenProvider};
use crate::status::StatusTracker;
use crate::types::AcceptedJob;

pub use job_runner::{MergeVerdict, evaluate_job, merge_verdict, run_dispatched};
pub use pool::WorkerPool;

/// An admitted job travelling from the dispatch loop to a worker, together
/// with the worker slot reserved for it.
///
/// Dropping the permit is what frees the slot, so it stays with the job
/// until its terminal status is recorded.
#[derive(Debug)]
pub struct Dispatch {
    pub job: AcceptedJob,
    pub slot: OwnedSemaphorePermit,
}

/// Everything a worker needs, shared by all workers of one engine.
pub struct WorkerContext {
    pub queue: Arc<PriorityJobQueue>,
    pub tracker: Arc<StatusTracker>,
    pub fetcher: Arc<dyn PullRequestFetcher>,
    pub tokens: Arc<dyn TokenProvider>,
    /// Cancelled when the engine is disposed; in-flight fetches fail fast.
    pub lifetime: CancellationToken,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("queue", &self.queue)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}
