// src/engine/scheduler.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::{Mutex, Notify, Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MergeQueueConfig;
use crate::errors::{MergeQueueError, Result};
use crate::exec::{WorkerContext, WorkerPool};
use crate::provider::{PullRequestFetcher, TokenProvider};
use crate::status::{ProcessedJob, StatusSnapshot, StatusTracker};
use crate::types::{AcceptedJob, JobId, JobStatus, MergeJob};

use super::dispatch::DispatchLoop;
use super::{AdmissionLimiter, PriorityJobQueue};

/// Tasks belonging to one start/stop cycle.
struct ActiveScope {
    scope: CancellationToken,
    dispatch: JoinHandle<()>,
    pool: WorkerPool,
}

enum Lifecycle {
    Stopped,
    Started(ActiveScope),
}

/// The merge queue engine.
///
/// Owns the queue, the admission limiter, the status counters and the
/// worker-slot semaphore for its whole life. [`start`](Self::start) and
/// [`stop`](Self::stop) only spawn and tear down the dispatch loop and the
/// worker tasks, so queued jobs and totals carry over across restarts.
///
/// Dropping the scheduler cancels every task it started; in-flight fetches
/// fail with a cancellation error.
pub struct Scheduler {
    config: MergeQueueConfig,
    queue: Arc<PriorityJobQueue>,
    limiter: Arc<AdmissionLimiter>,
    tracker: Arc<StatusTracker>,
    slots: Arc<Semaphore>,
    arrivals: Arc<Notify>,
    fetcher: Arc<dyn PullRequestFetcher>,
    tokens: Arc<dyn TokenProvider>,
    lifetime: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
    running: AtomicBool,
    next_id: AtomicU64,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(
        config: MergeQueueConfig,
        fetcher: Arc<dyn PullRequestFetcher>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        info!(
            max_queue_size = config.max_queue_size(),
            max_concurrent_jobs = config.max_concurrent_jobs(),
            rate_limit_requests = config.rate_limit_requests(),
            rate_limit_interval = ?config.rate_limit_interval(),
            "creating merge queue"
        );

        Self {
            queue: Arc::new(PriorityJobQueue::new(config.max_queue_size())),
            limiter: Arc::new(AdmissionLimiter::new(
                config.rate_limit_requests(),
                config.rate_limit_interval(),
            )),
            tracker: Arc::new(StatusTracker::new(
                config.rate_limit_interval(),
                config.history_limit(),
            )),
            slots: Arc::new(Semaphore::new(config.max_concurrent_jobs())),
            arrivals: Arc::new(Notify::new()),
            fetcher,
            tokens,
            lifetime: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle::Stopped),
            running: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &MergeQueueConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Submit a job. Allowed whether or not the engine is started.
    ///
    /// Fails with `InvalidJob` for PR number 0 or a priority above
    /// `max_priority`, and with `QueueFull` when queued plus in-flight jobs
    /// already reach `max_queue_size`.
    pub fn add_job(&self, mut job: MergeJob) -> Result<JobId> {
        if job.pr_number == 0 {
            return Err(MergeQueueError::InvalidJob(
                "pull request number must be positive".to_string(),
            ));
        }
        if job.priority > self.config.max_priority() {
            return Err(MergeQueueError::InvalidJob(format!(
                "priority {} for PR #{} exceeds max_priority {}",
                job.priority,
                job.pr_number,
                self.config.max_priority()
            )));
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let pr = job.pr_number;
        let priority = job.priority;
        job.status = JobStatus::Queued;

        // Registered before the push so a worker can never finish the job
        // before it is known to the tracker.
        self.tracker.record_queued(id);
        if let Err(err) = self.queue.push(AcceptedJob { id, job }) {
            self.tracker.forget(id);
            return Err(err);
        }
        self.arrivals.notify_one();

        debug!(job = %id, pr, priority, queued = self.queue.len(), "job accepted");
        Ok(id)
    }

    /// Start the worker pool and the dispatch loop.
    ///
    /// Returns once the dispatch loop is running.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        if matches!(*lifecycle, Lifecycle::Started(_)) {
            return Err(MergeQueueError::AlreadyStarted);
        }

        let scope = self.lifetime.child_token();
        let workers = self.config.max_concurrent_jobs();
        let (handoff_tx, handoff_rx) = mpsc::channel(workers);

        let ctx = Arc::new(WorkerContext {
            queue: Arc::clone(&self.queue),
            tracker: Arc::clone(&self.tracker),
            fetcher: Arc::clone(&self.fetcher),
            tokens: Arc::clone(&self.tokens),
            lifetime: self.lifetime.clone(),
        });
        let pool = WorkerPool::spawn(workers, handoff_rx, ctx);

        let dispatch_loop = DispatchLoop {
            queue: Arc::clone(&self.queue),
            limiter: Arc::clone(&self.limiter),
            tracker: Arc::clone(&self.tracker),
            slots: Arc::clone(&self.slots),
            arrivals: Arc::clone(&self.arrivals),
            handoff: handoff_tx,
            processing_interval: self.config.processing_interval(),
        };
        let (ready_tx, ready_rx) = oneshot::channel();
        let dispatch = tokio::spawn(dispatch_loop.run(scope.clone(), ready_tx));

        if ready_rx.await.is_err() {
            scope.cancel();
            return Err(anyhow!("dispatch loop exited before it started").into());
        }

        self.running.store(true, Ordering::SeqCst);
        *lifecycle = Lifecycle::Started(ActiveScope {
            scope,
            dispatch,
            pool,
        });

        info!(queued = self.queue.len(), workers, "merge queue started");
        Ok(())
    }

    /// Stop, waiting up to the configured `drain_timeout` for in-flight jobs.
    pub async fn stop(&self) -> Result<()> {
        self.stop_within(self.config.drain_timeout()).await
    }

    /// Stop the dispatch loop and wait up to `timeout` for workers to finish
    /// the jobs they already hold.
    ///
    /// On timeout the remaining workers are detached: they keep running and
    /// still record their outcome, and `DrainTimeout` is returned. The
    /// engine is stopped either way.
    pub async fn stop_within(&self, timeout: Duration) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        let active = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Started(active) => active,
            Lifecycle::Stopped => return Err(MergeQueueError::NotStarted),
        };
        self.running.store(false, Ordering::SeqCst);

        info!(?timeout, "stopping merge queue");
        let ActiveScope {
            scope,
            dispatch,
            pool,
        } = active;
        scope.cancel();

        let drained = tokio::time::timeout(timeout, async move {
            if let Err(e) = dispatch.await {
                error!(error = %e, "dispatch loop ended abnormally");
            }
            pool.join().await;
        })
        .await;

        match drained {
            Ok(()) => {
                info!(queued = self.queue.len(), "merge queue stopped");
                Ok(())
            }
            Err(_) => {
                warn!(
                    ?timeout,
                    active_jobs = self.tracker.active_jobs(),
                    "in-flight jobs did not finish in time; leaving them detached"
                );
                Err(MergeQueueError::DrainTimeout(timeout))
            }
        }
    }

    /// Point-in-time counters. Never blocks on the dispatch loop.
    pub fn status(&self) -> StatusSnapshot {
        self.tracker.snapshot(self.queue.len(), self.is_running())
    }

    /// Current status of a job, or `None` for an unknown id (or one that
    /// has aged out of the history).
    pub fn job_status(&self, id: JobId) -> Option<JobStatus> {
        self.tracker.job_status(id)
    }

    /// Terminal records, oldest first, bounded by `history_limit`.
    pub fn recent_jobs(&self) -> Vec<ProcessedJob> {
        self.tracker.recent_jobs()
    }

    /// Tokens left in the current rate-limit window.
    pub fn available_admissions(&self) -> u32 {
        self.limiter.available()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
