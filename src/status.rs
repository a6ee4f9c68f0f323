// src/status.rs

//! Live counters for the merge queue and the snapshot handed to pollers.
//!
//! Every counter lives behind one mutex so that a [`StatusSnapshot`] is
//! always a consistent cut: a terminal job is never visible in
//! `processed_order` without also being reflected in the totals.
//!
//! Interval counters (`jobs_in_last_interval`, `errors_last_interval`,
//! `rate_limit_hits`) cover the trailing rate-limit interval. The interval
//! is split into [`SLOTS_PER_WINDOW`] slots which are zeroed as the clock
//! rotates past them.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::engine::lock;
use crate::types::{JobId, JobStatus, PrNumber, Priority};

/// Number of slots the rate-limit interval is divided into.
pub const SLOTS_PER_WINDOW: u32 = 10;

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Jobs waiting in the queue (not yet dispatched).
    pub queue_size: usize,
    /// Jobs currently being processed by a worker.
    pub active_jobs: usize,
    /// Jobs that reached `Completed`, for the lifetime of the engine.
    pub total_processed: u64,
    /// Jobs that reached `Failed`, for the lifetime of the engine.
    pub total_errors: u64,
    /// Jobs the limiter let through, for the lifetime of the engine.
    pub total_admitted: u64,
    pub jobs_in_last_interval: u64,
    pub errors_last_interval: u64,
    pub rate_limit_hits: u64,
    pub total_rate_limit_hits: u64,
    /// Ids of terminal jobs, in the order their outcome was recorded.
    pub processed_order: Vec<JobId>,
    pub running: bool,
}

/// Terminal record of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessedJob {
    pub id: JobId,
    pub pr_number: PrNumber,
    pub priority: Priority,
    pub status: JobStatus,
}

#[derive(Debug, Default, Clone, Copy)]
struct SlotCounts {
    admitted: u64,
    errors: u64,
    rate_limit_hits: u64,
}

#[derive(Debug)]
struct RollingWindow {
    slot_len: Duration,
    slots: Vec<SlotCounts>,
    current: usize,
    current_start: Instant,
}

impl RollingWindow {
    fn new(interval: Duration, now: Instant) -> Self {
        let slot_len = (interval / SLOTS_PER_WINDOW).max(Duration::from_nanos(1));
        Self {
            slot_len,
            slots: vec![SlotCounts::default(); SLOTS_PER_WINDOW as usize],
            current: 0,
            current_start: now,
        }
    }

    /// Rotate forward to the slot containing `now`, zeroing skipped slots.
    fn advance(&mut self, now: Instant) -> &mut SlotCounts {
        let elapsed = now.saturating_duration_since(self.current_start);
        if elapsed >= self.slot_len {
            let steps = elapsed.as_nanos() / self.slot_len.as_nanos();
            let to_clear = steps.min(self.slots.len() as u128) as usize;
            for _ in 0..to_clear {
                self.current = (self.current + 1) % self.slots.len();
                self.slots[self.current] = SlotCounts::default();
            }
            // Keep the slot grid aligned even when whole windows were skipped.
            let skipped = self.slot_len.as_nanos() * steps;
            self.current_start += Duration::from_nanos(skipped as u64);
        }
        &mut self.slots[self.current]
    }

    fn totals(&mut self, now: Instant) -> SlotCounts {
        self.advance(now);
        self.slots.iter().fold(SlotCounts::default(), |acc, s| SlotCounts {
            admitted: acc.admitted + s.admitted,
            errors: acc.errors + s.errors,
            rate_limit_hits: acc.rate_limit_hits + s.rate_limit_hits,
        })
    }
}

#[derive(Debug)]
struct TrackerState {
    active_jobs: usize,
    total_admitted: u64,
    total_processed: u64,
    total_errors: u64,
    total_rate_limit_hits: u64,
    window: RollingWindow,
    /// Jobs accepted but not yet terminal.
    live: HashMap<JobId, JobStatus>,
    history: VecDeque<ProcessedJob>,
}

/// Thread-safe aggregator fed by the dispatch loop and the workers.
#[derive(Debug)]
pub struct StatusTracker {
    history_limit: usize,
    state: Mutex<TrackerState>,
}

impl StatusTracker {
    pub fn new(interval: Duration, history_limit: usize) -> Self {
        Self {
            history_limit,
            state: Mutex::new(TrackerState {
                active_jobs: 0,
                total_admitted: 0,
                total_processed: 0,
                total_errors: 0,
                total_rate_limit_hits: 0,
                window: RollingWindow::new(interval, Instant::now()),
                live: HashMap::new(),
                history: VecDeque::new(),
            }),
        }
    }

    /// A job was accepted into the queue.
    pub fn record_queued(&self, id: JobId) {
        lock(&self.state).live.insert(id, JobStatus::Queued);
    }

    /// Undo [`record_queued`](Self::record_queued) for a job the queue refused.
    pub fn forget(&self, id: JobId) {
        lock(&self.state).live.remove(&id);
    }

    /// The limiter granted a token to a job.
    pub fn record_admitted(&self) {
        let mut state = lock(&self.state);
        state.total_admitted += 1;
        state.window.advance(Instant::now()).admitted += 1;
    }

    /// A worker took ownership of a job.
    pub fn record_started(&self, id: JobId) {
        let mut state = lock(&self.state);
        state.active_jobs += 1;
        state.live.insert(id, JobStatus::Processing);
    }

    pub fn record_completed(&self, id: JobId, pr_number: PrNumber, priority: Priority) {
        let mut state = lock(&self.state);
        state.total_processed += 1;
        self.finish(&mut state, ProcessedJob {
            id,
            pr_number,
            priority,
            status: JobStatus::Completed,
        });
    }

    pub fn record_failed(&self, id: JobId, pr_number: PrNumber, priority: Priority) {
        let mut state = lock(&self.state);
        state.total_errors += 1;
        state.window.advance(Instant::now()).errors += 1;
        self.finish(&mut state, ProcessedJob {
            id,
            pr_number,
            priority,
            status: JobStatus::Failed,
        });
    }

    pub fn record_rate_limit_hit(&self) {
        let mut state = lock(&self.state);
        state.total_rate_limit_hits += 1;
        state.window.advance(Instant::now()).rate_limit_hits += 1;
    }

    fn finish(&self, state: &mut TrackerState, record: ProcessedJob) {
        state.active_jobs = state.active_jobs.saturating_sub(1);
        state.live.remove(&record.id);
        state.history.push_back(record);
        while state.history.len() > self.history_limit {
            state.history.pop_front();
        }
    }

    /// Current status of a job, if it is live or still in the history.
    pub fn job_status(&self, id: JobId) -> Option<JobStatus> {
        let state = lock(&self.state);
        state.live.get(&id).copied().or_else(|| {
            state
                .history
                .iter()
                .rev()
                .find(|p| p.id == id)
                .map(|p| p.status)
        })
    }

    /// Terminal records in the order they were recorded (oldest first).
    pub fn recent_jobs(&self) -> Vec<ProcessedJob> {
        lock(&self.state).history.iter().copied().collect()
    }

    pub fn active_jobs(&self) -> usize {
        lock(&self.state).active_jobs
    }

    /// Build a consistent snapshot. `queue_size` and `running` come from the
    /// owner, which holds the queue and lifecycle state.
    pub fn snapshot(&self, queue_size: usize, running: bool) -> StatusSnapshot {
        let mut state = lock(&self.state);
        let window = state.window.totals(Instant::now());

        StatusSnapshot {
            queue_size,
            active_jobs: state.active_jobs,
            total_processed: state.total_processed,
            total_errors: state.total_errors,
            total_admitted: state.total_admitted,
            jobs_in_last_interval: window.admitted,
            errors_last_interval: window.errors,
            rate_limit_hits: window.rate_limit_hits,
            total_rate_limit_hits: state.total_rate_limit_hits,
            processed_order: state.history.iter().map(|p| p.id).collect(),
            running,
        }
    }
}
