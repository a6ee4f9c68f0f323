// src/engine/queue.rs

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::errors::{MergeQueueError, Result};
use crate::types::{AcceptedJob, JobId, Priority};

use super::lock;

/// Heap entry ordered so the max-heap yields the lowest `(priority, id)`.
///
/// Ids are assigned in arrival order, so within a priority band the oldest
/// job wins. Re-inserting a job with its original id puts it back exactly
/// where it was relative to everything else.
#[derive(Debug)]
struct Entry {
    priority: Priority,
    id: JobId,
    job: AcceptedJob,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.id == other.id
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lower priority number first, then earlier arrival.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<Entry>,
    /// Jobs popped but not yet released or requeued.
    in_flight: usize,
}

/// Bounded priority queue of accepted merge jobs.
///
/// Capacity covers queued *and* in-flight jobs: a popped job keeps its slot
/// until the worker calls [`release`](Self::release) after recording a
/// terminal status, or the dispatch loop hands it back with
/// [`requeue`](Self::requeue).
///
/// All operations take a single short-lived lock and never await, so they
/// are linearizable and safe to call from any task.
#[derive(Debug)]
pub struct PriorityJobQueue {
    capacity: usize,
    state: Mutex<QueueState>,
}

impl PriorityJobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Insert a job, failing with `QueueFull` when queued + in-flight jobs
    /// already reach capacity.
    pub fn push(&self, job: AcceptedJob) -> Result<()> {
        let mut state = lock(&self.state);

        if state.heap.len() + state.in_flight >= self.capacity {
            debug!(
                job = %job.id,
                queued = state.heap.len(),
                in_flight = state.in_flight,
                capacity = self.capacity,
                "rejecting job: queue full"
            );
            return Err(MergeQueueError::QueueFull {
                capacity: self.capacity,
            });
        }

        state.heap.push(Entry {
            priority: job.job.priority,
            id: job.id,
            job,
        });
        Ok(())
    }

    /// Take the most urgent job, marking it in-flight.
    pub fn pop(&self) -> Option<AcceptedJob> {
        let mut state = lock(&self.state);
        let entry = state.heap.pop()?;
        state.in_flight += 1;
        Some(entry.job)
    }

    /// Return a popped job to the queue at its original position.
    ///
    /// The job's capacity slot was reserved while it was in flight, so this
    /// never fails.
    pub fn requeue(&self, job: AcceptedJob) {
        let mut state = lock(&self.state);
        if state.in_flight == 0 {
            warn!(job = %job.id, "requeue without a matching pop; in-flight count already zero");
        }
        state.in_flight = state.in_flight.saturating_sub(1);
        state.heap.push(Entry {
            priority: job.job.priority,
            id: job.id,
            job,
        });
    }

    /// Free the capacity held by an in-flight job that reached a terminal
    /// status.
    pub fn release(&self) {
        let mut state = lock(&self.state);
        if state.in_flight == 0 {
            warn!("release without a matching pop; in-flight count already zero");
        }
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Number of queued (not in-flight) jobs.
    pub fn len(&self) -> usize {
        lock(&self.state).heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.state).in_flight
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
