// src/engine/dispatch.rs

//! The dispatch loop: the single owner of pop/requeue decisions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, Semaphore, mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::exec::Dispatch;
use crate::status::StatusTracker;

use super::{AdmissionLimiter, PriorityJobQueue};

/// One started instance of the dispatch loop.
///
/// Built fresh on every `start()`; everything it points at is owned by the
/// [`Scheduler`](super::Scheduler) and outlives it.
#[derive(Debug)]
pub struct DispatchLoop {
    pub queue: Arc<PriorityJobQueue>,
    pub limiter: Arc<AdmissionLimiter>,
    pub tracker: Arc<StatusTracker>,
    /// Worker slots, `max_concurrent_jobs` permits in total.
    pub slots: Arc<Semaphore>,
    /// Signalled by `add_job` so an idle loop wakes before the next tick.
    pub arrivals: Arc<Notify>,
    pub handoff: mpsc::Sender<Dispatch>,
    pub processing_interval: Duration,
}

impl DispatchLoop {
    /// Run until `stop` is cancelled.
    ///
    /// `ready` fires once the loop is about to make its first dispatch
    /// decision. Dropping the handoff sender on exit is what lets the
    /// workers drain and finish.
    pub async fn run(self, stop: CancellationToken, ready: oneshot::Sender<()>) {
        let mut tick = interval(self.processing_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval = ?self.processing_interval,
            slots = self.slots.available_permits(),
            "dispatch loop started"
        );
        let _ = ready.send(());
        // The first tick of an interval fires immediately; waits start one
        // full period from now.
        tick.reset();

        let mut throttled = false;

        loop {
            // Reserve a worker before touching the queue, so the job popped
            // is always the best candidate at the moment a worker is free.
            let slot = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                permit = Arc::clone(&self.slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let Some(job) = self.queue.pop() else {
                drop(slot);
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = self.arrivals.notified() => {}
                    _ = tick.tick() => {}
                }
                continue;
            };

            if !self.limiter.try_acquire() {
                if !throttled {
                    warn!(
                        capacity = self.limiter.capacity(),
                        queued = self.queue.len() + 1,
                        "rate limit reached; holding jobs until the bucket refills"
                    );
                    throttled = true;
                }
                debug!(job = %job.id, pr = job.job.pr_number, "admission denied; requeueing");
                self.queue.requeue(job);
                self.tracker.record_rate_limit_hit();
                drop(slot);

                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = tick.tick() => {}
                }
                continue;
            }

            if throttled {
                info!("rate limit window refilled; resuming dispatch");
                throttled = false;
            }

            debug!(
                job = %job.id,
                pr = job.job.pr_number,
                priority = job.job.priority,
                "dispatching job"
            );
            self.tracker.record_admitted();

            if let Err(mpsc::error::SendError(returned)) =
                self.handoff.send(Dispatch { job, slot }).await
            {
                // Workers are gone; keep the job for the next start.
                warn!(job = %returned.job.id, "worker pool unavailable; returning job to queue");
                self.queue.requeue(returned.job);
                break;
            }
        }

        info!(queued = self.queue.len(), "dispatch loop stopped");
    }
}
