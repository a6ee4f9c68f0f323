// src/exec/pool.rs

//! Fixed-size pool of worker tasks.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::job_runner::run_dispatched;
use super::{Dispatch, WorkerContext};

/// Exactly `size` worker tasks pulling from one handoff channel.
///
/// Workers exit once the channel is closed *and* drained, so every job the
/// dispatch loop managed to hand off is still processed after the loop
/// stops.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the workers on the current Tokio runtime.
    pub fn spawn(size: usize, rx: mpsc::Receiver<Dispatch>, ctx: Arc<WorkerContext>) -> Self {
        let rx = Arc::new(Mutex::new(rx));
        let handles = (0..size)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let ctx = Arc::clone(&ctx);
                tokio::spawn(worker_loop(worker, rx, ctx))
            })
            .collect();

        info!(workers = size, "worker pool started");
        Self { handles }
    }

    /// Wait for every worker to exit.
    ///
    /// Dropping the returned future before it finishes detaches the
    /// remaining workers; they keep running and still record outcomes.
    pub async fn join(self) {
        for (worker, handle) in self.handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!(worker, error = %e, "worker task ended abnormally");
            }
        }
        info!("worker pool drained");
    }
}

async fn worker_loop(worker: usize, rx: Arc<Mutex<mpsc::Receiver<Dispatch>>>, ctx: Arc<WorkerContext>) {
    debug!(worker, "worker started");

    loop {
        // Only one idle worker waits on the channel at a time; the lock is
        // released before the job runs.
        let next = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };

        match next {
            Some(dispatch) => {
                run_dispatched(worker, dispatch, &ctx).await;
            }
            None => break,
        }
    }

    debug!(worker, "worker finished (handoff channel closed)");
}
