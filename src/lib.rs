// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod provider;
pub mod status;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::parse_duration;
use crate::provider::{EnvTokenProvider, ManifestFetcher, TokenProvider};
use crate::types::{JobId, JobStatus};

pub use crate::config::MergeQueueConfig;
pub use crate::engine::Scheduler;
pub use crate::errors::MergeQueueError;
pub use crate::status::{ProcessedJob, StatusSnapshot};

/// How often the driver checks whether the batch has finished.
const BATCH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a batch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Finished,
    Interrupted,
    TimedOut,
}

/// Final state of a batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcome: BatchOutcome,
    pub snapshot: StatusSnapshot,
    /// Terminal records, oldest first.
    pub jobs: Vec<ProcessedJob>,
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the environment token provider
/// - the batch driver
///
/// Every `[[job]]` is submitted, the queue runs until the batch is done,
/// and the final status is printed to stdout as JSON.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let timeout =
        parse_duration(&args.timeout).map_err(|e| anyhow!("invalid --timeout value: {e}"))?;

    info!(config = %config_path.display(), "running batch");
    let report = run_batch(&cfg, Arc::new(EnvTokenProvider::default()), timeout).await?;
    println!("{}", serde_json::to_string_pretty(&report.snapshot)?);

    if report.outcome == BatchOutcome::TimedOut {
        return Err(anyhow!("batch did not finish within {timeout:?}"));
    }
    Ok(())
}

/// Submit every job in `cfg` against its manifest, run the queue until the
/// batch is terminal (or Ctrl-C / `timeout`), then stop and report.
pub async fn run_batch(
    cfg: &ConfigFile,
    tokens: Arc<dyn TokenProvider>,
    timeout: Duration,
) -> Result<BatchReport> {
    let fetcher = Arc::new(ManifestFetcher::new(cfg.pull_requests.clone()));
    let scheduler = Scheduler::new(cfg.queue.clone(), fetcher, tokens);

    let mut ids = Vec::with_capacity(cfg.jobs.len());
    for job in cfg.jobs.iter().cloned() {
        ids.push(scheduler.add_job(job)?);
    }
    info!(jobs = ids.len(), "submitted batch");

    scheduler.start().await?;

    let outcome = tokio::select! {
        _ = wait_until_terminal(&scheduler, &ids) => BatchOutcome::Finished,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            BatchOutcome::Interrupted
        }
        _ = tokio::time::sleep(timeout) => BatchOutcome::TimedOut,
    };
    info!(?outcome, "batch wait finished; stopping");

    match scheduler.stop().await {
        Ok(()) => {}
        Err(MergeQueueError::DrainTimeout(waited)) => {
            warn!(?waited, "some jobs were still running at shutdown");
        }
        Err(e) => return Err(e.into()),
    }

    let jobs = scheduler.recent_jobs();
    for record in &jobs {
        info!(
            job = %record.id,
            pr = record.pr_number,
            priority = record.priority,
            status = %record.status,
            "job outcome"
        );
    }

    Ok(BatchReport {
        outcome,
        snapshot: scheduler.status(),
        jobs,
    })
}

/// Resolve once every job is terminal. Ids that aged out of the history
/// are terminal by definition.
async fn wait_until_terminal(scheduler: &Scheduler, ids: &[JobId]) {
    let mut poll = tokio::time::interval(BATCH_POLL_INTERVAL);
    loop {
        poll.tick().await;
        let done = ids.iter().all(|id| {
            scheduler
                .job_status(*id)
                .is_none_or(JobStatus::is_terminal)
        });
        if done {
            return;
        }
    }
}

/// Simple dry-run output: print queue limits, jobs and known pull requests.
fn print_dry_run(cfg: &ConfigFile) {
    let q = &cfg.queue;
    println!("mergequeue dry-run");
    println!("  queue.max_queue_size = {}", q.max_queue_size());
    println!("  queue.max_concurrent_jobs = {}", q.max_concurrent_jobs());
    println!("  queue.processing_interval = {:?}", q.processing_interval());
    println!(
        "  queue.rate_limit = {} per {:?}",
        q.rate_limit_requests(),
        q.rate_limit_interval()
    );
    println!("  queue.max_priority = {}", q.max_priority());
    println!("  queue.drain_timeout = {:?}", q.drain_timeout());
    println!();

    println!("jobs ({}):", cfg.jobs.len());
    let mut ordered: Vec<_> = cfg.jobs.iter().enumerate().collect();
    ordered.sort_by_key(|(seq, job)| (job.priority, *seq));
    for (_, job) in ordered {
        match cfg.pull_requests.get(&job.pr_number) {
            Some(pr) => println!(
                "  - #{} (priority {}): {} [{} <- {}] {:?}",
                job.pr_number, job.priority, pr.title, pr.base_branch, pr.head_branch, pr.merge_status
            ),
            None => println!(
                "  - #{} (priority {}): not in manifest, will fail",
                job.pr_number, job.priority
            ),
        }
    }

    debug!("dry-run complete (no jobs processed)");
}
