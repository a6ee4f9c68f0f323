// src/exec/job_runner.rs

//! Processing of a single admitted merge job.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::{MergeQueueError, Result};
use crate::provider::{ProviderError, PullRequestFetcher, TokenProvider};
use crate::types::{AcceptedJob, JobStatus, MergeStatus, PrNumber, PullRequestInfo};

use super::{Dispatch, WorkerContext};

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeVerdict {
    /// Checks pass (or are still settling); the PR can go in.
    Eligible,
    /// The provider already reports the PR as merged.
    AlreadyMerged,
}

/// Run one dispatched job to a terminal status and return it.
///
/// The evaluation runs on its own task so a panicking collaborator fails
/// only this job. Whatever happens, the job's queue capacity and worker
/// slot are released before this returns.
pub async fn run_dispatched(worker: usize, dispatch: Dispatch, ctx: &WorkerContext) -> JobStatus {
    let Dispatch {
        job: AcceptedJob { id, mut job },
        slot,
    } = dispatch;

    job.status = JobStatus::Processing;
    ctx.tracker.record_started(id);

    let pr = job.pr_number;
    info!(worker, job = %id, pr, priority = job.priority, "processing merge job");

    let fetcher = Arc::clone(&ctx.fetcher);
    let tokens = Arc::clone(&ctx.tokens);
    let lifetime = ctx.lifetime.clone();

    let evaluation = tokio::spawn(async move {
        evaluate_job(pr, fetcher.as_ref(), tokens.as_ref(), &lifetime).await
    })
    .await;

    let result = match evaluation {
        Ok(result) => result,
        Err(join_err) => {
            error!(worker, job = %id, pr, error = %join_err, "merge evaluation panicked");
            Err(MergeQueueError::JobPanicked(id))
        }
    };

    // Capacity is free before the terminal status becomes observable.
    ctx.queue.release();

    match result {
        Ok(verdict) => {
            job.status = JobStatus::Completed;
            ctx.tracker.record_completed(id, pr, job.priority);
            info!(worker, job = %id, pr, ?verdict, "merge job completed");
        }
        Err(err) => {
            job.status = JobStatus::Failed;
            ctx.tracker.record_failed(id, pr, job.priority);
            warn!(worker, job = %id, pr, error = %err, "merge job failed");
        }
    }

    drop(slot);
    job.status
}

/// Fetch the pull request behind `pr` and decide whether it can merge.
///
/// Cancelling `lifetime` abandons an in-flight fetch with
/// [`ProviderError::Cancelled`].
pub async fn evaluate_job(
    pr: PrNumber,
    fetcher: &dyn PullRequestFetcher,
    tokens: &dyn TokenProvider,
    lifetime: &CancellationToken,
) -> Result<MergeVerdict> {
    let token = tokens
        .get_token()
        .map_err(|source| MergeQueueError::FetchFailed { pr, source })?;

    let info = tokio::select! {
        biased;
        _ = lifetime.cancelled() => {
            return Err(MergeQueueError::FetchFailed { pr, source: ProviderError::Cancelled });
        }
        res = fetcher.fetch_pull_request(pr, &token) => {
            res.map_err(|source| MergeQueueError::FetchFailed { pr, source })?
        }
    };

    if info.number != pr {
        return Err(MergeQueueError::FetchFailed {
            pr,
            source: ProviderError::Api(format!(
                "provider returned pull request #{} instead of #{pr}",
                info.number
            )),
        });
    }

    merge_verdict(&info)
}

/// Map a provider merge status to a verdict.
pub fn merge_verdict(info: &PullRequestInfo) -> Result<MergeVerdict> {
    match info.merge_status {
        MergeStatus::Merged => Ok(MergeVerdict::AlreadyMerged),
        MergeStatus::Pending | MergeStatus::Mergeable => Ok(MergeVerdict::Eligible),
        MergeStatus::Conflicting => Err(MergeQueueError::MergeBlocked {
            pr: info.number,
            reason: format!("conflicts with base branch '{}'", info.base_branch),
        }),
        MergeStatus::Closed => Err(MergeQueueError::MergeBlocked {
            pr: info.number,
            reason: "pull request is closed".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::*;
    use crate::engine::PriorityJobQueue;
    use crate::provider::{ManifestFetcher, StaticTokenProvider};
    use crate::status::StatusTracker;
    use crate::types::{JobId, MergeJob};

    fn pull(number: PrNumber, merge_status: MergeStatus) -> PullRequestInfo {
        PullRequestInfo {
            number,
            title: format!("PR {number}"),
            base_branch: "main".to_string(),
            head_branch: format!("feature-{number}"),
            author: "octo".to_string(),
            merge_status,
        }
    }

    fn manifest(pulls: &[PullRequestInfo]) -> ManifestFetcher {
        ManifestFetcher::new(pulls.iter().map(|p| (p.number, p.clone())).collect::<BTreeMap<_, _>>())
    }

    #[test]
    fn verdict_follows_merge_status() {
        assert_eq!(
            merge_verdict(&pull(1, MergeStatus::Merged)).unwrap(),
            MergeVerdict::AlreadyMerged
        );
        assert_eq!(
            merge_verdict(&pull(1, MergeStatus::Pending)).unwrap(),
            MergeVerdict::Eligible
        );
        assert!(matches!(
            merge_verdict(&pull(7, MergeStatus::Conflicting)),
            Err(MergeQueueError::MergeBlocked { pr: 7, .. })
        ));
        assert!(matches!(
            merge_verdict(&pull(8, MergeStatus::Closed)),
            Err(MergeQueueError::MergeBlocked { pr: 8, .. })
        ));
    }

    #[tokio::test]
    async fn unknown_pull_request_fails_fetch() {
        let fetcher = manifest(&[pull(1, MergeStatus::Mergeable)]);
        let tokens = StaticTokenProvider::new("secret");

        let err = evaluate_job(2, &fetcher, &tokens, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MergeQueueError::FetchFailed { pr: 2, source: ProviderError::NotFound(2) }
        ));
    }

    #[tokio::test]
    async fn cancelled_lifetime_abandons_fetch() {
        let fetcher =
            manifest(&[pull(1, MergeStatus::Mergeable)]).with_latency(Duration::from_secs(60));
        let tokens = StaticTokenProvider::new("secret");
        let lifetime = CancellationToken::new();
        lifetime.cancel();

        let err = evaluate_job(1, &fetcher, &tokens, &lifetime).await.unwrap_err();
        assert!(matches!(
            err,
            MergeQueueError::FetchFailed { source: ProviderError::Cancelled, .. }
        ));
    }

    #[tokio::test]
    async fn dispatched_job_releases_capacity_and_slot() {
        let queue = Arc::new(PriorityJobQueue::new(1));
        let tracker = Arc::new(StatusTracker::new(Duration::from_secs(1), 10));
        let ctx = WorkerContext {
            queue: Arc::clone(&queue),
            tracker: Arc::clone(&tracker),
            fetcher: Arc::new(manifest(&[pull(5, MergeStatus::Closed)])),
            tokens: Arc::new(StaticTokenProvider::new("secret")),
            lifetime: CancellationToken::new(),
        };

        queue
            .push(AcceptedJob { id: JobId(0), job: MergeJob::new(5, 0) })
            .unwrap();
        let job = queue.pop().unwrap();
        let slots = Arc::new(Semaphore::new(1));
        let slot = Arc::clone(&slots).acquire_owned().await.unwrap();

        let status = run_dispatched(0, Dispatch { job, slot }, &ctx).await;

        assert_eq!(status, JobStatus::Failed);
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(slots.available_permits(), 1);
        assert_eq!(tracker.active_jobs(), 0);
        assert_eq!(tracker.job_status(JobId(0)), Some(JobStatus::Failed));
    }
}
