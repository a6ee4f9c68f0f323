// tests/scheduler_processing.rs

use std::error::Error;
use std::sync::Arc;

use tokio::time::Duration;

use mergequeue::errors::MergeQueueError;
use mergequeue::provider::ProviderError;
use mergequeue::types::{JobId, JobStatus, MergeJob, MergeStatus};
use mergequeue_test_utils::{
    ConfigBuilder, FakeFetcher, init_tracing, scheduler_with, wait_for_status, with_timeout,
};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn every_accepted_job_reaches_a_terminal_status() -> TestResult {
    init_tracing();

    let fetcher = Arc::new(FakeFetcher::new().with_latency(Duration::from_millis(5)));
    let scheduler = scheduler_with(ConfigBuilder::new().build(), Arc::clone(&fetcher));

    let mut ids = Vec::new();
    for pr in 1..=12 {
        ids.push(scheduler.add_job(MergeJob::new(pr, (pr % 3) as u32))?);
    }
    scheduler.start().await?;

    let snap = wait_for_status(&scheduler, |s| s.total_processed + s.total_errors == 12).await;
    assert_eq!(snap.total_processed, 12);
    assert_eq!(snap.queue_size, 0);
    assert_eq!(snap.processed_order.len(), 12);

    for id in ids {
        assert_eq!(scheduler.job_status(id), Some(JobStatus::Completed));
    }

    let mut fetched = fetcher.calls();
    fetched.sort_unstable();
    assert_eq!(fetched, (1..=12).collect::<Vec<_>>(), "each job fetched exactly once");

    scheduler.stop().await?;
    Ok(())
}

#[tokio::test]
async fn active_jobs_never_exceed_worker_count() -> TestResult {
    init_tracing();

    let fetcher = Arc::new(FakeFetcher::new().with_latency(Duration::from_millis(15)));
    let config = ConfigBuilder::new().max_concurrent_jobs(3).build();
    let scheduler = scheduler_with(config, Arc::clone(&fetcher));

    for pr in 1..=20 {
        scheduler.add_job(MergeJob::new(pr, 0))?;
    }
    scheduler.start().await?;

    let mut peak = 0;
    loop {
        let snap = scheduler.status();
        assert!(snap.active_jobs <= 3, "active_jobs = {}", snap.active_jobs);
        peak = peak.max(snap.active_jobs);
        if snap.total_processed == 20 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert!(fetcher.max_concurrent_calls() <= 3);
    assert!(peak >= 1);
    assert_eq!(scheduler.status().active_jobs, 0);

    scheduler.stop().await?;
    Ok(())
}

#[tokio::test]
async fn lower_priority_numbers_dispatch_first() -> TestResult {
    init_tracing();

    let fetcher = Arc::new(FakeFetcher::new().with_latency(Duration::from_millis(10)));
    let config = ConfigBuilder::new().max_concurrent_jobs(1).build();
    let scheduler = scheduler_with(config, Arc::clone(&fetcher));

    // PR n gets the n-th priority.
    let priorities = [3, 1, 2, 1, 3];
    let mut ids = Vec::new();
    for (idx, priority) in priorities.iter().enumerate() {
        ids.push(scheduler.add_job(MergeJob::new(idx as u64 + 1, *priority))?);
    }
    scheduler.start().await?;

    let snap = wait_for_status(&scheduler, |s| s.processed_order.len() == 5).await;

    let priority_of = |id: JobId| priorities[ids.iter().position(|x| *x == id).unwrap()];
    let first_three: Vec<u32> = snap.processed_order[..3]
        .iter()
        .map(|id| priority_of(*id))
        .collect();
    let ones = first_three.iter().filter(|p| **p == 1).count();
    let threes = first_three.iter().filter(|p| **p == 3).count();
    assert!(ones > threes, "first three priorities: {first_three:?}");

    // One worker and all jobs queued before start: exact priority then FIFO order.
    assert_eq!(fetcher.calls(), vec![2, 4, 3, 1, 5]);

    scheduler.stop().await?;
    Ok(())
}

#[tokio::test]
async fn failing_jobs_do_not_block_their_siblings() -> TestResult {
    init_tracing();

    let fetcher = Arc::new(
        FakeFetcher::new()
            .with_error(2, ProviderError::Api("502 Bad Gateway".to_string()))
            .with_status(3, MergeStatus::Conflicting)
            .with_status(4, MergeStatus::Closed)
            .with_mismatch(5, 99)
            .with_status(6, MergeStatus::Merged),
    );
    let config = ConfigBuilder::new().max_concurrent_jobs(2).build();
    let scheduler = scheduler_with(config, Arc::clone(&fetcher));

    let ids: Vec<_> = (1..=6)
        .map(|pr| scheduler.add_job(MergeJob::new(pr, 0)))
        .collect::<Result<_, _>>()?;
    scheduler.start().await?;

    let snap = wait_for_status(&scheduler, |s| s.total_processed + s.total_errors == 6).await;
    assert_eq!(snap.total_processed, 2);
    assert_eq!(snap.total_errors, 4);
    assert_eq!(snap.active_jobs, 0);

    let statuses: Vec<_> = ids.iter().map(|id| scheduler.job_status(*id)).collect();
    assert_eq!(
        statuses,
        vec![
            Some(JobStatus::Completed),
            Some(JobStatus::Failed),
            Some(JobStatus::Failed),
            Some(JobStatus::Failed),
            Some(JobStatus::Failed),
            Some(JobStatus::Completed),
        ]
    );

    scheduler.stop().await?;
    Ok(())
}

#[tokio::test]
async fn panicking_fetch_is_recorded_as_failure() -> TestResult {
    init_tracing();

    let fetcher = Arc::new(FakeFetcher::new().with_panic(7));
    let config = ConfigBuilder::new().max_concurrent_jobs(1).build();
    let scheduler = scheduler_with(config, fetcher);

    let bad = scheduler.add_job(MergeJob::new(7, 0))?;
    let good = scheduler.add_job(MergeJob::new(8, 0))?;
    scheduler.start().await?;

    let snap = wait_for_status(&scheduler, |s| s.processed_order.len() == 2).await;
    assert_eq!(snap.total_errors, 1);
    assert_eq!(snap.total_processed, 1);
    assert_eq!(scheduler.job_status(bad), Some(JobStatus::Failed));
    assert_eq!(scheduler.job_status(good), Some(JobStatus::Completed));

    // The single worker survived the panic and the slot was returned.
    let later = scheduler.add_job(MergeJob::new(9, 0))?;
    wait_for_status(&scheduler, |s| s.processed_order.len() == 3).await;
    assert_eq!(scheduler.job_status(later), Some(JobStatus::Completed));

    scheduler.stop().await?;
    Ok(())
}

#[tokio::test]
async fn queue_full_is_recoverable() -> TestResult {
    init_tracing();

    let fetcher = Arc::new(FakeFetcher::new());
    let config = ConfigBuilder::new().max_queue_size(3).build();
    let scheduler = scheduler_with(config, fetcher);

    for pr in 1..=3 {
        scheduler.add_job(MergeJob::new(pr, 0))?;
    }
    let rejected = scheduler.add_job(MergeJob::new(4, 0));
    assert!(matches!(rejected, Err(MergeQueueError::QueueFull { capacity: 3 })));

    let snap = scheduler.status();
    assert_eq!(snap.queue_size, 3);
    assert_eq!(snap.total_processed, 0);
    assert_eq!(snap.total_errors, 0);

    scheduler.start().await?;
    wait_for_status(&scheduler, |s| s.total_processed == 3).await;

    let accepted = scheduler.add_job(MergeJob::new(4, 0))?;
    wait_for_status(&scheduler, |s| s.total_processed == 4).await;
    assert_eq!(scheduler.job_status(accepted), Some(JobStatus::Completed));
    assert_eq!(scheduler.status().processed_order.len(), 4);

    scheduler.stop().await?;
    Ok(())
}

#[tokio::test]
async fn invalid_jobs_are_rejected_without_side_effects() -> TestResult {
    init_tracing();

    let config = ConfigBuilder::new().max_priority(5).build();
    let scheduler = scheduler_with(config, Arc::new(FakeFetcher::new()));

    assert!(matches!(
        scheduler.add_job(MergeJob::new(0, 1)),
        Err(MergeQueueError::InvalidJob(_))
    ));
    assert!(matches!(
        scheduler.add_job(MergeJob::new(10, 6)),
        Err(MergeQueueError::InvalidJob(_))
    ));
    assert_eq!(scheduler.status().queue_size, 0);

    let id = scheduler.add_job(MergeJob::new(10, 5))?;
    assert_eq!(scheduler.job_status(id), Some(JobStatus::Queued));
    Ok(())
}

#[tokio::test]
async fn missing_credentials_fail_jobs() -> TestResult {
    init_tracing();

    let fetcher = Arc::new(FakeFetcher::new());
    let tokens = Arc::new(mergequeue::provider::EnvTokenProvider::new([
        "MERGEQUEUE_TEST_TOKEN_THAT_IS_NEVER_SET",
    ]));
    let scheduler = mergequeue::Scheduler::new(
        ConfigBuilder::new().build(),
        Arc::clone(&fetcher) as Arc<dyn mergequeue::provider::PullRequestFetcher>,
        tokens,
    );

    let id = scheduler.add_job(MergeJob::new(1, 0))?;
    scheduler.start().await?;

    let snap = wait_for_status(&scheduler, |s| s.total_errors == 1).await;
    assert_eq!(snap.total_processed, 0);
    assert_eq!(scheduler.job_status(id), Some(JobStatus::Failed));
    assert!(fetcher.calls().is_empty(), "fetch must not run without a token");

    scheduler.stop().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capacity_is_free_once_a_job_is_terminal() -> TestResult {
    init_tracing();

    let config = ConfigBuilder::new().max_queue_size(1).build();
    let scheduler = scheduler_with(config, Arc::new(FakeFetcher::new()));
    scheduler.start().await?;

    with_timeout(async {
        for pr in 1..=200 {
            let id = scheduler
                .add_job(MergeJob::new(pr, 0))
                .unwrap_or_else(|e| panic!("job {pr} rejected after previous finished: {e}"));
            while !scheduler.job_status(id).is_some_and(JobStatus::is_terminal) {
                tokio::task::yield_now().await;
            }
        }
    })
    .await;

    assert_eq!(scheduler.status().total_processed, 200);
    scheduler.stop().await?;
    Ok(())
}
