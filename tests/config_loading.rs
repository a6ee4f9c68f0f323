// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use mergequeue::config::{DEFAULT_MAX_PRIORITY, load_and_validate};
use mergequeue::errors::MergeQueueError;
use mergequeue::types::MergeStatus;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_loads() {
    let file = write_config(
        r#"
[queue]
max_queue_size = 50
max_concurrent_jobs = 3
processing_interval = "250ms"
rate_limit_requests = 30
rate_limit_interval = "1m"
drain_timeout = "5s"
history_limit = 20

[[job]]
pr = 42
priority = 1

[[job]]
pr = 7

[pull_request.42]
title = "Add feature"
head = "feature/x"
author = "octo"
status = "clean"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.queue.max_queue_size(), 50);
    assert_eq!(cfg.queue.max_concurrent_jobs(), 3);
    assert_eq!(cfg.queue.processing_interval(), Duration::from_millis(250));
    assert_eq!(cfg.queue.rate_limit_requests(), 30);
    assert_eq!(cfg.queue.rate_limit_interval(), Duration::from_secs(60));
    assert_eq!(cfg.queue.max_priority(), DEFAULT_MAX_PRIORITY);
    assert_eq!(cfg.queue.drain_timeout(), Duration::from_secs(5));
    assert_eq!(cfg.queue.history_limit(), 20);

    let jobs: Vec<_> = cfg.jobs.iter().map(|j| (j.pr_number, j.priority)).collect();
    assert_eq!(jobs, vec![(42, 1), (7, 0)]);

    let pr = &cfg.pull_requests[&42];
    assert_eq!(pr.base_branch, "main");
    assert_eq!(pr.merge_status, MergeStatus::Mergeable);
}

#[test]
fn negative_limit_is_invalid_config() {
    let file = write_config(
        r#"
[queue]
max_queue_size = 10
max_concurrent_jobs = -1
processing_interval = "100ms"
rate_limit_requests = 5
rate_limit_interval = "1s"
"#,
    );

    match load_and_validate(file.path()) {
        Err(MergeQueueError::InvalidConfig(msg)) => {
            assert!(msg.contains("max_concurrent_jobs"), "{msg}");
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn zero_duration_is_invalid_config() {
    let file = write_config(
        r#"
[queue]
max_queue_size = 10
max_concurrent_jobs = 1
processing_interval = "0ms"
rate_limit_requests = 5
rate_limit_interval = "1s"
"#,
    );

    match load_and_validate(file.path()) {
        Err(MergeQueueError::InvalidConfig(msg)) => {
            assert!(msg.contains("processing_interval"), "{msg}");
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn job_priority_above_max_is_rejected() {
    let file = write_config(
        r#"
[queue]
max_queue_size = 10
max_concurrent_jobs = 1
processing_interval = "100ms"
rate_limit_requests = 5
rate_limit_interval = "1s"
max_priority = 3

[[job]]
pr = 1
priority = 4
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(MergeQueueError::InvalidConfig(_))
    ));
}

#[test]
fn unknown_merge_status_is_rejected() {
    let file = write_config(
        r#"
[queue]
max_queue_size = 10
max_concurrent_jobs = 1
processing_interval = "100ms"
rate_limit_requests = 5
rate_limit_interval = "1s"

[pull_request.3]
status = "approved"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(MergeQueueError::InvalidConfig(_))
    ));
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = write_config("[queue\nmax_queue_size = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(MergeQueueError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        load_and_validate(dir.path().join("MergeQueue.toml")),
        Err(MergeQueueError::IoError(_))
    ));
}
