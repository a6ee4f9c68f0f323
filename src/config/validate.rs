// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::model::{
    ConfigFile, DEFAULT_DRAIN_TIMEOUT, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_PRIORITY,
    MAX_CONCURRENT_JOBS, MergeQueueConfig, RawConfigFile, RawPullRequest, RawQueueSection,
};
use crate::errors::{MergeQueueError, Result};
use crate::types::{MergeJob, PrNumber, Priority, PullRequestInfo};

impl MergeQueueConfig {
    /// Build a configuration, rejecting any non-positive field.
    pub fn new(
        max_queue_size: usize,
        max_concurrent_jobs: usize,
        processing_interval: Duration,
        rate_limit_requests: u32,
        rate_limit_interval: Duration,
    ) -> Result<Self> {
        ensure_positive("max_queue_size", max_queue_size as u128)?;
        ensure_positive("max_concurrent_jobs", max_concurrent_jobs as u128)?;
        if max_concurrent_jobs > MAX_CONCURRENT_JOBS {
            return Err(MergeQueueError::InvalidConfig(format!(
                "max_concurrent_jobs must be at most {MAX_CONCURRENT_JOBS} (got {max_concurrent_jobs})"
            )));
        }
        ensure_positive_duration("processing_interval", processing_interval)?;
        ensure_positive("rate_limit_requests", rate_limit_requests as u128)?;
        ensure_positive_duration("rate_limit_interval", rate_limit_interval)?;

        Ok(Self {
            max_queue_size,
            max_concurrent_jobs,
            processing_interval,
            rate_limit_requests,
            rate_limit_interval,
            max_priority: DEFAULT_MAX_PRIORITY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            history_limit: DEFAULT_HISTORY_LIMIT,
        })
    }

    /// Highest priority value `add_job` accepts.
    pub fn with_max_priority(mut self, max_priority: Priority) -> Self {
        self.max_priority = max_priority;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Result<Self> {
        ensure_positive_duration("drain_timeout", timeout)?;
        self.drain_timeout = timeout;
        Ok(self)
    }

    pub fn with_history_limit(mut self, limit: usize) -> Result<Self> {
        ensure_positive("history_limit", limit as u128)?;
        self.history_limit = limit;
        Ok(self)
    }
}

fn ensure_positive(field: &str, value: u128) -> Result<()> {
    if value == 0 {
        return Err(MergeQueueError::InvalidConfig(format!(
            "{field} must be > 0 (got 0)"
        )));
    }
    Ok(())
}

fn ensure_positive_duration(field: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(MergeQueueError::InvalidConfig(format!(
            "{field} must be a positive duration (got 0)"
        )));
    }
    Ok(())
}

fn positive_int(field: &str, value: i64) -> Result<u64> {
    if value <= 0 {
        return Err(MergeQueueError::InvalidConfig(format!(
            "{field} must be > 0 (got {value})"
        )));
    }
    Ok(value as u64)
}

fn duration_field(field: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| MergeQueueError::InvalidConfig(format!("{field}: {e}")))
}

impl TryFrom<RawQueueSection> for MergeQueueConfig {
    type Error = MergeQueueError;

    fn try_from(raw: RawQueueSection) -> std::result::Result<Self, Self::Error> {
        let max_queue_size = positive_int("max_queue_size", raw.max_queue_size)?;
        let max_concurrent_jobs = positive_int("max_concurrent_jobs", raw.max_concurrent_jobs)?;
        let rate_limit_requests = positive_int("rate_limit_requests", raw.rate_limit_requests)?;
        let rate_limit_requests = u32::try_from(rate_limit_requests).map_err(|_| {
            MergeQueueError::InvalidConfig(format!(
                "rate_limit_requests must fit in 32 bits (got {rate_limit_requests})"
            ))
        })?;

        let mut cfg = MergeQueueConfig::new(
            max_queue_size as usize,
            max_concurrent_jobs as usize,
            duration_field("processing_interval", &raw.processing_interval)?,
            rate_limit_requests,
            duration_field("rate_limit_interval", &raw.rate_limit_interval)?,
        )?;

        if let Some(max_priority) = raw.max_priority {
            let max_priority = Priority::try_from(max_priority).map_err(|_| {
                MergeQueueError::InvalidConfig(format!(
                    "max_priority must be between 0 and {} (got {max_priority})",
                    Priority::MAX
                ))
            })?;
            cfg = cfg.with_max_priority(max_priority);
        }
        if let Some(ref timeout) = raw.drain_timeout {
            cfg = cfg.with_drain_timeout(duration_field("drain_timeout", timeout)?)?;
        }
        if let Some(limit) = raw.history_limit {
            cfg = cfg.with_history_limit(positive_int("history_limit", limit)? as usize)?;
        }

        Ok(cfg)
    }
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MergeQueueError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let queue = MergeQueueConfig::try_from(raw.queue)?;

        let mut jobs = Vec::with_capacity(raw.job.len());
        for (idx, job) in raw.job.iter().enumerate() {
            let pr = positive_int(&format!("job[{idx}].pr"), job.pr)?;
            if job.priority < 0 || job.priority > queue.max_priority as i64 {
                return Err(MergeQueueError::InvalidConfig(format!(
                    "job[{idx}].priority must be between 0 and {} (got {})",
                    queue.max_priority, job.priority
                )));
            }
            jobs.push(MergeJob::new(pr, job.priority as Priority));
        }

        if jobs.len() > queue.max_queue_size {
            return Err(MergeQueueError::InvalidConfig(format!(
                "{} jobs listed but max_queue_size is {}",
                jobs.len(),
                queue.max_queue_size
            )));
        }

        let mut pull_requests = BTreeMap::new();
        for (key, pr) in raw.pull_request {
            let number = parse_pr_key(&key)?;
            pull_requests.insert(number, pull_request_from_raw(number, pr)?);
        }

        Ok(ConfigFile {
            queue,
            jobs,
            pull_requests,
        })
    }
}

fn parse_pr_key(key: &str) -> Result<PrNumber> {
    match key.trim().parse::<PrNumber>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(MergeQueueError::InvalidConfig(format!(
            "[pull_request.{key}]: key must be a positive pull request number"
        ))),
    }
}

fn pull_request_from_raw(number: PrNumber, raw: RawPullRequest) -> Result<PullRequestInfo> {
    let merge_status = raw
        .status
        .parse()
        .map_err(|e| MergeQueueError::InvalidConfig(format!("[pull_request.{number}]: {e}")))?;

    Ok(PullRequestInfo {
        number,
        title: raw.title,
        base_branch: raw.base,
        head_branch: raw.head,
        author: raw.author,
        merge_status,
    })
}

/// Parse durations like `"250ms"`, `"3s"`, `"5m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(value.saturating_mul(3600))),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
