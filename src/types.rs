use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pull request number as used by the hosting provider.
pub type PrNumber = u64;

/// Job priority. Lower values are more urgent.
pub type Priority = u32;

/// Engine-assigned identifier of a submitted job.
///
/// Ids are handed out in arrival order, so they double as the FIFO
/// tie-breaker inside a priority band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Lifecycle of a merge job.
///
/// `Pending` -> `Queued` -> `Processing` -> (`Completed` | `Failed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus::Pending
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A request to merge one pull request.
///
/// Built by the submitter in `Pending` state; the scheduler moves it to
/// `Queued` on acceptance. From then on the job is owned by exactly one
/// party at a time: the queue, or the worker that dequeued it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeJob {
    pub pr_number: PrNumber,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl MergeJob {
    pub fn new(pr_number: PrNumber, priority: Priority) -> Self {
        Self {
            pr_number,
            priority,
            created_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }
}

/// A job the scheduler has accepted, paired with its id.
///
/// This is the unit that moves from the queue to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedJob {
    pub id: JobId,
    pub job: MergeJob,
}

/// Mergeability of a pull request as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStatus {
    /// Checks have not settled yet.
    Pending,
    Mergeable,
    Conflicting,
    Closed,
    Merged,
}

impl Default for MergeStatus {
    fn default() -> Self {
        MergeStatus::Pending
    }
}

impl FromStr for MergeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(MergeStatus::Pending),
            "mergeable" | "clean" => Ok(MergeStatus::Mergeable),
            "conflicting" | "dirty" => Ok(MergeStatus::Conflicting),
            "closed" => Ok(MergeStatus::Closed),
            "merged" => Ok(MergeStatus::Merged),
            other => Err(format!(
                "invalid merge status: {other} (expected pending, mergeable, conflicting, closed or merged)"
            )),
        }
    }
}

/// Pull request metadata needed to judge merge eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: PrNumber,
    pub title: String,
    pub base_branch: String,
    pub head_branch: String,
    pub author: String,
    pub merge_status: MergeStatus,
}
