// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::time::Duration;

use thiserror::Error;

use crate::provider::ProviderError;
use crate::types::{JobId, PrNumber};

#[derive(Error, Debug)]
pub enum MergeQueueError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Merge queue is already started")]
    AlreadyStarted,

    #[error("Merge queue is not started")]
    NotStarted,

    #[error("In-flight jobs did not drain within {0:?}")]
    DrainTimeout(Duration),

    #[error("Failed to fetch pull request #{pr}: {source}")]
    FetchFailed {
        pr: PrNumber,
        #[source]
        source: ProviderError,
    },

    #[error("Pull request #{pr} cannot be merged: {reason}")]
    MergeBlocked { pr: PrNumber, reason: String },

    #[error("Job {0} panicked while processing")]
    JobPanicked(JobId),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MergeQueueError>;
