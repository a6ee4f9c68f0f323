// src/config/mod.rs

//! Configuration for the merge queue.
//!
//! - [`model`] holds the validated [`MergeQueueConfig`] and the TOML-backed
//!   file model.
//! - [`loader`] reads a config file from disk.
//! - [`validate`] enforces the positivity invariants and parses durations.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, MergeQueueConfig, RawConfigFile, RawJob, RawPullRequest, RawQueueSection,
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_PRIORITY, MAX_CONCURRENT_JOBS,
};
pub use validate::parse_duration;
