// src/engine/mod.rs

//! Orchestration engine for the merge queue.
//!
//! This module ties together:
//! - the bounded priority queue of accepted jobs ([`queue`])
//! - the token bucket gating job admission ([`limiter`])
//! - the dispatch loop moving jobs from the queue to the worker pool
//!   ([`dispatch`])
//! - the [`Scheduler`] owning all of the above and its start/stop lifecycle
//!   ([`scheduler`])
//!
//! Workers themselves live in [`crate::exec`].

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod dispatch;
pub mod limiter;
pub mod queue;
pub mod scheduler;

pub use limiter::AdmissionLimiter;
pub use queue::PriorityJobQueue;
pub use scheduler::Scheduler;

/// Lock a std mutex, recovering the data if a previous holder panicked.
///
/// Critical sections in the engine never leave state half-updated, so a
/// poisoned lock still guards consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
