// src/provider/mod.rs

//! Narrow interfaces to the collaborators the engine depends on.
//!
//! The scheduler never talks to a hosting provider or a secret store
//! directly. It holds a [`PullRequestFetcher`] and a [`TokenProvider`] and
//! calls them from worker tasks, never while holding one of its own locks.
//!
//! - [`manifest`] serves pull requests from a fixed table (the CLI uses it
//!   with the `[pull_request.N]` sections of the config file).
//! - [`token`] reads credentials from the environment.
//!
//! Tests plug in their own implementations (see `mergequeue-test-utils`).

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::types::{PrNumber, PullRequestInfo};

pub mod manifest;
pub mod token;

pub use manifest::ManifestFetcher;
pub use token::{EnvTokenProvider, StaticTokenProvider};

/// Errors reported by collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("pull request #{0} not found")]
    NotFound(PrNumber),

    #[error("provider API error: {0}")]
    Api(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("request cancelled")]
    Cancelled,
}

/// Boxed future returned by collaborator calls.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Credential handed to the fetcher. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Fetches current pull-request state from the hosting provider.
///
/// Implementations should not retry; a failed fetch fails the job. The
/// returned future may be dropped at any await point when the engine is
/// being torn down, which is how cancellation reaches the call.
pub trait PullRequestFetcher: Send + Sync {
    fn fetch_pull_request<'a>(
        &'a self,
        pr_number: PrNumber,
        token: &'a AccessToken,
    ) -> ProviderFuture<'a, PullRequestInfo>;
}

/// Supplies the credential used for provider calls.
pub trait TokenProvider: Send + Sync {
    fn get_token(&self) -> Result<AccessToken, ProviderError>;
}
