// src/provider/manifest.rs

//! Fetcher backed by a fixed table of pull requests.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

use super::{AccessToken, ProviderError, ProviderFuture, PullRequestFetcher};
use crate::types::{PrNumber, PullRequestInfo};

/// Serves pull requests from an in-memory manifest.
///
/// Used by the CLI for offline runs: the `[pull_request.N]` tables of the
/// config file describe what the provider would have returned. Unknown
/// numbers fail with [`ProviderError::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct ManifestFetcher {
    pulls: BTreeMap<PrNumber, PullRequestInfo>,
    latency: Duration,
}

impl ManifestFetcher {
    pub fn new(pulls: BTreeMap<PrNumber, PullRequestInfo>) -> Self {
        Self {
            pulls,
            latency: Duration::ZERO,
        }
    }

    /// Simulated round-trip time for each fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl PullRequestFetcher for ManifestFetcher {
    fn fetch_pull_request<'a>(
        &'a self,
        pr_number: PrNumber,
        token: &'a AccessToken,
    ) -> ProviderFuture<'a, PullRequestInfo> {
        Box::pin(async move {
            if token.expose().is_empty() {
                return Err(ProviderError::Credentials("empty access token".to_string()));
            }
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            let pr = self
                .pulls
                .get(&pr_number)
                .cloned()
                .ok_or(ProviderError::NotFound(pr_number))?;
            debug!(pr = pr_number, status = ?pr.merge_status, "served pull request from manifest");
            Ok(pr)
        })
    }
}
