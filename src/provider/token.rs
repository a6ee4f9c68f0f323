// src/provider/token.rs

use super::{AccessToken, ProviderError, TokenProvider};

/// Environment variables consulted by [`EnvTokenProvider::default`], in order.
pub const DEFAULT_TOKEN_VARS: &[&str] = &["MERGEQUEUE_TOKEN", "GITHUB_TOKEN"];

/// Reads the access token from the first non-empty environment variable.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    vars: Vec<String>,
}

impl EnvTokenProvider {
    pub fn new<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_VARS.iter().copied())
    }
}

impl TokenProvider for EnvTokenProvider {
    fn get_token(&self) -> Result<AccessToken, ProviderError> {
        self.vars
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| {
                ProviderError::Credentials(format!("none of {:?} is set", self.vars))
            })
    }
}

/// Always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(secret),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn get_token(&self) -> Result<AccessToken, ProviderError> {
        Ok(self.token.clone())
    }
}
