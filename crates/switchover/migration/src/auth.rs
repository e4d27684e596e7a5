//! Owner credentials
//!
//! Single-device migrations write on behalf of the device's owner so the
//! registry attributes the change to them. A [`TokenProvider`] hands out
//! those per-user credentials.

use async_trait::async_trait;
use dashmap::DashMap;
use switchover_types::Credential;
use thiserror::Error;
use tracing::debug;

/// Token provider errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No token issued for user '{username}'")]
    TokenNotFound { username: String },

    #[error("Token request rejected with status {status}")]
    Rejected { status: u16 },

    #[error("Token request failed: {0}")]
    Transport(String),
}

/// Source of per-user bearer credentials
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token_for(&self, username: &str) -> Result<Credential, AuthError>;
}

/// Memoises another provider's tokens by username
pub struct CachingTokenProvider<P> {
    inner: P,
    cache: DashMap<String, Credential>,
}

impl<P: TokenProvider> CachingTokenProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn cached_users(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl<P: TokenProvider> TokenProvider for CachingTokenProvider<P> {
    async fn token_for(&self, username: &str) -> Result<Credential, AuthError> {
        if let Some(credential) = self.cache.get(username) {
            debug!(username = username, "Using cached user token");
            return Ok(credential.clone());
        }

        let credential = self.inner.token_for(username).await?;
        self.cache.insert(username.to_string(), credential.clone());
        Ok(credential)
    }
}
