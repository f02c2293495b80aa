//! Storage seams of the OAuth provider.

use async_trait::async_trait;

use super::error::OAuthError;
use super::types::{OAuthClient, OAuthToken};

/// Looks up registered clients.
#[async_trait]
pub trait ClientProvider: Send + Sync + 'static {
    /// Returns the client registered under `client_id`, enabled or not.
    async fn get(&self, client_id: &str) -> Option<OAuthClient>;

    /// Checks a presented secret against the registration.
    async fn validate_secret(&self, client_id: &str, secret: &str) -> bool {
        self.get(client_id)
            .await
            .and_then(|client| client.client_secret)
            .is_some_and(|expected| expected == secret)
    }
}

/// Why [`TokenCache::consume`] did not hand out a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeError {
    NotFound,
    /// The key was consumed earlier.
    Reused,
    /// The token had expired; it has been removed.
    Expired,
    /// The validator refused the token; it is left in the cache.
    Rejected(OAuthError),
}

/// Validation run by [`TokenCache::consume`] while the entry is locked.
pub type TokenValidator<'a> = &'a (dyn Fn(&OAuthToken) -> Result<(), OAuthError> + Send + Sync);

/// Holds codes and tokens between issue and use.
#[async_trait]
pub trait TokenCache: Send + Sync + 'static {
    async fn add(&self, token: OAuthToken);

    async fn get(&self, key: &str) -> Option<OAuthToken>;

    async fn remove(&self, key: &str) -> Option<OAuthToken>;

    /// Atomically validates and removes the token under `key`.
    ///
    /// Of any number of concurrent calls for one key, at most one returns
    /// `Ok`; the others see [`ConsumeError::Reused`].
    async fn consume(&self, key: &str, validate: TokenValidator<'_>) -> Result<OAuthToken, ConsumeError>;

    /// Drops expired tokens and returns how many were removed.
    async fn purge_expired(&self) -> usize;

    async fn len(&self) -> usize;
}
