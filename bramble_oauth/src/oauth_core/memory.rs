//! In-memory default implementations for OAuth core traits.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tracing::debug;

use super::oauth_provider::{ClientProvider, ConsumeError, TokenCache, TokenValidator};
use super::types::{OAuthClient, OAuthToken};

#[derive(Debug, Clone, Default)]
pub struct InMemoryClientProvider {
    clients: Arc<DashMap<String, OAuthClient>>,
}

impl InMemoryClientProvider {
    /// Creates a provider with an initial set of clients.
    pub fn new(initial_clients: impl IntoIterator<Item = OAuthClient>) -> Self {
        let map = DashMap::new();
        for client in initial_clients {
            map.insert(client.client_id.clone(), client);
        }
        Self { clients: Arc::new(map) }
    }

    /// Adds or replaces a registration.
    pub fn register(&self, client: OAuthClient) {
        self.clients.insert(client.client_id.clone(), client);
    }

    pub fn unregister(&self, client_id: &str) -> Option<OAuthClient> {
        self.clients.remove(client_id).map(|(_, client)| client)
    }
}

#[async_trait]
impl ClientProvider for InMemoryClientProvider {
    async fn get(&self, client_id: &str) -> Option<OAuthClient> {
        self.clients.get(client_id).map(|entry| entry.value().clone())
    }
}

/// Token cache on a sharded concurrent map.
///
/// Consumed keys leave a tombstone until the token would have expired, so a
/// replayed code is told apart from one that never existed.
#[derive(Debug, Default)]
pub struct InMemoryTokenCache {
    tokens: DashMap<String, OAuthToken>,
    consumed: DashMap<String, DateTime<Utc>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Purges expired entries every `period` until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    debug!(purged, "token cache sweep");
                }
            }
        })
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn add(&self, token: OAuthToken) {
        self.consumed.remove(&token.key);
        self.tokens.insert(token.key.clone(), token);
    }

    async fn get(&self, key: &str) -> Option<OAuthToken> {
        self.tokens.get(key).map(|entry| entry.value().clone())
    }

    async fn remove(&self, key: &str) -> Option<OAuthToken> {
        self.tokens.remove(key).map(|(_, token)| token)
    }

    async fn consume(&self, key: &str, validate: TokenValidator<'_>) -> Result<OAuthToken, ConsumeError> {
        match self.tokens.entry(key.to_string()) {
            Entry::Vacant(_) => {
                if self.consumed.contains_key(key) {
                    Err(ConsumeError::Reused)
                } else {
                    Err(ConsumeError::NotFound)
                }
            }
            Entry::Occupied(entry) => {
                if entry.get().is_expired() {
                    entry.remove();
                    return Err(ConsumeError::Expired);
                }
                validate(entry.get()).map_err(ConsumeError::Rejected)?;
                // Tombstone first: a waiter on this shard must see it once the entry is gone.
                self.consumed.insert(key.to_string(), entry.get().expires_at());
                Ok(entry.remove())
            }
        }
    }

    async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, token| !token.is_expired_at(now));
        self.consumed.retain(|_, expires_at| *expires_at > now);
        before.saturating_sub(self.tokens.len())
    }

    async fn len(&self) -> usize {
        self.tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth_core::error::{OAuthError, OAuthErrorKind};
    use crate::oauth_core::types::{GrantType, TokenKind, TokenSubType};

    fn code(key: &str, lifetime: u64) -> OAuthToken {
        OAuthToken {
            key: key.into(),
            kind: TokenKind::AuthorizationGrant,
            sub_type: TokenSubType::AuthorizationCode,
            client_id: "client".into(),
            username: "user".into(),
            redirect_uri: None,
            scopes: Vec::new(),
            state: None,
            created_at: Utc::now(),
            lifetime,
            code_challenge: None,
            code_challenge_method: None,
            grant_type: GrantType::AuthorizationCode,
        }
    }

    fn accept(_: &OAuthToken) -> Result<(), OAuthError> {
        Ok(())
    }

    #[tokio::test]
    async fn test_consume_once_then_reused() {
        let cache = InMemoryTokenCache::new();
        cache.add(code("abc", 60)).await;
        assert_eq!(cache.consume("abc", &accept).await.unwrap().key, "abc");
        assert_eq!(cache.consume("abc", &accept).await, Err(ConsumeError::Reused));
        assert_eq!(cache.consume("other", &accept).await, Err(ConsumeError::NotFound));
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_rejected_token_stays() {
        let cache = InMemoryTokenCache::new();
        cache.add(code("abc", 60)).await;
        let reject = |_: &OAuthToken| -> Result<(), OAuthError> {
            Err(OAuthErrorKind::MissingParameter("redirect_uri".into()).into())
        };
        assert!(matches!(cache.consume("abc", &reject).await, Err(ConsumeError::Rejected(_))));
        assert!(cache.get("abc").await.is_some());
    }

    #[tokio::test]
    async fn test_expired_token_removed_on_consume() {
        let cache = InMemoryTokenCache::new();
        let mut stale = code("old", 1);
        stale.created_at = Utc::now() - chrono::Duration::seconds(5);
        cache.add(stale).await;
        assert_eq!(cache.consume("old", &accept).await, Err(ConsumeError::Expired));
        assert!(cache.get("old").await.is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = InMemoryTokenCache::new();
        let mut stale = code("old", 1);
        stale.created_at = Utc::now() - chrono::Duration::seconds(5);
        cache.add(stale).await;
        cache.add(code("fresh", 60)).await;
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_client_registration() {
        let provider = InMemoryClientProvider::new([OAuthClient::confidential("key", "secret", ["https://a.example/cb"])]);
        assert!(provider.validate_secret("key", "secret").await);
        assert!(!provider.validate_secret("key", "wrong").await);
        provider.register(OAuthClient::public("pub", ["https://b.example/cb"]));
        assert!(provider.get("pub").await.is_some());
        assert!(provider.unregister("pub").is_some());
        assert!(provider.get("pub").await.is_none());
    }
}
