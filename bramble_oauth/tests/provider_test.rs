use std::sync::Arc;
use std::time::Duration;

use bramble_oauth::{
    ClientProvider, ConsumeError, GrantType, InMemoryClientProvider, InMemoryTokenCache, OAuthClient, OAuthError, OAuthToken,
    TokenCache, TokenKind, TokenSubType,
};
use chrono::Utc;

fn refresh(key: &str, lifetime: u64) -> OAuthToken {
    OAuthToken {
        key: key.to_string(),
        kind: TokenKind::AuthorizationGrant,
        sub_type: TokenSubType::RefreshToken,
        client_id: "client1".to_string(),
        username: "alice".to_string(),
        redirect_uri: None,
        scopes: vec!["read".to_string()],
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
async fn test_in_memory_client_provider() {
    let client = OAuthClient::confidential("client1", "secret", ["https://app.local/callback"]).with_display_name("App");
    let provider = InMemoryClientProvider::new(vec![client.clone()]);
    let fetched = provider.get("client1").await.unwrap();
    assert_eq!(fetched, client);
    assert!(provider.validate_secret("client1", "secret").await);
    assert!(provider.get("missing").await.is_none());
    assert!(!provider.validate_secret("missing", "secret").await);
}

#[tokio::test]
async fn test_in_memory_token_cache() {
    let cache = InMemoryTokenCache::new();
    cache.add(refresh("r1", 60)).await;
    assert_eq!(cache.get("r1").await.unwrap().username, "alice");
    assert_eq!(cache.remove("r1").await.map(|token| token.key), Some("r1".to_string()));
    assert!(cache.get("r1").await.is_none());
    // Removal is not consumption.
    assert_eq!(cache.consume("r1", &accept).await, Err(ConsumeError::NotFound));
}

#[tokio::test]
async fn test_reissued_key_is_consumable_again() {
    let cache = InMemoryTokenCache::new();
    cache.add(refresh("r1", 60)).await;
    assert!(cache.consume("r1", &accept).await.is_ok());
    cache.add(refresh("r1", 60)).await;
    assert!(cache.consume("r1", &accept).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_purges_expired() {
    let cache = Arc::new(InMemoryTokenCache::new());
    let mut stale = refresh("old", 1);
    stale.created_at = Utc::now() - chrono::Duration::seconds(10);
    cache.add(stale).await;
    cache.add(refresh("new", 600)).await;

    let sweeper = cache.spawn_sweeper(Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(cache.len().await, 1);
    assert!(cache.get("new").await.is_some());
    sweeper.abort();
}
