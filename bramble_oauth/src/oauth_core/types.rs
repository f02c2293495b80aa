//! OAuth 2.0 core primitives: grant and response types, clients and tokens.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

pub const PARAM_CLIENT_ID: &str = "client_id";
pub const PARAM_CLIENT_SECRET: &str = "client_secret";
pub const PARAM_GRANT_TYPE: &str = "grant_type";
pub const PARAM_RESPONSE_TYPE: &str = "response_type";
pub const PARAM_REDIRECT_URI: &str = "redirect_uri";
pub const PARAM_CODE: &str = "code";
pub const PARAM_REFRESH_TOKEN: &str = "refresh_token";
pub const PARAM_SCOPE: &str = "scope";
pub const PARAM_STATE: &str = "state";
pub const PARAM_USERNAME: &str = "username";
pub const PARAM_CODE_CHALLENGE: &str = "code_challenge";
pub const PARAM_CODE_CHALLENGE_METHOD: &str = "code_challenge_method";
pub const PARAM_CODE_VERIFIER: &str = "code_verifier";
pub const PARAM_ACCESS_TOKEN: &str = "access_token";

pub const ATTR_TOKEN_TYPE: &str = "token_type";
pub const ATTR_EXPIRES_IN: &str = "expires_in";
pub const ATTR_AUTHORIZATION_CODE_ID: &str = "authorization_code_id";
pub const ATTR_ACCESS_TOKEN_ID: &str = "access_token_id";
pub const ATTR_REFRESH_TOKEN_ID: &str = "refresh_token_id";
pub const ATTR_AUTHORIZED: &str = "authorized";
pub const ATTR_REQUEST_TYPE: &str = "request_type";

/// Parameters that may appear at most once in a request.
pub const SINGLE_VALUED_PARAMETERS: [&str; 11] = [
    PARAM_CLIENT_ID,
    PARAM_CLIENT_SECRET,
    PARAM_GRANT_TYPE,
    PARAM_RESPONSE_TYPE,
    PARAM_REDIRECT_URI,
    PARAM_CODE,
    PARAM_REFRESH_TOKEN,
    PARAM_STATE,
    PARAM_CODE_CHALLENGE,
    PARAM_CODE_CHALLENGE_METHOD,
    PARAM_CODE_VERIFIER,
];

/// Grant types an OAuth provider can be configured to allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    Implicit,
    RefreshToken,
    ClientCredentials,
}

impl GrantType {
    pub const ALL: [GrantType; 4] = [
        GrantType::AuthorizationCode,
        GrantType::Implicit,
        GrantType::RefreshToken,
        GrantType::ClientCredentials,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::Implicit => "implicit",
            GrantType::RefreshToken => "refresh_token",
            GrantType::ClientCredentials => "client_credentials",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|grant_type| grant_type.as_str() == value)
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `response_type` values of the authorization endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    Code,
    Token,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Code => "code",
            ResponseType::Token => "token",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(ResponseType::Code),
            "token" => Some(ResponseType::Token),
            _ => None,
        }
    }

    /// The grant type that must be allowed for this response type.
    pub fn grant_type(&self) -> GrantType {
        match self {
            ResponseType::Code => GrantType::AuthorizationCode,
            ResponseType::Token => GrantType::Implicit,
        }
    }
}

/// Cache category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AuthorizationGrant,
    AccessToken,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::AuthorizationGrant => "authorization_grant",
            TokenKind::AccessToken => "access_token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenSubType {
    #[serde(rename = "authorization_code")]
    AuthorizationCode,
    #[serde(rename = "refresh_token")]
    RefreshToken,
    Bearer,
}

impl TokenSubType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSubType::AuthorizationCode => "authorization_code",
            TokenSubType::RefreshToken => "refresh_token",
            TokenSubType::Bearer => "Bearer",
        }
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            TokenSubType::AuthorizationCode | TokenSubType::RefreshToken => TokenKind::AuthorizationGrant,
            TokenSubType::Bearer => TokenKind::AccessToken,
        }
    }
}

impl fmt::Display for TokenSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PKCE transform applied to the code verifier (RFC 7636).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    #[serde(rename = "plain")]
    Plain,
    S256,
}

impl CodeChallengeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeChallengeMethod::Plain => "plain",
            CodeChallengeMethod::S256 => "S256",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plain" => Some(CodeChallengeMethod::Plain),
            "S256" => Some(CodeChallengeMethod::S256),
            _ => None,
        }
    }
}

/// A registered OAuth 2.0 client.
///
/// A client with a secret is confidential; one without is public.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uris: Vec<String>,
    /// Scopes the client may be granted. Empty means unrestricted.
    #[serde(default)]
    pub scopes: Vec<String>,
    pub enabled: bool,
    pub display_name: Option<String>,
}

impl OAuthClient {
    pub fn confidential(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uris: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            redirect_uris: redirect_uris.into_iter().map(Into::into).collect(),
            scopes: Vec::new(),
            enabled: true,
            display_name: None,
        }
    }

    pub fn public(client_id: impl Into<String>, redirect_uris: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uris: redirect_uris.into_iter().map(Into::into).collect(),
            scopes: Vec::new(),
            enabled: true,
            display_name: None,
        }
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_confidential(&self) -> bool {
        self.client_secret.as_deref().is_some_and(|secret| !secret.is_empty())
    }
}

/// An issued code or token as held by the token cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    /// The opaque value handed to the client; also the cache key.
    pub key: String,
    pub kind: TokenKind,
    pub sub_type: TokenSubType,
    pub client_id: String,
    pub username: String,
    /// Redirect URI the grant was issued for, if any.
    pub redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Lifetime in seconds.
    pub lifetime: u64,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<CodeChallengeMethod>,
    pub grant_type: GrantType,
}

impl OAuthToken {
    /// Saturates at the latest representable instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        i64::try_from(self.lifetime)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|lifetime| self.created_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Whole seconds left before expiry, zero once expired.
    pub fn expires_in(&self) -> u64 {
        let remaining = (self.expires_at() - Utc::now()).num_seconds();
        u64::try_from(remaining).unwrap_or(0)
    }

    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(lifetime: u64) -> OAuthToken {
        OAuthToken {
            key: "k".into(),
            kind: TokenKind::AuthorizationGrant,
            sub_type: TokenSubType::AuthorizationCode,
            client_id: "client".into(),
            username: "user".into(),
            redirect_uri: None,
            scopes: vec!["read".into(), "write".into()],
            state: None,
            created_at: Utc::now(),
            lifetime,
            code_challenge: None,
            code_challenge_method: None,
            grant_type: GrantType::AuthorizationCode,
        }
    }

    #[test]
    fn test_grant_type_names() {
        for grant_type in GrantType::ALL {
            assert_eq!(GrantType::parse(grant_type.as_str()), Some(grant_type));
        }
        assert_eq!(GrantType::parse("password"), None);
        assert_eq!(ResponseType::parse("token").map(|r| r.grant_type()), Some(GrantType::Implicit));
    }

    #[test]
    fn test_token_expiry() {
        let fresh = token(60);
        assert!(!fresh.is_expired());
        assert!(fresh.expires_in() <= 60 && fresh.expires_in() >= 59);
        assert!(fresh.is_expired_at(fresh.created_at + TimeDelta::seconds(60)));
        assert_eq!(fresh.scope_string(), "read write");
    }

    #[test]
    fn test_unrepresentable_lifetime_never_expires() {
        for lifetime in [10_000_000_000_000, u64::MAX] {
            let forever = token(lifetime);
            assert_eq!(forever.expires_at(), DateTime::<Utc>::MAX_UTC);
            assert!(!forever.is_expired());
            assert!(forever.expires_in() > 0);
        }
    }

    #[test]
    fn test_confidential_needs_non_empty_secret() {
        assert!(OAuthClient::confidential("a", "s", ["https://a.example/cb"]).is_confidential());
        assert!(!OAuthClient::confidential("a", "", Vec::<String>::new()).is_confidential());
        assert!(!OAuthClient::public("b", ["https://b.example/cb"]).is_confidential());
    }

    #[test]
    fn test_registered_scopes_default_empty() {
        let client: OAuthClient = serde_json::from_str(
            r#"{"client_id":"a","client_secret":null,"redirect_uris":[],"enabled":true,"display_name":null}"#,
        )
        .unwrap();
        assert!(client.scopes.is_empty());
        let scoped = client.with_scopes(["read", "write"]);
        assert_eq!(scoped.scopes, vec!["read".to_string(), "write".to_string()]);
    }

    #[test]
    fn test_sub_type_serde_names() {
        let json = serde_json::to_string(&TokenSubType::RefreshToken).unwrap();
        assert_eq!(json, "\"refresh_token\"");
        assert_eq!(TokenSubType::Bearer.kind(), TokenKind::AccessToken);
    }
}
