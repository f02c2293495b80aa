//! Token minting and per-grant validation used by the component.

use bramble_lib::random_alphanumeric_string;
use chrono::Utc;

use super::attributes::{AttributeList, AttributeType};
use super::config::OAuthConfig;
use super::crypto::verify_code_verifier;
use super::error::{OAuthError, OAuthErrorKind};
use super::oauth_provider::ConsumeError;
use super::types::{
    ATTR_ACCESS_TOKEN_ID, ATTR_EXPIRES_IN, ATTR_REFRESH_TOKEN_ID, ATTR_TOKEN_TYPE, CodeChallengeMethod, GrantType,
    OAuthToken, PARAM_ACCESS_TOKEN, PARAM_REFRESH_TOKEN, PARAM_SCOPE, TokenSubType,
};

/// Who and what a new token is issued for.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Issue<'a> {
    pub client_id: &'a str,
    pub username: &'a str,
    pub scopes: &'a [String],
    pub redirect_uri: Option<&'a str>,
    pub state: Option<&'a str>,
    pub grant_type: GrantType,
}

fn mint(sub_type: TokenSubType, length: usize, lifetime: u64, issue: Issue<'_>) -> OAuthToken {
    OAuthToken {
        key: random_alphanumeric_string(length),
        kind: sub_type.kind(),
        sub_type,
        client_id: issue.client_id.to_string(),
        username: issue.username.to_string(),
        redirect_uri: issue.redirect_uri.map(str::to_string),
        scopes: issue.scopes.to_vec(),
        state: issue.state.map(str::to_string),
        created_at: Utc::now(),
        lifetime,
        code_challenge: None,
        code_challenge_method: None,
        grant_type: issue.grant_type,
    }
}

pub(crate) fn authorization_code(
    config: &OAuthConfig,
    issue: Issue<'_>,
    challenge: Option<(String, CodeChallengeMethod)>,
) -> OAuthToken {
    let mut code = mint(TokenSubType::AuthorizationCode, config.code_length, config.code_lifetime, issue);
    if let Some((challenge, method)) = challenge {
        code.code_challenge = Some(challenge);
        code.code_challenge_method = Some(method);
    }
    code
}

pub(crate) fn access_token(config: &OAuthConfig, issue: Issue<'_>) -> OAuthToken {
    mint(TokenSubType::Bearer, config.access_token_length, config.token_lifetime, issue)
}

pub(crate) fn refresh_token(config: &OAuthConfig, issue: Issue<'_>) -> OAuthToken {
    mint(
        TokenSubType::RefreshToken,
        config.refresh_token_length,
        config.max_authorization_grant_lifetime,
        issue,
    )
}

/// Refresh tokens go out only when configured and redeemable.
pub(crate) fn issues_refresh_token(config: &OAuthConfig) -> bool {
    config.issue_refresh_token && config.is_grant_type_allowed(GrantType::RefreshToken)
}

fn not_found(grant: &OAuthToken, sub_type: TokenSubType) -> OAuthError {
    OAuthErrorKind::TokenNotFound {
        key: grant.key.clone(),
        kind: sub_type.kind(),
        sub_type,
    }
    .into()
}

fn check_client(grant: &OAuthToken, client_id: &str) -> Result<(), OAuthError> {
    if grant.client_id != client_id {
        return Err(OAuthErrorKind::GrantClientMismatch {
            request: client_id.to_string(),
            grant: grant.client_id.clone(),
        }
        .into());
    }
    Ok(())
}

/// Checks an authorization code against the token request presenting it.
pub(crate) fn validate_code_grant(
    grant: &OAuthToken,
    client_id: &str,
    redirect_uri: Option<&str>,
    code_verifier: Option<&str>,
) -> Result<(), OAuthError> {
    if grant.sub_type != TokenSubType::AuthorizationCode {
        return Err(not_found(grant, TokenSubType::AuthorizationCode));
    }
    check_client(grant, client_id)?;
    match (redirect_uri, grant.redirect_uri.as_deref()) {
        (Some(request), Some(issued)) if request != issued => {
            return Err(OAuthErrorKind::GrantRedirectMismatch {
                request: request.to_string(),
                grant: issued.to_string(),
            }
            .into());
        }
        (Some(request), None) => {
            return Err(OAuthErrorKind::GrantRedirectMismatch {
                request: request.to_string(),
                grant: "null".to_string(),
            }
            .into());
        }
        (None, Some(issued)) => {
            return Err(OAuthErrorKind::MissingRequestRedirect { grant: issued.to_string() }.into());
        }
        _ => {}
    }
    verify_code_verifier(grant.code_challenge.as_deref(), grant.code_challenge_method, code_verifier)
}

pub(crate) fn validate_refresh_grant(grant: &OAuthToken, client_id: &str) -> Result<(), OAuthError> {
    if grant.sub_type != TokenSubType::RefreshToken {
        return Err(not_found(grant, TokenSubType::RefreshToken));
    }
    check_client(grant, client_id)
}

/// Classifies a failed cache consumption.
pub(crate) fn consume_error(err: ConsumeError, key: &str, sub_type: TokenSubType) -> OAuthError {
    let key = key.to_string();
    let kind = sub_type.kind();
    match err {
        ConsumeError::NotFound => OAuthErrorKind::TokenNotFound { key, kind, sub_type }.into(),
        ConsumeError::Reused => OAuthErrorKind::TokenReused { key, kind, sub_type }.into(),
        ConsumeError::Expired => OAuthErrorKind::TokenExpired { key, kind, sub_type }.into(),
        ConsumeError::Rejected(err) => err,
    }
}

/// Writes the token response attributes for an issued access token.
pub(crate) fn token_response_attributes(
    attributes: &mut AttributeList,
    access: &OAuthToken,
    refresh: Option<&OAuthToken>,
) {
    attributes.set_single(PARAM_ACCESS_TOKEN, AttributeType::ResponseAttribute, access.key.clone());
    attributes.set_single(ATTR_TOKEN_TYPE, AttributeType::ResponseAttribute, TokenSubType::Bearer.as_str());
    attributes.set_single(ATTR_EXPIRES_IN, AttributeType::ResponseAttribute, access.lifetime.to_string());
    if !access.scopes.is_empty() {
        attributes.set_single(PARAM_SCOPE, AttributeType::ResponseAttribute, access.scope_string());
    }
    attributes.set_single(ATTR_ACCESS_TOKEN_ID, AttributeType::ResponseMeta, access.key.clone());
    if let Some(refresh) = refresh {
        attributes.set_single(PARAM_REFRESH_TOKEN, AttributeType::ResponseAttribute, refresh.key.clone());
        attributes.set_single(ATTR_REFRESH_TOKEN_ID, AttributeType::ResponseMeta, refresh.key.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth_core::config::{GRANT_TYPES_ALLOWED, OAuthConfig};

    fn config() -> OAuthConfig {
        OAuthConfig::from_properties([(GRANT_TYPES_ALLOWED, "authorization_code refresh_token")]).unwrap()
    }

    fn issue(scopes: &[String]) -> Issue<'_> {
        Issue {
            client_id: "key",
            username: "user",
            scopes,
            redirect_uri: Some("https://app.example/cb"),
            state: None,
            grant_type: GrantType::AuthorizationCode,
        }
    }

    #[test]
    fn test_minted_lengths_follow_config() {
        let config = config();
        let scopes = vec!["read".to_string()];
        assert_eq!(authorization_code(&config, issue(&scopes), None).key.len(), 30);
        assert_eq!(access_token(&config, issue(&scopes)).key.len(), 40);
        let refresh = refresh_token(&config, issue(&scopes));
        assert_eq!(refresh.key.len(), 50);
        assert_eq!(refresh.lifetime, 604_800);
        assert!(issues_refresh_token(&config));
    }

    #[test]
    fn test_code_redirect_checks() {
        let config = config();
        let code = authorization_code(&config, issue(&[]), None);
        assert!(validate_code_grant(&code, "key", Some("https://app.example/cb"), None).is_ok());

        let err = validate_code_grant(&code, "key", Some("https://evil.example/cb"), None).unwrap_err();
        assert_eq!(
            err.kind(),
            &OAuthErrorKind::GrantRedirectMismatch {
                request: "https://evil.example/cb".into(),
                grant: "https://app.example/cb".into(),
            }
        );
        let err = validate_code_grant(&code, "key", None, None).unwrap_err();
        assert!(matches!(err.kind(), OAuthErrorKind::MissingRequestRedirect { .. }));
    }

    #[test]
    fn test_code_client_and_type_checks() {
        let config = config();
        let code = authorization_code(&config, issue(&[]), None);
        let err = validate_code_grant(&code, "other", Some("https://app.example/cb"), None).unwrap_err();
        assert!(matches!(err.kind(), OAuthErrorKind::GrantClientMismatch { .. }));
        let err = validate_refresh_grant(&code, "key").unwrap_err();
        assert!(matches!(
            err.kind(),
            OAuthErrorKind::TokenNotFound { sub_type: TokenSubType::RefreshToken, .. }
        ));
    }

    #[test]
    fn test_consume_error_classification() {
        let err = consume_error(ConsumeError::Reused, "abc", TokenSubType::AuthorizationCode);
        assert!(matches!(err.kind(), OAuthErrorKind::TokenReused { .. }));
        assert!(err.message().contains("key abc of type authorization_grant"));
    }

    #[test]
    fn test_response_attributes() {
        let config = config();
        let scopes = vec!["a".to_string(), "b".to_string()];
        let access = access_token(&config, issue(&scopes));
        let mut attributes = AttributeList::new();
        token_response_attributes(&mut attributes, &access, None);
        assert_eq!(attributes.value_of(ATTR_TOKEN_TYPE, AttributeType::ResponseAttribute), Some("Bearer"));
        assert_eq!(attributes.value_of(PARAM_SCOPE, AttributeType::ResponseAttribute), Some("a b"));
        assert_eq!(attributes.value_of(ATTR_EXPIRES_IN, AttributeType::ResponseAttribute), Some("3600"));
        assert!(attributes.value_of(PARAM_REFRESH_TOKEN, AttributeType::ResponseAttribute).is_none());
    }
}
