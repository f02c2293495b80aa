use std::sync::Arc;

use async_trait::async_trait;
use bramble_core::http::meta::HttpHeaders;
use bramble_oauth::oauth_core::config::{
    ACCESS_TOKEN_LENGTH, ALLOW_PUBLIC_CLIENTS, CODE_LIFETIME, GRANT_TYPES_ALLOWED, ISSUE_REFRESH_TOKEN, MAX_LIFETIME_SECONDS,
    TOKEN_LIFETIME,
};
use bramble_oauth::oauth_core::crypto::pkce_code_challenge;
use bramble_oauth::{
    AttributeList, AttributeType, AuthorizationRequest, InMemoryClientProvider, Mediator, OAuth20Component, OAuthClient,
    OAuthError, OAuthErrorKind, OAuthRequest, OAuthResult, OAuthResultStatus, PropertyValue,
};
use serde_json::Value;

const REDIRECT: &str = "https://app.example/callback";

fn clients() -> Arc<InMemoryClientProvider> {
    Arc::new(InMemoryClientProvider::new([
        OAuthClient::confidential("key", "secret", [REDIRECT]),
        OAuthClient::public("public", [REDIRECT]),
        OAuthClient::confidential("off", "secret", [REDIRECT]).disabled(),
        OAuthClient::confidential("scoped", "secret", [REDIRECT]).with_scopes(["read", "profile"]),
    ]))
}

fn component_with(extra: &[(&str, &str)]) -> OAuth20Component {
    let mut properties = vec![(
        GRANT_TYPES_ALLOWED.to_string(),
        PropertyValue::from("authorization_code implicit refresh_token client_credentials"),
    )];
    properties.extend(extra.iter().map(|(key, value)| (key.to_string(), PropertyValue::from(*value))));
    OAuth20Component::from_properties(properties, clients()).unwrap()
}

fn component() -> OAuth20Component {
    component_with(&[])
}

async fn authorize_code(component: &OAuth20Component) -> String {
    let result = component
        .process_authorization(
            AuthorizationRequest::new("user", "key", "code")
                .redirect_uri(REDIRECT)
                .state("")
                .scopes(["read", "write"]),
        )
        .await;
    assert!(result.is_ok(), "{:?}", result.cause());
    result.attributes().value("authorization_code_id").unwrap().to_string()
}

fn exchange(code: &str) -> OAuthRequest {
    OAuthRequest::post_form(&[
        ("grant_type", "authorization_code"),
        ("client_id", "key"),
        ("client_secret", "secret"),
        ("code", code),
        ("redirect_uri", REDIRECT),
    ])
}

fn body(result: &OAuthResult) -> Value {
    serde_json::from_slice(result.response().entity().unwrap()).unwrap()
}

fn cause(result: &OAuthResult) -> &OAuthError {
    assert_eq!(result.status(), OAuthResultStatus::Failed);
    result.cause().unwrap()
}

#[tokio::test]
async fn test_authorization_code_flow() {
    let component = component();
    let code = authorize_code(&component).await;
    assert_eq!(code.len(), 30);

    let result = component.process_token_request(None, &exchange(&code)).await;
    assert!(result.is_ok(), "{:?}", result.cause());
    let response = result.response();
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.header("Cache-Control"), Some("no-store"));
    assert_eq!(response.header("Pragma"), Some("no-cache"));
    assert_eq!(response.header("Content-Type"), Some("application/json"));

    let json = body(&result);
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["access_token"].as_str().unwrap().len(), 40);
    assert_eq!(json["refresh_token"].as_str().unwrap().len(), 50);
    assert_eq!(json["expires_in"], 3600);
    assert_eq!(json["scope"], "read write");
}

#[tokio::test]
async fn test_code_reuse_cites_code() {
    let component = component();
    let code = authorize_code(&component).await;
    assert!(component.process_token_request(None, &exchange(&code)).await.is_ok());

    let second = component.process_token_request(None, &exchange(&code)).await;
    let err = cause(&second);
    assert!(matches!(err.kind(), OAuthErrorKind::TokenReused { .. }));
    assert_eq!(
        err.message(),
        format!(
            "CWOAU0029E: The token with key {code} of type authorization_grant and subtype authorization_code was not found in the token cache."
        )
    );
    assert_eq!(second.response().status_code(), 400);
    assert_eq!(body(&second)["error"], "invalid_grant");
}

#[tokio::test]
async fn test_unknown_code() {
    let result = component().process_token_request(None, &exchange("nope")).await;
    assert!(matches!(cause(&result).kind(), OAuthErrorKind::TokenNotFound { key, .. } if key == "nope"));
}

#[tokio::test]
async fn test_refresh_rotation_and_reuse() {
    let component = component();
    let code = authorize_code(&component).await;
    let first = component.process_token_request(None, &exchange(&code)).await;
    let refresh = body(&first)["refresh_token"].as_str().unwrap().to_string();

    let refresh_request = OAuthRequest::post_form(&[
        ("grant_type", "refresh_token"),
        ("client_id", "key"),
        ("client_secret", "secret"),
        ("refresh_token", refresh.as_str()),
    ]);
    let renewed = component.process_token_request(None, &refresh_request).await;
    assert!(renewed.is_ok(), "{:?}", renewed.cause());
    let json = body(&renewed);
    assert_eq!(json["scope"], "read write");
    assert_ne!(json["refresh_token"].as_str().unwrap(), refresh);

    let replay = component.process_token_request(None, &refresh_request).await;
    let err = cause(&replay);
    assert!(matches!(err.kind(), OAuthErrorKind::TokenReused { .. }));
    assert!(err.message().contains(&format!("key {refresh} of type authorization_grant and subtype refresh_token")));
}

#[tokio::test]
async fn test_no_refresh_token_when_disabled() {
    let component = component_with(&[(ISSUE_REFRESH_TOKEN, "false")]);
    let code = authorize_code(&component).await;
    let result = component.process_token_request(None, &exchange(&code)).await;
    assert!(result.is_ok());
    assert!(body(&result).get("refresh_token").is_none());
}

#[tokio::test]
async fn test_configured_access_token_length() {
    let component = component_with(&[(ACCESS_TOKEN_LENGTH, "64")]);
    let code = authorize_code(&component).await;
    let result = component.process_token_request(None, &exchange(&code)).await;
    assert_eq!(body(&result)["access_token"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_redirect_mismatch_keeps_code() {
    let component = component();
    let code = authorize_code(&component).await;
    let wrong = OAuthRequest::post_form(&[
        ("grant_type", "authorization_code"),
        ("client_id", "key"),
        ("client_secret", "secret"),
        ("code", code.as_str()),
        ("redirect_uri", "https://app.example/other"),
    ]);
    let result = component.process_token_request(None, &wrong).await;
    assert!(matches!(cause(&result).kind(), OAuthErrorKind::GrantRedirectMismatch { .. }));

    let missing = OAuthRequest::post_form(&[
        ("grant_type", "authorization_code"),
        ("client_id", "key"),
        ("client_secret", "secret"),
        ("code", code.as_str()),
    ]);
    let result = component.process_token_request(None, &missing).await;
    assert!(matches!(
        cause(&result).kind(),
        OAuthErrorKind::MissingRequestRedirect { grant } if grant == REDIRECT
    ));

    assert!(component.process_token_request(None, &exchange(&code)).await.is_ok());
}

#[tokio::test]
async fn test_authorization_redirect() {
    let component = component();
    let result = component
        .process_authorization(AuthorizationRequest::new("user", "key", "code").state("xyz"))
        .await;
    assert!(result.is_ok());
    let code = result.attributes().value_of("code", AttributeType::ResponseAttribute).unwrap();
    let response = result.response();
    assert_eq!(response.status_code(), 302);
    assert_eq!(
        response.header("Location").unwrap(),
        format!("{REDIRECT}?code={code}&state=xyz")
    );
}

#[tokio::test]
async fn test_implicit_token_in_fragment() {
    let component = component();
    let result = component
        .process_authorization(AuthorizationRequest::new("user", "key", "token").scopes(["read"]))
        .await;
    assert!(result.is_ok(), "{:?}", result.cause());
    let location = result.response().header("Location").unwrap().to_string();
    let (base, fragment) = location.split_once('#').unwrap();
    assert_eq!(base, REDIRECT);
    assert!(fragment.starts_with("access_token="));
    assert!(fragment.contains("&token_type=Bearer&expires_in=3600&scope=read"));
    assert_eq!(component.token_cache().len().await, 1);
}

#[tokio::test]
async fn test_authorization_validation_order() {
    let component = component();
    let result = component.process_authorization(AuthorizationRequest::new("", "", "")).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::MissingParameter("response_type".into()));

    let result = component.process_authorization(AuthorizationRequest::new("", "", "code")).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::MissingParameter("client_id".into()));

    let result = component
        .process_authorization(AuthorizationRequest::new("", "key", "code").redirect_uri("https://evil.example/"))
        .await;
    assert!(matches!(cause(&result).kind(), OAuthErrorKind::RedirectUriMismatch { .. }));

    let result = component.process_authorization(AuthorizationRequest::new("", "key", "code")).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::MissingParameter("username".into()));

    let result = component.process_authorization(AuthorizationRequest::new("user", "key", "id_token")).await;
    assert_eq!(
        cause(&result).message(),
        "CWOAU0027E: The response_type parameter was invalid: id_token"
    );

    let result = component.process_authorization(AuthorizationRequest::new("user", "ghost", "code")).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::InvalidClient("ghost".into()));

    let result = component.process_authorization(AuthorizationRequest::new("user", "off", "code")).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::InvalidClient("off".into()));
}

#[tokio::test]
async fn test_grant_type_not_allowed() {
    let component = OAuth20Component::from_properties([(GRANT_TYPES_ALLOWED, "authorization_code")], clients()).unwrap();
    let result = component.process_authorization(AuthorizationRequest::new("user", "key", "token")).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::GrantTypeNotAllowed("implicit".into()));

    let request = OAuthRequest::post_form(&[
        ("grant_type", "client_credentials"),
        ("client_id", "key"),
        ("client_secret", "secret"),
    ]);
    let result = component.process_token_request(None, &request).await;
    assert_eq!(
        cause(&result).kind(),
        &OAuthErrorKind::GrantTypeNotAllowed("client_credentials".into())
    );
}

#[tokio::test]
async fn test_pkce_s256() {
    let component = component();
    let verifier = "a".repeat(43) + "-verifier";
    let result = component
        .process_authorization(
            AuthorizationRequest::new("user", "key", "code").code_challenge(pkce_code_challenge(&verifier), Some("S256")),
        )
        .await;
    let code = result.attributes().value("authorization_code_id").unwrap().to_string();

    let without = component.process_token_request(None, &exchange(&code)).await;
    assert_eq!(cause(&without).kind(), &OAuthErrorKind::MissingParameter("code_verifier".into()));

    let request = OAuthRequest::post_form(&[
        ("grant_type", "authorization_code"),
        ("client_id", "key"),
        ("client_secret", "secret"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT),
        ("code_verifier", verifier.as_str()),
    ]);
    let result = component.process_token_request(None, &request).await;
    assert!(result.is_ok(), "{:?}", result.cause());
}

#[tokio::test]
async fn test_pkce_bad_method() {
    let result = component()
        .process_authorization(AuthorizationRequest::new("user", "key", "code").code_challenge("abc", Some("S512")))
        .await;
    assert_eq!(
        cause(&result).kind(),
        &OAuthErrorKind::InvalidCodeChallengeMethod("S512".into())
    );
}

#[tokio::test]
async fn test_client_authentication() {
    let component = component();

    let wrong_secret = OAuthRequest::post_form(&[
        ("grant_type", "client_credentials"),
        ("client_id", "key"),
        ("client_secret", "nope"),
    ]);
    let result = component.process_token_request(None, &wrong_secret).await;
    assert_eq!(
        cause(&result).message(),
        "CWOAU0038E: The client could not be verified. Either the client ID: key or client secret is incorrect."
    );
    assert_eq!(result.response().status_code(), 401);

    let public_credentials = OAuthRequest::post_form(&[("grant_type", "client_credentials"), ("client_id", "public")]);
    let result = component.process_token_request(None, &public_credentials).await;
    assert_eq!(
        cause(&result).message(),
        "CWOAU0071E: A public client attempted to access the token endpoint using the client_credentials grant type. This grant type can only be used by confidential clients. The client_id is: public"
    );

    let public_code = OAuthRequest::post_form(&[
        ("grant_type", "authorization_code"),
        ("client_id", "public"),
        ("code", "x"),
    ]);
    let result = component.process_token_request(None, &public_code).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::PublicClientForbidden("public".into()));

    let mismatched = OAuthRequest::post_form(&[("grant_type", "client_credentials"), ("client_id", "key")]);
    let result = component.process_token_request(Some("other"), &mismatched).await;
    assert!(matches!(
        cause(&result).kind(),
        OAuthErrorKind::MismatchedClientAuthentication { .. }
    ));
}

#[tokio::test]
async fn test_confidential_client_needs_secret() {
    let missing_secret = OAuthRequest::post_form(&[("grant_type", "authorization_code"), ("client_id", "key"), ("code", "x")]);
    for allow_public in ["true", "false"] {
        let component = component_with(&[(ALLOW_PUBLIC_CLIENTS, allow_public)]);
        let result = component.process_token_request(None, &missing_secret).await;
        assert_eq!(
            cause(&result).message(),
            "CWOAU0070E: A public client attempted to access a confidential endpoint. The client [key] is registered as a confidential client but did not present its client_secret."
        );
        assert_eq!(result.response().status_code(), 401);
        assert_eq!(body(&result)["error"], "invalid_client");
    }

    // the client is checked before the grant type
    let bad_grant = OAuthRequest::post_form(&[("grant_type", "password"), ("client_id", "key")]);
    let result = component().process_token_request(None, &bad_grant).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::MissingClientSecret("key".into()));
}

#[tokio::test]
async fn test_authorization_scopes_narrowed_to_registration() {
    let component = component();
    let result = component
        .process_authorization(AuthorizationRequest::new("user", "scoped", "code").scopes(["read", "write"]))
        .await;
    assert!(result.is_ok(), "{:?}", result.cause());
    let code = result.attributes().value("authorization_code_id").unwrap().to_string();
    let request = OAuthRequest::post_form(&[
        ("grant_type", "authorization_code"),
        ("client_id", "scoped"),
        ("client_secret", "secret"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT),
    ]);
    let result = component.process_token_request(None, &request).await;
    assert!(result.is_ok(), "{:?}", result.cause());
    assert_eq!(body(&result)["scope"], "read");

    let result = component
        .process_authorization(AuthorizationRequest::new("user", "scoped", "code").scopes(["write", "admin"]))
        .await;
    assert_eq!(
        cause(&result).message(),
        "CWOAU0064E: The requested scope [write, admin] and registered scope [read, profile] of the client [scoped] does not have a common scope among them. The resultant scope is empty."
    );

    let result = component.process_authorization(AuthorizationRequest::new("user", "scoped", "token")).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::MissingScope("implicit".into()));
}

#[tokio::test]
async fn test_client_credentials_scopes_narrowed_to_registration() {
    let component = component();
    let credentials = |scope: Option<&'static str>| {
        let mut pairs = vec![("grant_type", "client_credentials"), ("client_id", "scoped"), ("client_secret", "secret")];
        pairs.extend(scope.map(|scope| ("scope", scope)));
        OAuthRequest::post_form(&pairs)
    };

    let result = component.process_token_request(None, &credentials(Some("profile admin"))).await;
    assert!(result.is_ok(), "{:?}", result.cause());
    assert_eq!(body(&result)["scope"], "profile");

    let result = component.process_token_request(None, &credentials(Some("admin"))).await;
    let err = cause(&result);
    assert_eq!(err.message_id(), "CWOAU0064E");
    assert_eq!(body(&result)["error"], "invalid_scope");
    assert_eq!(result.response().status_code(), 400);

    let result = component.process_token_request(None, &credentials(None)).await;
    assert_eq!(
        cause(&result).message(),
        "CWOAU0065E: The authorization server cannot process the [client_credentials] request. It is missing the required scope parameter."
    );
}

#[tokio::test]
async fn test_longest_lifetimes() {
    let longest = MAX_LIFETIME_SECONDS.to_string();
    let component = component_with(&[(CODE_LIFETIME, longest.as_str()), (TOKEN_LIFETIME, longest.as_str())]);
    let code = authorize_code(&component).await;
    let result = component.process_token_request(None, &exchange(&code)).await;
    assert!(result.is_ok(), "{:?}", result.cause());
    let json = body(&result);
    assert!(json["expires_in"].as_u64().unwrap() > MAX_LIFETIME_SECONDS as u64 - 60);

    let mut headers = HttpHeaders::new();
    headers.set("Authorization", format!("Bearer {}", json["access_token"].as_str().unwrap()));
    let result = component.process_resource_request_headers(&headers).await;
    assert!(result.is_ok(), "{:?}", result.cause());
    assert_eq!(component.token_cache().purge_expired().await, 0);
}

#[tokio::test]
async fn test_authenticated_client_skips_secret() {
    let component = component();
    let request = OAuthRequest::post_form(&[("grant_type", "client_credentials"), ("scope", "admin")]);
    let result = component.process_token_request(Some("key"), &request).await;
    assert!(result.is_ok(), "{:?}", result.cause());
    let json = body(&result);
    assert_eq!(json["scope"], "admin");
    assert!(json.get("refresh_token").is_none());
}

#[tokio::test]
async fn test_public_client_code_flow() {
    let component = component_with(&[(ALLOW_PUBLIC_CLIENTS, "true")]);
    let result = component
        .process_authorization(AuthorizationRequest::new("user", "public", "code"))
        .await;
    let code = result.attributes().value("authorization_code_id").unwrap().to_string();
    let request = OAuthRequest::post_form(&[
        ("grant_type", "authorization_code"),
        ("client_id", "public"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT),
    ]);
    assert!(component.process_token_request(None, &request).await.is_ok());
}

#[tokio::test]
async fn test_token_request_shape_errors() {
    let component = component();

    let get = OAuthRequest::new(bramble_core::http::http_value::HttpMethod::GET).query("grant_type=client_credentials");
    let result = component.process_token_request(None, &get).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::InvalidTokenRequestMethod("GET".into()));

    let no_client = OAuthRequest::post_form(&[("grant_type", "client_credentials")]);
    let result = component.process_token_request(None, &no_client).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::MissingParameter("client_id".into()));

    let bad_grant = OAuthRequest::post_form(&[("grant_type", "password"), ("client_id", "key"), ("client_secret", "secret")]);
    let result = component.process_token_request(None, &bad_grant).await;
    assert_eq!(
        cause(&result).message(),
        "CWOAU0025E: The grant_type parameter was invalid: password"
    );
    assert_eq!(body(&result)["error"], "unsupported_grant_type");

    let duplicated = OAuthRequest::post_form(&[("grant_type", "client_credentials"), ("client_id", "key"), ("client_id", "key")]);
    let result = component.process_token_request(None, &duplicated).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::DuplicateParameter("client_id".into()));
}

#[tokio::test]
async fn test_resource_request() {
    let component = component();
    let code = authorize_code(&component).await;
    let token = body(&component.process_token_request(None, &exchange(&code)).await)["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let mut headers = HttpHeaders::new();
    headers.set("Authorization", format!("Bearer {token}"));
    let result = component.process_resource_request_headers(&headers).await;
    assert!(result.is_ok(), "{:?}", result.cause());
    let attributes = result.attributes();
    assert_eq!(attributes.value_of("authorized", AttributeType::ResponseDecision), Some("TRUE"));
    assert_eq!(attributes.value_of("username", AttributeType::ResponseAttribute), Some("user"));
    assert_eq!(attributes.values("scope", AttributeType::ResponseAttribute), ["read", "write"]);
    assert_eq!(attributes.of_type(AttributeType::Param).count(), 0);

    let result = component.process_resource_request(AttributeList::new()).await;
    assert_eq!(
        cause(&result).message(),
        "CWOAU0033E: A required runtime parameter was missing: access_token"
    );

    let mut unknown = AttributeList::new();
    unknown.set_single("access_token", AttributeType::Param, "bogus");
    let result = component.process_resource_request(unknown).await;
    assert_eq!(result.response().status_code(), 401);
    assert_eq!(body(&result)["error"], "invalid_token");
}

struct Veto;

#[async_trait]
impl Mediator for Veto {
    async fn mediate_token(&self, _attributes: &mut AttributeList) -> Result<(), OAuthError> {
        Err(OAuthErrorKind::Mediator("vetoed".into()).into())
    }
}

#[tokio::test]
async fn test_mediator_failure_rolls_back_tokens() {
    let component = component().with_mediator(Arc::new(Veto));
    let code = authorize_code(&component).await;
    assert_eq!(component.token_cache().len().await, 1);

    let result = component.process_token_request(None, &exchange(&code)).await;
    assert_eq!(cause(&result).kind(), &OAuthErrorKind::Mediator("vetoed".into()));
    assert_eq!(result.response().status_code(), 500);
    assert_eq!(component.token_cache().len().await, 0);
}
