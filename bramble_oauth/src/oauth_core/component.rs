//! The OAuth 2.0 provider: authorization, token and resource endpoints.

use std::sync::Arc;

use bramble_core::http::http_value::{HttpMethod, StatusCode};
use bramble_core::http::media_type::MediaType;
use bramble_core::http::meta::HttpHeaders;
use bramble_core::{Response, Uri, UriBuilder};
use bramble_lib::url_encoding::{Component, encode_component};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use super::attributes::{AttributeList, AttributeType, OAuthResult};
use super::config::{ConfigError, MediatorKind, OAuthConfig, PropertyValue};
use super::error::{OAuthError, OAuthErrorKind};
use super::grant_helpers::{self, Issue};
use super::mediator::{AuditMediator, Mediator};
use super::memory::InMemoryTokenCache;
use super::oauth_provider::{ClientProvider, TokenCache};
use super::request::{AuthorizationRequest, OAuthRequest};
use super::types::*;

const REQUEST_AUTHORIZE: &str = "authorize";
const REQUEST_TOKEN: &str = "token";
const REQUEST_RESOURCE: &str = "resource";

#[derive(Clone, Copy)]
enum Endpoint {
    Authorize,
    Token,
    Resource,
}

/// OAuth 2.0 provider over a client registry and a token cache.
///
/// Every entry point returns an [`OAuthResult`]; request errors never
/// escape as `Err`. Tokens issued during a request that then fails are
/// removed again before the result is returned.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use bramble_oauth::oauth_core::component::OAuth20Component;
/// use bramble_oauth::oauth_core::config::{GRANT_TYPES_ALLOWED, ACCESS_TOKEN_LENGTH, PropertyValue};
/// use bramble_oauth::oauth_core::memory::InMemoryClientProvider;
/// use bramble_oauth::oauth_core::types::OAuthClient;
///
/// let clients = Arc::new(InMemoryClientProvider::new([
///     OAuthClient::confidential("key", "secret", ["https://app.example/cb"]),
/// ]));
/// let err = OAuth20Component::from_properties(
///     [
///         (GRANT_TYPES_ALLOWED, PropertyValue::from("authorization_code")),
///         (ACCESS_TOKEN_LENGTH, PropertyValue::from(-100)),
///     ],
///     clients,
/// );
/// assert!(err.is_err());
/// ```
pub struct OAuth20Component {
    config: OAuthConfig,
    clients: Arc<dyn ClientProvider>,
    cache: Arc<dyn TokenCache>,
    mediators: Vec<Arc<dyn Mediator>>,
}

impl OAuth20Component {
    pub fn new(config: OAuthConfig, clients: Arc<dyn ClientProvider>, cache: Arc<dyn TokenCache>) -> Self {
        let mediators = config
            .mediators
            .iter()
            .map(|kind| match kind {
                MediatorKind::Audit => Arc::new(AuditMediator) as Arc<dyn Mediator>,
            })
            .collect();
        Self {
            config,
            clients,
            cache,
            mediators,
        }
    }

    /// Validates `properties` and builds a component over an in-memory cache.
    pub fn from_properties<I, K, V>(properties: I, clients: Arc<dyn ClientProvider>) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let config = OAuthConfig::from_properties(properties)?;
        Ok(Self::new(config, clients, Arc::new(InMemoryTokenCache::new())))
    }

    pub fn with_mediator(mut self, mediator: Arc<dyn Mediator>) -> Self {
        self.mediators.push(mediator);
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn token_cache(&self) -> &Arc<dyn TokenCache> {
        &self.cache
    }

    /// Handles an authorization request for an authenticated user.
    ///
    /// On success the response is a 302 to the client's redirect URI with
    /// the code (query) or the access token (fragment).
    #[instrument(skip_all, fields(client_id = %request.client_id, response_type = %request.response_type))]
    pub async fn process_authorization(&self, request: AuthorizationRequest) -> OAuthResult {
        let mut attributes = authorization_attributes(&request);
        let mut issued = Vec::new();
        match self.authorize(&request, &mut attributes, &mut issued).await {
            Ok(response) => OAuthResult::ok(attributes, response),
            Err(err) => self.fail(Endpoint::Authorize, attributes, err, &issued).await,
        }
    }

    /// Handles a token endpoint request.
    ///
    /// `authenticated_client` is the client id established by the transport
    /// (for example HTTP Basic authentication), if any.
    #[instrument(skip_all, fields(authenticated_client = authenticated_client.unwrap_or("")))]
    pub async fn process_token_request(&self, authenticated_client: Option<&str>, request: &OAuthRequest) -> OAuthResult {
        let mut attributes = AttributeList::new();
        attributes.set_single(ATTR_REQUEST_TYPE, AttributeType::Request, REQUEST_TOKEN);
        let mut issued = Vec::new();
        match self.token(authenticated_client, request, &mut attributes, &mut issued).await {
            Ok(response) => OAuthResult::ok(attributes, response),
            Err(err) => self.fail(Endpoint::Token, attributes, err, &issued).await,
        }
    }

    /// Authorizes a protected resource access carrying an `access_token`
    /// parameter attribute.
    ///
    /// The returned attributes hold only the response and decision
    /// attributes.
    #[instrument(skip_all)]
    pub async fn process_resource_request(&self, attributes: AttributeList) -> OAuthResult {
        let mut attributes = attributes;
        attributes.set_single(ATTR_REQUEST_TYPE, AttributeType::Request, REQUEST_RESOURCE);
        match self.resource(&mut attributes).await {
            Ok(()) => {
                let kept = attributes.retain_types(&[AttributeType::ResponseAttribute, AttributeType::ResponseDecision]);
                OAuthResult::ok(kept, Response::ok().build())
            }
            Err(err) => self.fail(Endpoint::Resource, attributes, err, &[]).await,
        }
    }

    /// Like [`process_resource_request`](Self::process_resource_request),
    /// reading the token from an `Authorization: Bearer` header.
    pub async fn process_resource_request_headers(&self, headers: &HttpHeaders) -> OAuthResult {
        let mut attributes = AttributeList::new();
        if let Some(token) = headers.get_first("Authorization").and_then(bearer_token) {
            attributes.set_single(PARAM_ACCESS_TOKEN, AttributeType::Param, token);
        }
        self.process_resource_request(attributes).await
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest,
        attributes: &mut AttributeList,
        issued: &mut Vec<String>,
    ) -> Result<Response, OAuthError> {
        if request.response_type.is_empty() {
            return Err(OAuthErrorKind::MissingParameter(PARAM_RESPONSE_TYPE.into()).into());
        }
        if request.client_id.is_empty() {
            return Err(OAuthErrorKind::MissingParameter(PARAM_CLIENT_ID.into()).into());
        }
        let client = self.client(&request.client_id, None).await?;
        let redirect_uri = resolve_redirect(&client, request.redirect_uri.as_deref())?;
        if request.username.is_empty() {
            return Err(OAuthErrorKind::MissingParameter(PARAM_USERNAME.into()).into());
        }
        let response_type = ResponseType::parse(&request.response_type)
            .ok_or_else(|| OAuthErrorKind::InvalidResponseType(request.response_type.clone()))?;
        let grant_type = response_type.grant_type();
        if !self.config.is_grant_type_allowed(grant_type) {
            return Err(OAuthErrorKind::GrantTypeNotAllowed(grant_type.as_str().into()).into());
        }
        let challenge = match request.code_challenge.as_deref().filter(|challenge| !challenge.is_empty()) {
            None => None,
            Some(challenge) => {
                let method = match request.code_challenge_method.as_deref().filter(|method| !method.is_empty()) {
                    None => CodeChallengeMethod::Plain,
                    Some(method) => CodeChallengeMethod::parse(method)
                        .ok_or_else(|| OAuthErrorKind::InvalidCodeChallengeMethod(method.into()))?,
                };
                Some((challenge.to_string(), method))
            }
        };

        let state = request.state.as_deref().filter(|state| !state.is_empty());
        let scopes = granted_scopes(&client, attributes.values(PARAM_SCOPE, AttributeType::Param), grant_type)?;
        let issue = Issue {
            client_id: &client.client_id,
            username: &request.username,
            scopes: &scopes,
            redirect_uri: Some(&redirect_uri),
            state,
            grant_type,
        };
        match response_type {
            ResponseType::Code => {
                let code = grant_helpers::authorization_code(&self.config, issue, challenge);
                attributes.set_single(PARAM_CODE, AttributeType::ResponseAttribute, code.key.clone());
                attributes.set_single(ATTR_AUTHORIZATION_CODE_ID, AttributeType::ResponseMeta, code.key.clone());
                self.store(code, issued).await;
            }
            ResponseType::Token => {
                let access = grant_helpers::access_token(&self.config, issue);
                grant_helpers::token_response_attributes(attributes, &access, None);
                self.store(access, issued).await;
            }
        }
        if let Some(state) = state {
            attributes.set_single(PARAM_STATE, AttributeType::ResponseAttribute, state);
        }

        for mediator in &self.mediators {
            mediator.mediate_authorize(attributes).await?;
        }

        let location = redirect_location(&redirect_uri, response_type, attributes)?;
        debug!(client_id = %client.client_id, "authorization redirect issued");
        Response::status(StatusCode::FOUND)
            .cache_control("no-store")
            .location(&location)
            .map(|builder| builder.build())
            .map_err(|_| OAuthErrorKind::InvalidRedirectUri(redirect_uri.clone()).into())
    }

    async fn token(
        &self,
        authenticated_client: Option<&str>,
        request: &OAuthRequest,
        attributes: &mut AttributeList,
        issued: &mut Vec<String>,
    ) -> Result<Response, OAuthError> {
        attributes.set_single("method", AttributeType::Request, request.method().as_str());
        if request.method() != HttpMethod::POST {
            return Err(OAuthErrorKind::InvalidTokenRequestMethod(request.method().as_str().into()).into());
        }
        for attribute in request.parameters()?.iter() {
            attributes.set(&attribute.name, attribute.attribute_type, attribute.values.iter().cloned());
        }

        let authenticated = authenticated_client.filter(|client| !client.is_empty());
        let client_id = match attributes.value_of(PARAM_CLIENT_ID, AttributeType::Param).or(authenticated) {
            Some(client_id) => client_id.to_string(),
            None => return Err(OAuthErrorKind::MissingParameter(PARAM_CLIENT_ID.into()).into()),
        };
        attributes.set_single(PARAM_CLIENT_ID, AttributeType::Param, client_id.clone());

        // A client is public when it neither authenticated nor sent a secret.
        let (client, public) = match authenticated {
            Some(authenticated) => {
                if authenticated != client_id {
                    return Err(OAuthErrorKind::MismatchedClientAuthentication {
                        client_id,
                        authenticated: authenticated.to_string(),
                    }
                    .into());
                }
                (self.client(&client_id, None).await?, false)
            }
            None => match attributes.value_of(PARAM_CLIENT_SECRET, AttributeType::Param) {
                Some(secret) => (self.client(&client_id, Some(secret)).await?, false),
                None => {
                    let client = self.client(&client_id, None).await?;
                    if client.is_confidential() {
                        return Err(OAuthErrorKind::MissingClientSecret(client_id).into());
                    }
                    (client, true)
                }
            },
        };

        let raw_grant_type = attributes
            .value_of(PARAM_GRANT_TYPE, AttributeType::Param)
            .ok_or_else(|| OAuthErrorKind::MissingParameter(PARAM_GRANT_TYPE.into()))?
            .to_string();
        let grant_type = GrantType::parse(&raw_grant_type)
            .filter(|grant_type| *grant_type != GrantType::Implicit)
            .ok_or_else(|| OAuthErrorKind::InvalidGrantType(raw_grant_type.clone()))?;
        if !self.config.is_grant_type_allowed(grant_type) {
            return Err(OAuthErrorKind::GrantTypeNotAllowed(raw_grant_type).into());
        }

        if public {
            if grant_type == GrantType::ClientCredentials {
                return Err(OAuthErrorKind::PublicClientCredentials {
                    endpoint: REQUEST_TOKEN.into(),
                    client_id,
                }
                .into());
            }
            if !self.config.allow_public_clients {
                return Err(OAuthErrorKind::PublicClientForbidden(client_id).into());
            }
        }
        debug!(client_id = %client.client_id, %grant_type, public, "token request authenticated");

        let requested_scopes = attributes.values(PARAM_SCOPE, AttributeType::Param).to_vec();
        let (access, refresh) = match grant_type {
            GrantType::AuthorizationCode => {
                let key = required(attributes, PARAM_CODE)?;
                let redirect_uri = attributes.value_of(PARAM_REDIRECT_URI, AttributeType::Param);
                let verifier = attributes.value_of(PARAM_CODE_VERIFIER, AttributeType::Param);
                let validate = |grant: &OAuthToken| grant_helpers::validate_code_grant(grant, &client_id, redirect_uri, verifier);
                let code = self
                    .cache
                    .consume(&key, &validate)
                    .await
                    .map_err(|err| grant_helpers::consume_error(err, &key, TokenSubType::AuthorizationCode))?;
                self.issue_pair(&code, grant_type, &code.scopes)
            }
            GrantType::RefreshToken => {
                let key = required(attributes, PARAM_REFRESH_TOKEN)?;
                let validate = |grant: &OAuthToken| grant_helpers::validate_refresh_grant(grant, &client_id);
                let grant = self
                    .cache
                    .consume(&key, &validate)
                    .await
                    .map_err(|err| grant_helpers::consume_error(err, &key, TokenSubType::RefreshToken))?;
                self.issue_pair(&grant, grant_type, &grant.scopes)
            }
            GrantType::ClientCredentials => {
                let scopes = granted_scopes(&client, &requested_scopes, grant_type)?;
                let issue = Issue {
                    client_id: &client.client_id,
                    username: &client.client_id,
                    scopes: &scopes,
                    redirect_uri: None,
                    state: None,
                    grant_type,
                };
                (grant_helpers::access_token(&self.config, issue), None)
            }
            GrantType::Implicit => return Err(OAuthErrorKind::InvalidGrantType(raw_grant_type).into()),
        };

        grant_helpers::token_response_attributes(attributes, &access, refresh.as_ref());
        self.store(access, issued).await;
        if let Some(refresh) = refresh {
            self.store(refresh, issued).await;
        }

        for mediator in &self.mediators {
            mediator.mediate_token(attributes).await?;
        }
        Ok(token_response(attributes))
    }

    fn issue_pair(&self, grant: &OAuthToken, grant_type: GrantType, scopes: &[String]) -> (OAuthToken, Option<OAuthToken>) {
        let issue = Issue {
            client_id: &grant.client_id,
            username: &grant.username,
            scopes,
            redirect_uri: None,
            state: None,
            grant_type,
        };
        let refresh = grant_helpers::issues_refresh_token(&self.config).then(|| grant_helpers::refresh_token(&self.config, issue));
        (grant_helpers::access_token(&self.config, issue), refresh)
    }

    async fn resource(&self, attributes: &mut AttributeList) -> Result<(), OAuthError> {
        let key = required(attributes, PARAM_ACCESS_TOKEN)?;
        let not_found = || OAuthErrorKind::TokenNotFound {
            key: key.clone(),
            kind: TokenKind::AccessToken,
            sub_type: TokenSubType::Bearer,
        };
        let token = self
            .cache
            .get(&key)
            .await
            .filter(|token| token.kind == TokenKind::AccessToken && token.sub_type == TokenSubType::Bearer)
            .ok_or_else(not_found)?;
        if token.is_expired() {
            self.cache.remove(&key).await;
            return Err(OAuthErrorKind::TokenExpired {
                key,
                kind: TokenKind::AccessToken,
                sub_type: TokenSubType::Bearer,
            }
            .into());
        }
        match self.clients.get(&token.client_id).await {
            Some(client) if client.enabled => {}
            _ => {
                self.cache.remove(&key).await;
                return Err(OAuthErrorKind::InvalidClient(token.client_id).into());
            }
        }

        attributes.set_single(ATTR_AUTHORIZED, AttributeType::ResponseDecision, "TRUE");
        attributes.set_single(PARAM_USERNAME, AttributeType::ResponseAttribute, token.username.clone());
        attributes.set_single(PARAM_CLIENT_ID, AttributeType::ResponseAttribute, token.client_id.clone());
        attributes.set(PARAM_SCOPE, AttributeType::ResponseAttribute, token.scopes.iter().cloned());
        attributes.set_single(ATTR_EXPIRES_IN, AttributeType::ResponseAttribute, token.expires_in().to_string());

        for mediator in &self.mediators {
            mediator.mediate_resource(attributes).await?;
        }
        Ok(())
    }

    /// Looks a client up, checking the secret when one is presented.
    async fn client(&self, client_id: &str, secret: Option<&str>) -> Result<OAuthClient, OAuthError> {
        if client_id.is_empty() {
            return Err(OAuthErrorKind::MissingParameter(PARAM_CLIENT_ID.into()).into());
        }
        let client = self
            .clients
            .get(client_id)
            .await
            .filter(|client| client.enabled)
            .ok_or_else(|| OAuthErrorKind::InvalidClient(client_id.to_string()))?;
        if let Some(secret) = secret {
            if !self.clients.validate_secret(client_id, secret).await {
                return Err(OAuthErrorKind::InvalidClientSecret(client_id.to_string()).into());
            }
        }
        Ok(client)
    }

    async fn store(&self, token: OAuthToken, issued: &mut Vec<String>) {
        issued.push(token.key.clone());
        self.cache.add(token).await;
    }

    async fn fail(&self, endpoint: Endpoint, attributes: AttributeList, err: OAuthError, issued: &[String]) -> OAuthResult {
        for key in issued {
            self.cache.remove(key).await;
        }
        for mediator in &self.mediators {
            let outcome = match endpoint {
                Endpoint::Authorize => mediator.mediate_authorize_exception(&attributes, &err).await,
                Endpoint::Token => mediator.mediate_token_exception(&attributes, &err).await,
                Endpoint::Resource => mediator.mediate_resource_exception(&attributes, &err).await,
            };
            if let Err(mediator_err) = outcome {
                warn!(message_id = mediator_err.message_id(), "mediator exception hook failed");
            }
        }
        OAuthResult::failed(attributes, err)
    }
}

fn authorization_attributes(request: &AuthorizationRequest) -> AttributeList {
    let mut attributes = AttributeList::new();
    attributes.set_single(ATTR_REQUEST_TYPE, AttributeType::Request, REQUEST_AUTHORIZE);
    attributes.set_single(PARAM_USERNAME, AttributeType::Param, request.username.clone());
    attributes.set_single(PARAM_CLIENT_ID, AttributeType::Param, request.client_id.clone());
    attributes.set_single(PARAM_RESPONSE_TYPE, AttributeType::Param, request.response_type.clone());
    if let Some(redirect_uri) = &request.redirect_uri {
        attributes.set_single(PARAM_REDIRECT_URI, AttributeType::Param, redirect_uri.clone());
    }
    if let Some(state) = &request.state {
        attributes.set_single(PARAM_STATE, AttributeType::Param, state.clone());
    }
    for scope in request.scopes.iter().flat_map(|scope| scope.split(' ')).filter(|scope| !scope.is_empty()) {
        attributes.add_value(PARAM_SCOPE, AttributeType::Param, scope);
    }
    attributes
}

fn required(attributes: &AttributeList, name: &str) -> Result<String, OAuthError> {
    attributes
        .value_of(name, AttributeType::Param)
        .map(str::to_string)
        .ok_or_else(|| OAuthErrorKind::MissingParameter(name.to_string()).into())
}

fn is_valid_redirect(uri: &str) -> bool {
    Uri::parse(uri).is_ok_and(|uri| uri.is_absolute() && uri.fragment().is_none())
}

/// Picks the redirect URI for an authorization request.
///
/// A requested URI must be registered verbatim; without one, the client
/// must have exactly one registration.
fn resolve_redirect(client: &OAuthClient, requested: Option<&str>) -> Result<String, OAuthError> {
    match requested.filter(|uri| !uri.is_empty()) {
        Some(uri) => {
            if !is_valid_redirect(uri) {
                return Err(OAuthErrorKind::InvalidRedirectUri(uri.to_string()).into());
            }
            if !client.redirect_uris.iter().any(|registered| registered == uri) {
                return Err(OAuthErrorKind::RedirectUriMismatch {
                    uri: uri.to_string(),
                    registered: client.redirect_uris.join(" "),
                }
                .into());
            }
            Ok(uri.to_string())
        }
        None => match client.redirect_uris.as_slice() {
            [only] if is_valid_redirect(only) => Ok(only.clone()),
            [only] => Err(OAuthErrorKind::InvalidRedirectUri(only.clone()).into()),
            _ => Err(OAuthErrorKind::MissingParameter(PARAM_REDIRECT_URI.into()).into()),
        },
    }
}

/// Narrows the requested scopes to the client's registered ones.
///
/// Clients without registered scopes are granted what they ask for.
fn granted_scopes(client: &OAuthClient, requested: &[String], grant_type: GrantType) -> Result<Vec<String>, OAuthError> {
    if client.scopes.is_empty() {
        return Ok(requested.to_vec());
    }
    if requested.is_empty() {
        return Err(OAuthErrorKind::MissingScope(grant_type.as_str().into()).into());
    }
    let granted: Vec<String> = requested
        .iter()
        .filter(|scope| client.scopes.contains(*scope))
        .cloned()
        .collect();
    if granted.is_empty() {
        return Err(OAuthErrorKind::ScopeMismatch {
            requested: requested.to_vec(),
            registered: client.scopes.clone(),
            client_id: client.client_id.clone(),
        }
        .into());
    }
    Ok(granted)
}

/// The redirect carrying the response attributes: query parameters for a
/// code, a form-encoded fragment for an implicit token.
fn redirect_location(redirect_uri: &str, response_type: ResponseType, attributes: &AttributeList) -> Result<Uri, OAuthError> {
    let invalid = || OAuthError::from(OAuthErrorKind::InvalidRedirectUri(redirect_uri.to_string()));
    let base = Uri::parse(redirect_uri).map_err(|_| invalid())?;
    let mut builder = UriBuilder::from_uri(&base);
    let pairs = attributes
        .of_type(AttributeType::ResponseAttribute)
        .map(|attribute| (attribute.name.as_str(), attribute.values.join(" ")));
    match response_type {
        ResponseType::Code => {
            for (name, value) in pairs {
                let value = encode_component(&value, Component::QueryParam);
                builder = builder.query_param(name, &[&value]).map_err(|_| invalid())?;
            }
        }
        ResponseType::Token => {
            let fragment = pairs
                .map(|(name, value)| {
                    format!(
                        "{}={}",
                        encode_component(name, Component::FragmentValue),
                        encode_component(&value, Component::FragmentValue)
                    )
                })
                .collect::<Vec<_>>()
                .join("&");
            builder = builder.fragment(Some(&fragment));
        }
    }
    builder.build(&[]).map_err(|_| invalid())
}

/// JSON body of a successful token response.
fn token_response(attributes: &AttributeList) -> Response {
    let mut body = Map::new();
    for attribute in attributes.of_type(AttributeType::ResponseAttribute) {
        let value = attribute.values.join(" ");
        let value = match attribute.name.as_str() {
            ATTR_EXPIRES_IN => value.parse::<u64>().map(Value::from).unwrap_or(Value::String(value)),
            _ => Value::String(value),
        };
        body.insert(attribute.name.clone(), value);
    }
    let builder = Response::ok()
        .media_type(&MediaType::application_json())
        .cache_control("no-store")
        .entity(serde_json::to_vec(&Value::Object(body)).unwrap_or_default());
    builder.clone().header("Pragma", "no-cache").unwrap_or(builder).build()
}

/// The credentials of an `Authorization: Bearer` header.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
