//! Per-request OAuth failures and their wire rendering.

use std::fmt;

use bramble_core::Response;
use bramble_core::http::http_value::StatusCode;
use bramble_core::http::media_type::MediaType;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

use super::types::{TokenKind, TokenSubType};

/// What went wrong, with the values the message cites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthErrorKind {
    BadParameterFormat { name: String, value: String },
    DuplicateParameter(String),
    InvalidClient(String),
    GrantTypeNotAllowed(String),
    InvalidGrantType(String),
    InvalidRedirectUri(String),
    InvalidResponseType(String),
    TokenNotFound { key: String, kind: TokenKind, sub_type: TokenSubType },
    /// The grant existed but was already consumed.
    TokenReused { key: String, kind: TokenKind, sub_type: TokenSubType },
    TokenExpired { key: String, kind: TokenKind, sub_type: TokenSubType },
    GrantRedirectMismatch { request: String, grant: String },
    MissingRequestRedirect { grant: String },
    GrantClientMismatch { request: String, grant: String },
    MissingParameter(String),
    InvalidClientSecret(String),
    InvalidTokenRequestMethod(String),
    MismatchedClientAuthentication { client_id: String, authenticated: String },
    RedirectUriMismatch { uri: String, registered: String },
    PublicClientCredentials { endpoint: String, client_id: String },
    PublicClientForbidden(String),
    /// A confidential client called the token endpoint without its secret.
    MissingClientSecret(String),
    ScopeMismatch { requested: Vec<String>, registered: Vec<String>, client_id: String },
    /// No scope was requested by a client that registers scopes.
    MissingScope(String),
    InvalidCodeChallengeMethod(String),
    InvalidCodeVerifier(usize),
    CodeVerifierMismatch { challenge: Option<String> },
    Mediator(String),
}

impl OAuthErrorKind {
    /// The `CWOAU####E` message identifier.
    pub fn message_id(&self) -> &'static str {
        use OAuthErrorKind::*;
        match self {
            BadParameterFormat { .. } => "CWOAU0021E",
            DuplicateParameter(_) => "CWOAU0022E",
            InvalidClient(_) => "CWOAU0023E",
            GrantTypeNotAllowed(_) => "CWOAU0024E",
            InvalidGrantType(_) => "CWOAU0025E",
            InvalidRedirectUri(_) => "CWOAU0026E",
            InvalidResponseType(_) => "CWOAU0027E",
            TokenNotFound { .. } | TokenReused { .. } => "CWOAU0029E",
            GrantRedirectMismatch { .. } => "CWOAU0030E",
            MissingRequestRedirect { .. } => "CWOAU0031E",
            GrantClientMismatch { .. } => "CWOAU0032E",
            MissingParameter(_) => "CWOAU0033E",
            TokenExpired { .. } => "CWOAU0034E",
            InvalidClientSecret(_) => "CWOAU0038E",
            InvalidTokenRequestMethod(_) => "CWOAU0039E",
            MismatchedClientAuthentication { .. } => "CWOAU0040E",
            Mediator(_) => "CWOAU0045E",
            RedirectUriMismatch { .. } => "CWOAU0056E",
            ScopeMismatch { .. } => "CWOAU0064E",
            MissingScope(_) => "CWOAU0065E",
            MissingClientSecret(_) => "CWOAU0070E",
            PublicClientCredentials { .. } => "CWOAU0071E",
            PublicClientForbidden(_) => "CWOAU0072E",
            InvalidCodeChallengeMethod(_) => "CWOAU0079E",
            InvalidCodeVerifier(_) => "CWOAU0080E",
            CodeVerifierMismatch { .. } => "CWOAU0081E",
        }
    }

    /// The RFC 6749 `error` code.
    pub fn error_code(&self) -> &'static str {
        use OAuthErrorKind::*;
        match self {
            BadParameterFormat { .. }
            | DuplicateParameter(_)
            | InvalidRedirectUri(_)
            | RedirectUriMismatch { .. }
            | MissingParameter(_)
            | InvalidTokenRequestMethod(_)
            | InvalidCodeChallengeMethod(_) => "invalid_request",
            InvalidClient(_)
            | InvalidClientSecret(_)
            | MismatchedClientAuthentication { .. }
            | PublicClientForbidden(_)
            | MissingClientSecret(_) => "invalid_client",
            GrantTypeNotAllowed(_) | PublicClientCredentials { .. } => "unauthorized_client",
            InvalidGrantType(_) => "unsupported_grant_type",
            InvalidResponseType(_) => "unsupported_response_type",
            ScopeMismatch { .. } | MissingScope(_) => "invalid_scope",
            TokenNotFound { kind, .. } | TokenReused { kind, .. } | TokenExpired { kind, .. } => match kind {
                TokenKind::AccessToken => "invalid_token",
                TokenKind::AuthorizationGrant => "invalid_grant",
            },
            GrantRedirectMismatch { .. }
            | MissingRequestRedirect { .. }
            | GrantClientMismatch { .. }
            | InvalidCodeVerifier(_)
            | CodeVerifierMismatch { .. } => "invalid_grant",
            Mediator(_) => "server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.error_code() {
            "invalid_client" | "invalid_token" => StatusCode::UNAUTHORIZED,
            "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for OAuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use OAuthErrorKind::*;
        write!(f, "{}: ", self.message_id())?;
        match self {
            BadParameterFormat { name, value } => {
                write!(f, "The parameter [{name}] contains an illegally formatted value: [{value}].")
            }
            DuplicateParameter(name) => {
                write!(f, "The following OAuth parameter was provided more than once in the request: {name}")
            }
            InvalidClient(id) => write!(f, "The OAuth service provider could not find the client {id}."),
            GrantTypeNotAllowed(grant_type) => write!(
                f,
                "The grant type [{grant_type}] is not allowed by the configuration of the OAuth provider."
            ),
            InvalidGrantType(value) => write!(f, "The grant_type parameter was invalid: {value}"),
            InvalidRedirectUri(value) => write!(f, "The redirect URI parameter was invalid: {value}"),
            InvalidResponseType(value) => write!(f, "The response_type parameter was invalid: {value}"),
            TokenNotFound { key, kind, sub_type } | TokenReused { key, kind, sub_type } => write!(
                f,
                "The token with key {key} of type {kind} and subtype {sub_type} was not found in the token cache."
            ),
            TokenExpired { key, kind, sub_type } => {
                write!(f, "The token with key {key} of type {kind} and subtype {sub_type} has expired.")
            }
            GrantRedirectMismatch { request, grant } => write!(
                f,
                "The redirect URI specified in the token request [{request}] did not match the redirect URI [{grant}] used to obtain the authorization grant."
            ),
            MissingRequestRedirect { grant } => write!(
                f,
                "The token request did not include a redirect URI, but the authorization grant was issued with the redirect URI [{grant}]."
            ),
            GrantClientMismatch { request, grant } => write!(
                f,
                "The client [{request}] making the token request is not the client [{grant}] that the authorization grant was issued to."
            ),
            MissingParameter(name) => write!(f, "A required runtime parameter was missing: {name}"),
            InvalidClientSecret(id) => write!(
                f,
                "The client could not be verified. Either the client ID: {id} or client secret is incorrect."
            ),
            InvalidTokenRequestMethod(method) => write!(
                f,
                "The token endpoint received a request with the HTTP method {method}. Only POST is supported."
            ),
            MismatchedClientAuthentication { client_id, authenticated } => write!(
                f,
                "The client_id [{client_id}] in the request does not match the authenticated client [{authenticated}]."
            ),
            Mediator(detail) => write!(f, "The OAuth mediator failed to process the request: {detail}"),
            RedirectUriMismatch { uri, registered } => write!(
                f,
                "The redirect URI parameter [{uri}] provided in the OAuth or OpenID Connect request did not match any of the redirect URIs registered with the OAuth provider [{registered}]."
            ),
            PublicClientCredentials { endpoint, client_id } => write!(
                f,
                "A public client attempted to access the {endpoint} endpoint using the client_credentials grant type. This grant type can only be used by confidential clients. The client_id is: {client_id}"
            ),
            PublicClientForbidden(id) => write!(
                f,
                "A public client attempted to access the token endpoint, but the OAuth provider does not allow public clients. The client_id is: {id}"
            ),
            MissingClientSecret(id) => write!(
                f,
                "A public client attempted to access a confidential endpoint. The client [{id}] is registered as a confidential client but did not present its client_secret."
            ),
            ScopeMismatch { requested, registered, client_id } => write!(
                f,
                "The requested scope [{}] and registered scope [{}] of the client [{client_id}] does not have a common scope among them. The resultant scope is empty.",
                requested.join(", "),
                registered.join(", ")
            ),
            MissingScope(request_type) => write!(
                f,
                "The authorization server cannot process the [{request_type}] request. It is missing the required scope parameter."
            ),
            InvalidCodeChallengeMethod(method) => write!(
                f,
                "The code_challenge_method [{method}] is not supported. The supported methods are plain and S256."
            ),
            InvalidCodeVerifier(length) => write!(
                f,
                "The code_verifier is {length} characters long. It must be between 43 and 128 characters."
            ),
            CodeVerifierMismatch { challenge } => write!(
                f,
                "The code_verifier does not match the code_challenge [{}] of the authorization grant.",
                challenge.as_deref().unwrap_or("null")
            ),
        }
    }
}

/// A classified OAuth request failure.
///
/// `Display` is the literal `CWOAU####E` message; callers branch on
/// [`OAuthError::kind`].
///
/// # Examples
///
/// ```rust
/// use bramble_oauth::oauth_core::error::{OAuthError, OAuthErrorKind};
///
/// let err = OAuthError::new(OAuthErrorKind::MissingParameter("client_id".into()));
/// assert_eq!(err.to_string(), "CWOAU0033E: A required runtime parameter was missing: client_id");
/// assert_eq!(err.error_code(), "invalid_request");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OAuthError {
    kind: OAuthErrorKind,
    message: String,
}

impl OAuthError {
    pub fn new(kind: OAuthErrorKind) -> Self {
        let message = kind.to_string();
        Self { kind, message }
    }

    pub fn kind(&self) -> &OAuthErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn message_id(&self) -> &'static str {
        self.kind.message_id()
    }

    pub fn error_code(&self) -> &'static str {
        self.kind.error_code()
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    /// Renders `{"error", "error_description"}` with the mapped status.
    pub fn into_response(&self) -> Response {
        let status = self.status();
        warn!(
            error_code = self.error_code(),
            message_id = self.message_id(),
            http_status = %status,
            "OAuth error occurred"
        );
        let body = json!({ "error": self.error_code(), "error_description": self.message });
        Response::status(status)
            .media_type(&MediaType::application_json())
            .cache_control("no-store")
            .entity(serde_json::to_vec(&body).unwrap_or_default())
            .build()
    }
}

impl From<OAuthErrorKind> for OAuthError {
    fn from(kind: OAuthErrorKind) -> Self {
        Self::new(kind)
    }
}
