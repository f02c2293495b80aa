//! Inputs to the OAuth endpoints.

use bramble_core::http::http_value::HttpMethod;
use bramble_core::http::meta::HttpHeaders;
use bramble_lib::url_encoding::{encode_url_owned, parse_form_urlencoded};

use super::attributes::{AttributeList, AttributeType};
use super::error::{OAuthError, OAuthErrorKind};
use super::types::{PARAM_SCOPE, SINGLE_VALUED_PARAMETERS};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An HTTP request addressed to the token or resource endpoint.
///
/// # Examples
///
/// ```rust
/// use bramble_oauth::oauth_core::request::OAuthRequest;
///
/// let request = OAuthRequest::post_form(&[("grant_type", "authorization_code"), ("code", "abc")]);
/// let params = request.parameters().unwrap();
/// assert_eq!(params.value("code"), Some("abc"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRequest {
    method: HttpMethod,
    headers: HttpHeaders,
    query: Option<String>,
    body: Vec<u8>,
}

impl OAuthRequest {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            headers: HttpHeaders::new(),
            query: None,
            body: Vec::new(),
        }
    }

    /// A form-encoded POST carrying `pairs`.
    pub fn post_form(pairs: &[(&str, &str)]) -> Self {
        let body = pairs
            .iter()
            .map(|(name, value)| format!("{}={}", encode_url_owned(name), encode_url_owned(value)))
            .collect::<Vec<_>>()
            .join("&");
        Self::new(HttpMethod::POST)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(body)
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    fn is_form(&self) -> bool {
        self.headers.get_first("Content-Type").is_some_and(|content_type| {
            content_type
                .split(';')
                .next()
                .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        })
    }

    /// Query and form parameters as `Param` attributes.
    ///
    /// Empty values are skipped, `scope` is split on spaces, and a protocol
    /// parameter given twice is an error.
    pub fn parameters(&self) -> Result<AttributeList, OAuthError> {
        let mut pairs = self.query.as_deref().map(parse_form_urlencoded).unwrap_or_default();
        if self.is_form() {
            pairs.extend(parse_form_urlencoded(&String::from_utf8_lossy(&self.body)));
        }
        let mut params = AttributeList::new();
        for (name, value) in pairs {
            add_parameter(&mut params, &name, &value)?;
        }
        Ok(params)
    }
}

fn add_parameter(params: &mut AttributeList, name: &str, value: &str) -> Result<(), OAuthError> {
    if value.is_empty() {
        return Ok(());
    }
    if name == PARAM_SCOPE {
        for scope in value.split(' ').filter(|scope| !scope.is_empty()) {
            params.add_value(PARAM_SCOPE, AttributeType::Param, scope);
        }
        return Ok(());
    }
    if SINGLE_VALUED_PARAMETERS.contains(&name) && !params.values(name, AttributeType::Param).is_empty() {
        return Err(OAuthErrorKind::DuplicateParameter(name.to_string()).into());
    }
    params.add_value(name, AttributeType::Param, value);
    Ok(())
}

/// Parameters of an authorization endpoint request, after the user has
/// been authenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub username: String,
    pub client_id: String,
    pub response_type: String,
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

impl AuthorizationRequest {
    pub fn new(username: impl Into<String>, client_id: impl Into<String>, response_type: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            client_id: client_id.into(),
            response_type: response_type.into(),
            ..Self::default()
        }
    }

    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn code_challenge(mut self, challenge: impl Into<String>, method: Option<&str>) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = method.map(str::to_string);
        self
    }
}
