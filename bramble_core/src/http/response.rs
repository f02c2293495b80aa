use chrono::{DateTime, Utc};
use thiserror::Error;

use super::accept::LanguageTag;
use super::etag::EntityTag;
use super::http_date;
use super::http_value::StatusCode;
use super::media_type::MediaType;
use super::meta::HttpHeaders;
use super::variant::Variant;
use crate::uri::{Uri, UriError};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LANGUAGE: &str = "Content-Language";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const CONTENT_LOCATION: &str = "Content-Location";
pub const CACHE_CONTROL: &str = "Cache-Control";
pub const ETAG: &str = "ETag";
pub const LAST_MODIFIED: &str = "Last-Modified";
pub const LOCATION: &str = "Location";
pub const VARY: &str = "Vary";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("status code {0} is outside 100..=599")]
    InvalidStatus(u16),
    #[error("header name is empty")]
    EmptyHeaderName,
    #[error(transparent)]
    Uri(#[from] UriError),
}

/// A finished response: status, headers and an optional entity body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: HttpHeaders,
    entity: Option<Vec<u8>>,
}

impl Response {
    /// Starts a builder with the given status.
    pub fn status(status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::from_status(status)
    }

    pub fn ok() -> ResponseBuilder {
        ResponseBuilder::from_status(StatusCode::OK)
    }

    pub fn not_modified() -> ResponseBuilder {
        ResponseBuilder::from_status(StatusCode::NOT_MODIFIED)
    }

    /// 406 listing, in `Vary`, every request header the variants differ by.
    pub fn not_acceptable(variants: &[Variant]) -> ResponseBuilder {
        let mut builder = ResponseBuilder::from_status(StatusCode::NOT_ACCEPTABLE);
        if let Some(vary) = vary_for(variants) {
            builder = builder.vary(&vary);
        }
        builder
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    /// The first value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_first(name)
    }

    pub fn entity(&self) -> Option<&[u8]> {
        self.entity.as_deref()
    }
}

fn vary_for(variants: &[Variant]) -> Option<String> {
    let mut names = Vec::new();
    if variants.iter().any(|variant| variant.media_type().is_some()) {
        names.push("Accept");
    }
    if variants.iter().any(|variant| variant.language().is_some()) {
        names.push("Accept-Language");
    }
    if variants.iter().any(|variant| variant.encoding().is_some()) {
        names.push("Accept-Encoding");
    }
    (!names.is_empty()).then(|| names.join(", "))
}

/// Accumulates response metadata.
///
/// `Location` and `Content-Location` may be relative; they are resolved
/// against the base URI, when one is set, at the time they are added.
///
/// # Examples
///
/// ```rust
/// use bramble_core::http::etag::EntityTag;
/// use bramble_core::http::media_type::MediaType;
/// use bramble_core::Response;
///
/// let response = Response::ok()
///     .media_type(&MediaType::application_json())
///     .tag(&EntityTag::weak("7"))
///     .entity("{}")
///     .build();
/// assert_eq!(response.status_code(), 200);
/// assert_eq!(response.header("etag"), Some("W/\"7\""));
/// assert_eq!(response.entity(), Some(&b"{}"[..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBuilder {
    status: u16,
    headers: HttpHeaders,
    entity: Option<Vec<u8>>,
    base_uri: Option<Uri>,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::from_status(StatusCode::OK)
    }
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status: status.to_u16(),
            headers: HttpHeaders::new(),
            entity: None,
            base_uri: None,
        }
    }

    /// Sets a numeric status; anything outside 100..=599 is rejected.
    pub fn status(mut self, status: u16) -> Result<Self, ResponseError> {
        if !(100..=599).contains(&status) {
            return Err(ResponseError::InvalidStatus(status));
        }
        self.status = status;
        Ok(self)
    }

    pub fn status_code(mut self, status: StatusCode) -> Self {
        self.status = status.to_u16();
        self
    }

    /// Appends a header value.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Result<Self, ResponseError> {
        if name.trim().is_empty() {
            return Err(ResponseError::EmptyHeaderName);
        }
        self.headers.add(name, value);
        Ok(self)
    }

    pub fn entity(mut self, entity: impl Into<Vec<u8>>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn media_type(mut self, media_type: &MediaType) -> Self {
        self.headers.set(CONTENT_TYPE, media_type.to_string());
        self
    }

    pub fn language(mut self, language: &LanguageTag) -> Self {
        self.headers.set(CONTENT_LANGUAGE, language.to_string());
        self
    }

    pub fn encoding(mut self, encoding: &str) -> Self {
        self.headers.set(CONTENT_ENCODING, encoding);
        self
    }

    /// Sets the content headers the variant defines.
    pub fn variant(mut self, variant: &Variant) -> Self {
        if let Some(media_type) = variant.media_type() {
            self = self.media_type(media_type);
        }
        if let Some(language) = variant.language() {
            self = self.language(language);
        }
        if let Some(encoding) = variant.encoding() {
            self = self.encoding(encoding);
        }
        self
    }

    pub fn tag(mut self, tag: &EntityTag) -> Self {
        self.headers.set(ETAG, tag.to_string());
        self
    }

    pub fn last_modified(mut self, date: DateTime<Utc>) -> Self {
        self.headers.set(LAST_MODIFIED, http_date::format(&date));
        self
    }

    pub fn base_uri(mut self, base: Uri) -> Self {
        self.base_uri = Some(base);
        self
    }

    pub fn location(mut self, location: &Uri) -> Result<Self, ResponseError> {
        let resolved = self.resolve(location)?;
        self.headers.set(LOCATION, resolved.to_string());
        Ok(self)
    }

    pub fn content_location(mut self, location: &Uri) -> Result<Self, ResponseError> {
        let resolved = self.resolve(location)?;
        self.headers.set(CONTENT_LOCATION, resolved.to_string());
        Ok(self)
    }

    /// Adds names to `Vary`, skipping any already listed.
    pub fn vary(mut self, names: &str) -> Self {
        let mut current: Vec<String> = self
            .headers
            .get_joined(VARY)
            .map(|joined| joined.split(',').map(|name| name.trim().to_string()).collect())
            .unwrap_or_default();
        for name in names.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            if !current.iter().any(|existing| existing.eq_ignore_ascii_case(name)) {
                current.push(name.to_string());
            }
        }
        if !current.is_empty() {
            self.headers.set(VARY, current.join(", "));
        }
        self
    }

    pub fn cache_control(mut self, directives: &str) -> Self {
        self.headers.set(CACHE_CONTROL, directives);
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: self.status,
            headers: self.headers,
            entity: self.entity,
        }
    }

    fn resolve(&self, location: &Uri) -> Result<Uri, UriError> {
        match &self.base_uri {
            Some(base) if !location.is_absolute() => base.resolve(location),
            _ => Ok(location.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bounds() {
        assert_eq!(ResponseBuilder::new().status(99), Err(ResponseError::InvalidStatus(99)));
        assert_eq!(ResponseBuilder::new().status(600), Err(ResponseError::InvalidStatus(600)));
        assert_eq!(ResponseBuilder::new().status(418).unwrap().build().status_code(), 418);
    }

    #[test]
    fn test_empty_header_name() {
        assert_eq!(ResponseBuilder::new().header(" ", "x"), Err(ResponseError::EmptyHeaderName));
    }

    #[test]
    fn test_relative_location_resolves_against_base() {
        let response = Response::status(StatusCode::CREATED)
            .base_uri(Uri::parse("http://example.com/items/").unwrap())
            .location(&Uri::parse("42").unwrap())
            .unwrap()
            .content_location(&Uri::parse("/other").unwrap())
            .unwrap()
            .build();
        assert_eq!(response.header(LOCATION), Some("http://example.com/items/42"));
        assert_eq!(response.header(CONTENT_LOCATION), Some("http://example.com/other"));
    }

    #[test]
    fn test_relative_location_without_base_is_kept() {
        let response = Response::ok().location(&Uri::parse("a/b").unwrap()).unwrap().build();
        assert_eq!(response.header(LOCATION), Some("a/b"));
    }

    #[test]
    fn test_vary_deduplicates() {
        let response = Response::ok().vary("Accept").vary("accept, Accept-Language").build();
        assert_eq!(response.header(VARY), Some("Accept, Accept-Language"));
    }

    #[test]
    fn test_not_acceptable_lists_dimensions() {
        let variants = [
            Variant::new(Some(MediaType::text_plain()), None, None).unwrap(),
            Variant::new(None, None, Some("gzip")).unwrap(),
        ];
        let response = Response::not_acceptable(&variants).build();
        assert_eq!(response.status_code(), 406);
        assert_eq!(response.header(VARY), Some("Accept, Accept-Encoding"));
    }

    #[test]
    fn test_variant_headers() {
        let variant = Variant::new(
            Some(MediaType::text_html()),
            Some(LanguageTag::parse("en-GB")),
            Some("gzip"),
        )
        .unwrap();
        let response = Response::ok().variant(&variant).build();
        assert_eq!(response.header(CONTENT_TYPE), Some("text/html"));
        assert_eq!(response.header(CONTENT_LANGUAGE), Some("en-GB"));
        assert_eq!(response.header(CONTENT_ENCODING), Some("gzip"));
    }
}
