use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::debug;

use super::accept::{LanguageTag, parse_accept, parse_accept_encoding, parse_accept_language};
use super::etag::EntityTag;
use super::http_date;
use super::http_value::{HttpMethod, StatusCode};
use super::media_type::{MediaType, MediaTypeCache};
use super::meta::HttpHeaders;
use super::response::ResponseBuilder;
use super::variant::{NegotiationError, Variant};

pub const ACCEPT: &str = "Accept";
pub const ACCEPT_LANGUAGE: &str = "Accept-Language";
pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
pub const IF_MATCH: &str = "If-Match";
pub const IF_NONE_MATCH: &str = "If-None-Match";
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";
pub const IF_UNMODIFIED_SINCE: &str = "If-Unmodified-Since";

/// What to do with an `If-Modified-Since`/`If-Unmodified-Since` header that
/// is not a valid HTTP-date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreconditionPolicy {
    /// Answer 412 Precondition Failed.
    #[default]
    Compatible,
    /// Ignore the header, as RFC 7232 section 3.3 asks.
    IgnoreMalformedDates,
}

/// The outcome of [`Request::select_variant`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSelection<'a> {
    variant: Option<&'a Variant>,
    vary: Option<String>,
}

impl<'a> VariantSelection<'a> {
    /// The chosen variant; `None` means the caller should answer 406.
    pub fn variant(&self) -> Option<&'a Variant> {
        self.variant
    }

    /// The `Vary` value: the request headers that took part in matching.
    pub fn vary(&self) -> Option<&str> {
        self.vary.as_deref()
    }

    pub fn is_match(&self) -> bool {
        self.variant.is_some()
    }
}

/// The parts of an incoming request that negotiation and conditional
/// processing look at.
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpMethod,
    headers: HttpHeaders,
    media_types: Arc<MediaTypeCache>,
    policy: PreconditionPolicy,
}

/// One entry of the cartesian product of the acceptable media types,
/// languages and encodings.
struct RequestVariant<'h> {
    media_type: &'h MediaType,
    language: &'h LanguageTag,
    encoding: Option<&'h str>,
}

/// Request headers that contributed to a match, in `Vary` order.
#[derive(Default)]
struct VaryHeaders {
    accept: bool,
    language: bool,
    encoding: bool,
}

impl VaryHeaders {
    fn header_value(&self) -> Option<String> {
        let names: Vec<&str> = [
            (self.accept, ACCEPT),
            (self.language, ACCEPT_LANGUAGE),
            (self.encoding, ACCEPT_ENCODING),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        (!names.is_empty()).then(|| names.join(", "))
    }
}

impl Request {
    pub fn new(method: HttpMethod, headers: HttpHeaders) -> Self {
        Self {
            method,
            headers,
            media_types: Arc::new(MediaTypeCache::default()),
            policy: PreconditionPolicy::default(),
        }
    }

    /// Shares a media type cache between requests.
    pub fn with_media_type_cache(mut self, cache: Arc<MediaTypeCache>) -> Self {
        self.media_types = cache;
        self
    }

    pub fn with_policy(mut self, policy: PreconditionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn policy(&self) -> PreconditionPolicy {
        self.policy
    }

    // --------------------------------------------------
    // Variant negotiation
    // --------------------------------------------------

    /// Picks the candidate that best matches the `Accept*` headers.
    ///
    /// Acceptable values are combined into request variants ordered by media
    /// type specificity, then language (wildcards last), then encoding
    /// (requested encodings first). The sort is stable, so header quality
    /// order decides among equal keys. The first candidate matching the
    /// first request variant wins; ties keep candidate order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bramble_core::http::http_value::HttpMethod;
    /// use bramble_core::http::media_type::MediaType;
    /// use bramble_core::http::meta::HttpHeaders;
    /// use bramble_core::http::variant::Variant;
    /// use bramble_core::Request;
    ///
    /// let headers: HttpHeaders = [("Accept", "text/html;q=0.5, text/plain;q=0.9")].into_iter().collect();
    /// let request = Request::new(HttpMethod::GET, headers);
    /// let variants = [
    ///     Variant::new(Some(MediaType::text_plain()), None, None).unwrap(),
    ///     Variant::new(Some(MediaType::text_html()), None, None).unwrap(),
    /// ];
    /// let selection = request.select_variant(&variants).unwrap();
    /// assert_eq!(selection.variant(), Some(&variants[0]));
    /// assert_eq!(selection.vary(), Some("Accept, Accept-Language, Accept-Encoding"));
    /// ```
    pub fn select_variant<'a>(&self, variants: &'a [Variant]) -> Result<VariantSelection<'a>, NegotiationError> {
        if variants.is_empty() {
            return Err(NegotiationError::NoCandidates);
        }
        let media_types = parse_accept(self.headers.get_joined(ACCEPT).as_deref(), &self.media_types)?;
        let languages = parse_accept_language(self.headers.get_joined(ACCEPT_LANGUAGE).as_deref());
        let encodings = parse_accept_encoding(self.headers.get_joined(ACCEPT_ENCODING).as_deref());
        let requested = request_variants(&media_types, &languages, &encodings);

        let mut vary = VaryHeaders::default();
        for wanted in &requested {
            for candidate in variants {
                let media_matched = candidate
                    .media_type()
                    .is_none_or(|offered| wanted.media_type.is_compatible(offered));
                vary.accept |= media_matched;

                let language_matched = candidate
                    .language()
                    .is_none_or(|offered| wanted.language.accepts(offered));
                vary.language |= language_matched;

                let encoding_matched = encodings.is_empty()
                    || candidate
                        .encoding()
                        .is_none_or(|offered| encoding_accepts(wanted.encoding, offered));
                vary.encoding |= encoding_matched;

                if media_matched && language_matched && encoding_matched {
                    debug!(
                        media_type = ?candidate.media_type().map(ToString::to_string),
                        language = ?candidate.language().map(ToString::to_string),
                        encoding = ?candidate.encoding(),
                        "selected variant"
                    );
                    return Ok(VariantSelection {
                        variant: Some(candidate),
                        vary: vary.header_value(),
                    });
                }
            }
        }
        debug!(candidates = variants.len(), "no acceptable variant");
        Ok(VariantSelection {
            variant: None,
            vary: vary.header_value(),
        })
    }

    // --------------------------------------------------
    // Preconditions
    // --------------------------------------------------

    /// Evaluates `If-Match` for a resource that does not exist: any tag other
    /// than `*` fails. `None` means "proceed".
    pub fn evaluate_preconditions(&self) -> Option<ResponseBuilder> {
        let value = self.headers.get(IF_MATCH)?;
        let failed = value
            .values()
            .flat_map(|line| line.split(','))
            .map(str::trim)
            .find(|tag| !tag.is_empty() && *tag != "*")?;
        let mut response = ResponseBuilder::from_status(StatusCode::PRECONDITION_FAILED);
        if let Ok(tag) = EntityTag::parse(failed) {
            response = response.tag(&tag);
        }
        Some(response)
    }

    /// `If-Match` then `If-None-Match` against the current entity tag.
    pub fn evaluate_preconditions_etag(&self, tag: &EntityTag) -> Option<ResponseBuilder> {
        self.evaluate_if_match(tag, None)
            .or_else(|| self.evaluate_if_none_match(tag, None))
    }

    /// `If-Unmodified-Since` then `If-Modified-Since` against the
    /// modification date.
    pub fn evaluate_preconditions_date(&self, last_modified: DateTime<Utc>) -> Option<ResponseBuilder> {
        self.evaluate_if_unmodified_since(last_modified)
            .or_else(|| self.evaluate_if_modified_since(last_modified))
    }

    /// The full RFC 7232 section 6 order. Each date header is only consulted
    /// when the matching tag header is absent.
    pub fn evaluate_preconditions_both(&self, last_modified: DateTime<Utc>, tag: &EntityTag) -> Option<ResponseBuilder> {
        self.evaluate_if_match(tag, Some(last_modified))
            .or_else(|| self.evaluate_if_none_match(tag, Some(last_modified)))
    }

    fn evaluate_if_match(&self, tag: &EntityTag, last_modified: Option<DateTime<Utc>>) -> Option<ResponseBuilder> {
        let Some(header) = self.headers.get_joined(IF_MATCH) else {
            return last_modified.and_then(|date| self.evaluate_if_unmodified_since(date));
        };
        // an unparsable list can never be satisfied
        let matched = EntityTag::parse_list(&header)
            .map(|tags| tags.iter().any(|candidate| candidate.is_wildcard() || candidate.strong_eq(tag)))
            .unwrap_or(false);
        if matched {
            return None;
        }
        debug!(method = %self.method, "If-Match failed");
        Some(ResponseBuilder::from_status(StatusCode::PRECONDITION_FAILED).tag(tag))
    }

    fn evaluate_if_none_match(&self, tag: &EntityTag, last_modified: Option<DateTime<Utc>>) -> Option<ResponseBuilder> {
        let Some(header) = self.headers.get_joined(IF_NONE_MATCH) else {
            return last_modified.and_then(|date| self.evaluate_if_modified_since(date));
        };
        let retrieval = self.method.is_retrieval();
        let matched = EntityTag::parse_list(&header)
            .map(|tags| {
                tags.iter().any(|candidate| {
                    candidate.is_wildcard() || if retrieval { candidate.weak_eq(tag) } else { candidate.strong_eq(tag) }
                })
            })
            .unwrap_or(false);
        if !matched {
            return None;
        }
        let status = if retrieval {
            StatusCode::NOT_MODIFIED
        } else {
            StatusCode::PRECONDITION_FAILED
        };
        debug!(method = %self.method, %status, "If-None-Match matched");
        Some(ResponseBuilder::from_status(status).tag(tag))
    }

    fn evaluate_if_unmodified_since(&self, last_modified: DateTime<Utc>) -> Option<ResponseBuilder> {
        let since = match self.conditional_date(IF_UNMODIFIED_SINCE)? {
            Ok(since) => since,
            Err(response) => return response,
        };
        if since < last_modified.trunc_subsecs(0) {
            return Some(ResponseBuilder::from_status(StatusCode::PRECONDITION_FAILED).last_modified(last_modified));
        }
        None
    }

    fn evaluate_if_modified_since(&self, last_modified: DateTime<Utc>) -> Option<ResponseBuilder> {
        if !self.method.is_retrieval() {
            return None;
        }
        let since = match self.conditional_date(IF_MODIFIED_SINCE)? {
            Ok(since) => since,
            Err(response) => return response,
        };
        if since < last_modified.trunc_subsecs(0) {
            return None;
        }
        Some(ResponseBuilder::from_status(StatusCode::NOT_MODIFIED).last_modified(last_modified))
    }

    /// `None` when the header is absent. A malformed date yields the response
    /// the policy dictates (`Some` for 412, `None` to ignore it).
    fn conditional_date(&self, name: &str) -> Option<Result<DateTime<Utc>, Option<ResponseBuilder>>> {
        let raw = self.headers.get_first(name)?;
        Some(http_date::parse(raw).map_err(|error| {
            debug!(header = name, %error, "malformed conditional date");
            match self.policy {
                PreconditionPolicy::Compatible => Some(ResponseBuilder::from_status(StatusCode::PRECONDITION_FAILED)),
                PreconditionPolicy::IgnoreMalformedDates => None,
            }
        }))
    }
}

fn request_variants<'h>(
    media_types: &'h [MediaType],
    languages: &'h [LanguageTag],
    encodings: &'h [String],
) -> Vec<RequestVariant<'h>> {
    let encodings: Vec<Option<&str>> = if encodings.is_empty() {
        vec![None]
    } else {
        encodings.iter().map(|encoding| Some(encoding.as_str())).collect()
    };
    let mut requested = Vec::with_capacity(media_types.len() * languages.len() * encodings.len());
    for media_type in media_types {
        for language in languages {
            for encoding in &encodings {
                requested.push(RequestVariant {
                    media_type,
                    language,
                    encoding: *encoding,
                });
            }
        }
    }
    requested.sort_by(compare_request_variants);
    requested
}

fn compare_request_variants(a: &RequestVariant<'_>, b: &RequestVariant<'_>) -> Ordering {
    a.media_type
        .specificity_rank()
        .cmp(&b.media_type.specificity_rank())
        .then_with(|| a.language.is_wildcard().cmp(&b.language.is_wildcard()))
        .then_with(|| b.encoding.is_some().cmp(&a.encoding.is_some()))
}

fn encoding_accepts(requested: Option<&str>, offered: &str) -> bool {
    requested.is_some_and(|requested| requested == "*" || requested.eq_ignore_ascii_case(offered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(method: HttpMethod, headers: &[(&str, &str)]) -> Request {
        Request::new(method, headers.iter().copied().collect())
    }

    fn variant(media_type: Option<&str>, language: Option<&str>, encoding: Option<&str>) -> Variant {
        Variant::new(
            media_type.map(|value| MediaType::parse(value).unwrap()),
            language.map(LanguageTag::parse),
            encoding,
        )
        .unwrap()
    }

    fn modified() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_no_candidates() {
        let request = request(HttpMethod::GET, &[]);
        assert_eq!(request.select_variant(&[]), Err(NegotiationError::NoCandidates));
    }

    #[test]
    fn test_quality_breaks_ties() {
        let request = request(HttpMethod::GET, &[(ACCEPT, "text/html;q=0.5, text/plain;q=0.9")]);
        let variants = [variant(Some("text/plain"), None, None), variant(Some("text/html"), None, None)];
        let selection = request.select_variant(&variants).unwrap();
        assert_eq!(selection.variant(), Some(&variants[0]));
    }

    #[test]
    fn test_language_outranks_media_quality() {
        let request = request(HttpMethod::GET, &[(ACCEPT, "text/plain, text/html;q=0.5"), (ACCEPT_LANGUAGE, "en, *")]);
        let variants = [variant(Some("text/html"), Some("en"), None), variant(Some("text/plain"), Some("fr"), None)];
        let selection = request.select_variant(&variants).unwrap();
        assert_eq!(selection.variant(), Some(&variants[0]));
    }

    #[test]
    fn test_specific_type_beats_wildcard() {
        let request = request(HttpMethod::GET, &[(ACCEPT, "*/*, application/json;q=0.2")]);
        let variants = [variant(Some("text/plain"), None, None), variant(Some("application/json"), None, None)];
        let selection = request.select_variant(&variants).unwrap();
        assert_eq!(selection.variant(), Some(&variants[1]));
    }

    #[test]
    fn test_language_primary_subtag() {
        let request = request(HttpMethod::GET, &[(ACCEPT_LANGUAGE, "fr-CA, en;q=0.5")]);
        let variants = [variant(None, Some("en"), None), variant(None, Some("FR"), None)];
        let selection = request.select_variant(&variants).unwrap();
        assert_eq!(selection.variant(), Some(&variants[1]));
    }

    #[test]
    fn test_encoding_only_matters_when_requested() {
        let variants = [variant(Some("text/plain"), None, Some("gzip"))];
        let plain = request(HttpMethod::GET, &[]);
        assert!(plain.select_variant(&variants).unwrap().is_match());

        let deflate = request(HttpMethod::GET, &[(ACCEPT_ENCODING, "deflate")]);
        let selection = deflate.select_variant(&variants).unwrap();
        assert!(!selection.is_match());
        assert_eq!(selection.vary(), Some("Accept, Accept-Language"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let request = request(HttpMethod::GET, &[(ACCEPT, "image/png")]);
        let variants = [variant(Some("text/plain"), None, None)];
        assert_eq!(request.select_variant(&variants).unwrap().variant(), None);
    }

    #[test]
    fn test_weak_if_none_match_on_get() {
        let tag = EntityTag::weak("v1");
        let get = request(HttpMethod::GET, &[(IF_NONE_MATCH, "W/\"v1\"")]);
        let response = get.evaluate_preconditions_etag(&tag).unwrap().build();
        assert_eq!(response.status_code(), 304);
        assert_eq!(response.header("ETag"), Some("W/\"v1\""));

        let put = request(HttpMethod::PUT, &[(IF_NONE_MATCH, "W/\"v1\"")]);
        assert!(put.evaluate_preconditions_etag(&tag).is_none());
    }

    #[test]
    fn test_if_match_uses_strong_comparison() {
        let tag = EntityTag::weak("v1");
        let put = request(HttpMethod::PUT, &[(IF_MATCH, "W/\"v1\"")]);
        let response = put.evaluate_preconditions_etag(&tag).unwrap().build();
        assert_eq!(response.status_code(), 412);

        let star = request(HttpMethod::PUT, &[(IF_MATCH, "*")]);
        assert!(star.evaluate_preconditions_etag(&tag).is_none());
    }

    #[test]
    fn test_if_none_match_star_on_put() {
        let request = request(HttpMethod::PUT, &[(IF_NONE_MATCH, "*")]);
        let response = request.evaluate_preconditions_etag(&EntityTag::strong("x")).unwrap().build();
        assert_eq!(response.status_code(), 412);
    }

    #[test]
    fn test_missing_resource() {
        assert!(request(HttpMethod::PUT, &[(IF_MATCH, "*")]).evaluate_preconditions().is_none());
        assert!(request(HttpMethod::PUT, &[]).evaluate_preconditions().is_none());
        let response = request(HttpMethod::PUT, &[(IF_MATCH, "\"a\"")])
            .evaluate_preconditions()
            .unwrap()
            .build();
        assert_eq!(response.status_code(), 412);
    }

    #[test]
    fn test_dates() {
        let before = "Wed, 01 Jan 2020 11:00:00 GMT";
        let after = "Wed, 01 Jan 2020 13:00:00 GMT";
        let stale = request(HttpMethod::GET, &[(IF_MODIFIED_SINCE, before)]);
        assert!(stale.evaluate_preconditions_date(modified()).is_none());
        let fresh = request(HttpMethod::GET, &[(IF_MODIFIED_SINCE, after)]);
        assert_eq!(fresh.evaluate_preconditions_date(modified()).unwrap().build().status_code(), 304);
        let post = request(HttpMethod::POST, &[(IF_MODIFIED_SINCE, after)]);
        assert!(post.evaluate_preconditions_date(modified()).is_none());
        let unmodified = request(HttpMethod::PUT, &[(IF_UNMODIFIED_SINCE, before)]);
        assert_eq!(unmodified.evaluate_preconditions_date(modified()).unwrap().build().status_code(), 412);
    }

    #[test]
    fn test_subsecond_modification_is_truncated() {
        let exact = "Wed, 01 Jan 2020 12:00:00 GMT";
        let request = request(HttpMethod::GET, &[(IF_MODIFIED_SINCE, exact)]);
        let modified = modified() + chrono::Duration::milliseconds(400);
        assert_eq!(request.evaluate_preconditions_date(modified).unwrap().build().status_code(), 304);
    }

    #[test]
    fn test_malformed_date_policy() {
        let headers = [(IF_UNMODIFIED_SINCE, "not a date")];
        let compatible = request(HttpMethod::PUT, &headers);
        assert_eq!(compatible.evaluate_preconditions_date(modified()).unwrap().build().status_code(), 412);
        let lenient = request(HttpMethod::PUT, &headers).with_policy(PreconditionPolicy::IgnoreMalformedDates);
        assert!(lenient.evaluate_preconditions_date(modified()).is_none());
    }

    #[test]
    fn test_tag_header_shadows_date_header() {
        let request = request(
            HttpMethod::GET,
            &[(IF_NONE_MATCH, "\"other\""), (IF_MODIFIED_SINCE, "Wed, 01 Jan 2020 13:00:00 GMT")],
        );
        assert!(request.evaluate_preconditions_both(modified(), &EntityTag::strong("v1")).is_none());
    }
}
