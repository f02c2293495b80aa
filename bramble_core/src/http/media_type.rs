use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaTypeError {
    #[error("empty media type")]
    Empty,
    #[error("media type {0:?} has no subtype")]
    MissingSubtype(String),
    #[error("media type {0:?} contains an invalid token")]
    InvalidToken(String),
    #[error("media type {value:?} has a malformed parameter {parameter:?}")]
    InvalidParameter { value: String, parameter: String },
}

/// A parsed media type such as `text/html;charset=UTF-8`.
///
/// Type, subtype and parameter names are stored lower case; parameter values
/// keep their case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    main_type: String,
    sub_type: String,
    parameters: BTreeMap<String, String>,
}

pub const WILDCARD: &str = "*";

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

impl MediaType {
    pub fn new(main_type: &str, sub_type: &str) -> Self {
        Self {
            main_type: main_type.to_ascii_lowercase(),
            sub_type: sub_type.to_ascii_lowercase(),
            parameters: BTreeMap::new(),
        }
    }

    /// `*/*`
    pub fn wildcard() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    pub fn text_html() -> Self {
        Self::new("text", "html")
    }

    pub fn application_json() -> Self {
        Self::new("application", "json")
    }

    pub fn application_form_urlencoded() -> Self {
        Self::new("application", "x-www-form-urlencoded")
    }

    /// Strictly parses `type/subtype *( ";" name=value )`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bramble_core::http::media_type::MediaType;
    /// let mt = MediaType::parse("Text/HTML; charset=\"UTF-8\"; q=0.5").unwrap();
    /// assert_eq!(mt.main_type(), "text");
    /// assert_eq!(mt.parameter("charset"), Some("UTF-8"));
    /// assert_eq!(mt.quality(), 0.5);
    /// ```
    pub fn parse(value: &str) -> Result<Self, MediaTypeError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(MediaTypeError::Empty);
        }
        let mut pieces = trimmed.split(';');
        let essence = pieces.next().unwrap_or_default().trim();
        let (main_type, sub_type) = essence
            .split_once('/')
            .ok_or_else(|| MediaTypeError::MissingSubtype(trimmed.to_string()))?;
        let (main_type, sub_type) = (main_type.trim(), sub_type.trim());
        if !is_token(main_type) || !is_token(sub_type) {
            return Err(MediaTypeError::InvalidToken(trimmed.to_string()));
        }
        let mut media_type = Self::new(main_type, sub_type);
        for parameter in pieces {
            let parameter = parameter.trim();
            if parameter.is_empty() {
                continue;
            }
            let invalid = || MediaTypeError::InvalidParameter {
                value: trimmed.to_string(),
                parameter: parameter.to_string(),
            };
            let (name, raw) = parameter.split_once('=').ok_or_else(invalid)?;
            let name = name.trim();
            if !is_token(name) {
                return Err(invalid());
            }
            let raw = raw.trim();
            let parameter_value = match raw.strip_prefix('"') {
                Some(quoted) => quoted.strip_suffix('"').ok_or_else(invalid)?.replace("\\\"", "\""),
                None => raw.to_string(),
            };
            media_type
                .parameters
                .insert(name.to_ascii_lowercase(), parameter_value);
        }
        Ok(media_type)
    }

    pub fn main_type(&self) -> &str {
        &self.main_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn with_parameter(mut self, name: &str, value: impl Into<String>) -> Self {
        self.parameters.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn without_parameters(&self) -> Self {
        Self::new(&self.main_type, &self.sub_type)
    }

    pub fn is_wildcard_type(&self) -> bool {
        self.main_type == WILDCARD
    }

    pub fn is_wildcard_subtype(&self) -> bool {
        self.sub_type == WILDCARD
    }

    /// The `q` parameter, defaulting to 1. Out-of-range or unparsable values
    /// count as 1 as well.
    pub fn quality(&self) -> f32 {
        self.parameter("q")
            .and_then(|q| q.trim().parse::<f32>().ok())
            .filter(|q| (0.0..=1.0).contains(q))
            .unwrap_or(1.0)
    }

    /// 0 for a concrete type, 1 for `type/*` (or `type/*+suffix`), 2 for `*/*`.
    pub fn specificity_rank(&self) -> u8 {
        if self.is_wildcard_type() {
            2
        } else if self.is_wildcard_subtype() || self.sub_type.starts_with("*+") {
            1
        } else {
            0
        }
    }

    /// Whether the two types can describe the same representation.
    ///
    /// Wildcard types match everything; wildcard subtypes match within the
    /// same type, and a `*+xml` style subtype matches any subtype with the
    /// same structured-syntax suffix.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bramble_core::http::media_type::MediaType;
    /// let atom = MediaType::parse("application/atom+xml").unwrap();
    /// assert!(MediaType::parse("application/*+xml").unwrap().is_compatible(&atom));
    /// assert!(MediaType::parse("*/*").unwrap().is_compatible(&atom));
    /// assert!(!MediaType::parse("text/*").unwrap().is_compatible(&atom));
    /// ```
    pub fn is_compatible(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() || other.is_wildcard_type() {
            return true;
        }
        if self.main_type != other.main_type {
            return false;
        }
        if self.is_wildcard_subtype() || other.is_wildcard_subtype() || self.sub_type == other.sub_type {
            return true;
        }
        suffix_matches(&self.sub_type, &other.sub_type) || suffix_matches(&other.sub_type, &self.sub_type)
    }
}

fn suffix_matches(pattern: &str, sub_type: &str) -> bool {
    match pattern.strip_prefix('*') {
        Some(suffix) if suffix.starts_with('+') => sub_type.ends_with(suffix),
        _ => false,
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        for (name, value) in &self.parameters {
            if is_token(value) {
                write!(f, ";{}={}", name, value)?;
            } else {
                write!(f, ";{}=\"{}\"", name, value.replace('"', "\\\""))?;
            }
        }
        Ok(())
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::parse(s)
    }
}

/// Parsed-media-type cache keyed by the raw header text.
///
/// When the cache reaches its capacity it is cleared wholesale rather than
/// evicted entry by entry. Concurrent callers may race on a clear and parse
/// the same value twice, but every map operation is atomic and values are
/// immutable, so a lookup never observes a torn entry.
#[derive(Debug)]
pub struct MediaTypeCache {
    entries: DashMap<String, MediaType>,
    capacity: usize,
    strict: bool,
}

impl Default for MediaTypeCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl MediaTypeCache {
    pub const DEFAULT_CAPACITY: usize = 200;

    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            strict: false,
        }
    }

    /// In strict mode malformed values are returned as errors instead of
    /// being mapped to a wildcard.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Parses `raw`, consulting and filling the cache.
    ///
    /// In lenient mode `*` becomes `*/*`, a bare token such as `text` becomes
    /// `text/*`, and anything else that fails to parse becomes `*/*`.
    pub fn parse(&self, raw: &str) -> Result<MediaType, MediaTypeError> {
        if let Some(hit) = self.entries.get(raw).map(|entry| entry.value().clone()) {
            return Ok(hit);
        }
        let parsed = match MediaType::parse(raw) {
            Ok(media_type) => media_type,
            Err(err) if self.strict => return Err(err),
            Err(err) => Self::lenient_fallback(raw, &err),
        };
        if self.entries.len() >= self.capacity {
            debug!(capacity = self.capacity, "media type cache full, clearing");
            self.entries.clear();
        }
        self.entries.insert(raw.to_string(), parsed.clone());
        Ok(parsed)
    }

    fn lenient_fallback(raw: &str, err: &MediaTypeError) -> MediaType {
        let trimmed = raw.trim();
        if trimmed == WILDCARD {
            return MediaType::wildcard();
        }
        let essence = trimmed.split(';').next().unwrap_or_default().trim();
        if !essence.contains('/') && is_token(essence) {
            return MediaType::new(essence, WILDCARD);
        }
        warn!(media_type = raw, error = %err, "malformed media type, using */*");
        MediaType::wildcard()
    }
}
