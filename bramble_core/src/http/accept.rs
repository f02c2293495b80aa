//! Parsers for `Accept`, `Accept-Language` and `Accept-Encoding`.
//!
//! Entries with `q=0` are dropped: they explicitly mark a value as not
//! acceptable, so they can never produce a match.

use std::fmt;

use super::media_type::{MediaType, MediaTypeCache, MediaTypeError};
use super::meta::split_header_list;

/// A language tag reduced to what negotiation needs: the primary subtag and
/// whatever follows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageTag {
    primary: String,
    rest: Option<String>,
}

impl LanguageTag {
    /// Parses `en`, `en-US` or `en_US`. The primary subtag is stored lower case.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.split_once(['-', '_']) {
            Some((primary, rest)) if !rest.is_empty() => Self {
                primary: primary.to_ascii_lowercase(),
                rest: Some(rest.to_string()),
            },
            Some((primary, _)) => Self {
                primary: primary.to_ascii_lowercase(),
                rest: None,
            },
            None => Self {
                primary: value.to_ascii_lowercase(),
                rest: None,
            },
        }
    }

    pub fn wildcard() -> Self {
        Self {
            primary: "*".to_string(),
            rest: None,
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn rest(&self) -> Option<&str> {
        self.rest.as_deref()
    }

    pub fn is_wildcard(&self) -> bool {
        self.primary == "*"
    }

    /// True when this (requested) tag accepts `offered`: a wildcard accepts
    /// anything, otherwise only the primary subtags are compared.
    pub fn accepts(&self, offered: &LanguageTag) -> bool {
        self.is_wildcard() || self.primary.eq_ignore_ascii_case(&offered.primary)
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rest {
            Some(rest) => write!(f, "{}-{}", self.primary, rest),
            None => f.write_str(&self.primary),
        }
    }
}

fn split_quality(entry: &str) -> (&str, f32) {
    let mut parts = entry.split(';');
    let value = parts.next().unwrap_or_default().trim();
    let mut quality = 1.0;
    for parameter in parts {
        if let Some((name, raw)) = parameter.split_once('=') {
            if name.trim().eq_ignore_ascii_case("q") {
                quality = raw.trim().parse::<f32>().unwrap_or(1.0).clamp(0.0, 1.0);
            }
        }
    }
    (value, quality)
}

fn sort_by_quality<T>(entries: &mut [(T, f32)]) {
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
}

/// Parses `Accept` into media types ordered by descending quality.
///
/// The sort is stable, so equally weighted types keep header order. A
/// missing or empty header means `*/*`.
pub fn parse_accept(header: Option<&str>, cache: &MediaTypeCache) -> Result<Vec<MediaType>, MediaTypeError> {
    let header = header.map(str::trim).unwrap_or_default();
    if header.is_empty() {
        return Ok(vec![MediaType::wildcard()]);
    }
    let mut entries = Vec::new();
    for item in split_header_list(header) {
        let media_type = cache.parse(item)?;
        let quality = media_type.quality();
        if quality > 0.0 {
            entries.push((media_type, quality));
        }
    }
    sort_by_quality(&mut entries);
    Ok(entries.into_iter().map(|(media_type, _)| media_type).collect())
}

/// Parses `Accept-Language` into tags ordered by descending quality. A
/// missing or empty header means `*`.
pub fn parse_accept_language(header: Option<&str>) -> Vec<LanguageTag> {
    let header = header.map(str::trim).unwrap_or_default();
    if header.is_empty() {
        return vec![LanguageTag::wildcard()];
    }
    let mut entries: Vec<(LanguageTag, f32)> = split_header_list(header)
        .into_iter()
        .map(split_quality)
        .filter(|(tag, quality)| !tag.is_empty() && *quality > 0.0)
        .map(|(tag, quality)| (LanguageTag::parse(tag), quality))
        .collect();
    sort_by_quality(&mut entries);
    entries.into_iter().map(|(tag, _)| tag).collect()
}

/// Parses `Accept-Encoding` into codings in header order, qualifiers removed.
/// A missing header yields an empty list, meaning no encoding was requested.
///
/// Codings listed with `q=0` are dropped rather than kept: RFC 7231 §5.3.4
/// defines `q=0` as "not acceptable", so they never match a variant.
pub fn parse_accept_encoding(header: Option<&str>) -> Vec<String> {
    let header = header.map(str::trim).unwrap_or_default();
    split_header_list(header)
        .into_iter()
        .map(split_quality)
        .filter(|(coding, quality)| !coding.is_empty() && *quality > 0.0)
        .map(|(coding, _)| coding.to_string())
        .collect()
}
