use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::meta::split_header_list;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityTagError {
    #[error("empty entity tag")]
    Empty,
    #[error("malformed entity tag {0:?}")]
    Malformed(String),
}

/// An HTTP entity tag (RFC 7232 section 2.3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityTag {
    value: String,
    weak: bool,
}

impl EntityTag {
    pub fn strong(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            weak: false,
        }
    }

    pub fn weak(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            weak: true,
        }
    }

    /// Parses `"v"`, `W/"v"`, or a bare unquoted value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bramble_core::http::etag::EntityTag;
    /// let tag = EntityTag::parse("W/\"abc\"").unwrap();
    /// assert!(tag.is_weak());
    /// assert_eq!(tag.value(), "abc");
    /// assert_eq!(tag.to_string(), "W/\"abc\"");
    /// ```
    pub fn parse(header: &str) -> Result<Self, EntityTagError> {
        let trimmed = header.trim();
        if trimmed.is_empty() {
            return Err(EntityTagError::Empty);
        }
        let (weak, rest) = match trimmed.strip_prefix("W/").or_else(|| trimmed.strip_prefix("w/")) {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        let value = match rest.strip_prefix('"') {
            Some(quoted) => {
                let inner = quoted
                    .strip_suffix('"')
                    .ok_or_else(|| EntityTagError::Malformed(trimmed.to_string()))?;
                unescape(inner, trimmed)?
            }
            None if rest.contains('"') || rest.is_empty() => {
                return Err(EntityTagError::Malformed(trimmed.to_string()));
            }
            None => rest.to_string(),
        };
        Ok(Self { value, weak })
    }

    /// Parses a comma separated `If-Match`/`If-None-Match` list. `*` is
    /// returned as a strong tag with the value `*`.
    pub fn parse_list(header: &str) -> Result<Vec<Self>, EntityTagError> {
        split_header_list(header).into_iter().map(Self::parse).collect()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub fn is_wildcard(&self) -> bool {
        !self.weak && self.value == "*"
    }

    /// Strong comparison: both tags strong and their values equal.
    pub fn strong_eq(&self, other: &EntityTag) -> bool {
        !self.weak && !other.weak && self.value == other.value
    }

    /// Weak comparison: values equal regardless of either weak flag.
    pub fn weak_eq(&self, other: &EntityTag) -> bool {
        self.value == other.value
    }
}

fn unescape(inner: &str, original: &str) -> Result<String, EntityTagError> {
    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => value.push(escaped),
                None => return Err(EntityTagError::Malformed(original.to_string())),
            },
            '"' => return Err(EntityTagError::Malformed(original.to_string())),
            _ => value.push(c),
        }
    }
    Ok(value)
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            f.write_str("W/")?;
        }
        write!(f, "\"{}\"", self.value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

impl FromStr for EntityTag {
    type Err = EntityTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityTag::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(EntityTag::parse("\"xyz\"").unwrap(), EntityTag::strong("xyz"));
        assert_eq!(EntityTag::parse("W/\"xyz\"").unwrap(), EntityTag::weak("xyz"));
        assert_eq!(EntityTag::parse("xyz").unwrap(), EntityTag::strong("xyz"));
        assert_eq!(EntityTag::parse("\"a\\\"b\"").unwrap().value(), "a\"b");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(EntityTag::parse("  "), Err(EntityTagError::Empty));
        assert!(EntityTag::parse("\"open").is_err());
        assert!(EntityTag::parse("W/").is_err());
        assert!(EntityTag::parse("a\"b").is_err());
    }

    #[test]
    fn test_comparisons() {
        let strong = EntityTag::strong("1");
        let weak = EntityTag::weak("1");
        assert!(strong.strong_eq(&EntityTag::strong("1")));
        assert!(!weak.strong_eq(&EntityTag::weak("1")));
        assert!(!strong.strong_eq(&weak));
        assert!(weak.weak_eq(&EntityTag::weak("1")));
        assert!(weak.weak_eq(&strong));
        assert!(!weak.weak_eq(&EntityTag::weak("2")));
    }

    #[test]
    fn test_display_escapes() {
        assert_eq!(EntityTag::strong("a\"b").to_string(), "\"a\\\"b\"");
    }

    #[test]
    fn test_parse_list() {
        let tags = EntityTag::parse_list("\"a\", W/\"b\", *").unwrap();
        assert_eq!(tags.len(), 3);
        assert!(tags[1].is_weak());
        assert!(tags[2].is_wildcard());
    }
}
