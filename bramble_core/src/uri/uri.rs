use std::fmt;
use std::str::FromStr;

use bramble_lib::url_encoding::{TemplatePiece, is_escape_triple, template_pieces};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// RFC 3986 appendix B.
static URI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?$")
        .expect("static URI regex is valid")
});

static SCHEME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("static scheme regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("invalid scheme {0:?}")]
    InvalidScheme(String),
    #[error("invalid port {0:?}")]
    InvalidPort(String),
    #[error("illegal character {character:?} at index {index} in {uri:?}")]
    IllegalCharacter { uri: String, character: char, index: usize },
    #[error("malformed percent escape at index {index} in {uri:?}")]
    MalformedEscape { uri: String, index: usize },
    #[error("invalid URI template {0:?}")]
    InvalidTemplate(String),
    #[error("cannot resolve against the non-absolute URI {0:?}")]
    RelativeBase(String),
}

/// An immutable, validated URI reference.
///
/// Components are stored exactly as they appear in the source text, still
/// percent-encoded.
#[derive(Debug, Clone)]
pub struct Uri {
    raw: String,
    scheme: Option<String>,
    authority: Option<String>,
    user_info: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

struct Parts {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

fn decompose(input: &str) -> Parts {
    let captures = URI_REGEX.captures(input);
    let group = |index: usize| {
        captures
            .as_ref()
            .and_then(|c| c.get(index))
            .map(|m| m.as_str().to_string())
    };
    Parts {
        scheme: group(2),
        authority: group(4),
        path: group(5).unwrap_or_default(),
        query: group(7),
        fragment: group(9),
    }
}

pub(crate) fn is_valid_scheme(scheme: &str) -> bool {
    SCHEME_REGEX.is_match(scheme)
}

/// Byte range of the authority, the only place `[` and `]` may appear.
fn authority_span(parts: &Parts) -> Option<(usize, usize)> {
    parts.authority.as_ref().map(|authority| {
        let start = parts.scheme.as_ref().map_or(0, |s| s.len() + 1) + 2;
        (start, start + authority.len())
    })
}

fn check_characters(input: &str, allow_brackets_in: Option<(usize, usize)>) -> Result<(), UriError> {
    let bytes = input.as_bytes();
    for (index, c) in input.char_indices() {
        let illegal = match c {
            '%' => {
                if !is_escape_triple(bytes, index) {
                    return Err(UriError::MalformedEscape {
                        uri: input.to_string(),
                        index,
                    });
                }
                false
            }
            '[' | ']' => !allow_brackets_in.is_some_and(|(start, end)| index >= start && index < end),
            ' ' | '"' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}' => true,
            c => c.is_control(),
        };
        if illegal {
            return Err(UriError::IllegalCharacter {
                uri: input.to_string(),
                character: c,
                index,
            });
        }
    }
    Ok(())
}

/// Splits an authority into user info, host and port.
fn split_authority(authority: &str) -> Result<(Option<String>, Option<String>, Option<u16>), UriError> {
    let (user_info, host_port) = match authority.rsplit_once('@') {
        Some((user_info, rest)) => (Some(user_info.to_string()), rest),
        None => (None, authority),
    };
    let (host, port) = if host_port.starts_with('[') {
        match host_port.find(']') {
            Some(end) => {
                let port = host_port[end + 1..].strip_prefix(':');
                (&host_port[..=end], port)
            }
            None => return Err(UriError::IllegalCharacter {
                uri: authority.to_string(),
                character: '[',
                index: 0,
            }),
        }
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };
    let port = match port {
        Some("") | None => None,
        Some(digits) => Some(
            digits
                .parse::<u16>()
                .map_err(|_| UriError::InvalidPort(digits.to_string()))?,
        ),
    };
    let host = (!host.is_empty()).then(|| host.to_string());
    Ok((user_info, host, port))
}

impl Uri {
    /// Parses and validates a URI reference.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bramble_core::uri::Uri;
    /// let uri = Uri::parse("http://user@example.com:8080/a/b?x=1#top").unwrap();
    /// assert_eq!(uri.host(), Some("example.com"));
    /// assert_eq!(uri.port(), Some(8080));
    /// assert_eq!(uri.path(), "/a/b");
    /// assert_eq!(uri.query(), Some("x=1"));
    /// assert!(Uri::parse("http://a b").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, UriError> {
        let parts = decompose(input);
        check_characters(input, authority_span(&parts))?;
        Self::from_parts(input.to_string(), parts)
    }

    /// Parses a URI whose components may contain `{name}` template
    /// expressions. The expressions are masked while the URI is decomposed
    /// and restored in each component afterwards.
    ///
    /// ```rust
    /// use bramble_core::uri::Uri;
    /// let uri = Uri::parse_template("http://{host}:8080/{a}/b?x={x}").unwrap();
    /// assert_eq!(uri.host(), Some("{host}"));
    /// assert_eq!(uri.path(), "/{a}/b");
    /// assert_eq!(uri.query(), Some("x={x}"));
    /// ```
    pub fn parse_template(input: &str) -> Result<Self, UriError> {
        let mut masked = String::with_capacity(input.len());
        let mut expressions = Vec::new();
        for piece in template_pieces(input) {
            match piece {
                TemplatePiece::Literal(text) => masked.push_str(text),
                TemplatePiece::Template(text) => {
                    masked.push_str(&mask_marker(expressions.len()));
                    expressions.push(text);
                }
            }
        }
        if expressions.is_empty() {
            return Self::parse(input);
        }
        let parts = decompose(&masked);
        check_characters(&masked, authority_span(&parts))?;
        let restore = |value: String| {
            let mut restored = value;
            for (index, expression) in expressions.iter().enumerate() {
                restored = restored.replace(&mask_marker(index), expression);
            }
            restored
        };
        let parts = Parts {
            scheme: parts.scheme,
            authority: parts.authority.map(&restore),
            path: restore(parts.path),
            query: parts.query.map(&restore),
            fragment: parts.fragment.map(&restore),
        };
        Self::from_parts(input.to_string(), parts)
    }

    fn from_parts(raw: String, parts: Parts) -> Result<Self, UriError> {
        if let Some(scheme) = &parts.scheme {
            if !SCHEME_REGEX.is_match(scheme) {
                return Err(UriError::InvalidScheme(scheme.clone()));
            }
        }
        let (user_info, host, port) = match &parts.authority {
            Some(authority) => split_authority(authority)?,
            None => (None, None, None),
        };
        Ok(Self {
            raw,
            scheme: parts.scheme,
            authority: parts.authority,
            user_info,
            host,
            port,
            path: parts.path,
            query: parts.query,
            fragment: parts.fragment,
        })
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn user_info(&self) -> Option<&str> {
        self.user_info.as_deref()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn is_absolute(&self) -> bool {
        self.scheme.is_some()
    }

    /// An absolute URI whose scheme-specific part does not start with `/`,
    /// such as `mailto:a@example.com` or `urn:isbn:0451450523`.
    pub fn is_opaque(&self) -> bool {
        self.is_absolute() && self.authority.is_none() && !self.path.starts_with('/')
    }

    /// Everything between `scheme:` and the fragment.
    pub fn scheme_specific_part(&self) -> &str {
        let start = self.scheme.as_ref().map_or(0, |s| s.len() + 1);
        let end = self
            .fragment
            .as_ref()
            .map_or(self.raw.len(), |f| self.raw.len() - f.len() - 1);
        &self.raw[start..end]
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolves `reference` against this URI (RFC 3986 section 5.2.2).
    ///
    /// ```rust
    /// use bramble_core::uri::Uri;
    /// let base = Uri::parse("http://a/b/c/d;p?q").unwrap();
    /// let target = base.resolve(&Uri::parse("../g").unwrap()).unwrap();
    /// assert_eq!(target.as_str(), "http://a/b/g");
    /// ```
    pub fn resolve(&self, reference: &Uri) -> Result<Uri, UriError> {
        if reference.is_absolute() {
            return Ok(reference.clone());
        }
        if !self.is_absolute() {
            return Err(UriError::RelativeBase(self.raw.clone()));
        }
        let (authority, path, query) = if reference.authority.is_some() {
            (
                reference.authority.clone(),
                remove_dot_segments(&reference.path),
                reference.query.clone(),
            )
        } else if reference.path.is_empty() {
            (
                self.authority.clone(),
                self.path.clone(),
                reference.query.clone().or_else(|| self.query.clone()),
            )
        } else if reference.path.starts_with('/') {
            (
                self.authority.clone(),
                remove_dot_segments(&reference.path),
                reference.query.clone(),
            )
        } else {
            let merged = if self.authority.is_some() && self.path.is_empty() {
                format!("/{}", reference.path)
            } else {
                match self.path.rfind('/') {
                    Some(index) => format!("{}{}", &self.path[..=index], reference.path),
                    None => reference.path.clone(),
                }
            };
            (self.authority.clone(), remove_dot_segments(&merged), reference.query.clone())
        };
        let mut target = String::new();
        if let Some(scheme) = &self.scheme {
            target.push_str(scheme);
            target.push(':');
        }
        if let Some(authority) = &authority {
            target.push_str("//");
            target.push_str(authority);
        }
        target.push_str(&path);
        if let Some(query) = &query {
            target.push('?');
            target.push_str(query);
        }
        if let Some(fragment) = &reference.fragment {
            target.push('#');
            target.push_str(fragment);
        }
        Uri::parse(&target)
    }
}

fn mask_marker(index: usize) -> String {
    format!("\u{E000}{}\u{E001}", index)
}

/// RFC 3986 section 5.2.4.
fn remove_dot_segments(path: &str) -> String {
    let mut input = path;
    let mut output: Vec<&str> = Vec::new();
    while !input.is_empty() {
        if let Some(rest) = input.strip_prefix("../") {
            input = rest;
        } else if let Some(rest) = input.strip_prefix("./") {
            input = rest;
        } else if input.starts_with("/./") {
            input = &input[2..];
        } else if input == "/." {
            input = "/";
        } else if input.starts_with("/../") {
            input = &input[3..];
            output.pop();
        } else if input == "/.." {
            input = "/";
            output.pop();
        } else if input == "." || input == ".." {
            input = "";
        } else {
            let start = usize::from(input.starts_with('/'));
            let end = input[start..].find('/').map_or(input.len(), |i| i + start);
            output.push(&input[..end]);
            input = &input[end..];
        }
    }
    output.concat()
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Uri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uri::parse(s)
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Uri {}

impl std::hash::Hash for Uri {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}
