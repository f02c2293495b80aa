//! Percent-encoding helpers for URI components.
//!
//! Each URI component tolerates a different set of raw characters, so every
//! encoder here takes a [`Component`] that selects the matching `AsciiSet`.
//! Two flavours exist:
//!
//! - **full** encoding ([`encode_component`]) escapes every byte in the set,
//!   including `%`. Use it for raw, unencoded values.
//! - **partial** encoding ([`encode_partially`]) keeps existing `%XX` escape
//!   triples and escapes only a bare `%`. Use it for values that may already
//!   be encoded.
//!
//! Template expressions (`{name}`) can be skipped with
//! [`encode_outside_templates`] so that a value can be stored encoded while
//! its placeholders stay resolvable.

use percent_encoding::{percent_encode, AsciiSet, CONTROLS, NON_ALPHANUMERIC};
pub use percent_encoding::percent_decode;

/// Custom encode set for application/x-www-form-urlencoded allowing unreserved characters including hyphens
const FORM_URLENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Characters which never appear raw in any URI component.
const URI_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

const PATH_SET: &AsciiSet = &URI_UNSAFE.add(b'#').add(b'?');

const PATH_SEGMENT_SET: &AsciiSet = &PATH_SET.add(b'/');

const MATRIX_SET: &AsciiSet = &PATH_SEGMENT_SET.add(b';').add(b'=');

const QUERY_SET: &AsciiSet = &URI_UNSAFE.add(b'#');

const QUERY_PARAM_SET: &AsciiSet = &QUERY_SET.add(b'&').add(b'=').add(b'+');

const FRAGMENT_SET: &AsciiSet = &URI_UNSAFE.add(b'#');

const FRAGMENT_VALUE_SET: &AsciiSet = &FRAGMENT_SET.add(b'&').add(b'=');

const USER_INFO_SET: &AsciiSet = &PATH_SEGMENT_SET.add(b'@');

/// The URI component a value is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// A whole path; `/` is a delimiter and stays raw.
    Path,
    /// A single path segment; `/` is escaped.
    PathSegment,
    /// A matrix parameter name or value; `;` and `=` are escaped as well.
    Matrix,
    /// A literal query string; `&` and `=` are delimiters and stay raw.
    Query,
    /// A single query parameter name or value.
    QueryParam,
    /// A literal fragment.
    Fragment,
    /// A value substituted into a fragment; `&` and `=` are escaped.
    FragmentValue,
    /// The user-info part of an authority.
    UserInfo,
}

impl Component {
    fn ascii_set(self) -> &'static AsciiSet {
        match self {
            Component::Path => PATH_SET,
            Component::PathSegment => PATH_SEGMENT_SET,
            Component::Matrix => MATRIX_SET,
            Component::Query => QUERY_SET,
            Component::QueryParam => QUERY_PARAM_SET,
            Component::Fragment => FRAGMENT_SET,
            Component::FragmentValue => FRAGMENT_VALUE_SET,
            Component::UserInfo => USER_INFO_SET,
        }
    }
}

/// Encodes a string for URL safety and returns an owned `String`
///
/// # Example
/// ```
/// use bramble_lib::url_encoding::encode_url_owned;
/// let encoded = encode_url_owned("Hello World!");
/// assert_eq!(encoded, "Hello%20World%21");
/// ```
pub fn encode_url_owned(input: &str) -> String {
    percent_encode(input.as_bytes(), FORM_URLENCODE_SET).to_string()
}

/// Fully encodes `input` for the given component, escaping `%` too.
///
/// # Example
/// ```
/// use bramble_lib::url_encoding::{encode_component, Component};
/// assert_eq!(encode_component("b/c", Component::PathSegment), "b%2Fc");
/// assert_eq!(encode_component("b/c", Component::Path), "b/c");
/// assert_eq!(encode_component("a&b=c", Component::QueryParam), "a%26b%3Dc");
/// ```
pub fn encode_component(input: &str, component: Component) -> String {
    percent_encode(input.as_bytes(), component.ascii_set()).to_string()
}

/// Encodes `input` for the given component while keeping valid `%XX`
/// escape triples. A `%` that does not start a triple becomes `%25`.
///
/// # Example
/// ```
/// use bramble_lib::url_encoding::{encode_partially, Component};
/// assert_eq!(encode_partially("a%20b c%zz", Component::Path), "a%20b%20c%25zz");
/// ```
pub fn encode_partially(input: &str, component: Component) -> String {
    let set = component.ascii_set();
    let bytes = input.as_bytes();
    let mut result = String::with_capacity(input.len());
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if is_escape_triple(bytes, i) {
            result.extend(percent_encode(&bytes[start..i], set));
            result.push_str(&input[i..i + 3]);
            i += 3;
            start = i;
        } else {
            i += 1;
        }
    }
    result.extend(percent_encode(&bytes[start..], set));
    result
}

/// Encodes everything outside `{...}` template expressions, leaving the
/// expressions themselves untouched.
///
/// # Example
/// ```
/// use bramble_lib::url_encoding::{encode_outside_templates, Component};
/// let encoded = encode_outside_templates("a b/{id}", Component::PathSegment, false);
/// assert_eq!(encoded, "a%20b%2F{id}");
/// ```
pub fn encode_outside_templates(input: &str, component: Component, partially: bool) -> String {
    let mut result = String::with_capacity(input.len());
    for piece in template_pieces(input) {
        match piece {
            TemplatePiece::Literal(text) if partially => result.push_str(&encode_partially(text, component)),
            TemplatePiece::Literal(text) => result.push_str(&encode_component(text, component)),
            TemplatePiece::Template(text) => result.push_str(text),
        }
    }
    result
}

/// Returns true when `bytes[index]` starts a `%XX` escape triple.
pub fn is_escape_triple(bytes: &[u8], index: usize) -> bool {
    bytes.get(index) == Some(&b'%')
        && bytes.get(index + 1).is_some_and(|b| b.is_ascii_hexdigit())
        && bytes.get(index + 2).is_some_and(|b| b.is_ascii_hexdigit())
}

/// A slice of a templated string: either literal text or a whole
/// `{...}` expression including its braces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePiece<'a> {
    Literal(&'a str),
    Template(&'a str),
}

/// Splits `input` into literal text and template expressions.
///
/// Braces nest, so `{id: [0-9]{3}}` is one expression. An opening brace
/// without a matching close is kept as literal text.
///
/// # Example
/// ```
/// use bramble_lib::url_encoding::{template_pieces, TemplatePiece};
/// let pieces = template_pieces("/a/{b}/c");
/// assert_eq!(pieces, vec![
///     TemplatePiece::Literal("/a/"),
///     TemplatePiece::Template("{b}"),
///     TemplatePiece::Literal("/c"),
/// ]);
/// ```
pub fn template_pieces(input: &str) -> Vec<TemplatePiece<'_>> {
    let bytes = input.as_bytes();
    let mut pieces = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let Some(end) = matching_brace(bytes, i) else {
            break;
        };
        if literal_start < i {
            pieces.push(TemplatePiece::Literal(&input[literal_start..i]));
        }
        pieces.push(TemplatePiece::Template(&input[i..=end]));
        i = end + 1;
        literal_start = i;
    }
    if literal_start < input.len() {
        pieces.push(TemplatePiece::Literal(&input[literal_start..]));
    }
    pieces
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, b) in bytes[open..].iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decodes a URL-encoded string and returns an owned `String`.
///
/// # Arguments
///
/// * `input` - A URL-encoded string as a `&str`.
///
/// # Returns
///
/// A new `String` containing the decoded value.
pub fn decode_url_owned(input: &str) -> String {
    percent_decode(input.as_bytes())
        .decode_utf8_lossy()
        .into_owned()
}

/// Decodes one `application/x-www-form-urlencoded` name or value, where
/// `+` stands for a space.
pub fn decode_form_component(input: &str) -> String {
    decode_url_owned(&input.replace('+', " "))
}

/// Parses an `application/x-www-form-urlencoded` body into ordered pairs.
///
/// Empty pairs are skipped; a name without `=` gets an empty value.
///
/// # Example
/// ```
/// use bramble_lib::url_encoding::parse_form_urlencoded;
/// let pairs = parse_form_urlencoded("grant_type=authorization_code&redirect_uri=http%3A%2F%2Fa+b");
/// assert_eq!(pairs[0], ("grant_type".to_string(), "authorization_code".to_string()));
/// assert_eq!(pairs[1].1, "http://a b");
/// ```
pub fn parse_form_urlencoded(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (decode_form_component(name), decode_form_component(value)),
            None => (decode_form_component(pair), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_encoding_keeps_triples() {
        assert_eq!(encode_partially("%2F%2f", Component::PathSegment), "%2F%2f");
        assert_eq!(encode_partially("100%", Component::QueryParam), "100%25");
        assert_eq!(encode_partially("%4", Component::Fragment), "%254");
    }

    #[test]
    fn test_full_encoding_escapes_percent() {
        assert_eq!(encode_component("%20", Component::Path), "%2520");
    }

    #[test]
    fn test_query_param_keeps_slash() {
        assert_eq!(encode_component("a/b?c", Component::QueryParam), "a/b?c");
        assert_eq!(encode_component("a+b", Component::QueryParam), "a%2Bb");
    }

    #[test]
    fn test_fragment_value_escapes_delimiters() {
        assert_eq!(encode_component("x=1&y", Component::FragmentValue), "x%3D1%26y");
        assert_eq!(encode_component("x=1&y", Component::Fragment), "x=1&y");
    }

    #[test]
    fn test_non_ascii_is_encoded() {
        assert_eq!(encode_component("é", Component::Path), "%C3%A9");
    }

    #[test]
    fn test_template_pieces_nested_and_unterminated() {
        assert_eq!(
            template_pieces("{id: [0-9]{3}}x"),
            vec![TemplatePiece::Template("{id: [0-9]{3}}"), TemplatePiece::Literal("x")]
        );
        assert_eq!(template_pieces("a{b"), vec![TemplatePiece::Literal("a{b")]);
        assert_eq!(
            template_pieces("{a}{b}"),
            vec![TemplatePiece::Template("{a}"), TemplatePiece::Template("{b}")]
        );
    }

    #[test]
    fn test_encode_outside_templates_partially() {
        assert_eq!(
            encode_outside_templates("a%20{x}&b", Component::QueryParam, true),
            "a%20{x}%26b"
        );
    }

    #[test]
    fn test_form_parsing() {
        let pairs = parse_form_urlencoded("a=1&&b&c=%zz");
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1], ("b".to_string(), String::new()));
        assert_eq!(pairs[2].1, "%zz");
    }
}
