//! A value-semantics URI builder with template resolution.
//!
//! Mutators consume the builder and hand it back, so `clone()` followed by
//! further calls always yields two independent builders. Terminal operations
//! (`build*`, `to_template`) borrow the builder and never change it; template
//! values bound with `resolve_template*` are drained from a per-build copy.
//!
//! Encoding rules:
//!
//! | where a value lands | `build` / `build_from_map`     | `*_from_encoded`            |
//! |---------------------|--------------------------------|-----------------------------|
//! | path                | `/` escaped unless disabled    | valid `%XX` kept            |
//! | query               | `&`, `=`, `+` escaped, `/` kept | valid `%XX` kept            |
//! | fragment            | `&`, `=` escaped, `/` kept     | valid `%XX` kept            |
//!
//! Literal text is always partially encoded: existing escape triples pass
//! through and a bare `%` becomes `%25`.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use bramble_lib::url_encoding::{
    Component, TemplatePiece, encode_component, encode_outside_templates, encode_partially, template_pieces,
};
use thiserror::Error;

use super::template::{TemplatePart, UriTemplate};
use super::uri::{Uri, UriError, is_valid_scheme};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriBuilderError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("port {0} is out of range")]
    InvalidPort(i32),
    #[error("not enough values for the URI templates: {required} required, {supplied} supplied")]
    NotEnoughValues { required: usize, supplied: usize },
    #[error("the template variable {0:?} has no value")]
    UnresolvedVariable(String),
    #[error(transparent)]
    Uri(#[from] UriError),
}

/// How a template value was supplied, which decides how it is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    EncodeSlash,
    KeepSlash,
    Encoded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolved {
    value: String,
    binding: Binding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PathSegment {
    /// Segment text as given; literal parts are encoded at build time.
    value: String,
    /// Matrix parameters, already encoded outside template expressions.
    matrix: Vec<(String, Option<String>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    UserInfo,
    Host,
    SchemeSpecificPart,
    Path,
    Query,
    Fragment,
}

impl Slot {
    fn literal_component(self) -> Component {
        match self {
            Slot::UserInfo => Component::UserInfo,
            Slot::Host | Slot::Path => Component::Path,
            Slot::SchemeSpecificPart | Slot::Query => Component::Query,
            Slot::Fragment => Component::Fragment,
        }
    }

    fn value_component(self, binding: Binding) -> Component {
        match (self, binding) {
            (Slot::Path, Binding::KeepSlash) => Component::Path,
            (Slot::Path, Binding::Encoded) => Component::Path,
            (Slot::Path | Slot::Host, _) => Component::PathSegment,
            (Slot::UserInfo, _) => Component::UserInfo,
            (Slot::SchemeSpecificPart | Slot::Query, _) => Component::QueryParam,
            (Slot::Fragment, _) => Component::FragmentValue,
        }
    }

    fn encode_value(self, resolved: &Resolved) -> String {
        let component = self.value_component(resolved.binding);
        match resolved.binding {
            Binding::Encoded => encode_partially(&resolved.value, component),
            Binding::EncodeSlash | Binding::KeepSlash => encode_component(&resolved.value, component),
        }
    }
}

/// Where the values for unresolved template variables come from.
enum Values<'a> {
    Positional(&'a [&'a str]),
    Named(&'a dyn Fn(&str) -> Option<String>),
    Unbound,
}

/// Builds URIs from components and `{name}` templates.
///
/// # Examples
///
/// ```rust
/// use bramble_core::uri::UriBuilder;
///
/// let uri = UriBuilder::from_template("http://example.com/users/{id}")?
///     .query_param("tab", &["a&b"])?
///     .build(&["j doe"])?;
/// assert_eq!(uri.as_str(), "http://example.com/users/j%20doe?tab=a%26b");
/// # Ok::<(), bramble_core::uri::UriBuilderError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriBuilder {
    scheme: Option<String>,
    scheme_specific_part: Option<String>,
    user_info: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    leading_slash: bool,
    segments: Vec<PathSegment>,
    query: Vec<(String, Vec<Option<String>>)>,
    fragment: Option<String>,
    resolved: HashMap<String, Resolved>,
}

impl UriBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_uri(uri: &Uri) -> Self {
        Self::new().uri_value(uri)
    }

    /// Starts from a URI string which may contain template expressions.
    pub fn from_template(template: &str) -> Result<Self, UriBuilderError> {
        Self::new().uri(template)
    }

    pub fn from_path(path: &str) -> Result<Self, UriBuilderError> {
        Self::new().path(path)
    }

    // --------------------------------------------------
    // Whole-URI mutators
    // --------------------------------------------------

    /// Copies the components present in `uri`, which may contain template
    /// expressions, replacing the builder's values for those components.
    pub fn uri(self, uri: &str) -> Result<Self, UriBuilderError> {
        let parsed = parse_uri_or_template(uri)?;
        Ok(self.uri_value(&parsed))
    }

    /// Copies the components present in `uri`. An opaque URI replaces the
    /// whole hierarchical part with its scheme-specific part.
    pub fn uri_value(mut self, uri: &Uri) -> Self {
        if let Some(scheme) = uri.scheme() {
            self.scheme = Some(scheme.to_string());
        }
        if uri.is_opaque() {
            self.scheme_specific_part = Some(uri.scheme_specific_part().to_string());
            self.user_info = None;
            self.host = None;
            self.port = None;
            self.leading_slash = false;
            self.segments.clear();
            self.query.clear();
        } else {
            self.scheme_specific_part = None;
            if uri.authority().is_some() {
                self.user_info = uri.user_info().map(str::to_string);
                self.host = uri.host().map(str::to_string);
                self.port = uri.port();
            }
            if !uri.path().is_empty() {
                self = self.replace_path(Some(uri.path()));
            }
            if let Some(query) = uri.query() {
                self = self.replace_query(Some(query));
            }
        }
        if let Some(fragment) = uri.fragment() {
            self.fragment = Some(fragment.to_string());
        }
        self
    }

    pub fn scheme(mut self, scheme: Option<&str>) -> Result<Self, UriBuilderError> {
        if let Some(scheme) = scheme {
            let templated = template_pieces(scheme)
                .iter()
                .any(|piece| matches!(piece, TemplatePiece::Template(_)));
            if !templated && !is_valid_scheme(scheme) {
                return Err(UriBuilderError::InvalidArgument(format!("invalid scheme {scheme:?}")));
            }
        }
        self.scheme = scheme.map(str::to_string);
        Ok(self)
    }

    /// Sets everything between `scheme:` and the fragment.
    ///
    /// A hierarchical value (`//host/path?query`) replaces the authority,
    /// path and query; anything else makes the URI opaque.
    pub fn scheme_specific_part(mut self, ssp: &str) -> Result<Self, UriBuilderError> {
        if ssp.is_empty() {
            return Err(UriBuilderError::InvalidArgument("scheme-specific part is empty".to_string()));
        }
        let text = match &self.scheme {
            Some(scheme) => format!("{scheme}:{ssp}"),
            None => ssp.to_string(),
        };
        let parsed = parse_uri_or_template(&text)?;
        if parsed.is_opaque() {
            self.scheme_specific_part = Some(ssp.to_string());
            self.user_info = None;
            self.host = None;
            self.port = None;
            self.leading_slash = false;
            self.segments.clear();
            self.query.clear();
            return Ok(self);
        }
        self.scheme_specific_part = None;
        self.user_info = parsed.user_info().map(str::to_string);
        self.host = parsed.host().map(str::to_string);
        self.port = parsed.port();
        self = self.replace_path(Some(parsed.path()));
        Ok(self.replace_query(parsed.query()))
    }

    // --------------------------------------------------
    // Authority
    // --------------------------------------------------

    pub fn user_info(mut self, user_info: Option<&str>) -> Self {
        self.user_info = user_info.map(str::to_string);
        self
    }

    /// Sets or clears the host. An empty host is an error.
    pub fn host(mut self, host: Option<&str>) -> Result<Self, UriBuilderError> {
        if host.is_some_and(str::is_empty) {
            return Err(UriBuilderError::InvalidArgument("host is empty".to_string()));
        }
        self.host = host.map(str::to_string);
        Ok(self)
    }

    /// Sets the port; `-1` clears it.
    pub fn port(mut self, port: i32) -> Result<Self, UriBuilderError> {
        self.port = match port {
            -1 => None,
            0..=65535 => Some(port as u16),
            _ => return Err(UriBuilderError::InvalidPort(port)),
        };
        Ok(self)
    }

    // --------------------------------------------------
    // Path and matrix parameters
    // --------------------------------------------------

    /// Appends `path`, inserting a `/` separator where needed.
    ///
    /// `;name=value` suffixes become matrix parameters of their segment. An
    /// absolute `http:`/`https:` URI replaces the builder's components
    /// instead.
    pub fn path(self, path: &str) -> Result<Self, UriBuilderError> {
        if is_http_uri(path) {
            return self.uri(path);
        }
        Ok(self.append_path(path))
    }

    /// Appends each value as exactly one segment: `/` inside a value is
    /// encoded as `%2F`.
    pub fn segment(mut self, segments: &[&str]) -> Self {
        self.drop_trailing_empty_segment();
        for segment in segments {
            self.segments.push(PathSegment {
                value: split_outside_templates(segment, '/').join("%2F"),
                matrix: Vec::new(),
            });
        }
        self
    }

    /// Clears the path (and any opaque scheme-specific part), then appends
    /// `path` if given.
    pub fn replace_path(mut self, path: Option<&str>) -> Self {
        self.scheme_specific_part = None;
        self.leading_slash = false;
        self.segments.clear();
        match path {
            Some(path) => self.append_path(path),
            None => self,
        }
    }

    /// Adds matrix parameters to the last path segment.
    pub fn matrix_param(mut self, name: &str, values: &[&str]) -> Result<Self, UriBuilderError> {
        check_name("matrix parameter", name)?;
        let name = encode_outside_templates(name, Component::Matrix, true);
        let segment = self.last_segment_mut();
        for value in values {
            segment
                .matrix
                .push((name.clone(), Some(encode_outside_templates(value, Component::Matrix, true))));
        }
        Ok(self)
    }

    /// Replaces all matrix parameters of the last segment with those in
    /// `matrix` (`a=1;b=2`, leading `;` optional).
    pub fn replace_matrix(mut self, matrix: Option<&str>) -> Self {
        let segment = self.last_segment_mut();
        segment.matrix.clear();
        if let Some(matrix) = matrix {
            segment.matrix = parse_matrix(matrix);
        }
        self
    }

    pub fn replace_matrix_param(mut self, name: &str, values: &[&str]) -> Result<Self, UriBuilderError> {
        check_name("matrix parameter", name)?;
        let encoded = encode_outside_templates(name, Component::Matrix, true);
        if let Some(segment) = self.segments.last_mut() {
            segment.matrix.retain(|(existing, _)| *existing != encoded);
        }
        self.matrix_param(name, values)
    }

    // --------------------------------------------------
    // Query and fragment
    // --------------------------------------------------

    /// Appends values for a query parameter. Values for the same name are
    /// kept together, in the order they were added.
    pub fn query_param(mut self, name: &str, values: &[&str]) -> Result<Self, UriBuilderError> {
        check_name("query parameter", name)?;
        let name = encode_outside_templates(name, Component::QueryParam, true);
        let encoded = values
            .iter()
            .map(|value| Some(encode_outside_templates(value, Component::QueryParam, true)));
        self.push_query(name, encoded);
        Ok(self)
    }

    /// Replaces the whole query with `query` (`a=1&b=2`).
    pub fn replace_query(mut self, query: Option<&str>) -> Self {
        self.query.clear();
        let Some(query) = query else {
            return self;
        };
        for pair in split_outside_templates(query, '&') {
            if pair.is_empty() {
                continue;
            }
            let pieces = split_outside_templates(pair, '=');
            let name = encode_outside_templates(pieces[0], Component::QueryParam, true);
            let value = (pieces.len() > 1)
                .then(|| encode_outside_templates(&pair[pieces[0].len() + 1..], Component::Query, true));
            self.push_query(name, std::iter::once(value));
        }
        self
    }

    /// Replaces every value of `name`; no values removes the parameter.
    pub fn replace_query_param(mut self, name: &str, values: &[&str]) -> Result<Self, UriBuilderError> {
        check_name("query parameter", name)?;
        let encoded = encode_outside_templates(name, Component::QueryParam, true);
        self.query.retain(|(existing, _)| *existing != encoded);
        self.query_param(name, values)
    }

    pub fn fragment(mut self, fragment: Option<&str>) -> Self {
        self.fragment = fragment.map(str::to_string);
        self
    }

    // --------------------------------------------------
    // Template resolution
    // --------------------------------------------------

    /// Binds `name` to `value`; `/` in the value is encoded when it lands in
    /// the path.
    pub fn resolve_template(self, name: &str, value: &str) -> Result<Self, UriBuilderError> {
        self.resolve_template_with(name, value, true)
    }

    pub fn resolve_template_with(
        self,
        name: &str,
        value: &str,
        encode_slash_in_path: bool,
    ) -> Result<Self, UriBuilderError> {
        let binding = if encode_slash_in_path {
            Binding::EncodeSlash
        } else {
            Binding::KeepSlash
        };
        self.bind(name, value, binding)
    }

    /// Binds `name` to an already encoded value.
    pub fn resolve_template_from_encoded(self, name: &str, value: &str) -> Result<Self, UriBuilderError> {
        self.bind(name, value, Binding::Encoded)
    }

    pub fn resolve_templates<I, K, V>(self, templates: I) -> Result<Self, UriBuilderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.resolve_templates_with(templates, true)
    }

    pub fn resolve_templates_with<I, K, V>(mut self, templates: I, encode_slash_in_path: bool) -> Result<Self, UriBuilderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in templates {
            self = self.resolve_template_with(name.as_ref(), value.as_ref(), encode_slash_in_path)?;
        }
        Ok(self)
    }

    pub fn resolve_templates_from_encoded<I, K, V>(mut self, templates: I) -> Result<Self, UriBuilderError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in templates {
            self = self.resolve_template_from_encoded(name.as_ref(), value.as_ref())?;
        }
        Ok(self)
    }

    // --------------------------------------------------
    // Terminal operations
    // --------------------------------------------------

    /// Builds the URI, substituting `values` in order of first appearance of
    /// each unresolved variable (authority, then path, query and fragment).
    /// Surplus values are ignored.
    pub fn build(&self, values: &[&str]) -> Result<Uri, UriBuilderError> {
        self.build_with(values, true)
    }

    pub fn build_with(&self, values: &[&str], encode_slash_in_path: bool) -> Result<Uri, UriBuilderError> {
        let binding = if encode_slash_in_path {
            Binding::EncodeSlash
        } else {
            Binding::KeepSlash
        };
        self.finish(Values::Positional(values), binding)
    }

    pub fn build_from_encoded(&self, values: &[&str]) -> Result<Uri, UriBuilderError> {
        self.finish(Values::Positional(values), Binding::Encoded)
    }

    pub fn build_from_map<K, V>(&self, values: &HashMap<K, V>) -> Result<Uri, UriBuilderError>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<str>,
    {
        self.build_from_map_with(values, true)
    }

    pub fn build_from_map_with<K, V>(&self, values: &HashMap<K, V>, encode_slash_in_path: bool) -> Result<Uri, UriBuilderError>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<str>,
    {
        let binding = if encode_slash_in_path {
            Binding::EncodeSlash
        } else {
            Binding::KeepSlash
        };
        let lookup = |name: &str| values.get(name).map(|value| value.as_ref().to_string());
        self.finish(Values::Named(&lookup), binding)
    }

    pub fn build_from_encoded_map<K, V>(&self, values: &HashMap<K, V>) -> Result<Uri, UriBuilderError>
    where
        K: Borrow<str> + Hash + Eq,
        V: AsRef<str>,
    {
        let lookup = |name: &str| values.get(name).map(|value| value.as_ref().to_string());
        self.finish(Values::Named(&lookup), Binding::Encoded)
    }

    /// Renders the URI with resolved variables substituted and unresolved
    /// expressions left in place.
    pub fn to_template(&self) -> Result<String, UriBuilderError> {
        self.render(Values::Unbound, Binding::EncodeSlash)
    }

    // --------------------------------------------------
    // Internals
    // --------------------------------------------------

    fn bind(mut self, name: &str, value: &str, binding: Binding) -> Result<Self, UriBuilderError> {
        check_name("template variable", name)?;
        self.resolved.insert(
            name.to_string(),
            Resolved {
                value: value.to_string(),
                binding,
            },
        );
        Ok(self)
    }

    fn append_path(mut self, path: &str) -> Self {
        if path.is_empty() {
            return self;
        }
        if self.segments.is_empty() && !self.leading_slash && path.starts_with('/') {
            self.leading_slash = true;
        }
        self.drop_trailing_empty_segment();
        let pieces = split_outside_templates(path, '/');
        let last = pieces.len() - 1;
        for (index, piece) in pieces.into_iter().enumerate() {
            // empty pieces collapse, except the one a trailing slash leaves
            if piece.is_empty() && (index != last || last == 0) {
                continue;
            }
            self.segments.push(parse_segment(piece));
        }
        self
    }

    fn drop_trailing_empty_segment(&mut self) {
        if self
            .segments
            .last()
            .is_some_and(|segment| segment.value.is_empty() && segment.matrix.is_empty())
        {
            self.segments.pop();
        }
    }

    fn last_segment_mut(&mut self) -> &mut PathSegment {
        if self.segments.is_empty() {
            self.segments.push(PathSegment::default());
        }
        let last = self.segments.len() - 1;
        &mut self.segments[last]
    }

    fn push_query(&mut self, name: String, values: impl Iterator<Item = Option<String>>) {
        match self.query.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => existing.extend(values),
            None => self.query.push((name, values.collect())),
        }
    }

    fn path_text(&self) -> String {
        let mut path = String::new();
        if self.leading_slash {
            path.push('/');
        }
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                path.push('/');
            }
            path.push_str(&segment.value);
            for (name, value) in &segment.matrix {
                path.push(';');
                path.push_str(name);
                if let Some(value) = value {
                    path.push('=');
                    path.push_str(value);
                }
            }
        }
        path
    }

    fn query_text(&self) -> String {
        let mut pairs = Vec::new();
        for (name, values) in &self.query {
            for value in values {
                match value {
                    Some(value) => pairs.push(format!("{name}={value}")),
                    None => pairs.push(name.clone()),
                }
            }
        }
        pairs.join("&")
    }

    /// The templated components in resolution order.
    fn slots(&self) -> Result<Vec<(Slot, UriTemplate)>, UriBuilderError> {
        let mut slots = Vec::new();
        if let Some(ssp) = &self.scheme_specific_part {
            slots.push((Slot::SchemeSpecificPart, UriTemplate::parse(ssp)?));
        } else {
            if let Some(user_info) = &self.user_info {
                slots.push((Slot::UserInfo, UriTemplate::parse(user_info)?));
            }
            if let Some(host) = &self.host {
                slots.push((Slot::Host, UriTemplate::parse(host)?));
            }
            slots.push((Slot::Path, UriTemplate::parse(&self.path_text())?));
            let query = self.query_text();
            if !query.is_empty() {
                slots.push((Slot::Query, UriTemplate::parse(&query)?));
            }
        }
        if let Some(fragment) = &self.fragment {
            slots.push((Slot::Fragment, UriTemplate::parse(fragment)?));
        }
        Ok(slots)
    }

    fn finish(&self, values: Values<'_>, binding: Binding) -> Result<Uri, UriBuilderError> {
        let rendered = self.render(values, binding)?;
        Ok(Uri::parse(&rendered)?)
    }

    fn render(&self, values: Values<'_>, binding: Binding) -> Result<String, UriBuilderError> {
        let slots = self.slots()?;

        let mut order: Vec<&str> = Vec::new();
        for (_, template) in &slots {
            for name in template.variables() {
                if !order.contains(&name) {
                    order.push(name);
                }
            }
        }

        let mut pending = self.resolved.clone();
        let required = order.iter().filter(|name| !pending.contains_key(**name)).count();
        let mut bound: HashMap<&str, Resolved> = HashMap::new();
        let mut next_value = 0;
        for name in order {
            if let Some(resolved) = pending.remove(name) {
                bound.insert(name, resolved);
                continue;
            }
            let value = match &values {
                Values::Positional(list) => {
                    let value = list.get(next_value).ok_or(UriBuilderError::NotEnoughValues {
                        required,
                        supplied: list.len(),
                    })?;
                    next_value += 1;
                    value.to_string()
                }
                Values::Named(lookup) => {
                    lookup(name).ok_or_else(|| UriBuilderError::UnresolvedVariable(name.to_string()))?
                }
                Values::Unbound => continue,
            };
            bound.insert(name, Resolved { value, binding });
        }

        let mut rendered: HashMap<Slot, String> = HashMap::new();
        for (slot, template) in &slots {
            let mut text = String::new();
            for part in template.parts() {
                match part {
                    TemplatePart::Literal(literal) if *slot == Slot::Host => text.push_str(literal),
                    TemplatePart::Literal(literal) => {
                        text.push_str(&encode_partially(literal, slot.literal_component()))
                    }
                    TemplatePart::Variable { name, expression, .. } => match bound.get(name.as_str()) {
                        Some(resolved) => text.push_str(&slot.encode_value(resolved)),
                        None => text.push_str(expression),
                    },
                }
            }
            rendered.insert(*slot, text);
        }

        let mut uri = String::new();
        if let Some(scheme) = &self.scheme {
            uri.push_str(scheme);
            uri.push(':');
        }
        if let Some(ssp) = rendered.remove(&Slot::SchemeSpecificPart) {
            uri.push_str(&ssp);
        } else {
            let user_info = rendered.remove(&Slot::UserInfo);
            let host = rendered.remove(&Slot::Host);
            let has_authority = user_info.is_some() || host.is_some() || self.port.is_some();
            if has_authority {
                uri.push_str("//");
                if let Some(user_info) = user_info {
                    uri.push_str(&user_info);
                    uri.push('@');
                }
                if let Some(host) = host {
                    uri.push_str(&host);
                }
                if let Some(port) = self.port {
                    uri.push(':');
                    uri.push_str(&port.to_string());
                }
            }
            let path = rendered.remove(&Slot::Path).unwrap_or_default();
            if has_authority && !path.is_empty() && !path.starts_with('/') {
                uri.push('/');
            }
            uri.push_str(&path);
            if let Some(query) = rendered.remove(&Slot::Query) {
                uri.push('?');
                uri.push_str(&query);
            }
        }
        if let Some(fragment) = rendered.remove(&Slot::Fragment) {
            uri.push('#');
            uri.push_str(&fragment);
        }
        Ok(uri)
    }
}

fn check_name(what: &str, name: &str) -> Result<(), UriBuilderError> {
    if name.is_empty() {
        return Err(UriBuilderError::InvalidArgument(format!("{what} name is empty")));
    }
    Ok(())
}

fn is_http_uri(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http:") || lower.starts_with("https:")
}

fn parse_uri_or_template(value: &str) -> Result<Uri, UriError> {
    Uri::parse(value).or_else(|_| Uri::parse_template(value))
}

/// Splits on `separator`, skipping separators inside `{...}` expressions.
fn split_outside_templates(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for piece in template_pieces(input) {
        match piece {
            TemplatePiece::Literal(text) => {
                for (index, c) in text.char_indices() {
                    if c == separator {
                        parts.push(&input[start..offset + index]);
                        start = offset + index + c.len_utf8();
                    }
                }
                offset += text.len();
            }
            TemplatePiece::Template(text) => offset += text.len(),
        }
    }
    parts.push(&input[start..]);
    parts
}

fn parse_segment(text: &str) -> PathSegment {
    let mut pieces = split_outside_templates(text, ';').into_iter();
    let value = pieces.next().unwrap_or_default().to_string();
    let matrix = parse_matrix_pieces(pieces);
    PathSegment { value, matrix }
}

fn parse_matrix(matrix: &str) -> Vec<(String, Option<String>)> {
    parse_matrix_pieces(split_outside_templates(matrix, ';').into_iter())
}

fn parse_matrix_pieces<'a>(pieces: impl Iterator<Item = &'a str>) -> Vec<(String, Option<String>)> {
    pieces
        .filter(|piece| !piece.is_empty())
        .map(|piece| {
            let parts = split_outside_templates(piece, '=');
            let name = encode_outside_templates(parts[0], Component::Matrix, true);
            let value = (parts.len() > 1)
                .then(|| encode_outside_templates(&piece[parts[0].len() + 1..], Component::Path, true));
            (name, value)
        })
        .collect()
}
