/// Represents a value for an HTTP header, which can be either a single string or multiple values.
///
/// HTTP headers can sometimes have multiple values, which are typically combined with commas,
/// when the same header line appears more than once in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// A single header value
    Single(String),
    /// Multiple header values
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// Create a new HeaderValue from a single string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bramble_core::http::meta::HeaderValue;
    /// let header = HeaderValue::new("application/json");
    /// assert_eq!(header.as_str(), "application/json");
    /// ```
    pub fn new<T: Into<String>>(value: T) -> Self {
        HeaderValue::Single(value.into())
    }

    /// Append a new value to the HeaderValue.
    ///
    /// If the HeaderValue is a single value, it will convert it to a multiple value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bramble_core::http::meta::HeaderValue;
    /// let mut header_value = HeaderValue::new("text/html");
    /// header_value.append("application/xhtml+xml");
    /// assert_eq!(header_value.as_str(), "text/html, application/xhtml+xml");
    /// ```
    pub fn append<T: Into<String>>(&mut self, value: T) {
        match self {
            HeaderValue::Single(s) => {
                let values = vec![std::mem::take(s), value.into()];
                *self = HeaderValue::Multiple(values);
            }
            HeaderValue::Multiple(v) => v.push(value.into()),
        }
    }

    /// Convert the HeaderValue to a string representation.
    ///
    /// Multiple values are joined with a comma and space, following HTTP header conventions.
    pub fn as_str(&self) -> String {
        match self {
            HeaderValue::Single(s) => s.clone(),
            HeaderValue::Multiple(v) => v.join(", "),
        }
    }

    /// Returns the number of values in this HeaderValue.
    pub fn len(&self) -> usize {
        match self {
            HeaderValue::Single(_) => 1,
            HeaderValue::Multiple(v) => v.len(),
        }
    }

    /// Checks if the HeaderValue is empty.
    ///
    /// A HeaderValue is considered empty if it contains no values or only empty strings.
    pub fn is_empty(&self) -> bool {
        match self {
            HeaderValue::Single(s) => s.is_empty(),
            HeaderValue::Multiple(v) => v.is_empty() || v.iter().all(|s| s.is_empty()),
        }
    }

    /// Attempts to get a value at the specified index.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bramble_core::http::meta::HeaderValue;
    /// let mut header = HeaderValue::new("text/html");
    /// assert_eq!(header.try_get(0), Some("text/html"));
    /// assert_eq!(header.try_get(1), None);
    ///
    /// header.append("application/json");
    /// assert_eq!(header.try_get(1), Some("application/json"));
    /// ```
    pub fn try_get(&self, index: usize) -> Option<&str> {
        match self {
            HeaderValue::Single(s) if index == 0 => Some(s.as_str()),
            HeaderValue::Single(_) => None,
            HeaderValue::Multiple(v) => v.get(index).map(String::as_str),
        }
    }

    /// Iterates over the raw values, one per header line.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            HeaderValue::Single(s) => std::slice::from_ref(s),
            HeaderValue::Multiple(v) => v,
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::new(value)
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Single(value)
    }
}

/// An ordered, case-insensitive header map.
///
/// Entries keep the spelling of the name that first introduced them and the
/// order in which names were first added. Adding a name again appends to its
/// value instead of creating a second entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpHeaders {
    entries: Vec<(String, HeaderValue)>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Appends a value, creating the entry if it does not exist yet.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1.append(value),
            None => self.entries.push((name, HeaderValue::new(value))),
        }
    }

    /// Replaces every value of `name` with `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1 = HeaderValue::new(value),
            None => self.entries.push((name, HeaderValue::new(value))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.position(name).map(|index| &self.entries[index].1)
    }

    /// The first value of `name`, ignoring any repeated header lines.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.try_get(0))
    }

    /// All values of `name` joined into one comma separated list, which is how
    /// list-valued headers such as `Accept` are combined across lines.
    pub fn get_joined(&self, name: &str) -> Option<String> {
        self.get(name).map(HeaderValue::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        self.position(name).map(|index| self.entries.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HttpHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HttpHeaders::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

/// Splits a comma separated header list, ignoring commas inside quoted strings.
pub(crate) fn split_header_list(value: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                items.push(value[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(value[start..].trim());
    items.retain(|item| !item.is_empty());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut headers = HttpHeaders::new();
        headers.add("Accept", "text/html");
        headers.add("ACCEPT", "text/plain");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_joined("accept").as_deref(), Some("text/html, text/plain"));
        assert_eq!(headers.get_first("Accept"), Some("text/html"));
    }

    #[test]
    fn test_set_replaces_all_values() {
        let mut headers: HttpHeaders = [("Vary", "Accept"), ("vary", "Accept-Language")].into_iter().collect();
        headers.set("VARY", "Accept-Encoding");
        assert_eq!(headers.get("Vary").map(HeaderValue::len), Some(1));
        assert_eq!(headers.get_first("vary"), Some("Accept-Encoding"));
    }

    #[test]
    fn test_split_header_list_respects_quotes() {
        let items = split_header_list(r#"W/"a,b", "c", , *"#);
        assert_eq!(items, vec![r#"W/"a,b""#, r#""c""#, "*"]);
    }
}
