use bramble_lib::url_encoding::{TemplatePiece, template_pieces};
use regex::Regex;

use super::uri::UriError;

const DEFAULT_PATTERN: &str = "[^/]+?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Variable {
        name: String,
        pattern: Option<String>,
        /// The expression as written, braces included.
        expression: String,
    },
}

/// A string containing `{name}` or `{name: regex}` expressions.
///
/// # Examples
///
/// ```rust
/// use bramble_core::uri::UriTemplate;
/// let template = UriTemplate::parse("/users/{id: [0-9]+}/{tab}/{id}").unwrap();
/// assert_eq!(template.variables(), vec!["id", "tab"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    template: String,
    parts: Vec<TemplatePart>,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self, UriError> {
        let mut parts = Vec::new();
        for piece in template_pieces(template) {
            match piece {
                TemplatePiece::Literal(text) => parts.push(TemplatePart::Literal(text.to_string())),
                TemplatePiece::Template(expression) => {
                    let inner = &expression[1..expression.len() - 1];
                    let (name, pattern) = match inner.split_once(':') {
                        Some((name, pattern)) => (name.trim(), Some(pattern.trim().to_string())),
                        None => (inner.trim(), None),
                    };
                    if name.is_empty() || name.contains(char::is_whitespace) {
                        return Err(UriError::InvalidTemplate(template.to_string()));
                    }
                    if let Some(pattern) = &pattern {
                        Regex::new(pattern).map_err(|_| UriError::InvalidTemplate(template.to_string()))?;
                    }
                    parts.push(TemplatePart::Variable {
                        name: name.to_string(),
                        pattern,
                        expression: expression.to_string(),
                    });
                }
            }
        }
        Ok(Self {
            template: template.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    pub fn has_variables(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, TemplatePart::Variable { .. }))
    }

    /// Distinct variable names in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for part in &self.parts {
            if let TemplatePart::Variable { name, .. } = part {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Matches `input` against the template and returns the captured values
    /// in template order. A variable without an explicit pattern matches one
    /// path segment; a repeated variable must capture the same text each time.
    ///
    /// ```rust
    /// use bramble_core::uri::UriTemplate;
    /// let template = UriTemplate::parse("/items/{id: [0-9]+}/{name}").unwrap();
    /// let values = template.match_path("/items/42/lamp").unwrap();
    /// assert_eq!(values, vec![("id".to_string(), "42".to_string()), ("name".to_string(), "lamp".to_string())]);
    /// assert!(template.match_path("/items/x/lamp").is_none());
    /// ```
    pub fn match_path(&self, input: &str) -> Option<Vec<(String, String)>> {
        let mut pattern = String::from("^");
        // (name, groups the variable's own pattern adds)
        let mut variables: Vec<(&str, usize)> = Vec::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => pattern.push_str(&regex::escape(text)),
                TemplatePart::Variable { name, pattern: custom, .. } => {
                    let custom = custom.as_deref().unwrap_or(DEFAULT_PATTERN);
                    let inner_groups = Regex::new(custom).map_or(0, |r| r.captures_len() - 1);
                    pattern.push('(');
                    pattern.push_str(custom);
                    pattern.push(')');
                    variables.push((name.as_str(), inner_groups));
                }
            }
        }
        pattern.push('$');
        let regex = Regex::new(&pattern).ok()?;
        let captures = regex.captures(input)?;
        let mut values: Vec<(String, String)> = Vec::new();
        let mut group = 1;
        for (name, inner_groups) in variables {
            let value = captures.get(group)?.as_str().to_string();
            group += 1 + inner_groups;
            match values.iter().find(|(existing, _)| existing.as_str() == name) {
                Some((_, previous)) if *previous != value => return None,
                Some(_) => {}
                None => values.push((name.to_string(), value)),
            }
        }
        Some(values)
    }
}
