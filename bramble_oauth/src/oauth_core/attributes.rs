//! Typed name/value attributes flowing through a request, and the result
//! handed back to the caller.

use bramble_core::Response;

use super::error::OAuthError;

/// Where an attribute came from, or what it is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// Describes the request itself (request type, method).
    Request,
    /// An OAuth protocol parameter supplied by the client.
    Param,
    /// Returned to the client in the response body or redirect.
    ResponseAttribute,
    /// Returned to the caller only.
    ResponseMeta,
    /// Authorization decision for resource requests.
    ResponseDecision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
    pub values: Vec<String>,
}

impl Attribute {
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// Ordered attribute list; names are unique per type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeList {
    attributes: Vec<Attribute>,
}

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str, attribute_type: AttributeType) -> Option<usize> {
        self.attributes
            .iter()
            .position(|attribute| attribute.name == name && attribute.attribute_type == attribute_type)
    }

    /// Replaces the values of `name` for the given type.
    pub fn set<I, V>(&mut self, name: &str, attribute_type: AttributeType, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self.position(name, attribute_type) {
            Some(index) => self.attributes[index].values = values,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                attribute_type,
                values,
            }),
        }
    }

    pub fn set_single(&mut self, name: &str, attribute_type: AttributeType, value: impl Into<String>) {
        let value: String = value.into();
        self.set(name, attribute_type, [value]);
    }

    /// Appends a value, returning false when it was already present.
    pub fn add_value(&mut self, name: &str, attribute_type: AttributeType, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.position(name, attribute_type) {
            Some(index) => {
                let values = &mut self.attributes[index].values;
                if values.contains(&value) {
                    return false;
                }
                values.push(value);
                true
            }
            None => {
                self.attributes.push(Attribute {
                    name: name.to_string(),
                    attribute_type,
                    values: vec![value],
                });
                true
            }
        }
    }

    /// First value of `name` across all types.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .and_then(Attribute::value)
    }

    /// First non-empty value of `name` for the given type.
    pub fn value_of(&self, name: &str, attribute_type: AttributeType) -> Option<&str> {
        self.position(name, attribute_type)
            .and_then(|index| self.attributes[index].value())
            .filter(|value| !value.is_empty())
    }

    pub fn values(&self, name: &str, attribute_type: AttributeType) -> &[String] {
        self.position(name, attribute_type)
            .map(|index| self.attributes[index].values.as_slice())
            .unwrap_or(&[])
    }

    pub fn remove(&mut self, name: &str, attribute_type: AttributeType) -> Option<Attribute> {
        self.position(name, attribute_type).map(|index| self.attributes.remove(index))
    }

    pub fn of_type(&self, attribute_type: AttributeType) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(move |attribute| attribute.attribute_type == attribute_type)
    }

    /// A copy holding only the listed types.
    pub fn retain_types(&self, types: &[AttributeType]) -> AttributeList {
        AttributeList {
            attributes: self
                .attributes
                .iter()
                .filter(|attribute| types.contains(&attribute.attribute_type))
                .cloned()
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthResultStatus {
    Ok,
    Failed,
}

/// Outcome of one component call.
///
/// Failures carry the cause and an error response ready to send; callers
/// branch on [`OAuthResult::status`].
#[derive(Debug, Clone)]
pub struct OAuthResult {
    status: OAuthResultStatus,
    attributes: AttributeList,
    cause: Option<OAuthError>,
    response: Response,
}

impl OAuthResult {
    pub fn ok(attributes: AttributeList, response: Response) -> Self {
        Self {
            status: OAuthResultStatus::Ok,
            attributes,
            cause: None,
            response,
        }
    }

    pub fn failed(attributes: AttributeList, cause: OAuthError) -> Self {
        let response = cause.into_response();
        Self {
            status: OAuthResultStatus::Failed,
            attributes,
            cause: Some(cause),
            response,
        }
    }

    pub fn status(&self) -> OAuthResultStatus {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.status == OAuthResultStatus::Ok
    }

    pub fn attributes(&self) -> &AttributeList {
        &self.attributes
    }

    pub fn cause(&self) -> Option<&OAuthError> {
        self.cause.as_ref()
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_unique_per_type() {
        let mut list = AttributeList::new();
        list.set_single("scope", AttributeType::Param, "a");
        list.set_single("scope", AttributeType::ResponseAttribute, "b");
        list.set("scope", AttributeType::Param, ["c", "d"]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.values("scope", AttributeType::Param), ["c", "d"]);
        assert_eq!(list.value_of("scope", AttributeType::ResponseAttribute), Some("b"));
        assert_eq!(list.value("scope"), Some("c"));
    }

    #[test]
    fn test_add_value_deduplicates() {
        let mut list = AttributeList::new();
        assert!(list.add_value("scope", AttributeType::Param, "read"));
        assert!(!list.add_value("scope", AttributeType::Param, "read"));
        assert!(list.add_value("scope", AttributeType::Param, "write"));
        assert_eq!(list.values("scope", AttributeType::Param).len(), 2);
    }

    #[test]
    fn test_empty_value_reads_as_absent() {
        let mut list = AttributeList::new();
        list.set_single("state", AttributeType::Param, "");
        assert_eq!(list.value_of("state", AttributeType::Param), None);
        assert!(list.values("missing", AttributeType::Param).is_empty());
    }

    #[test]
    fn test_retain_types() {
        let mut list = AttributeList::new();
        list.set_single("a", AttributeType::Param, "1");
        list.set_single("b", AttributeType::ResponseDecision, "2");
        let kept = list.retain_types(&[AttributeType::ResponseDecision]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.value("b"), Some("2"));
        assert!(list.remove("a", AttributeType::Param).is_some());
        assert_eq!(list.of_type(AttributeType::Param).count(), 0);
    }
}
