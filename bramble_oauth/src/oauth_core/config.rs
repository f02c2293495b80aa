//! Startup configuration of the OAuth provider.
//!
//! Properties arrive as a keyed bag of strings or string lists and are
//! validated eagerly. Anything wrong here is a [`ConfigError`], reported
//! before the component handles its first request.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::types::GrantType;

pub const GRANT_TYPES_ALLOWED: &str = "oauth20.grant.types.allowed";
pub const CODE_LENGTH: &str = "oauth20.code.length";
pub const ACCESS_TOKEN_LENGTH: &str = "oauth20.access.token.length";
pub const REFRESH_TOKEN_LENGTH: &str = "oauth20.refresh.token.length";
pub const CODE_LIFETIME: &str = "oauth20.code.lifetime.seconds";
pub const TOKEN_LIFETIME: &str = "oauth20.token.lifetime.seconds";
pub const MAX_AUTHORIZATION_GRANT_LIFETIME: &str = "oauth20.max.authorization.grant.lifetime.seconds";
pub const ISSUE_REFRESH_TOKEN: &str = "oauth20.issue.refresh.token";
pub const ALLOW_PUBLIC_CLIENTS: &str = "oauth20.allow.public.clients";
pub const CLIENT_PROVIDER: &str = "oauth20.client.provider.classname";
pub const TOKEN_CACHE: &str = "oauth20.token.cache.classname";
pub const TOKEN_TYPE_HANDLER: &str = "oauth20.access.tokentypehandler.classname";
pub const MEDIATORS: &str = "oauth20.mediator.classnames";

const MAX_TOKEN_LENGTH: i64 = 500;
/// One hundred years; expiry instants must stay within the chrono range.
pub const MAX_LIFETIME_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("required property {0} is missing")]
    MissingProperty(&'static str),
    #[error("property {property} must have at least one value")]
    Empty { property: &'static str },
    #[error("property {property} is not an integer: {value}")]
    InvalidInteger { property: &'static str, value: String },
    #[error("property {property} is {value}, expected {min}..={max}")]
    OutOfRange { property: &'static str, value: i64, min: i64, max: i64 },
    #[error("property {property} is not a boolean: {value}")]
    InvalidBoolean { property: &'static str, value: String },
    #[error("unknown grant type in oauth20.grant.types.allowed: {0}")]
    InvalidGrantType(String),
    #[error("property {property} names no built-in implementation: {value}")]
    UnknownPlugin { property: &'static str, value: String },
    #[error("invalid JSON configuration: {0}")]
    Json(String),
}

/// A raw property value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Single(String),
    Multiple(Vec<String>),
    Number(i64),
    Flag(bool),
}

impl PropertyValue {
    /// The value as a list, splitting single strings on commas and spaces.
    fn items(&self) -> Vec<String> {
        match self {
            PropertyValue::Single(value) => value
                .split([',', ' '])
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
            PropertyValue::Multiple(values) => values
                .iter()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .collect(),
            PropertyValue::Number(value) => vec![value.to_string()],
            PropertyValue::Flag(value) => vec![value.to_string()],
        }
    }

    fn scalar(&self) -> String {
        match self {
            PropertyValue::Single(value) => value.trim().to_string(),
            PropertyValue::Multiple(values) => values.first().map(|value| value.trim().to_string()).unwrap_or_default(),
            PropertyValue::Number(value) => value.to_string(),
            PropertyValue::Flag(value) => value.to_string(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Single(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Single(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::Multiple(values)
    }
}

impl From<&[&str]> for PropertyValue {
    fn from(values: &[&str]) -> Self {
        PropertyValue::Multiple(values.iter().map(|value| value.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PropertyValue {
    fn from(values: [&str; N]) -> Self {
        PropertyValue::Multiple(values.iter().map(|value| value.to_string()).collect())
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Flag(value)
    }
}

/// Mediators shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediatorKind {
    Audit,
}

/// Validated provider configuration.
///
/// # Examples
///
/// ```rust
/// use bramble_oauth::oauth_core::config::{OAuthConfig, PropertyValue, GRANT_TYPES_ALLOWED, ACCESS_TOKEN_LENGTH};
///
/// let config = OAuthConfig::from_properties([
///     (GRANT_TYPES_ALLOWED, PropertyValue::from("authorization_code refresh_token")),
///     (ACCESS_TOKEN_LENGTH, PropertyValue::from(64)),
/// ]).unwrap();
/// assert_eq!(config.access_token_length, 64);
/// assert_eq!(config.code_length, 30);
/// assert!(config.issue_refresh_token);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub grant_types_allowed: Vec<GrantType>,
    pub code_length: usize,
    pub access_token_length: usize,
    pub refresh_token_length: usize,
    /// Seconds.
    pub code_lifetime: u64,
    pub token_lifetime: u64,
    pub max_authorization_grant_lifetime: u64,
    pub issue_refresh_token: bool,
    pub allow_public_clients: bool,
    pub mediators: Vec<MediatorKind>,
}

impl OAuthConfig {
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<PropertyValue>,
    {
        let properties: HashMap<String, PropertyValue> = properties
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::validate(&properties)
    }

    /// Reads a JSON object of properties.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let properties: HashMap<String, PropertyValue> =
            serde_json::from_str(json).map_err(|err| ConfigError::Json(err.to_string()))?;
        Self::validate(&properties)
    }

    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types_allowed.contains(&grant_type)
    }

    fn validate(properties: &HashMap<String, PropertyValue>) -> Result<Self, ConfigError> {
        for key in properties.keys() {
            if !KNOWN.contains(&key.as_str()) {
                debug!(property = %key, "ignoring unknown OAuth property");
            }
        }

        let grant_types_allowed = grant_types(properties)?;

        plugin(properties, CLIENT_PROVIDER, &["memory"])?;
        plugin(properties, TOKEN_CACHE, &["memory"])?;
        plugin(properties, TOKEN_TYPE_HANDLER, &["bearer"])?;
        let mediators = match properties.get(MEDIATORS) {
            None => Vec::new(),
            Some(value) => value
                .items()
                .into_iter()
                .map(|name| match name.as_str() {
                    "audit" => Ok(MediatorKind::Audit),
                    _ => Err(ConfigError::UnknownPlugin { property: MEDIATORS, value: name }),
                })
                .collect::<Result<_, _>>()?,
        };

        Ok(Self {
            grant_types_allowed,
            code_length: length(properties, CODE_LENGTH, 30)?,
            access_token_length: length(properties, ACCESS_TOKEN_LENGTH, 40)?,
            refresh_token_length: length(properties, REFRESH_TOKEN_LENGTH, 50)?,
            code_lifetime: lifetime(properties, CODE_LIFETIME, 60)?,
            token_lifetime: lifetime(properties, TOKEN_LIFETIME, 3600)?,
            max_authorization_grant_lifetime: lifetime(properties, MAX_AUTHORIZATION_GRANT_LIFETIME, 604_800)?,
            issue_refresh_token: boolean(properties, ISSUE_REFRESH_TOKEN, true)?,
            allow_public_clients: boolean(properties, ALLOW_PUBLIC_CLIENTS, false)?,
            mediators,
        })
    }
}

const KNOWN: [&str; 13] = [
    GRANT_TYPES_ALLOWED,
    CODE_LENGTH,
    ACCESS_TOKEN_LENGTH,
    REFRESH_TOKEN_LENGTH,
    CODE_LIFETIME,
    TOKEN_LIFETIME,
    MAX_AUTHORIZATION_GRANT_LIFETIME,
    ISSUE_REFRESH_TOKEN,
    ALLOW_PUBLIC_CLIENTS,
    CLIENT_PROVIDER,
    TOKEN_CACHE,
    TOKEN_TYPE_HANDLER,
    MEDIATORS,
];

fn grant_types(properties: &HashMap<String, PropertyValue>) -> Result<Vec<GrantType>, ConfigError> {
    let items = properties
        .get(GRANT_TYPES_ALLOWED)
        .ok_or(ConfigError::MissingProperty(GRANT_TYPES_ALLOWED))?
        .items();
    if items.is_empty() {
        return Err(ConfigError::Empty { property: GRANT_TYPES_ALLOWED });
    }
    let mut allowed = Vec::new();
    for item in items {
        let grant_type = GrantType::parse(&item).ok_or(ConfigError::InvalidGrantType(item))?;
        if !allowed.contains(&grant_type) {
            allowed.push(grant_type);
        }
    }
    Ok(allowed)
}

fn integer(properties: &HashMap<String, PropertyValue>, property: &'static str) -> Result<Option<i64>, ConfigError> {
    let Some(value) = properties.get(property) else {
        return Ok(None);
    };
    if let PropertyValue::Number(number) = value {
        return Ok(Some(*number));
    }
    let raw = value.scalar();
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidInteger { property, value: raw })
}

fn bounded(
    properties: &HashMap<String, PropertyValue>,
    property: &'static str,
    default: i64,
    min: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    let value = integer(properties, property)?.unwrap_or(default);
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { property, value, min, max });
    }
    Ok(value)
}

fn length(properties: &HashMap<String, PropertyValue>, property: &'static str, default: i64) -> Result<usize, ConfigError> {
    bounded(properties, property, default, 1, MAX_TOKEN_LENGTH).map(|value| value as usize)
}

fn lifetime(properties: &HashMap<String, PropertyValue>, property: &'static str, default: i64) -> Result<u64, ConfigError> {
    bounded(properties, property, default, 1, MAX_LIFETIME_SECONDS).map(|value| value as u64)
}

fn boolean(properties: &HashMap<String, PropertyValue>, property: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = properties.get(property) else {
        return Ok(default);
    };
    if let PropertyValue::Flag(flag) = value {
        return Ok(*flag);
    }
    let raw = value.scalar();
    match raw.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean { property, value: raw }),
    }
}

fn plugin(properties: &HashMap<String, PropertyValue>, property: &'static str, built_in: &[&str]) -> Result<(), ConfigError> {
    let Some(value) = properties.get(property) else {
        return Ok(());
    };
    let name = value.scalar();
    if built_in.iter().any(|candidate| candidate.eq_ignore_ascii_case(&name)) {
        Ok(())
    } else {
        Err(ConfigError::UnknownPlugin { property, value: name })
    }
}
