//! OAuth 2.0 grant engine for bramble.
//!
//! [`OAuth20Component`] implements the authorization, token and resource
//! endpoints over a [`ClientProvider`] and a [`TokenCache`]. Codes and
//! refresh tokens are single use: the cache validates and removes them in
//! one step.

pub mod oauth_core;

pub use oauth_core::attributes::{Attribute, AttributeList, AttributeType, OAuthResult, OAuthResultStatus};
pub use oauth_core::component::OAuth20Component;
pub use oauth_core::config::{ConfigError, OAuthConfig, PropertyValue};
pub use oauth_core::error::{OAuthError, OAuthErrorKind};
pub use oauth_core::mediator::{AuditMediator, Mediator};
pub use oauth_core::memory::{InMemoryClientProvider, InMemoryTokenCache};
pub use oauth_core::oauth_provider::{ClientProvider, ConsumeError, TokenCache};
pub use oauth_core::request::{AuthorizationRequest, OAuthRequest};
pub use oauth_core::types::{GrantType, OAuthClient, OAuthToken, ResponseType, TokenKind, TokenSubType};
