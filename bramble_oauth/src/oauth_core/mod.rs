//! OAuth 2.0 provider core: configuration, storage seams, grant handling
//! and the endpoint component.

pub mod attributes;
pub mod component;
pub mod config;
pub mod crypto;
pub mod error;
pub(crate) mod grant_helpers;
pub mod mediator;
pub mod memory;
pub mod oauth_provider;
pub mod request;
pub mod types;
