//! Hooks run after each endpoint has done its own processing.

use async_trait::async_trait;
use tracing::{info, warn};

use super::attributes::{AttributeList, AttributeType};
use super::error::OAuthError;
use super::types::{ATTR_REQUEST_TYPE, PARAM_CLIENT_ID, PARAM_GRANT_TYPE, PARAM_RESPONSE_TYPE, PARAM_USERNAME};

/// Observes, and may veto, OAuth requests.
///
/// The success hooks may add attributes; an error from one fails the
/// request and rolls back anything it issued. The exception hooks are
/// informational and their errors are only logged.
#[async_trait]
pub trait Mediator: Send + Sync + 'static {
    async fn mediate_authorize(&self, _attributes: &mut AttributeList) -> Result<(), OAuthError> {
        Ok(())
    }

    async fn mediate_token(&self, _attributes: &mut AttributeList) -> Result<(), OAuthError> {
        Ok(())
    }

    async fn mediate_resource(&self, _attributes: &mut AttributeList) -> Result<(), OAuthError> {
        Ok(())
    }

    async fn mediate_authorize_exception(&self, _attributes: &AttributeList, _error: &OAuthError) -> Result<(), OAuthError> {
        Ok(())
    }

    async fn mediate_token_exception(&self, _attributes: &AttributeList, _error: &OAuthError) -> Result<(), OAuthError> {
        Ok(())
    }

    async fn mediate_resource_exception(&self, _attributes: &AttributeList, _error: &OAuthError) -> Result<(), OAuthError> {
        Ok(())
    }
}

/// Traces request outcomes. Never sees secrets: only identifiers are logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditMediator;

fn param<'a>(attributes: &'a AttributeList, name: &str) -> &'a str {
    attributes.value_of(name, AttributeType::Param).unwrap_or("")
}

#[async_trait]
impl Mediator for AuditMediator {
    async fn mediate_authorize(&self, attributes: &mut AttributeList) -> Result<(), OAuthError> {
        info!(
            client_id = param(attributes, PARAM_CLIENT_ID),
            username = param(attributes, PARAM_USERNAME),
            response_type = param(attributes, PARAM_RESPONSE_TYPE),
            "authorization granted"
        );
        Ok(())
    }

    async fn mediate_token(&self, attributes: &mut AttributeList) -> Result<(), OAuthError> {
        info!(
            client_id = param(attributes, PARAM_CLIENT_ID),
            grant_type = param(attributes, PARAM_GRANT_TYPE),
            "token issued"
        );
        Ok(())
    }

    async fn mediate_resource(&self, attributes: &mut AttributeList) -> Result<(), OAuthError> {
        info!(
            client_id = attributes.value_of(PARAM_CLIENT_ID, AttributeType::ResponseAttribute).unwrap_or(""),
            "resource access authorized"
        );
        Ok(())
    }

    async fn mediate_authorize_exception(&self, attributes: &AttributeList, error: &OAuthError) -> Result<(), OAuthError> {
        audit_failure(attributes, error);
        Ok(())
    }

    async fn mediate_token_exception(&self, attributes: &AttributeList, error: &OAuthError) -> Result<(), OAuthError> {
        audit_failure(attributes, error);
        Ok(())
    }

    async fn mediate_resource_exception(&self, attributes: &AttributeList, error: &OAuthError) -> Result<(), OAuthError> {
        audit_failure(attributes, error);
        Ok(())
    }
}

fn audit_failure(attributes: &AttributeList, error: &OAuthError) {
    warn!(
        request_type = attributes.value_of(ATTR_REQUEST_TYPE, AttributeType::Request).unwrap_or(""),
        client_id = param(attributes, PARAM_CLIENT_ID),
        message_id = error.message_id(),
        error_code = error.error_code(),
        "OAuth request failed"
    );
}
