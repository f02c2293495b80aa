pub use crate::{
    EntityTag, HttpHeaders, HttpMethod, MediaType, OAuth20Component, OAuthConfig, OAuthError, OAuthRequest, OAuthResult,
    PreconditionPolicy, Request, Response, ResponseBuilder, StatusCode, Uri, UriBuilder, UriTemplate, Variant,
    VariantListBuilder,
};
pub use bramble_core::http::accept::LanguageTag;
pub use bramble_core::uri::UriBuilderError;
pub use bramble_oauth::{
    AttributeList, AttributeType, AuthorizationRequest, ClientProvider, InMemoryClientProvider, InMemoryTokenCache,
    Mediator, OAuthClient, OAuthErrorKind, TokenCache,
};

pub use std::sync::Arc;
pub use std::time::Duration;
