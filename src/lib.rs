//! bramble: JAX-RS style URI building, variant negotiation and conditional
//! requests, plus an OAuth 2.0 grant engine.
//!
//! The crates can be used on their own; this one re-exports them and adds
//! logging setup.

pub mod logging;
pub mod prelude;

pub use bramble_core;
pub use bramble_lib;
pub use bramble_oauth;

pub use bramble_core::http::etag::EntityTag;
pub use bramble_core::http::http_value::{HttpMethod, StatusCode};
pub use bramble_core::http::media_type::MediaType;
pub use bramble_core::http::meta::HttpHeaders;
pub use bramble_core::http::variant::{Variant, VariantListBuilder};
pub use bramble_core::{PreconditionPolicy, Request, Response, ResponseBuilder, Uri, UriBuilder, UriTemplate};
pub use bramble_oauth::{OAuth20Component, OAuthConfig, OAuthError, OAuthRequest, OAuthResult};

pub use tokio;
