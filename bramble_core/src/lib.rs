//! HTTP plumbing for bramble: URI templates and the `UriBuilder`, media types
//! and `Accept*` negotiation, conditional requests and response building.

pub mod http;
pub mod provider;
pub mod uri;

pub use http::request::{PreconditionPolicy, Request, VariantSelection};
pub use http::response::{Response, ResponseBuilder};
pub use uri::{Uri, UriBuilder, UriTemplate};
