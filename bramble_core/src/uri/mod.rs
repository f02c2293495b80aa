mod builder;
mod template;
#[allow(clippy::module_inception)]
mod uri;

pub use builder::{UriBuilder, UriBuilderError};
pub use template::{TemplatePart, UriTemplate};
pub use uri::{Uri, UriError};
