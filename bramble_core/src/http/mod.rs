pub mod accept;
pub mod etag;
pub mod http_date;
pub mod http_value;
pub mod media_type;
pub mod meta;
pub mod request;
pub mod response;
pub mod variant;
