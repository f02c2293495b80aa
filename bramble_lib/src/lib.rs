use rand::Rng;

#[cfg(feature = "url_encoding")]
pub mod url_encoding;

#[cfg(feature = "url_encoding")]
pub use url_encoding::{decode_url_owned, encode_url_owned};

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generates a random string of `length` ASCII letters and digits.
///
/// Used for authorization codes, access tokens and refresh tokens, so the
/// generator is the thread-local CSPRNG.
pub fn random_alphanumeric_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}
