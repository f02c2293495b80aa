//! PKCE (RFC 7636) transforms and checks.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::digest::{SHA256, digest};

use super::error::{OAuthError, OAuthErrorKind};
use super::types::CodeChallengeMethod;

pub const MIN_VERIFIER_LENGTH: usize = 43;
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// `BASE64URL(SHA256(verifier))` without padding.
pub fn pkce_code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(digest(&SHA256, verifier.as_bytes()))
}

/// Checks a token request's `code_verifier` against the grant's challenge.
pub fn verify_code_verifier(
    challenge: Option<&str>,
    method: Option<CodeChallengeMethod>,
    verifier: Option<&str>,
) -> Result<(), OAuthError> {
    let verifier = verifier.filter(|verifier| !verifier.is_empty());
    let Some(challenge) = challenge else {
        return match verifier {
            Some(_) => Err(OAuthErrorKind::CodeVerifierMismatch { challenge: None }.into()),
            None => Ok(()),
        };
    };
    let verifier = verifier.ok_or_else(|| OAuthErrorKind::MissingParameter("code_verifier".into()))?;
    if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&verifier.len()) {
        return Err(OAuthErrorKind::InvalidCodeVerifier(verifier.len()).into());
    }
    let matches = match method.unwrap_or(CodeChallengeMethod::Plain) {
        CodeChallengeMethod::Plain => verifier == challenge,
        CodeChallengeMethod::S256 => pkce_code_challenge(verifier) == challenge,
    };
    if matches {
        Ok(())
    } else {
        Err(OAuthErrorKind::CodeVerifierMismatch { challenge: Some(challenge.to_string()) }.into())
    }
}
