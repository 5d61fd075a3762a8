//! Invitation token generation and shape checks.

use rand::distributions::{Alphanumeric, DistString};

/// Longest token accepted for lookup.
pub const MAX_TOKEN_LENGTH: usize = 128;

/// Draws an alphanumeric invitation token from the thread-local CSPRNG.
///
/// Each character carries about 5.95 bits, so the default 32 characters
/// give roughly 190 bits.
///
/// # Example
///
/// ```rust
/// use groupgate::crypto::{generate_token, is_well_formed_token};
///
/// let token = generate_token(32);
/// assert_eq!(token.len(), 32);
/// assert!(is_well_formed_token(&token));
/// ```
pub fn generate_token(length: usize) -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), length)
}

/// Rejects tokens that could never have been issued, before any storage lookup.
pub fn is_well_formed_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LENGTH
        && token.bytes().all(|b| b.is_ascii_alphanumeric())
}
