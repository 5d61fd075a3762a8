//! Configuration for group governance.
//!
//! # Example
//!
//! ```rust
//! use chrono::Duration;
//! use groupgate::config::GovernanceConfig;
//!
//! // Use defaults
//! let config = GovernanceConfig::default();
//! assert_eq!(config.invitation_ttl, Duration::hours(48));
//!
//! // Or customize
//! let config = GovernanceConfig {
//!     invitation_ttl: Duration::hours(12),
//!     ..Default::default()
//! }
//! .with_invite_base_url("https://study.example.com/join");
//! ```

use chrono::Duration;

use crate::GroupError;
use crate::crypto::MAX_TOKEN_LENGTH;

/// Minimum token length: 22 alphanumeric characters carry just over 128 bits.
pub const MIN_TOKEN_LENGTH: usize = 22;

/// Settings shared by the governance services.
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    /// How long an invitation link stays redeemable after it is issued.
    ///
    /// Default: 48 hours
    pub invitation_ttl: Duration,

    /// Length of generated invitation tokens (in characters).
    ///
    /// Default is 32 alphanumeric characters (~190 bits of entropy).
    pub token_length: usize,

    /// Maximum length of the optional message on a join request, in characters.
    ///
    /// Default: 500
    pub max_request_message_len: usize,

    /// Prefix used to render shareable invitation URLs.
    ///
    /// When set, links render as `<base>/<token>`. When unset, the token
    /// itself is the link.
    pub invite_base_url: Option<String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            invitation_ttl: Duration::hours(48),
            token_length: 32,
            max_request_message_len: 500,
            invite_base_url: None,
        }
    }
}

impl GovernanceConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration suitable for development/testing.
    ///
    /// Invitation links expire after one hour.
    pub fn development() -> Self {
        Self {
            invitation_ttl: Duration::hours(1),
            ..Self::default()
        }
    }

    /// Sets the base URL used to render shareable invitation links.
    #[must_use]
    pub fn with_invite_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.invite_base_url = Some(base.trim_end_matches('/').to_owned());
        self
    }

    /// Renders the shareable link for a token.
    pub fn invite_url(&self, token: &str) -> String {
        match &self.invite_base_url {
            Some(base) => format!("{base}/{token}"),
            None => token.to_owned(),
        }
    }

    /// Checks that the configuration keeps the guarantees the services rely on.
    pub fn validate(&self) -> Result<(), GroupError> {
        if self.token_length < MIN_TOKEN_LENGTH {
            return Err(GroupError::Validation(format!(
                "token_length must be at least {MIN_TOKEN_LENGTH} characters"
            )));
        }
        if self.token_length > MAX_TOKEN_LENGTH {
            return Err(GroupError::Validation(format!(
                "token_length must be at most {MAX_TOKEN_LENGTH} characters"
            )));
        }
        if self.invitation_ttl <= Duration::zero() {
            return Err(GroupError::Validation(
                "invitation_ttl must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GovernanceConfig::default();

        assert_eq!(config.invitation_ttl, Duration::hours(48));
        assert_eq!(config.token_length, 32);
        assert_eq!(config.max_request_message_len, 500);
        assert!(config.invite_base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_development_config() {
        let config = GovernanceConfig::development();
        assert_eq!(config.invitation_ttl, Duration::hours(1));
    }

    #[test]
    fn test_invite_url() {
        let config = GovernanceConfig::new();
        assert_eq!(config.invite_url("abc"), "abc");

        let config = config.with_invite_base_url("https://study.example.com/join/");
        assert_eq!(
            config.invite_url("abc"),
            "https://study.example.com/join/abc"
        );
    }

    #[test]
    fn test_validate_rejects_short_tokens() {
        let config = GovernanceConfig {
            token_length: 16,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GroupError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_tokens_too_long_to_redeem() {
        let config = GovernanceConfig {
            token_length: MAX_TOKEN_LENGTH + 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(GroupError::Validation(_))));

        let config = GovernanceConfig {
            token_length: MAX_TOKEN_LENGTH,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
