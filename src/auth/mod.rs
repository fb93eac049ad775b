//! Shared-secret request authentication
//!
//! When a security token is configured, every request must carry it in the
//! [`TOKEN_HEADER`] header. Without a configured token all requests pass.

use subtle::ConstantTimeEq;
use thiserror::Error;

/// Header that carries the shared secret
pub const TOKEN_HEADER: &str = "X-RemoClip-Token";

/// Authentication errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Token missing or different from the configured secret
    #[error("invalid token")]
    InvalidToken,
}

/// Gate that runs before any request handling
#[derive(Debug, Clone, Default)]
pub struct RequestAuthenticator {
    secret: Option<String>,
}

impl RequestAuthenticator {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }

    /// Whether requests need a token at all
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Check the raw token bytes a request presented
    pub fn verify(&self, presented: Option<&[u8]>) -> Result<(), AuthError> {
        let Some(secret) = &self.secret else {
            return Ok(());
        };

        match presented {
            Some(token) if bool::from(token.ct_eq(secret.as_bytes())) => Ok(()),
            _ => Err(AuthError::InvalidToken),
        }
    }
}
