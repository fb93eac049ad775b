//! Error taxonomy for request handlers

use thiserror::Error;
use warp::http::StatusCode;

use crate::auth::AuthError;
use crate::clipboard::ClipboardError;
use crate::store::StoreError;

/// Result type for request handlers
pub type ActionResult<T> = Result<T, ActionError>;

/// Why a request was not served
#[derive(Debug, Error)]
pub enum ActionError {
    /// A required payload field is absent
    #[error("JSON payload must include '{0}'")]
    MissingField(&'static str),

    /// A payload field has the wrong type or an out-of-range value
    #[error("{0}")]
    InvalidArgument(String),

    /// Missing or wrong security token
    #[error("invalid token")]
    Unauthorized,

    /// The operation is disabled by configuration
    #[error("{0}")]
    Forbidden(String),

    /// The requested entry does not exist or is not addressable
    #[error("{0}")]
    NotFound(String),

    /// The clipboard backend failed
    #[error("{0}")]
    BackendUnavailable(#[from] ClipboardError),

    /// Unexpected persistence error
    #[error("storage failure: {0}")]
    StoreFailure(#[from] StoreError),

    /// Any other unexpected failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for ActionError {
    fn from(_: AuthError) -> Self {
        ActionError::Unauthorized
    }
}

impl ActionError {
    pub fn history_entry_not_found() -> Self {
        ActionError::NotFound("history entry not found".to_string())
    }

    /// HTTP status this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Unauthorized => StatusCode::UNAUTHORIZED,
            ActionError::Forbidden(_) => StatusCode::FORBIDDEN,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::MissingField(_)
            | ActionError::InvalidArgument(_)
            | ActionError::BackendUnavailable(_)
            | ActionError::StoreFailure(_)
            | ActionError::Internal(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message sent back to the caller
    ///
    /// Unexpected failures are reported generically; their detail stays in
    /// the server log.
    pub fn client_message(&self) -> String {
        match self {
            ActionError::StoreFailure(_) => "storage failure".to_string(),
            ActionError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether this error points at a server-side problem
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            ActionError::StoreFailure(_) | ActionError::Internal(_)
        )
    }
}
