use thiserror::Error;

/// Result alias for secret store calls.
pub type StoreResult<T> = core::result::Result<T, StoreError>;

/// Failure surface of a [`crate::SecretStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{path} not found")]
    NotFound { path: String },
    #[error("permission denied for {path}")]
    PermissionDenied { path: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode store response: {0}")]
    Decode(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Errors that abort a rotation before any per-field work happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotationError {
    #[error("invalid mode `{0}` (use 'list' or 'edit')")]
    InvalidMode(String),
    #[error("old password is required")]
    MissingOldValue,
    #[error("new password is required in edit mode")]
    MissingNewValue,
    #[error("secret store unreachable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl RotationError {
    /// Whether the error stems from caller input rather than the store.
    pub fn is_validation(&self) -> bool {
        !matches!(self, RotationError::StoreUnavailable(_))
    }
}
