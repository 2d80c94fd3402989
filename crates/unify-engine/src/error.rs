use std::fmt;

use unify_store::StoreError;

/// Errors from credential resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The secret or identity does not map to any voter.
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    /// The credential is malformed (blank secret, empty identity id).
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The device token is not bound to any voter.
    #[error("no session for device {0}")]
    NoSessionForDevice(String),

    /// A voter id points at a row that does not exist.
    #[error("voter not found: {0}")]
    VoterNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the engine's non-merge operations (rebinding, notification).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("voter not found: {0}")]
    VoterNotFound(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PartialEq for ResolveError {
    fn eq(&self, other: &Self) -> bool {
        // Compare by display representation for test convenience.
        fmt::format(format_args!("{self}")) == fmt::format(format_args!("{other}"))
    }
}

/// Result alias for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Result alias for other engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
