//! Error types for groupline
//!
//! This module defines the error taxonomy used throughout the crate and the
//! crate-wide [`Result`] alias. Coordination-service failures carry their own
//! domain enum so callers can distinguish a lost session (fatal for a handle)
//! from a transient outage (retried by the reconciler).

use thiserror::Error;

/// Result type alias for groupline operations
pub type Result<T> = std::result::Result<T, GrouplineError>;

/// Failures surfaced by the coordination-service client.
///
/// Every operation of [`crate::coordination::CoordinationClient`] fails with
/// one of these. `Conflict` is not an error to claim callers; it drives the
/// wait loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// The service could not be reached or answered with a transient failure
    #[error("coordination service unavailable: {0}")]
    Unavailable(String),

    /// The session is gone; every ephemeral node created under it is gone too
    #[error("coordination session lost")]
    SessionLost,

    /// An ephemeral create hit an already-existing node
    #[error("node already exists: {0}")]
    Conflict(String),
}

impl CoordinationError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable(detail.into())
    }

    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict(path.into())
    }

    /// Returns true if retrying the operation on the same session can succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Structured configuration error domain
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{setting}: {reason}")]
    InvalidSetting { setting: String, reason: String },
    #[error("missing {0}")]
    Missing(String),
}

impl ConfigError {
    pub fn invalid_setting(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            setting: setting.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(setting: impl Into<String>) -> Self {
        Self::Missing(setting.into())
    }
}

/// Main error type for groupline
#[derive(Debug, Error)]
pub enum GrouplineError {
    #[error("coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The group-member handle has been stopped; the operation was not attempted
    #[error("group member is stopped")]
    Stopped,
}

impl GrouplineError {
    /// Returns true if the underlying cause is a lost coordination session
    pub fn is_session_lost(&self) -> bool {
        matches!(
            self,
            GrouplineError::Coordination(CoordinationError::SessionLost)
        )
    }
}
