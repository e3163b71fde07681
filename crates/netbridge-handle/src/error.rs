//! Error Types for the Handle Registry

use thiserror::Error;

use crate::token::Token;

/// Result type for registry lookups
pub type HandleResult<T> = Result<T, HandleError>;

/// Handle registry error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// Token was minted before the last reset
    #[error("handle {token} is from a previous bridge epoch; it was invalidated by a reset")]
    EpochMismatch {
        /// The rejected token
        token: Token,
        /// The registry's current epoch
        current: u64,
    },

    /// Token's slot is gone, reused, or its object has been dropped
    #[error("handle {token} no longer refers to a live object")]
    Dangling {
        /// The rejected token
        token: Token,
    },

    /// Token resolves, but to a different kind of object
    #[error("handle {token} refers to a {actual}, expected a {expected}")]
    WrongKind {
        /// The rejected token
        token: Token,
        /// Kind the caller asked for
        expected: String,
        /// Kind stored in the slot
        actual: String,
    },
}

impl HandleError {
    /// Create a wrong kind error
    pub fn wrong_kind(token: Token, expected: impl ToString, actual: impl ToString) -> Self {
        HandleError::WrongKind {
            token,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Check if this error means the token can never resolve again
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            HandleError::EpochMismatch { .. } | HandleError::Dangling { .. }
        )
    }

    /// The token that failed to resolve
    pub fn token(&self) -> Token {
        match self {
            HandleError::EpochMismatch { token, .. }
            | HandleError::Dangling { token }
            | HandleError::WrongKind { token, .. } => *token,
        }
    }
}
