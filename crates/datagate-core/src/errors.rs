//! Unified error system for data access operations
//!
//! One error type crosses every layer. The variant carries the category a
//! caller reacts to; the message is stable text suitable for end users.

use serde::{Deserialize, Serialize};

/// Unified error type for all datagate operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum AccessError {
    /// Malformed or disallowed input
    #[error("Invalid: {message}")]
    Validation {
        /// Error message describing the invalid input
        message: String,
    },

    /// Caller lacks the standing to perform the operation
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message describing the missing authority
        message: String,
    },

    /// Referenced record does not exist
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Stale etag or illegal state transition
    #[error("Conflict: {message}")]
    Conflict {
        /// Error message describing the conflicting state
        message: String,
    },

    /// Transient condition; the operation may succeed if retried
    #[error("Retryable: {message}")]
    Retryable {
        /// Error message describing the transient condition
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl AccessError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Conflict for a write made against an outdated etag
    pub fn stale(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::conflict(format!(
            "{kind} {id} was updated since you last fetched it, retrieve it again and reapply the update."
        ))
    }

    /// Create a retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message }
            | Self::Unauthorized { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Retryable { message }
            | Self::Internal { message } => message,
        }
    }

    /// Whether a worker should requeue the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

/// Standard Result type for datagate operations
pub type AccessResult<T> = std::result::Result<T, AccessError>;

/// Fail with a validation error unless `condition` holds
pub fn ensure(condition: bool, message: &str) -> AccessResult<()> {
    if condition {
        Ok(())
    } else {
        Err(AccessError::validation(message))
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("serialization failed: {err}"))
    }
}

impl From<toml::de::Error> for AccessError {
    fn from(err: toml::de::Error) -> Self {
        Self::validation(format!("invalid configuration: {err}"))
    }
}

impl From<std::io::Error> for AccessError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("I/O error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn display_carries_category_and_message() {
        let err = AccessError::conflict("etag mismatch");
        assert_eq!(err.to_string(), "Conflict: etag mismatch");
        assert_eq!(err.message(), "etag mismatch");
    }

    #[test]
    fn only_retryable_errors_requeue() {
        assert!(AccessError::retryable("stack unknown").is_retryable());
        assert!(!AccessError::internal("boom").is_retryable());
        assert!(!AccessError::conflict("stale").is_retryable());
    }

    #[test]
    fn ensure_maps_to_validation() {
        assert!(ensure(true, "unused").is_ok());
        let err = ensure(false, "Must provide at least one accessor.").unwrap_err();
        assert_matches!(err, AccessError::Validation { .. });
        assert_eq!(
            err,
            AccessError::validation("Must provide at least one accessor.")
        );
    }

    #[test]
    fn errors_survive_serialization() {
        let err = AccessError::unauthorized("Only ACT member can perform this action.");
        let json = serde_json::to_string(&err).unwrap();
        let back: AccessError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
