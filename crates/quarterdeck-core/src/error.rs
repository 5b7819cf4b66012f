//! Error types for the Quarterdeck console.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole console.
///
/// Variants follow the failure taxonomy of the system: transient transport
/// exhaustion, normal negative lookups, remote error envelopes, malformed
/// bodies, local validation, and authorization denial are all distinct and
/// never collapsed into one another.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum ConsoleError {
    /// Entity lookup came back empty (HTTP 404 or an empty result).
    /// A normal negative outcome, not a system fault.
    #[error("{entity_type} '{id}' not found")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// All retry attempts were exhausted on a transient transport failure.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The remote API answered with an error envelope.
    #[error("API error: {0}")]
    Api(String),

    /// 2xx response with a body that could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A field value failed local validation. Never reaches the network.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operator is not on the allow-list.
    #[error("operator is not authorized")]
    Unauthorized,

    /// Configuration error (missing credential, bad base URL, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// Creates a NotFound error.
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an Unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a Config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Malformed error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Creates an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a local validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// True when the failure came from the remote side (transport or API),
    /// as opposed to a local validation/config problem.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Api(_) | Self::Malformed(_)
        )
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("{} (kind: {:?})", err, err.kind()))
    }
}

impl From<toml::de::Error> for ConsoleError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A type alias for `Result<T, ConsoleError>`.
pub type Result<T> = std::result::Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_classified() {
        let err = ConsoleError::not_found("user", "abc");
        assert!(err.is_not_found());
        assert!(!err.is_remote());
        assert_eq!(err.to_string(), "user 'abc' not found");
    }

    #[test]
    fn remote_classification() {
        assert!(ConsoleError::unavailable("boom").is_remote());
        assert!(ConsoleError::Api("bad".into()).is_remote());
        assert!(!ConsoleError::validation("bad field").is_remote());
    }
}
