//! Error types and result aliases for Quarry.
//!
//! Every backend maps its failures onto this taxonomy so callers can match on
//! the kind of failure without knowing which transport produced it. Only
//! [`Error::TransientAuth`] is ever retried, and only on the create path.

use std::fmt;

/// The result type used throughout Quarry.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Quarry operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The identifier does not resolve to an existing, accessible asset.
    #[error("not found: {resource_type} with id {id}")]
    NotFound {
        /// The type of resource that was looked up.
        resource_type: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The mutation collides with an existing asset.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// The request failed validation.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of the validation failure.
        message: String,
    },

    /// The caller lacks authorization for the operation.
    #[error("permission denied: {message}")]
    Permission {
        /// Description returned by the server.
        message: String,
    },

    /// A server-reported authorization failure that is known to clear on its own
    /// (for example while access policies for a new connection propagate).
    #[error("transient authorization failure {code}: {message}")]
    TransientAuth {
        /// Server error code.
        code: String,
        /// Server error message.
        message: String,
    },

    /// The operation was cancelled while waiting between attempts.
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Number of attempts made before cancellation.
        attempts: u32,
    },

    /// The transport failed or the server answered with an unexpected status.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Invalid local input (configuration, identifiers, asset definitions).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new not found error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a new conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new transport error without a source.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transport error with a source cause.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for the transient authorization failure retried on create.
    #[must_use]
    pub fn is_transient_auth(&self) -> bool {
        matches!(self, Self::TransientAuth { .. })
    }

    /// Returns true if the error means the asset does not exist (or no longer exists).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_auth_is_flagged_transient() {
        let transient = Error::TransientAuth {
            code: "ATLAS-403-00-001".into(),
            message: "not yet authorized".into(),
        };
        assert!(transient.is_transient_auth());
        assert!(!Error::conflict("dup").is_transient_auth());
        assert!(
            !Error::Permission {
                message: "nope".into()
            }
            .is_transient_auth()
        );
    }

    #[test]
    fn not_found_renders_type_and_id() {
        let err = Error::not_found("Table", "01HZX");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: Table with id 01HZX");
    }
}
