//! Error types for the authorization engine.
//!
//! Ordinary denials are never errors: they are returned as an
//! [`AuthorizationOutcome`](crate::outcome::AuthorizationOutcome). The
//! variants here cover contract violations by the caller, configuration
//! problems found while building the registry, and failures of the
//! collaborator identity store.

use thiserror::Error;

/// Errors that can occur during authorization operations.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The resource handed to the engine does not expose the capability the
    /// engine needs to evaluate it.
    #[error("Resource does not expose the required capability {capability}")]
    InvalidResource {
        /// The capability the resource must provide, e.g. `{id, name}`.
        capability: &'static str,
    },

    /// The registry or engine configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The identity store failed to answer a query.
    ///
    /// Store failures are never swallowed or retried by the engine.
    #[error("Identity store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The caller cancelled the request while a store query was in flight.
    #[error("Authorization request cancelled")]
    Cancelled,
}

impl AuthzError {
    /// Wraps any store-side error.
    pub fn store(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Store(err.into())
    }
}

impl From<serde_yaml::Error> for AuthzError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthzError::InvalidResource {
            capability: "{id, name}",
        };
        assert_eq!(
            err.to_string(),
            "Resource does not expose the required capability {id, name}"
        );

        let err = AuthzError::Configuration("restricted claim not defined".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: restricted claim not defined"
        );

        let err = AuthzError::store("connection refused");
        assert_eq!(err.to_string(), "Identity store error: connection refused");

        assert_eq!(
            AuthzError::Cancelled.to_string(),
            "Authorization request cancelled"
        );
    }

    #[test]
    fn test_store_error_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = AuthzError::store(io);
        assert!(err.source().is_some());
    }
}
