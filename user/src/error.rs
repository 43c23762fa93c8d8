use authz::{AuthorizationFailure, AuthzError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Unknown claim: {0}")]
    UnknownClaim(String),

    #[error("Forbidden: {0}")]
    Forbidden(AuthorizationFailure),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthzError),

    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl From<AuthorizationFailure> for UserError {
    fn from(failure: AuthorizationFailure) -> Self {
        UserError::Forbidden(failure)
    }
}

/// Lets the SQLite store report failures through the engine.
impl From<UserError> for AuthzError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Authorization(inner) => inner,
            other => AuthzError::store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, UserError>;
