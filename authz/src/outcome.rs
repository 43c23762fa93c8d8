//! The result of an authorization decision.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{join_claims, ClaimSet};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// The principal lacks one or more of the required claims.
    NotAuthorized,
    /// The requested state would grant more privilege than the principal holds.
    Elevation,
    /// The principal has no resolvable identifier.
    NoPrincipalId,
    /// A restricted claim was requested against a built-in object.
    SystemObject,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotAuthorized => write!(f, "not authorized"),
            FailureReason::Elevation => write!(f, "elevation of privilege"),
            FailureReason::NoPrincipalId => write!(f, "no principal id"),
            FailureReason::SystemObject => write!(f, "system object"),
        }
    }
}

/// A denial together with the claims that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationFailure {
    pub reason: FailureReason,
    pub claims: ClaimSet,
}

impl fmt::Display for AuthorizationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let claims = join_claims(&self.claims);
        match self.reason {
            FailureReason::NotAuthorized => write!(f, "Missing required claims: {claims}"),
            FailureReason::Elevation => {
                write!(f, "Request would elevate privileges beyond: {claims}")
            }
            FailureReason::NoPrincipalId => {
                write!(f, "No principal id available to authorize: {claims}")
            }
            FailureReason::SystemObject => {
                write!(f, "Restricted claims cannot target a system object: {claims}")
            }
        }
    }
}

/// Outcome of `authorize`: either success, or a failure carrying its reason
/// and the failing claims. The failure payload exists only on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AuthorizationOutcome {
    Succeeded,
    Failed(AuthorizationFailure),
}

impl AuthorizationOutcome {
    pub fn success() -> Self {
        Self::Succeeded
    }

    pub fn failed(reason: FailureReason, claims: ClaimSet) -> Self {
        Self::Failed(AuthorizationFailure { reason, claims })
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn failure(&self) -> Option<&AuthorizationFailure> {
        match self {
            Self::Succeeded => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure().map(|f| f.reason)
    }

    pub fn failing_claims(&self) -> Option<&ClaimSet> {
        self.failure().map(|f| &f.claims)
    }

    /// Converts into a `Result`, handy for `?` in write paths.
    pub fn into_result(self) -> Result<(), AuthorizationFailure> {
        match self {
            Self::Succeeded => Ok(()),
            Self::Failed(failure) => Err(failure),
        }
    }
}

impl fmt::Display for AuthorizationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "Authorized"),
            Self::Failed(failure) => failure.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(items: &[&str]) -> ClaimSet {
        items.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_success_has_no_failure() {
        let outcome = AuthorizationOutcome::success();
        assert!(outcome.succeeded());
        assert!(outcome.failure_reason().is_none());
        assert!(outcome.failing_claims().is_none());
        assert_eq!(outcome.to_string(), "Authorized");
        assert!(outcome.into_result().is_ok());
    }

    #[test]
    fn test_failure_carries_reason_and_claims() {
        let outcome = AuthorizationOutcome::failed(
            FailureReason::NotAuthorized,
            claims(&["User.Delete", "User.Create"]),
        );
        assert!(!outcome.succeeded());
        assert_eq!(outcome.failure_reason(), Some(FailureReason::NotAuthorized));
        assert_eq!(
            outcome.to_string(),
            "Missing required claims: User.Create, User.Delete"
        );
    }

    #[test]
    fn test_failure_messages_per_reason() {
        let elevation =
            AuthorizationOutcome::failed(FailureReason::Elevation, claims(&["Administrator"]));
        assert_eq!(
            elevation.to_string(),
            "Request would elevate privileges beyond: Administrator"
        );

        let system =
            AuthorizationOutcome::failed(FailureReason::SystemObject, claims(&["Role.Delete"]));
        assert_eq!(
            system.to_string(),
            "Restricted claims cannot target a system object: Role.Delete"
        );
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome =
            AuthorizationOutcome::failed(FailureReason::SystemObject, claims(&["Role.Delete"]));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "SystemObject");
        assert_eq!(json["claims"][0], "Role.Delete");

        let json = serde_json::to_value(AuthorizationOutcome::success()).unwrap();
        assert_eq!(json["outcome"], "succeeded");
    }
}
