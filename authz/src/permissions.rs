//! Built-in claims and objects of the user and role management module.

use crate::registry::{ClaimDeclaration, ClaimProvider};
use crate::types::ResourceKind;

pub const USER_CREATE: &str = "User.Create";
pub const USER_READ: &str = "User.Read";
pub const USER_UPDATE: &str = "User.Update";
pub const USER_DELETE: &str = "User.Delete";
pub const USER_UPDATE_CLAIMS: &str = "User.UpdateClaims";

pub const ROLE_CREATE: &str = "Role.Create";
pub const ROLE_READ: &str = "Role.Read";
pub const ROLE_UPDATE: &str = "Role.Update";
pub const ROLE_DELETE: &str = "Role.Delete";
pub const ROLE_UPDATE_CLAIMS: &str = "Role.UpdateClaims";

/// Id of the built-in Administrator role.
pub const ADMINISTRATOR_ROLE_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Name of the built-in Administrator role. Also reported as the failing
/// claim when a request would make someone an administrator.
pub const ADMINISTRATOR_ROLE_NAME: &str = "Administrator";

/// Id of the built-in Administrator user.
pub const ADMINISTRATOR_USER_ID: &str = "00000000-0000-0000-0000-000000000002";

pub const USER_CLAIMS: [&str; 5] = [
    USER_CREATE,
    USER_READ,
    USER_UPDATE,
    USER_DELETE,
    USER_UPDATE_CLAIMS,
];

pub const ROLE_CLAIMS: [&str; 5] = [
    ROLE_CREATE,
    ROLE_READ,
    ROLE_UPDATE,
    ROLE_DELETE,
    ROLE_UPDATE_CLAIMS,
];

pub const RESTRICTED_CLAIMS: [&str; 4] =
    [USER_DELETE, USER_UPDATE_CLAIMS, ROLE_DELETE, ROLE_UPDATE_CLAIMS];

/// Declares the user and role management claims.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserManagement;

impl ClaimProvider for UserManagement {
    fn declaration(&self) -> ClaimDeclaration {
        ClaimDeclaration {
            defined_claims: USER_CLAIMS
                .iter()
                .chain(ROLE_CLAIMS.iter())
                .map(|c| c.to_string())
                .collect(),
            restricted_claims: RESTRICTED_CLAIMS.iter().map(|c| c.to_string()).collect(),
            system_object_ids: [
                ADMINISTRATOR_ROLE_ID.to_string(),
                ADMINISTRATOR_USER_ID.to_string(),
            ]
            .into(),
            delete_claims: [
                (ResourceKind::Role, ROLE_DELETE.to_string()),
                (ResourceKind::User, USER_DELETE.to_string()),
            ]
            .into(),
        }
    }
}
