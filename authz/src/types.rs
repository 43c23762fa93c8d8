//! Core authorization types.
//!
//! The engine only ever looks at a narrow slice of the identity model: a
//! principal's identifier, a role's `{id, name, claims}` and a user's
//! `{id, name, role names}`. Those slices are expressed as the
//! [`RoleEntity`] and [`UserEntity`] traits so that any persistence layer can
//! hand its own structs to the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{AuthzError, Result};

/// A set of permission-claim strings, kept sorted for deterministic output.
pub type ClaimSet = BTreeSet<String>;

/// A set of role identifiers.
pub type RoleIdSet = BTreeSet<String>;

/// The capability every resource must expose.
pub const RESOURCE_CAPABILITY: &str = "{id, name}";

/// An immutable set of permission claims that must all be held.
///
/// Equality and display are defined on the sorted claim set, so
/// `["b", "a", "a"]` and `["a", "b"]` are the same requirement and both
/// render as `a, b`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimRequirement {
    claims: ClaimSet,
}

impl ClaimRequirement {
    /// Creates a requirement from any collection of claims, deduplicating them.
    pub fn new<I, S>(claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            claims: claims.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a requirement for a single claim.
    pub fn single(claim: impl Into<String>) -> Self {
        Self::new([claim.into()])
    }

    /// Creates a requirement that every identified principal satisfies.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    pub fn contains(&self, claim: &str) -> bool {
        self.claims.contains(claim)
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Returns the claims of this requirement that `held` does not contain.
    pub fn missing_from(&self, held: &ClaimSet) -> ClaimSet {
        self.claims.difference(held).cloned().collect()
    }
}

impl fmt::Display for ClaimRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_claims(&self.claims))
    }
}

impl From<&[&str]> for ClaimRequirement {
    fn from(claims: &[&str]) -> Self {
        Self::new(claims.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for ClaimRequirement {
    fn from(claims: [&str; N]) -> Self {
        Self::new(claims)
    }
}

/// Joins a claim set as `claim1, claim2`.
pub fn join_claims(claims: &ClaimSet) -> String {
    claims.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

/// The authenticated party making a request.
///
/// Only the identifier is inspected by the engine. A principal without an
/// identifier (or with an empty one) is never authorized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    id: Option<String>,
}

impl Principal {
    /// Creates a principal for the given user id.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    /// Creates a principal with no resolvable identifier.
    pub fn anonymous() -> Self {
        Self { id: None }
    }

    /// The principal's user id, if it has a non-empty one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// What a role looks like to the engine.
pub trait RoleEntity: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// The claims currently assigned to this role object.
    fn claims(&self) -> ClaimSet;
}

/// What a user looks like to the engine.
pub trait UserEntity: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    /// The role names claimed by this user object (possibly not yet persisted).
    fn role_names(&self) -> Vec<String>;
}

/// A role with its assigned claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub claims: ClaimSet,
}

impl Role {
    pub fn new<I, S>(id: impl Into<String>, name: impl Into<String>, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            claims: claims.into_iter().map(Into::into).collect(),
        }
    }
}

impl RoleEntity for Role {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn claims(&self) -> ClaimSet {
        self.claims.clone()
    }
}

/// A user with the role names assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub user_name: String,
    #[serde(default)]
    pub role_names: Vec<String>,
}

impl User {
    pub fn new<I, S>(id: impl Into<String>, user_name: impl Into<String>, role_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            user_name: user_name.into(),
            role_names: role_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl UserEntity for User {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.user_name
    }

    fn role_names(&self) -> Vec<String> {
        self.role_names.clone()
    }
}

/// The kind of object a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Role,
    User,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Role => write!(f, "role"),
            ResourceKind::User => write!(f, "user"),
        }
    }
}

/// The target of an authorization request.
#[derive(Clone, Copy)]
pub enum Resource<'a> {
    Role(&'a dyn RoleEntity),
    User(&'a dyn UserEntity),
}

impl<'a> Resource<'a> {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Role(_) => ResourceKind::Role,
            Resource::User(_) => ResourceKind::User,
        }
    }

    pub fn id(&self) -> &'a str {
        match *self {
            Resource::Role(role) => role.id(),
            Resource::User(user) => user.id(),
        }
    }

    pub fn name(&self) -> &'a str {
        match *self {
            Resource::Role(role) => role.name(),
            Resource::User(user) => user.name(),
        }
    }

    /// Checks that the resource actually carries an id and a name.
    pub fn validate(&self) -> Result<()> {
        if self.id().is_empty() || self.name().is_empty() {
            return Err(AuthzError::InvalidResource {
                capability: RESOURCE_CAPABILITY,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Resource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .field("name", &self.name())
            .finish()
    }
}
