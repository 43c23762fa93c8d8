//! The closed universe of claims and built-in objects.
//!
//! Each component of the embedding application describes what it contributes
//! with a [`ClaimDeclaration`], either directly or through a
//! [`ClaimProvider`]. The declarations are merged once at startup by a
//! [`RegistryBuilder`] into an immutable [`Registry`] that the engine and the
//! management UI share.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::error::{AuthzError, Result};
use crate::types::{ClaimRequirement, ClaimSet, ResourceKind};

/// What a single component declares to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDeclaration {
    /// Every claim this component defines.
    #[serde(default)]
    pub defined_claims: ClaimSet,

    /// Claims that must never be requested against a system object.
    #[serde(default)]
    pub restricted_claims: ClaimSet,

    /// Ids of built-in roles and users.
    #[serde(default)]
    pub system_object_ids: BTreeSet<String>,

    /// The claim that deletes a resource of the given kind. Requests carrying
    /// it skip the elevation check.
    #[serde(default)]
    pub delete_claims: BTreeMap<ResourceKind, String>,
}

impl ClaimDeclaration {
    /// Parses a declaration from YAML.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Implemented by components that contribute claims or built-in objects.
pub trait ClaimProvider {
    fn declaration(&self) -> ClaimDeclaration;
}

/// Collects declarations and validates them into a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    merged: ClaimDeclaration,
    conflicts: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider's declaration.
    pub fn register(self, provider: &dyn ClaimProvider) -> Self {
        self.declare(provider.declaration())
    }

    /// Merges a declaration into the builder.
    pub fn declare(mut self, declaration: ClaimDeclaration) -> Self {
        self.merged.defined_claims.extend(declaration.defined_claims);
        self.merged
            .restricted_claims
            .extend(declaration.restricted_claims);
        self.merged
            .system_object_ids
            .extend(declaration.system_object_ids);
        for (kind, claim) in declaration.delete_claims {
            match self.merged.delete_claims.get(&kind) {
                Some(existing) if *existing != claim => self.conflicts.push(format!(
                    "{} resources declare both '{}' and '{}' as their delete claim",
                    kind, existing, claim
                )),
                Some(_) => {}
                None => {
                    self.merged.delete_claims.insert(kind, claim);
                }
            }
        }
        self
    }

    /// Merges a YAML declaration.
    pub fn declare_yaml(self, content: &str) -> Result<Self> {
        Ok(self.declare(ClaimDeclaration::from_yaml(content)?))
    }

    /// Validates the merged declarations and freezes them.
    ///
    /// Restricted claims and delete claims must be defined claims, and each
    /// resource kind has at most one delete claim.
    pub fn build(self) -> Result<Registry> {
        if let Some(conflict) = self.conflicts.into_iter().next() {
            return Err(AuthzError::Configuration(conflict));
        }

        let ClaimDeclaration {
            defined_claims,
            restricted_claims,
            system_object_ids,
            delete_claims,
        } = self.merged;

        if let Some(claim) = restricted_claims
            .iter()
            .find(|c| !defined_claims.contains(*c))
        {
            return Err(AuthzError::Configuration(format!(
                "restricted claim '{}' is not a defined claim",
                claim
            )));
        }

        if let Some((kind, claim)) = delete_claims
            .iter()
            .find(|(_, c)| !defined_claims.contains(*c))
        {
            return Err(AuthzError::Configuration(format!(
                "delete claim '{}' for {} resources is not a defined claim",
                claim, kind
            )));
        }

        info!(
            "Claim registry built: {} claims ({} restricted), {} system objects",
            defined_claims.len(),
            restricted_claims.len(),
            system_object_ids.len()
        );

        Ok(Registry {
            defined_claims,
            restricted_claims,
            system_object_ids,
            delete_claims,
        })
    }
}

/// Read-only registry of defined claims and system objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    defined_claims: ClaimSet,
    restricted_claims: ClaimSet,
    system_object_ids: BTreeSet<String>,
    delete_claims: BTreeMap<ResourceKind, String>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn defined_claims(&self) -> &ClaimSet {
        &self.defined_claims
    }

    pub fn restricted_claims(&self) -> &ClaimSet {
        &self.restricted_claims
    }

    pub fn system_object_ids(&self) -> &BTreeSet<String> {
        &self.system_object_ids
    }

    pub fn is_system_object(&self, id: &str) -> bool {
        self.system_object_ids.contains(id)
    }

    /// The restricted claims contained in `requirement`.
    pub fn restricted_in(&self, requirement: &ClaimRequirement) -> ClaimSet {
        requirement
            .claims()
            .intersection(&self.restricted_claims)
            .cloned()
            .collect()
    }

    pub fn delete_claim(&self, kind: ResourceKind) -> Option<&str> {
        self.delete_claims.get(&kind).map(String::as_str)
    }
}
