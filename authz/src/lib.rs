//! Claims-based authorization engine.
//!
//! This crate decides whether an authenticated principal may perform an
//! operation described by a set of permission claims, optionally against a
//! target role or user. It sits on top of an [`IdentityStore`] that knows
//! which roles a user holds and which claims a role carries, and caches both
//! answers with a sliding expiration.
//!
//! # Decision procedure
//!
//! For a request `(principal, resource?, requirement)`:
//!
//! 1. **No principal id**: deny with `NoPrincipalId`, echoing the full requirement
//! 2. **Role resolution**: principal's role ids via the principal role cache
//! 3. **System objects**: restricted claims against a built-in role or user are
//!    denied with `SystemObject`, even for administrators
//! 4. **Administrator bypass**: holders of the Administrator role succeed
//! 5. **Subset test**: missing claims are denied with `NotAuthorized`
//! 6. **Elevation**: the target role's claims, or the claims of the target
//!    user's roles, must be held by the principal; making someone an
//!    Administrator is always an elevation. Requests carrying the delete claim
//!    for the resource kind skip this step.
//!
//! Steps 3 and 4 must stay in this order.
//!
//! # Caching
//!
//! The write path must call [`AuthzEngine::refresh_user`] after changing a
//! user's roles and [`AuthzEngine::refresh_role`] after changing a role's
//! claims. See [`cache`] for how in-flight fills interact with invalidation.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use authz::permissions::{UserManagement, ROLE_CREATE};
//! use authz::{AuthzConfig, AuthzEngine, ClaimRequirement, MemoryIdentityStore, Principal, Registry};
//!
//! # async fn run() -> authz::error::Result<()> {
//! let registry = Arc::new(Registry::builder().register(&UserManagement).build()?);
//! let store = Arc::new(MemoryIdentityStore::new());
//! let engine = AuthzEngine::new(store, registry, AuthzConfig::default())?;
//!
//! let outcome = engine
//!     .authorize(&Principal::user("u1"), &ClaimRequirement::single(ROLE_CREATE))
//!     .await?;
//! if !outcome.succeeded() {
//!     println!("{}", outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod outcome;
pub mod permissions;
pub mod registry;
pub mod store;
pub mod types;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use cache::{ExpiringCache, PrincipalRoleCache, RoleClaimCache};
pub use cancel::{CancelHandle, CancelToken};
pub use config::AuthzConfig;
pub use error::{AuthzError, Result};
pub use outcome::{AuthorizationFailure, AuthorizationOutcome, FailureReason};
pub use registry::{ClaimDeclaration, ClaimProvider, Registry, RegistryBuilder};
pub use store::{IdentityStore, MemoryIdentityStore};
pub use types::{
    ClaimRequirement, ClaimSet, Principal, Resource, ResourceKind, Role, RoleEntity, RoleIdSet,
    User, UserEntity,
};

/// The authorization decision engine.
///
/// Cheap to share: wrap it in an `Arc` and call it from any number of tasks.
/// The only mutable state is the two caches.
pub struct AuthzEngine {
    store: Arc<dyn IdentityStore>,
    registry: Arc<Registry>,
    config: AuthzConfig,
    principal_roles: PrincipalRoleCache,
    role_claims: RoleClaimCache,
}

impl AuthzEngine {
    /// Creates an engine with empty caches.
    pub fn new(
        store: Arc<dyn IdentityStore>,
        registry: Arc<Registry>,
        config: AuthzConfig,
    ) -> Result<Self> {
        config.validate()?;
        let ttl = config.cache_ttl();
        info!(
            "Authorization engine ready: {} defined claims, cache ttl {:?}",
            registry.defined_claims().len(),
            ttl
        );
        Ok(Self {
            store,
            registry,
            config,
            principal_roles: PrincipalRoleCache::new(ttl),
            role_claims: RoleClaimCache::new(ttl),
        })
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    /// Every claim the application defines, for building assignment forms.
    pub fn defined_claims(&self) -> &ClaimSet {
        self.registry.defined_claims()
    }

    /// Ids of built-in roles and users, e.g. to hide their delete buttons.
    pub fn defined_system_object_ids(&self) -> &BTreeSet<String> {
        self.registry.system_object_ids()
    }

    pub fn principal_role_cache(&self) -> &PrincipalRoleCache {
        &self.principal_roles
    }

    pub fn role_claim_cache(&self) -> &RoleClaimCache {
        &self.role_claims
    }

    /// Authorizes a request that targets no particular resource.
    pub async fn authorize(
        &self,
        principal: &Principal,
        requirement: &ClaimRequirement,
    ) -> Result<AuthorizationOutcome> {
        self.authorize_with_cancel(principal, None, requirement, &CancelToken::never())
            .await
    }

    /// Authorizes a request against an optional role or user resource.
    pub async fn authorize_resource(
        &self,
        principal: &Principal,
        resource: Option<Resource<'_>>,
        requirement: &ClaimRequirement,
    ) -> Result<AuthorizationOutcome> {
        self.authorize_with_cancel(principal, resource, requirement, &CancelToken::never())
            .await
    }

    /// Returns whether the principal holds every one of `claims`.
    pub async fn is_authorized(&self, principal: &Principal, claims: &[&str]) -> Result<bool> {
        let requirement = ClaimRequirement::from(claims);
        Ok(self.authorize(principal, &requirement).await?.succeeded())
    }

    /// Forgets the cached roles of a user.
    pub fn refresh_user(&self, user_id: &str) {
        debug!("Invalidating cached roles for user {}", user_id);
        self.principal_roles.remove(user_id);
    }

    /// Forgets the cached claims of a role.
    pub fn refresh_role(&self, role_id: &str) {
        debug!("Invalidating cached claims for role {}", role_id);
        self.role_claims.remove(role_id);
    }

    /// Full decision procedure. `cancel` aborts an in-flight store query with
    /// [`AuthzError::Cancelled`].
    pub async fn authorize_with_cancel(
        &self,
        principal: &Principal,
        resource: Option<Resource<'_>>,
        requirement: &ClaimRequirement,
        cancel: &CancelToken,
    ) -> Result<AuthorizationOutcome> {
        if let Some(resource) = &resource {
            resource.validate()?;
        }
        let target = resource.map(|r| r.id()).unwrap_or("-");

        let Some(principal_id) = principal.id() else {
            info!(
                "Denied [{}] on {}: no principal id",
                requirement, target
            );
            return Ok(AuthorizationOutcome::failed(
                FailureReason::NoPrincipalId,
                requirement.claims().clone(),
            ));
        };

        let role_ids = self.principal_role_ids(principal_id, cancel).await?;

        if let Some(resource) = resource {
            if self.registry.is_system_object(resource.id()) {
                let restricted = self.registry.restricted_in(requirement);
                if !restricted.is_empty() {
                    info!(
                        "Denied [{}] for {} on system {} {}",
                        requirement,
                        principal_id,
                        resource.kind(),
                        resource.id()
                    );
                    return Ok(AuthorizationOutcome::failed(
                        FailureReason::SystemObject,
                        restricted,
                    ));
                }
            }
        }

        if role_ids.contains(&self.config.administrator_role_id) {
            debug!(
                "Administrator {} authorized for [{}] on {}",
                principal_id, requirement, target
            );
            return Ok(AuthorizationOutcome::success());
        }

        let principal_claims = self.claims_for_roles(&role_ids, cancel).await?;
        let missing = requirement.missing_from(&principal_claims);
        if !missing.is_empty() {
            info!(
                "Denied [{}] for {} on {}: missing {}",
                requirement,
                principal_id,
                target,
                types::join_claims(&missing)
            );
            return Ok(AuthorizationOutcome::failed(
                FailureReason::NotAuthorized,
                missing,
            ));
        }

        let Some(resource) = resource else {
            return Ok(AuthorizationOutcome::success());
        };

        if let Some(delete_claim) = self.registry.delete_claim(resource.kind()) {
            if requirement.contains(delete_claim) {
                return Ok(AuthorizationOutcome::success());
            }
        }

        let elevated = self
            .elevated_claims(resource, &principal_claims, cancel)
            .await?;
        if !elevated.is_empty() {
            warn!(
                "Denied [{}] for {} on {} {}: would elevate to {}",
                requirement,
                principal_id,
                resource.kind(),
                resource.id(),
                types::join_claims(&elevated)
            );
            return Ok(AuthorizationOutcome::failed(
                FailureReason::Elevation,
                elevated,
            ));
        }

        Ok(AuthorizationOutcome::success())
    }

    /// Claims the resource would carry that the principal does not hold.
    async fn elevated_claims(
        &self,
        resource: Resource<'_>,
        principal_claims: &ClaimSet,
        cancel: &CancelToken,
    ) -> Result<ClaimSet> {
        match resource {
            Resource::Role(role) => Ok(role
                .claims()
                .difference(principal_claims)
                .cloned()
                .collect()),
            Resource::User(user) => {
                let role_names = user.role_names();
                let target_roles =
                    guarded(cancel, self.store.resolve_role_ids_for_names(&role_names)).await?;
                if target_roles.contains(&self.config.administrator_role_id) {
                    return Ok([self.config.administrator_role_name.clone()].into());
                }
                let target_claims = self.claims_for_roles(&target_roles, cancel).await?;
                Ok(target_claims
                    .difference(principal_claims)
                    .cloned()
                    .collect())
            }
        }
    }

    async fn principal_role_ids(
        &self,
        user_id: &str,
        cancel: &CancelToken,
    ) -> Result<Arc<RoleIdSet>> {
        if let Some(roles) = self.principal_roles.try_get(user_id) {
            debug!("Role cache hit for user {}", user_id);
            return Ok(roles);
        }

        debug!("Role cache miss for user {}, querying store", user_id);
        let ticket = self.principal_roles.begin_fill();
        let roles = Arc::new(guarded(cancel, self.store.resolve_role_ids_for_user(user_id)).await?);
        if !self
            .principal_roles
            .complete_fill(ticket, user_id.to_string(), Arc::clone(&roles))
        {
            debug!("User {} was refreshed during lookup, not caching", user_id);
        }
        Ok(roles)
    }

    async fn role_claims(&self, role_id: &str, cancel: &CancelToken) -> Result<Arc<ClaimSet>> {
        if let Some(claims) = self.role_claims.try_get(role_id) {
            debug!("Claim cache hit for role {}", role_id);
            return Ok(claims);
        }

        debug!("Claim cache miss for role {}, querying store", role_id);
        let ticket = self.role_claims.begin_fill();
        let claims = Arc::new(guarded(cancel, self.store.resolve_claims_for_role(role_id)).await?);
        if !self
            .role_claims
            .complete_fill(ticket, role_id.to_string(), Arc::clone(&claims))
        {
            debug!("Role {} was refreshed during lookup, not caching", role_id);
        }
        Ok(claims)
    }

    /// Union of the claims of every role in `role_ids`.
    async fn claims_for_roles(
        &self,
        role_ids: &RoleIdSet,
        cancel: &CancelToken,
    ) -> Result<ClaimSet> {
        let mut claims = ClaimSet::new();
        for role_id in role_ids {
            claims.extend(self.role_claims(role_id, cancel).await?.iter().cloned());
        }
        Ok(claims)
    }
}

/// Runs a store query unless the request is cancelled first.
async fn guarded<T, F>(cancel: &CancelToken, query: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(AuthzError::Cancelled),
        result = query => result,
    }
}
