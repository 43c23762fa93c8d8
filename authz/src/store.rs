//! The identity store the engine falls back to on a cache miss.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::types::{ClaimSet, Role, RoleIdSet, User};

/// Read access to user role assignments and role claims.
///
/// Implementations may be slow (a database round trip); the engine caches
/// their answers and never calls them while holding a lock.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Role ids implied by the role-name claims currently assigned to a user.
    /// An unknown user has no roles.
    async fn resolve_role_ids_for_user(&self, user_id: &str) -> Result<RoleIdSet>;

    /// Role ids of the roles with the given names. Unknown names are ignored.
    async fn resolve_role_ids_for_names(&self, role_names: &[String]) -> Result<RoleIdSet>;

    /// Claims currently assigned to a role. An unknown role has no claims.
    async fn resolve_claims_for_role(&self, role_id: &str) -> Result<ClaimSet>;
}

/// An identity store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    roles: RwLock<HashMap<String, Role>>,
    users: RwLock<HashMap<String, User>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a role.
    pub async fn put_role(&self, role: Role) {
        self.roles.write().await.insert(role.id.clone(), role);
    }

    /// Inserts or replaces a user.
    pub async fn put_user(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn remove_role(&self, role_id: &str) -> Option<Role> {
        self.roles.write().await.remove(role_id)
    }

    pub async fn remove_user(&self, user_id: &str) -> Option<User> {
        self.users.write().await.remove(user_id)
    }

    pub async fn role(&self, role_id: &str) -> Option<Role> {
        self.roles.read().await.get(role_id).cloned()
    }

    pub async fn user(&self, user_id: &str) -> Option<User> {
        self.users.read().await.get(user_id).cloned()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn resolve_role_ids_for_user(&self, user_id: &str) -> Result<RoleIdSet> {
        let role_names = match self.users.read().await.get(user_id) {
            Some(user) => user.role_names.clone(),
            None => {
                debug!("Unknown user {} resolves to no roles", user_id);
                return Ok(RoleIdSet::new());
            }
        };
        self.resolve_role_ids_for_names(&role_names).await
    }

    async fn resolve_role_ids_for_names(&self, role_names: &[String]) -> Result<RoleIdSet> {
        let roles = self.roles.read().await;
        Ok(roles
            .values()
            .filter(|role| role_names.iter().any(|name| *name == role.name))
            .map(|role| role.id.clone())
            .collect())
    }

    async fn resolve_claims_for_role(&self, role_id: &str) -> Result<ClaimSet> {
        Ok(self
            .roles
            .read()
            .await
            .get(role_id)
            .map(|role| role.claims.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> MemoryIdentityStore {
        let store = MemoryIdentityStore::new();
        store
            .put_role(Role::new("r-editor", "Editor", ["Role.Read", "Role.Update"]))
            .await;
        store.put_role(Role::new("r-viewer", "Viewer", ["Role.Read"])).await;
        store
            .put_user(User::new("u1", "alice", ["Editor", "Ghost"]))
            .await;
        store
    }

    #[tokio::test]
    async fn test_user_roles_join_on_names() {
        let store = seeded().await;
        let roles = store.resolve_role_ids_for_user("u1").await.unwrap();
        assert_eq!(roles, ["r-editor".to_string()].into());
    }

    #[tokio::test]
    async fn test_unknown_user_and_role_are_empty() {
        let store = seeded().await;
        assert!(store.resolve_role_ids_for_user("nobody").await.unwrap().is_empty());
        assert!(store.resolve_claims_for_role("r-none").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_names_resolution() {
        let store = seeded().await;
        let roles = store
            .resolve_role_ids_for_names(&["Viewer".to_string(), "Editor".to_string()])
            .await
            .unwrap();
        assert_eq!(roles.len(), 2);
    }

    #[tokio::test]
    async fn test_replacing_a_role_changes_claims() {
        let store = seeded().await;
        store.put_role(Role::new("r-viewer", "Viewer", ["User.Read"])).await;
        let claims = store.resolve_claims_for_role("r-viewer").await.unwrap();
        assert_eq!(claims, ["User.Read".to_string()].into());
        assert!(store.remove_role("r-viewer").await.is_some());
        assert!(store.role("r-viewer").await.is_none());
    }
}
