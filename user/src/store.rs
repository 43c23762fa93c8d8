use async_trait::async_trait;
use authz::{ClaimSet, IdentityStore, RoleIdSet};

use crate::database::UserDatabase;

#[async_trait]
impl IdentityStore for UserDatabase {
    async fn resolve_role_ids_for_user(&self, user_id: &str) -> authz::Result<RoleIdSet> {
        Ok(self.role_ids_for_user(user_id).await?.into_iter().collect())
    }

    async fn resolve_role_ids_for_names(&self, role_names: &[String]) -> authz::Result<RoleIdSet> {
        Ok(self.role_ids_for_names(role_names).await?.into_iter().collect())
    }

    async fn resolve_claims_for_role(&self, role_id: &str) -> authz::Result<ClaimSet> {
        Ok(self.role_claims(role_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::UserDatabaseConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store_resolves_through_role_names() {
        let temp_dir = TempDir::new().unwrap();
        let db = UserDatabase::new(UserDatabaseConfig {
            database_path: temp_dir.path().join("store.db"),
            ..Default::default()
        })
        .await
        .unwrap();

        let editor = db
            .create_role("Editor", ["Role.Read".to_string(), "Role.Update".to_string()].into())
            .await
            .unwrap();
        let user = db
            .create_user("carol", &["Editor".to_string(), "Missing".to_string()])
            .await
            .unwrap();

        let store: &dyn IdentityStore = &db;
        let roles = store.resolve_role_ids_for_user(&user.id).await.unwrap();
        assert_eq!(roles, [editor.id.clone()].into());

        let by_name = store
            .resolve_role_ids_for_names(&["Editor".to_string()])
            .await
            .unwrap();
        assert_eq!(by_name, roles);

        let claims = store.resolve_claims_for_role(&editor.id).await.unwrap();
        assert!(claims.contains("Role.Update"));
        assert!(store.resolve_claims_for_role("unknown").await.unwrap().is_empty());
        assert!(store.resolve_role_ids_for_user("unknown").await.unwrap().is_empty());
    }
}
