use authz::permissions::{
    ADMINISTRATOR_ROLE_ID, ADMINISTRATOR_ROLE_NAME, ADMINISTRATOR_USER_ID,
};
use authz::{ClaimSet, Registry, Role, User};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, UserError};

/// Configuration for the user database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDatabaseConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

impl Default for UserDatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/user-backend/users.db"),
            max_connections: 5,
            connection_timeout: 30,
        }
    }
}

/// SQLite store of users, roles, role claims and user role assignments.
///
/// Users reference roles by name, the same way an identity token carries
/// role-name claims; role ids are resolved by joining on `roles.name`.
pub struct UserDatabase {
    pool: Pool<Sqlite>,
}

impl UserDatabase {
    /// Open (creating if needed) and migrate the user database
    pub async fn new(config: UserDatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(
            "Opening user database at: {}",
            config.database_path.display()
        );

        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_with(options)
            .await
            .map_err(|e| UserError::Initialization(format!("Failed to open database: {}", e)))?;

        let db = Self { pool };
        db.run_migrations().await?;

        info!("User database initialized successfully");
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        info!("Running user database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                user_name TEXT NOT NULL UNIQUE,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS role_claims (
                role_id TEXT NOT NULL,
                claim TEXT NOT NULL,
                PRIMARY KEY (role_id, claim),
                FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_role_claims (
                user_id TEXT NOT NULL,
                role_name TEXT NOT NULL,
                PRIMARY KEY (user_id, role_name),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_role_claims_role ON role_claims(role_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_role_claims_user ON user_role_claims(user_id)",
        )
        .execute(&self.pool)
        .await?;

        info!("User database migrations completed");
        Ok(())
    }

    /// Create the built-in Administrator role and user if they are missing.
    ///
    /// The Administrator role is granted every claim the registry defines.
    pub async fn seed_builtin_objects(&self, registry: &Registry) -> Result<()> {
        if self.find_role(ADMINISTRATOR_ROLE_ID).await?.is_none() {
            self.insert_role(&Role {
                id: ADMINISTRATOR_ROLE_ID.to_string(),
                name: ADMINISTRATOR_ROLE_NAME.to_string(),
                claims: registry.defined_claims().clone(),
            })
            .await?;
            info!("Created built-in role: {}", ADMINISTRATOR_ROLE_NAME);
        }

        if self.find_user(ADMINISTRATOR_USER_ID).await?.is_none() {
            self.insert_user(&User::new(
                ADMINISTRATOR_USER_ID,
                "admin",
                [ADMINISTRATOR_ROLE_NAME],
            ))
            .await?;
            info!("Created built-in user: admin");
        }

        Ok(())
    }

    /// Insert a role with a fresh ULID
    pub async fn create_role(&self, name: &str, claims: ClaimSet) -> Result<Role> {
        let role = Role {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            claims,
        };
        self.insert_role(&role).await?;
        Ok(role)
    }

    /// Insert a role exactly as given
    pub async fn insert_role(&self, role: &Role) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO roles (id, name) VALUES (?, ?)")
            .bind(&role.id)
            .bind(&role.name)
            .execute(&mut *tx)
            .await?;

        for claim in &role.claims {
            sqlx::query("INSERT INTO role_claims (role_id, claim) VALUES (?, ?)")
                .bind(&role.id)
                .bind(claim)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Inserted role {} ({})", role.name, role.id);
        Ok(())
    }

    /// Replace every claim assigned to a role
    pub async fn set_role_claims(&self, role_id: &str, claims: &ClaimSet) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM roles WHERE id = ?)")
            .bind(role_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(UserError::RoleNotFound(role_id.to_string()));
        }

        sqlx::query("DELETE FROM role_claims WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for claim in claims {
            sqlx::query("INSERT INTO role_claims (role_id, claim) VALUES (?, ?)")
                .bind(role_id)
                .bind(claim)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Role {} now has {} claims", role_id, claims.len());
        Ok(())
    }

    /// Delete a role and its claims. Returns whether it existed.
    pub async fn delete_role(&self, role_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM role_claims WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;
        Ok(deleted)
    }

    pub async fn find_role(&self, role_id: &str) -> Result<Option<Role>> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM roles WHERE id = ?")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;

        match name {
            Some(name) => Ok(Some(Role {
                id: role_id.to_string(),
                name,
                claims: self.role_claims(role_id).await?,
            })),
            None => Ok(None),
        }
    }

    pub async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => self.find_role(&id).await,
            None => Ok(None),
        }
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        let mut roles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(role) = self.find_role(&id).await? {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    /// Claims assigned to a role; empty for an unknown role
    pub async fn role_claims(&self, role_id: &str) -> Result<ClaimSet> {
        let claims =
            sqlx::query_scalar::<_, String>("SELECT claim FROM role_claims WHERE role_id = ?")
                .bind(role_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(claims.into_iter().collect())
    }

    /// Insert a user with a fresh ULID
    pub async fn create_user(&self, user_name: &str, role_names: &[String]) -> Result<User> {
        let user = User::new(
            ulid::Ulid::new().to_string(),
            user_name,
            role_names.iter().cloned(),
        );
        self.insert_user(&user).await?;
        Ok(user)
    }

    /// Insert a user exactly as given
    pub async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (id, user_name) VALUES (?, ?)")
            .bind(&user.id)
            .bind(&user.user_name)
            .execute(&mut *tx)
            .await?;

        for role_name in &user.role_names {
            sqlx::query("INSERT OR IGNORE INTO user_role_claims (user_id, role_name) VALUES (?, ?)")
                .bind(&user.id)
                .bind(role_name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Inserted user {} ({})", user.user_name, user.id);
        Ok(())
    }

    /// Replace the role names assigned to a user
    pub async fn set_user_roles(&self, user_id: &str, role_names: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(UserError::UserNotFound(user_id.to_string()));
        }

        sqlx::query("DELETE FROM user_role_claims WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for role_name in role_names {
            sqlx::query("INSERT OR IGNORE INTO user_role_claims (user_id, role_name) VALUES (?, ?)")
                .bind(user_id)
                .bind(role_name)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("User {} now has roles {:?}", user_id, role_names);
        Ok(())
    }

    /// Delete a user and its role assignments. Returns whether it existed.
    pub async fn delete_user(&self, user_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM user_role_claims WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        tx.commit().await?;
        Ok(deleted)
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let user_name = sqlx::query_scalar::<_, String>("SELECT user_name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(user_name) = user_name else {
            return Ok(None);
        };

        let role_names = sqlx::query_scalar::<_, String>(
            "SELECT role_name FROM user_role_claims WHERE user_id = ? ORDER BY role_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(User {
            id: user_id.to_string(),
            user_name,
            role_names,
        }))
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM users ORDER BY user_name")
            .fetch_all(&self.pool)
            .await?;

        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.find_user(&id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    /// Ids of the users holding a role-name claim for `role_name`
    pub async fn user_ids_with_role_name(&self, role_name: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM user_role_claims WHERE role_name = ?",
        )
        .bind(role_name)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Role ids of the roles named by a user's role-name claims
    pub async fn role_ids_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.id
            FROM user_role_claims u
            JOIN roles r ON r.name = u.role_name
            WHERE u.user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Role ids of the roles with the given names
    pub async fn role_ids_for_names(&self, role_names: &[String]) -> Result<Vec<String>> {
        if role_names.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT id FROM roles WHERE name IN (");
        let mut names = query.separated(", ");
        for name in role_names {
            names.push_bind(name);
        }
        names.push_unseparated(")");

        let ids = query
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    /// Verify database integrity
    pub async fn verify_integrity(&self) -> Result<bool> {
        let tables = ["users", "roles", "role_claims", "user_role_claims"];

        for table in tables {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                warn!("Missing table: {}", table);
                return Ok(false);
            }
        }

        info!("Database integrity check passed");
        Ok(true)
    }

    /// Close the database connection
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        info!("User database connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz::permissions::UserManagement;
    use rstest::rstest;
    use tempfile::TempDir;

    async fn open(temp_dir: &TempDir) -> UserDatabase {
        let config = UserDatabaseConfig {
            database_path: temp_dir.path().join("test_user.db"),
            ..Default::default()
        };
        UserDatabase::new(config).await.unwrap()
    }

    fn registry() -> Registry {
        Registry::builder().register(&UserManagement).build().unwrap()
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        assert!(temp_dir.path().join("test_user.db").exists());
        assert!(db.verify_integrity().await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;
        let registry = registry();

        db.seed_builtin_objects(&registry).await.unwrap();
        db.seed_builtin_objects(&registry).await.unwrap();

        let roles = db.list_roles().await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].claims, *registry.defined_claims());

        let admin = db.find_user(ADMINISTRATOR_USER_ID).await.unwrap().unwrap();
        assert_eq!(admin.role_names, vec![ADMINISTRATOR_ROLE_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_role_claims_roundtrip_through_store() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        let role = db
            .create_role("Editor", ["Role.Read".to_string()].into())
            .await
            .unwrap();
        db.set_role_claims(&role.id, &["Role.Update".to_string()].into())
            .await
            .unwrap();

        let found = db.find_role_by_name("Editor").await.unwrap().unwrap();
        assert_eq!(found.id, role.id);
        assert_eq!(found.claims, ["Role.Update".to_string()].into());

        assert!(db.delete_role(&role.id).await.unwrap());
        assert!(!db.delete_role(&role.id).await.unwrap());
        assert!(db.role_claims(&role.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_role_and_user_updates_fail() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        let err = db
            .set_role_claims("nope", &ClaimSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::RoleNotFound(_)));

        let err = db.set_user_roles("nope", &[]).await.unwrap_err();
        assert!(matches!(err, UserError::UserNotFound(_)));
    }

    #[rstest]
    #[case(vec![], 0)]
    #[case(vec!["Editor"], 1)]
    #[case(vec!["Editor", "Viewer"], 2)]
    #[case(vec!["Editor", "Ghost"], 1)]
    #[tokio::test]
    async fn test_user_roles_join_on_name(#[case] role_names: Vec<&str>, #[case] expected: usize) {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;
        db.create_role("Editor", ClaimSet::new()).await.unwrap();
        db.create_role("Viewer", ClaimSet::new()).await.unwrap();

        let role_names: Vec<String> = role_names.into_iter().map(String::from).collect();
        let user = db.create_user("alice", &role_names).await.unwrap();

        assert_eq!(db.role_ids_for_user(&user.id).await.unwrap().len(), expected);
        let editors = db.user_ids_with_role_name("Editor").await.unwrap();
        assert_eq!(editors.contains(&user.id), role_names.iter().any(|n| n == "Editor"));
        assert_eq!(db.role_ids_for_names(&role_names).await.unwrap().len(), expected);
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        let user = db
            .create_user("bob", &["Viewer".to_string()])
            .await
            .unwrap();
        db.set_user_roles(&user.id, &["Editor".to_string(), "Viewer".to_string()])
            .await
            .unwrap();

        let found = db.find_user(&user.id).await.unwrap().unwrap();
        assert_eq!(found.role_names, vec!["Editor", "Viewer"]);

        assert_eq!(db.list_users().await.unwrap(), vec![found]);

        assert!(db.delete_user(&user.id).await.unwrap());
        assert!(db.find_user(&user.id).await.unwrap().is_none());
    }
}
