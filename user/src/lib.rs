pub mod database;
pub mod error;
pub mod store;

use std::sync::Arc;
use tracing::info;

use authz::permissions::{
    UserManagement, ROLE_CREATE, ROLE_DELETE, ROLE_UPDATE_CLAIMS, USER_CREATE, USER_DELETE,
    USER_UPDATE_CLAIMS,
};
use authz::{
    AuthzConfig, AuthzEngine, ClaimRequirement, ClaimSet, Principal, Registry, Resource, Role,
    User,
};
use database::{UserDatabase, UserDatabaseConfig};
use error::{Result, UserError};

/// Role and user administration guarded by the authorization engine.
///
/// Every write authorizes the acting principal against the requested state
/// of the target, performs the write, and then invalidates the engine's
/// cached view of that target.
pub struct AccessManager {
    database: Arc<UserDatabase>,
    engine: Arc<AuthzEngine>,
}

impl AccessManager {
    /// Open the database, seed the built-in objects and start an engine on top of it
    pub async fn new(db_config: UserDatabaseConfig, authz_config: AuthzConfig) -> Result<Self> {
        let registry = Registry::builder().register(&UserManagement).build()?;
        Self::with_registry(db_config, authz_config, registry).await
    }

    /// Like [`AccessManager::new`], with claims declared by other modules
    /// added to the registry. The registry must include [`UserManagement`].
    pub async fn with_registry(
        db_config: UserDatabaseConfig,
        authz_config: AuthzConfig,
        registry: Registry,
    ) -> Result<Self> {
        info!("Initializing access management");

        let registry = Arc::new(registry);
        let database = Arc::new(UserDatabase::new(db_config).await?);
        database.seed_builtin_objects(&registry).await?;

        let engine = Arc::new(AuthzEngine::new(
            database.clone(),
            registry,
            authz_config,
        )?);

        Ok(Self::from_parts(database, engine))
    }

    /// Wrap an existing database and engine. The engine must read from `database`.
    pub fn from_parts(database: Arc<UserDatabase>, engine: Arc<AuthzEngine>) -> Self {
        Self { database, engine }
    }

    pub fn database(&self) -> &UserDatabase {
        &self.database
    }

    pub fn engine(&self) -> &AuthzEngine {
        &self.engine
    }

    pub async fn create_role(
        &self,
        principal: &Principal,
        name: &str,
        claims: ClaimSet,
    ) -> Result<Role> {
        self.ensure_defined(&claims)?;

        let role = Role {
            id: ulid::Ulid::new().to_string(),
            name: name.to_string(),
            claims,
        };
        self.require(principal, Resource::Role(&role), ROLE_CREATE)
            .await?;

        self.database.insert_role(&role).await?;
        self.engine.refresh_role(&role.id);
        self.refresh_holders(&role.name).await?;
        info!("Role {} ({}) created", role.name, role.id);
        Ok(role)
    }

    /// Replace every claim of a role
    pub async fn update_role_claims(
        &self,
        principal: &Principal,
        role_id: &str,
        claims: ClaimSet,
    ) -> Result<Role> {
        self.ensure_defined(&claims)?;

        let mut role = self
            .database
            .find_role(role_id)
            .await?
            .ok_or_else(|| UserError::RoleNotFound(role_id.to_string()))?;
        role.claims = claims;
        self.require(principal, Resource::Role(&role), ROLE_UPDATE_CLAIMS)
            .await?;

        self.database.set_role_claims(&role.id, &role.claims).await?;
        self.engine.refresh_role(&role.id);
        info!("Role {} now has claims [{}]", role.id, authz::types::join_claims(&role.claims));
        Ok(role)
    }

    pub async fn delete_role(&self, principal: &Principal, role_id: &str) -> Result<()> {
        let role = self
            .database
            .find_role(role_id)
            .await?
            .ok_or_else(|| UserError::RoleNotFound(role_id.to_string()))?;
        self.require(principal, Resource::Role(&role), ROLE_DELETE)
            .await?;

        self.database.delete_role(&role.id).await?;
        self.engine.refresh_role(&role.id);
        self.refresh_holders(&role.name).await?;
        info!("Role {} ({}) deleted", role.name, role.id);
        Ok(())
    }

    pub async fn create_user(
        &self,
        principal: &Principal,
        user_name: &str,
        role_names: Vec<String>,
    ) -> Result<User> {
        let user = User::new(ulid::Ulid::new().to_string(), user_name, role_names);
        self.require(principal, Resource::User(&user), USER_CREATE)
            .await?;

        self.database.insert_user(&user).await?;
        self.engine.refresh_user(&user.id);
        info!("User {} ({}) created", user.user_name, user.id);
        Ok(user)
    }

    /// Replace the role names assigned to a user
    pub async fn update_user_roles(
        &self,
        principal: &Principal,
        user_id: &str,
        role_names: Vec<String>,
    ) -> Result<User> {
        let mut user = self
            .database
            .find_user(user_id)
            .await?
            .ok_or_else(|| UserError::UserNotFound(user_id.to_string()))?;
        user.role_names = role_names;
        self.require(principal, Resource::User(&user), USER_UPDATE_CLAIMS)
            .await?;

        self.database.set_user_roles(&user.id, &user.role_names).await?;
        self.engine.refresh_user(&user.id);
        info!("User {} now has roles {:?}", user.id, user.role_names);
        Ok(user)
    }

    pub async fn delete_user(&self, principal: &Principal, user_id: &str) -> Result<()> {
        let user = self
            .database
            .find_user(user_id)
            .await?
            .ok_or_else(|| UserError::UserNotFound(user_id.to_string()))?;
        self.require(principal, Resource::User(&user), USER_DELETE)
            .await?;

        self.database.delete_user(&user.id).await?;
        self.engine.refresh_user(&user.id);
        info!("User {} ({}) deleted", user.user_name, user.id);
        Ok(())
    }

    async fn require(&self, principal: &Principal, resource: Resource<'_>, claim: &str) -> Result<()> {
        self.engine
            .authorize_resource(principal, Some(resource), &ClaimRequirement::single(claim))
            .await?
            .into_result()?;
        Ok(())
    }

    /// Users resolve roles by name, so creating or deleting a role changes
    /// the role ids of every user already holding that name.
    async fn refresh_holders(&self, role_name: &str) -> Result<()> {
        for user_id in self.database.user_ids_with_role_name(role_name).await? {
            self.engine.refresh_user(&user_id);
        }
        Ok(())
    }

    fn ensure_defined(&self, claims: &ClaimSet) -> Result<()> {
        let defined = self.engine.defined_claims();
        match claims.iter().find(|claim| !defined.contains(*claim)) {
            Some(unknown) => Err(UserError::UnknownClaim(unknown.clone())),
            None => Ok(()),
        }
    }
}
