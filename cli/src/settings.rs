use anyhow::{Context, Result};
use authz::permissions::UserManagement;
use authz::{AuthzConfig, Registry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use user::database::UserDatabaseConfig;
use user::AccessManager;

/// Contents of the `--config` file.
///
/// ```yaml
/// authz:
///   cache_ttl_seconds: 60
/// database:
///   database_path: data/authz.db
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub authz: AuthzConfig,
    pub database: UserDatabaseConfig,
}

impl Settings {
    /// Load settings, applying command line overrides on top of the file.
    pub fn load(config: Option<&Path>, database: Option<PathBuf>) -> Result<Self> {
        let mut settings = match config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_yaml::from_str::<Settings>(&content)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => Settings::default(),
        };

        if let Some(path) = database {
            settings.database.database_path = path;
        }

        settings.authz.validate()?;
        Ok(settings)
    }
}

/// Build the claim registry: user management plus any extra YAML declarations.
pub fn build_registry(declarations: &[PathBuf]) -> Result<Registry> {
    let mut builder = Registry::builder().register(&UserManagement);
    for path in declarations {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read claim declarations {}", path.display()))?;
        builder = builder
            .declare_yaml(&content)
            .with_context(|| format!("Invalid claim declarations {}", path.display()))?;
    }
    Ok(builder.build()?)
}

pub async fn open_manager(settings: &Settings, registry: Registry) -> Result<AccessManager> {
    Ok(AccessManager::with_registry(settings.database.clone(), settings.authz.clone(), registry).await?)
}
