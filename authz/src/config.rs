//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::{AuthzError, Result};
use crate::permissions::{ADMINISTRATOR_ROLE_ID, ADMINISTRATOR_ROLE_NAME};

/// Settings for [`AuthzEngine`](crate::AuthzEngine).
///
/// Every field has a default; a YAML file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Sliding expiration window for both caches, in seconds.
    pub cache_ttl_seconds: u64,
    /// Role id whose holders bypass claim checks.
    pub administrator_role_id: String,
    /// Reported as the failing claim when a request would create an administrator.
    pub administrator_role_name: String,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: DEFAULT_CACHE_TTL.as_secs(),
            administrator_role_id: ADMINISTRATOR_ROLE_ID.to_string(),
            administrator_role_name: ADMINISTRATOR_ROLE_NAME.to_string(),
        }
    }
}

impl AuthzConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthzError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_seconds == 0 {
            return Err(AuthzError::Configuration(
                "cache_ttl_seconds must be greater than zero".to_string(),
            ));
        }
        if self.administrator_role_id.is_empty() || self.administrator_role_name.is_empty() {
            return Err(AuthzError::Configuration(
                "administrator role id and name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
