use anyhow::{bail, Result};
use colored::*;
use user::AccessManager;

/// Report on a freshly opened (migrated and seeded) database
pub async fn execute(manager: &AccessManager) -> Result<()> {
    if !manager.database().verify_integrity().await? {
        bail!("database integrity check failed");
    }

    let roles = manager.database().list_roles().await?;
    println!("{} Database initialized", "✓".green().bold());
    println!(
        "  cache ttl {}s, administrator role {}",
        manager.engine().config().cache_ttl_seconds,
        manager.engine().config().administrator_role_id
    );
    for role in roles {
        println!("  role {} ({}) with {} claims", role.name.bold(), role.id, role.claims.len());
    }

    Ok(())
}
