use anyhow::{bail, Context, Result};
use authz::ClaimSet;
use colored::*;
use user::AccessManager;

/// Create a role directly in the store
pub async fn create(manager: &AccessManager, name: &str, claims: Vec<String>) -> Result<()> {
    let claims = defined_claims(manager, claims)?;
    let role = manager.database().create_role(name, claims).await?;
    println!("{} Created role {} ({})", "✓".green().bold(), role.name.bold(), role.id);
    Ok(())
}

/// Add claims to an existing role
pub async fn grant(manager: &AccessManager, role_id: &str, claims: Vec<String>) -> Result<()> {
    let added = defined_claims(manager, claims)?;
    let mut role = manager
        .database()
        .find_role(role_id)
        .await?
        .with_context(|| format!("Role not found: {}", role_id))?;

    role.claims.extend(added);
    manager.database().set_role_claims(&role.id, &role.claims).await?;
    manager.engine().refresh_role(&role.id);

    println!(
        "{} Role {} now has claims: {}",
        "✓".green().bold(),
        role.name.bold(),
        authz::types::join_claims(&role.claims)
    );
    Ok(())
}

pub async fn list(manager: &AccessManager, format: &str) -> Result<()> {
    let roles = manager.database().list_roles().await?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&roles)?),
        "yaml" => print!("{}", serde_yaml::to_string(&roles)?),
        _ => {
            println!("{}", "Roles".bold().underline());
            for role in &roles {
                println!("  {} {}", role.name.bold(), role.id.dimmed());
                for claim in &role.claims {
                    println!("    {}", claim);
                }
            }
        }
    }
    Ok(())
}

fn defined_claims(manager: &AccessManager, claims: Vec<String>) -> Result<ClaimSet> {
    let defined = manager.engine().defined_claims();
    if let Some(unknown) = claims.iter().find(|claim| !defined.contains(*claim)) {
        bail!("Unknown claim: {}", unknown);
    }
    Ok(claims.into_iter().collect())
}
