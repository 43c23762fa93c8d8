use anyhow::{Context, Result};
use colored::*;
use user::AccessManager;

/// Create a user directly in the store
pub async fn create(manager: &AccessManager, user_name: &str, role_names: Vec<String>) -> Result<()> {
    let user = manager.database().create_user(user_name, &role_names).await?;
    println!(
        "{} Created user {} ({})",
        "✓".green().bold(),
        user.user_name.bold(),
        user.id
    );
    Ok(())
}

/// Add role names to an existing user
pub async fn assign(manager: &AccessManager, user_id: &str, role_names: Vec<String>) -> Result<()> {
    let mut user = manager
        .database()
        .find_user(user_id)
        .await?
        .with_context(|| format!("User not found: {}", user_id))?;

    for role_name in role_names {
        if !user.role_names.contains(&role_name) {
            user.role_names.push(role_name);
        }
    }
    manager
        .database()
        .set_user_roles(&user.id, &user.role_names)
        .await?;
    manager.engine().refresh_user(&user.id);

    println!(
        "{} User {} now has roles: {}",
        "✓".green().bold(),
        user.user_name.bold(),
        user.role_names.join(", ")
    );
    Ok(())
}

pub async fn list(manager: &AccessManager, format: &str) -> Result<()> {
    let users = manager.database().list_users().await?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&users)?),
        "yaml" => print!("{}", serde_yaml::to_string(&users)?),
        _ => {
            println!("{}", "Users".bold().underline());
            for user in &users {
                println!(
                    "  {} {} [{}]",
                    user.user_name.bold(),
                    user.id.dimmed(),
                    user.role_names.join(", ")
                );
            }
        }
    }
    Ok(())
}
