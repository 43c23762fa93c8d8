use anyhow::{Context, Result};
use authz::{AuthorizationOutcome, ClaimRequirement, Principal, Resource, Role, User};
use colored::*;
use serde_json::json;
use user::AccessManager;

/// What a check is run against
pub enum Target {
    None,
    Role(String),
    User(String),
}

/// Run one authorization check and print its outcome. Returns whether it succeeded.
pub async fn execute(
    manager: &AccessManager,
    user_id: Option<String>,
    claims: Vec<String>,
    target: Target,
    format: &str,
) -> Result<bool> {
    let principal = match user_id {
        Some(id) => Principal::user(id),
        None => Principal::anonymous(),
    };
    let requirement = ClaimRequirement::new(claims);

    let role: Option<Role> = match &target {
        Target::Role(id) => Some(
            manager
                .database()
                .find_role(id)
                .await?
                .with_context(|| format!("Role not found: {}", id))?,
        ),
        _ => None,
    };
    let user: Option<User> = match &target {
        Target::User(id) => Some(
            manager
                .database()
                .find_user(id)
                .await?
                .with_context(|| format!("User not found: {}", id))?,
        ),
        _ => None,
    };
    let resource = match (&role, &user) {
        (Some(role), _) => Some(Resource::Role(role)),
        (_, Some(user)) => Some(Resource::User(user)),
        _ => None,
    };

    let outcome = manager
        .engine()
        .authorize_resource(&principal, resource, &requirement)
        .await?;

    match format {
        "json" => {
            let output = json!({
                "principal": principal.id(),
                "requirement": requirement.claims(),
                "target": resource.map(|r| json!({ "kind": r.kind(), "id": r.id(), "name": r.name() })),
                "result": outcome,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => print_outcome_text(&outcome),
    }

    Ok(outcome.succeeded())
}

fn print_outcome_text(outcome: &AuthorizationOutcome) {
    match outcome.failure() {
        None => println!("{} {}", "✓".green().bold(), outcome.to_string().green()),
        Some(failure) => {
            println!("{} {}", "✗".red().bold(), "Denied".red().bold());
            println!("  Reason: {}", failure.reason);
            println!("  {}", failure);
        }
    }
}
