use anyhow::Result;
use authz::{Registry, ResourceKind};
use colored::*;
use serde_json::json;

/// Print the claim registry
pub fn execute(registry: &Registry, format: &str) -> Result<()> {
    match format {
        "json" => {
            let delete_claims: serde_json::Map<String, serde_json::Value> =
                [ResourceKind::Role, ResourceKind::User]
                    .into_iter()
                    .filter_map(|kind| {
                        registry
                            .delete_claim(kind)
                            .map(|claim| (kind.to_string(), json!(claim)))
                    })
                    .collect();
            let output = json!({
                "defined_claims": registry.defined_claims(),
                "restricted_claims": registry.restricted_claims(),
                "system_object_ids": registry.system_object_ids(),
                "delete_claims": delete_claims,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => print_registry_text(registry),
    }

    Ok(())
}

fn print_registry_text(registry: &Registry) {
    println!("{}", "Defined Claims".bold().underline());
    for claim in registry.defined_claims() {
        if registry.restricted_claims().contains(claim) {
            println!("  {} {}", claim, "(restricted)".yellow());
        } else {
            println!("  {}", claim);
        }
    }

    println!();
    println!("{}", "System Objects".bold().underline());
    for id in registry.system_object_ids() {
        println!("  {}", id.cyan());
    }

    println!();
    println!(
        "Total claims: {} ({} restricted)",
        registry.defined_claims().len(),
        registry.restricted_claims().len()
    );
}
