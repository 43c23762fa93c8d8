use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod logging;
mod settings;

use commands::{check, claims, init, roles, users};
use settings::Settings;

/// Exit code of a `check` that was denied
const DENIED_EXIT_CODE: u8 = 2;

/// authzctl - Command line interface for the claims-based authorization store
#[derive(Parser)]
#[command(name = "authzctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML settings file with `authz` and `database` sections
    #[arg(short, long, global = true, env = "AUTHZ_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the settings file
    #[arg(short, long, global = true, env = "AUTHZ_DATABASE")]
    database: Option<PathBuf>,

    /// Additional YAML claim declarations to register
    #[arg(long = "claims-file", global = true)]
    claims_files: Vec<PathBuf>,

    /// Directory for daily rolling log files
    #[arg(long, global = true, env = "AUTHZ_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List defined and restricted claims and system objects
    Claims {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Create the database and seed the built-in Administrator role and user
    Init,

    /// Role management commands (bypass authorization)
    Role {
        #[command(subcommand)]
        action: RoleAction,
    },

    /// User management commands (bypass authorization)
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Check whether a user holds claims, optionally against a role or user
    Check {
        /// Acting user id; omit to check an anonymous request
        #[arg(short, long)]
        user: Option<String>,

        /// Required claim (repeatable)
        #[arg(long = "claim")]
        claims: Vec<String>,

        /// Target role id
        #[arg(long, conflicts_with = "target_user")]
        role: Option<String>,

        /// Target user id
        #[arg(long)]
        target_user: Option<String>,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum RoleAction {
    /// Create a role
    Create {
        name: String,

        /// Claim to assign (repeatable)
        #[arg(long = "claim")]
        claims: Vec<String>,
    },

    /// Add claims to a role
    Grant {
        role_id: String,

        /// Claim to add (repeatable)
        #[arg(long = "claim", required = true)]
        claims: Vec<String>,
    },

    /// List roles and their claims
    List {
        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user
    Create {
        user_name: String,

        /// Role name to assign (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,
    },

    /// Add role names to a user
    Assign {
        user_id: String,

        /// Role name to add (repeatable)
        #[arg(long = "role", required = true)]
        roles: Vec<String>,
    },

    /// List users and their roles
    List {
        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let _guard = match logging::init_logging(cli.verbose, cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let registry = settings::build_registry(&cli.claims_files)?;

    if let Commands::Claims { format } = &cli.command {
        claims::execute(&registry, format)?;
        return Ok(ExitCode::SUCCESS);
    }

    let settings = Settings::load(cli.config.as_deref(), cli.database)?;
    let manager = settings::open_manager(&settings, registry).await?;

    match cli.command {
        Commands::Claims { .. } => {}
        Commands::Init => init::execute(&manager).await?,
        Commands::Role { action } => match action {
            RoleAction::Create { name, claims } => roles::create(&manager, &name, claims).await?,
            RoleAction::Grant { role_id, claims } => {
                roles::grant(&manager, &role_id, claims).await?
            }
            RoleAction::List { format } => roles::list(&manager, &format).await?,
        },
        Commands::User { action } => match action {
            UserAction::Create { user_name, roles } => {
                users::create(&manager, &user_name, roles).await?
            }
            UserAction::Assign { user_id, roles } => {
                users::assign(&manager, &user_id, roles).await?
            }
            UserAction::List { format } => users::list(&manager, &format).await?,
        },
        Commands::Check {
            user,
            claims,
            role,
            target_user,
            format,
        } => {
            let target = match (role, target_user) {
                (Some(id), _) => check::Target::Role(id),
                (_, Some(id)) => check::Target::User(id),
                _ => check::Target::None,
            };
            if !check::execute(&manager, user, claims, target, &format).await? {
                return Ok(ExitCode::from(DENIED_EXIT_CODE));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
