use assert_cmd::Command;
use authz::permissions::{ADMINISTRATOR_ROLE_ID, ADMINISTRATOR_USER_ID};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Helper that runs authzctl against a database inside `dir`
fn authzctl(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("authzctl").unwrap();
    cmd.current_dir(dir)
        .env_remove("AUTHZ_CONFIG")
        .env_remove("AUTHZ_LOG_DIR")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .env("AUTHZ_DATABASE", database_path(dir));
    cmd
}

fn database_path(dir: &Path) -> PathBuf {
    dir.join("data").join("authz.db")
}

/// Runs a command that prints JSON and parses its stdout
fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{:?}", output);
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Creates a role and returns its id
fn create_role(dir: &Path, name: &str, claims: &[&str]) -> String {
    let mut args = vec!["role", "create", name];
    for claim in claims {
        args.extend(["--claim", *claim]);
    }
    authzctl(dir).args(&args).assert().success();

    let roles = json_output(authzctl(dir).args(["role", "list", "--format", "json"]));
    roles
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == name)
        .map(|r| r["id"].as_str().unwrap().to_string())
        .unwrap()
}

/// Creates a user and returns its id
fn create_user(dir: &Path, user_name: &str, roles: &[&str]) -> String {
    let mut args = vec!["user", "create", user_name];
    for role in roles {
        args.extend(["--role", *role]);
    }
    authzctl(dir).args(&args).assert().success();

    let users = json_output(authzctl(dir).args(["user", "list", "--format", "json"]));
    users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["user_name"] == user_name)
        .map(|u| u["id"].as_str().unwrap().to_string())
        .unwrap()
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("authzctl").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("authzctl"))
        .stdout(predicate::str::contains("Command line interface"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("authzctl").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("authzctl"));
}

#[test]
fn test_claims_text() {
    let temp_dir = TempDir::new().unwrap();

    authzctl(temp_dir.path())
        .arg("claims")
        .assert()
        .success()
        .stdout(predicate::str::contains("Role.Create"))
        .stdout(predicate::str::contains("User.Delete (restricted)"))
        .stdout(predicate::str::contains(ADMINISTRATOR_ROLE_ID));

    // Listing claims never touches the database
    assert!(!database_path(temp_dir.path()).exists());
}

#[test]
fn test_claims_json_with_extra_declarations() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("reports.yaml"),
        "defined_claims: [Reports.Run]\n",
    )
    .unwrap();

    let claims = json_output(authzctl(temp_dir.path()).args([
        "--claims-file",
        "reports.yaml",
        "claims",
        "--format",
        "json",
    ]));
    let defined = claims["defined_claims"].as_array().unwrap();
    assert!(defined.iter().any(|c| c == "Reports.Run"));
    assert_eq!(claims["delete_claims"]["role"], "Role.Delete");
}

#[test]
fn test_invalid_claim_declarations_fail() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("bad.yaml"),
        "restricted_claims: [Nope.Never]\n",
    )
    .unwrap();

    authzctl(temp_dir.path())
        .args(["--claims-file", "bad.yaml", "claims"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nope.Never"));
}

#[test]
fn test_init_seeds_builtins() {
    let temp_dir = TempDir::new().unwrap();

    authzctl(temp_dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database initialized"))
        .stdout(predicate::str::contains("cache ttl 180s"))
        .stdout(predicate::str::contains("Administrator"));

    assert!(database_path(temp_dir.path()).exists());

    let users = json_output(authzctl(temp_dir.path()).args(["user", "list", "--format", "json"]));
    assert_eq!(users[0]["id"], ADMINISTRATOR_USER_ID);
}

#[test]
fn test_check_admin_succeeds() {
    let temp_dir = TempDir::new().unwrap();

    authzctl(temp_dir.path())
        .args(["check", "--user", ADMINISTRATOR_USER_ID, "--claim", "Role.Create"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Authorized"));
}

#[test]
fn test_check_missing_claim_exits_with_denied_code() {
    let temp_dir = TempDir::new().unwrap();
    create_role(temp_dir.path(), "Viewer", &["Role.Read"]);
    let viewer = create_user(temp_dir.path(), "vic", &["Viewer"]);

    authzctl(temp_dir.path())
        .args(["check", "--user", &viewer, "--claim", "Role.Read"])
        .assert()
        .success();

    authzctl(temp_dir.path())
        .args([
            "check", "--user", &viewer, "--claim", "Role.Read", "--claim", "Role.Create",
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Missing required claims: Role.Create"));
}

#[test]
fn test_check_anonymous_request_json() {
    let temp_dir = TempDir::new().unwrap();

    let output = authzctl(temp_dir.path())
        .args(["check", "--claim", "User.Read", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["principal"], serde_json::Value::Null);
    assert_eq!(result["result"]["outcome"], "failed");
    assert_eq!(result["result"]["reason"], "NoPrincipalId");
}

#[test]
fn test_check_system_object_is_protected() {
    let temp_dir = TempDir::new().unwrap();

    authzctl(temp_dir.path())
        .args([
            "check",
            "--user",
            ADMINISTRATOR_USER_ID,
            "--claim",
            "Role.Delete",
            "--role",
            ADMINISTRATOR_ROLE_ID,
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Role.Delete"))
        .stdout(predicate::str::contains("system object"));
}

#[test]
fn test_check_role_elevation() {
    let temp_dir = TempDir::new().unwrap();
    create_role(
        temp_dir.path(),
        "RoleManager",
        &["Role.Read", "Role.UpdateClaims"],
    );
    let target = create_role(temp_dir.path(), "Auditor", &["User.Read"]);
    let rita = create_user(temp_dir.path(), "rita", &["RoleManager"]);

    authzctl(temp_dir.path())
        .args([
            "check",
            "--user",
            &rita,
            "--claim",
            "Role.UpdateClaims",
            "--role",
            &target,
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("elevate privileges beyond: User.Read"));

    authzctl(temp_dir.path())
        .args(["role", "grant", &target, "--claim", "Role.Read"])
        .assert()
        .success();
    authzctl(temp_dir.path())
        .args(["user", "assign", &rita, "--role", "Auditor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RoleManager, Auditor"));

    authzctl(temp_dir.path())
        .args([
            "check",
            "--user",
            &rita,
            "--claim",
            "Role.UpdateClaims",
            "--role",
            &target,
        ])
        .assert()
        .success();
}

#[test]
fn test_check_target_user_administrator_elevation() {
    let temp_dir = TempDir::new().unwrap();
    create_role(temp_dir.path(), "UserManager", &["User.Read", "User.UpdateClaims"]);
    let ulla = create_user(temp_dir.path(), "ulla", &["UserManager"]);
    let boss = create_user(temp_dir.path(), "boss", &["Administrator"]);

    authzctl(temp_dir.path())
        .args([
            "check",
            "--user",
            &ulla,
            "--claim",
            "User.UpdateClaims",
            "--target-user",
            &boss,
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("beyond: Administrator"));
}

#[test]
fn test_role_and_target_user_conflict() {
    let temp_dir = TempDir::new().unwrap();

    authzctl(temp_dir.path())
        .args([
            "check",
            "--claim",
            "Role.Read",
            "--role",
            "a",
            "--target-user",
            "b",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_unknown_claim_is_rejected() {
    let temp_dir = TempDir::new().unwrap();

    authzctl(temp_dir.path())
        .args(["role", "create", "Odd", "--claim", "Reports.Run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown claim: Reports.Run"));
}

#[test]
fn test_check_unknown_target_fails() {
    let temp_dir = TempDir::new().unwrap();

    authzctl(temp_dir.path())
        .args([
            "check",
            "--user",
            ADMINISTRATOR_USER_ID,
            "--claim",
            "Role.Read",
            "--role",
            "missing",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Role not found: missing"));
}

#[test]
fn test_config_file_and_log_dir() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(
        root.join("authz.yaml"),
        "authz:\n  cache_ttl_seconds: 0\n",
    )
    .unwrap();

    authzctl(root)
        .args(["--config", "authz.yaml", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cache_ttl_seconds"));

    fs::write(
        root.join("authz.yaml"),
        "authz:\n  cache_ttl_seconds: 60\n",
    )
    .unwrap();

    authzctl(root)
        .args(["--config", "authz.yaml", "--log-dir", "logs", "--verbose", "init"])
        .assert()
        .success();

    let log_files: Vec<_> = fs::read_dir(root.join("logs")).unwrap().collect();
    assert!(!log_files.is_empty());
}
