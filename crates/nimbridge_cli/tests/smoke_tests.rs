//! CLI smoke tests: verify basic binary behavior.

use std::process::Command;

fn cli_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nimbridge"))
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("--rules"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("nimbridge"),
        "Expected binary name in --version output"
    );
}

#[test]
fn test_missing_rule_catalog_fails_cleanly() {
    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_nimbridge_config_12345.toml")
        .arg("--rules")
        .arg("/tmp/nonexistent_nimbridge_rules_12345.json")
        .arg("--port")
        .arg("0")
        .env_remove("RULESETS_PATH")
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load rule sets"), "stderr: {}", stderr);
}

#[test]
fn test_occupied_port_exits_nonzero() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test port");
    let port = taken.local_addr().expect("local addr").port();

    let output = cli_bin()
        .arg("--config")
        .arg("/tmp/nonexistent_nimbridge_config_12345.toml")
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .env_remove("RULESETS_PATH")
        .env_remove("HOST")
        .env_remove("PORT")
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Gateway failed to bind"), "stderr: {}", stderr);
    drop(taken);
}
