//! `burrow config` end to end.

use predicates::prelude::*;
use tempfile::TempDir;

use crate::burrow;

#[test]
fn test_config_show_defaults_as_json() {
    let dir = TempDir::new().expect("tempdir");
    let output = burrow(&dir)
        .args(["config", "show", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["backend_url"], "https://api.example.com");
    assert_eq!(value["tunnel_name"], "my-tunnel");
    assert_eq!(value["web_server_port"], 8080);
    assert_eq!(value["refresh_interval_secs"], 300);
    assert_eq!(value["retention"], "cached");
    assert_eq!(value["routes"], serde_json::json!([]));
}

#[test]
fn test_config_set_persists_value() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["config", "set", "backend_url", "https://tunnels.example.org/"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Set backend_url = https://tunnels.example.org",
        ));

    let saved = std::fs::read_to_string(dir.path().join("config.yaml")).expect("saved");
    assert!(saved.contains("backend_url: https://tunnels.example.org\n"), "{saved}");

    burrow(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://tunnels.example.org"));
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["config", "set", "color", "blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown setting: color"));
    assert!(!dir.path().join("config.yaml").exists());
}

#[test]
fn test_config_set_rejects_invalid_values() {
    let dir = TempDir::new().expect("tempdir");
    for (key, value) in [
        ("web_server_port", "0"),
        ("web_server_port", "http"),
        ("refresh_interval_secs", "1"),
        ("backend_url", "ftp://example.com"),
        ("retention", "forever"),
    ] {
        burrow(&dir)
            .args(["config", "set", key, value])
            .assert()
            .failure()
            .stderr(predicate::str::contains(format!("Invalid value for {key}")));
    }
}

#[test]
fn test_config_path_honours_env_override() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.yaml"));
}
