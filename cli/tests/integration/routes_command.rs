//! `burrow routes` end to end.

use predicates::prelude::*;
use tempfile::TempDir;

use crate::burrow;

#[test]
fn test_routes_empty_by_default() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["routes", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("token-only mode"));
}

#[test]
fn test_routes_add_update_and_remove() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["routes", "add", "app.example.com", "http://localhost:3000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added app.example.com"));
    burrow(&dir)
        .args(["routes", "add", "app.example.com", "http://localhost:4000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated app.example.com"));

    let output = burrow(&dir)
        .args(["routes", "list", "--json"])
        .output()
        .expect("run");
    let routes: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(
        routes,
        serde_json::json!([{"hostname": "app.example.com", "service": "http://localhost:4000"}])
    );

    burrow(&dir)
        .args(["routes", "remove", "app.example.com"])
        .assert()
        .success();
    burrow(&dir)
        .args(["routes", "remove", "app.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no route for app.example.com"));
}

#[test]
fn test_routes_render_ends_with_catch_all() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["routes", "add", "a.example.com", "http://localhost:3000"])
        .assert()
        .success();

    burrow(&dir)
        .args(["routes", "render"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- hostname: a.example.com"))
        .stdout(predicate::str::contains("service: http_status:404"));
}

#[test]
fn test_routes_add_rejects_url_as_hostname() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["routes", "add", "https://a.example.com", "http://localhost:3000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid route"));
}

#[test]
fn test_routes_list_renders_hostname_to_service() {
    let dir = TempDir::new().expect("tempdir");
    burrow(&dir)
        .args(["routes", "add", "api.example.com", "http://localhost:8000"])
        .assert()
        .success();
    burrow(&dir)
        .args(["routes", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "api.example.com → http://localhost:8000",
        ));
}
