use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{json, Value};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

fn verify(manifest: &Path, schema: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_erasure-verify"))
        .arg("--manifest")
        .arg(manifest)
        .arg("--schema")
        .arg(schema)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

#[test]
fn test_complete_coverage_exits_zero() {
    let output = verify(&fixture("manifest.json"), &fixture("schema.json"));
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(0), "{}", stdout);
    assert!(stdout.contains("Result: PASSED"));
}

#[test]
fn test_unregistered_table_exits_one() {
    let mut schema: Value =
        serde_json::from_str(&std::fs::read_to_string(fixture("schema.json")).unwrap()).unwrap();
    schema["tables"].as_array_mut().unwrap().push(json!({
        "name": "invites",
        "fields": [{"name": "invitedBy", "isIdentityReference": true}],
        "indexes": []
    }));
    let dir = tempfile::tempdir().unwrap();
    let schema_path = dir.path().join("schema.json");
    std::fs::write(&schema_path, serde_json::to_string(&schema).unwrap()).unwrap();

    let output = verify(&fixture("manifest.json"), &schema_path);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1), "{}", stdout);
    assert!(stdout.contains("Unregistered tables (1)"));
    assert!(stdout.contains("invites"));
    assert!(stdout.contains("Result: FAILED"));
}

#[test]
fn test_unreadable_input_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let output = verify(&fixture("manifest.json"), &dir.path().join("missing.json"));

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unknown_flag_exits_two() {
    let output = Command::new(env!("CARGO_BIN_EXE_erasure-verify"))
        .arg("--verbose")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage: erasure-verify"));
}
