#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const VALID: &str = r#"
[[interface]]
name = "People"

[[interface.method]]
name = "by_id"
query = "start n=node({id}) return n"
returns = "single"

[[interface.method.param]]
name = "id"
type = "i64"
binding = "id"

[[interface.method]]
name = "everyone"
query = "start n=node(*) return n"
returns = "iterable"
"#;

const BROKEN: &str = r#"
[[interface]]
name = "People"

[[interface.method]]
name = "by_id"
query = "start n=node({id} return n"
line = 4
returns = "single"

[[interface.method.param]]
name = "id"
type = "i64"

[[interface.method]]
name = "pair"
query = "start a=node({id}), b=node({id}) return a"
returns = "single"

[[interface.method.param]]
name = "first"
type = "i64"
binding = "id"

[[interface.method.param]]
name = "second"
type = "i64"
binding = "id"
"#;

const CONCRETE: &str = r#"
[[interface]]
name = "Helper"
kind = "concrete"

[[interface.method]]
name = "zero"
query = "start n=node(0) return n"
returns = "single"
"#;

const UNSUPPORTED: &str = r#"
[[interface]]
name = "P"

[[interface.method]]
name = "count"
query = "start n=node(*) return n"
returns = "u64"

[[interface.method]]
name = "count"
query = "start n=node(*) return n"
returns = "iterator"
"#;

fn write_manifest(contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("queries.toml");
    fs::write(&path, contents).expect("write manifest");
    (dir, path)
}

fn json_output(args: &[&str], manifest: &PathBuf, code: i32) -> Value {
    let output = cargo_bin_cmd!("sombra-repo")
        .args(["--format", "json"])
        .args(args)
        .arg(manifest)
        .assert()
        .code(code)
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn check_accepts_valid_manifest() {
    let (_dir, path) = write_manifest(VALID);
    let json = json_output(&["check"], &path, 0);
    assert_eq!(json["success"], Value::Bool(true));
    assert_eq!(json["methods"], 2);
    assert_eq!(json["errors"], 0);
    assert!(json["diagnostics"].as_array().unwrap().is_empty());
}

#[test]
fn check_reports_every_problem() {
    let (_dir, path) = write_manifest(BROKEN);
    let json = json_output(&["check"], &path, 2);
    assert_eq!(json["success"], Value::Bool(false));
    let codes: Vec<_> = json["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["code"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(
        codes,
        [
            "QuerySyntax",
            "MissingParameterBinding",
            "DuplicateParameterBinding"
        ]
    );
    let first = &json["diagnostics"][0];
    assert_eq!(first["interface"], "People");
    assert_eq!(first["attachment"]["site"]["kind"], "annotation");
    assert_eq!(first["attachment"]["site"]["line"], 4);
    assert_eq!(json["diagnostics"][1]["suggestion"], "#[param(\"id\")]");
}

#[test]
fn check_no_suggest_drops_suggestions() {
    let (_dir, path) = write_manifest(BROKEN);
    let json = json_output(&["check", "--no-suggest"], &path, 2);
    assert!(json["diagnostics"][1].get("suggestion").is_none());
}

#[test]
fn check_deny_warnings_fails_on_warnings() {
    let (_dir, path) = write_manifest(CONCRETE);
    let json = json_output(&["check"], &path, 0);
    assert_eq!(json["warnings"], 1);

    let json = json_output(&["check", "--deny-warnings"], &path, 2);
    assert_eq!(json["success"], Value::Bool(false));
}

#[test]
fn check_text_output_names_methods() {
    let (_dir, path) = write_manifest(BROKEN);
    let output = cargo_bin_cmd!("sombra-repo")
        .arg("check")
        .arg(&path)
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("People: error[MissingParameterBinding]"));
    assert!(text.contains("by_id (parameter 1 'id')"));
    assert!(text.contains("3 errors, 0 warnings"));
}

#[test]
fn plan_prints_dispatch_table() {
    let (_dir, path) = write_manifest(VALID);
    let json = json_output(&["plan"], &path, 0);
    let methods = json["interfaces"][0]["methods"].as_array().unwrap();
    assert_eq!(methods.len(), 2);
    assert_eq!(methods[0]["name"], "by_id");
    assert_eq!(methods[0]["converter"], "single_entity");
    assert_eq!(methods[0]["bindings"][0], "id");
    assert_eq!(methods[1]["converter"], "entity_iterable");
}

#[test]
fn plan_fails_fast_per_interface() {
    let (_dir, path) = write_manifest(BROKEN);
    let json = json_output(&["plan"], &path, 2);
    let interface = &json["interfaces"][0];
    assert_eq!(interface["error"]["code"], "QuerySyntax");
    assert!(interface["methods"].as_array().unwrap().is_empty());
}

#[test]
fn check_and_plan_reject_the_same_manifest() {
    let (_dir, path) = write_manifest(UNSUPPORTED);
    let json = json_output(&["check"], &path, 2);
    let codes: Vec<_> = json["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["code"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(codes, ["UnsupportedReturnShape", "DuplicateMethod"]);

    let json = json_output(&["plan"], &path, 2);
    assert_eq!(
        json["interfaces"][0]["error"]["code"],
        "UnsupportedReturnShape"
    );
}

#[test]
fn missing_manifest_is_an_io_error() {
    let dir = TempDir::new().expect("tempdir");
    cargo_bin_cmd!("sombra-repo")
        .arg("check")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(1);
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    cargo_bin_cmd!("sombra-repo")
        .arg("frobnicate")
        .assert()
        .code(1);
}
