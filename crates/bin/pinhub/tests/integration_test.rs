//! End-to-end tests for the full pinhub stack.
//!
//! Library-level tests wire the real JSON store and the virtual board
//! through [`pinhub::answer`]. Process-level tests run the compiled binary
//! to check the stdout/exit-status contract.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use pinhub::backend::BackendKind;
use pinhub::config::Config;
use serde_json::{Value, json};
use tempfile::TempDir;

fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.store.path = dir.path().join("pin_config.json");
    config.backend.kind = BackendKind::Virtual;
    config
}

async fn send(config: &Config, request: Value) -> Value {
    pinhub::answer(config, &request.to_string()).await
}

// ---------------------------------------------------------------------------
// Library level
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_persist_registry_between_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);

    let registered = send(
        &config,
        json!({"command": "register", "name": "kitchen_light", "pin": 17, "description": "Kitchen"}),
    )
    .await;
    assert_eq!(registered["success"], true);

    let activated = send(&config, json!({"command": "activate", "device": "kitchen_light"})).await;
    assert_eq!(activated["success"], true);
    assert_eq!(activated["pin"], 17);
    assert_eq!(activated["value"], true);
    assert_eq!(activated["backend"], "virtual");
    assert_eq!(activated["description"], "Kitchen");

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(&config.store.path).unwrap()).unwrap();
    assert_eq!(raw["devices"]["kitchen_light"]["pin"], 17);
}

#[tokio::test]
async fn should_report_unknown_device() {
    let dir = tempfile::tempdir().unwrap();
    let response = send(&config(&dir), json!({"command": "activate", "device": "nope"})).await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error_kind"], "unknown_device");
}

#[tokio::test]
async fn should_answer_malformed_request_with_failure_object() {
    let dir = tempfile::tempdir().unwrap();
    let response = pinhub::answer(&config(&dir), "{not json").await;
    assert_eq!(response["success"], false);
    assert_eq!(response["error_kind"], "structural");
}

#[tokio::test]
async fn should_run_saved_routine_in_later_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    send(&config, json!({"command": "register", "name": "sensor", "pin": 4, "type": "sensor"})).await;
    let saved = send(
        &config,
        json!({
            "command": "save_routine",
            "name": "report",
            "description": "show the climate",
            "steps": [
                {"command": "dht_read", "device": "sensor", "as": "climate"},
                {"command": "lcd_print", "text": "T {climate.temperature_c}C", "line": 1},
                {"if": "{climate.humidity_pct} > 80", "then": {"command": "activate", "device": 27}},
            ],
        }),
    )
    .await;
    assert_eq!(saved["success"], true);

    let ran = send(&config, json!({"command": "run_routine", "name": "report"})).await;
    assert_eq!(ran["success"], true, "{ran}");
    assert_eq!(ran["routine"], "report");
    assert_eq!(ran["results"][1]["text"], "T 21.5C");
    assert_eq!(ran["results"][2]["condition_met"], false);
}

#[tokio::test]
async fn should_list_unknown_routine_alternatives() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    send(
        &config,
        json!({"command": "save_routine", "name": "wake", "steps": [{"command": "read_all"}]}),
    )
    .await;
    let response = send(&config, json!({"command": "run_routine", "name": "sleep"})).await;
    assert_eq!(response["error_kind"], "unknown_routine");
    assert_eq!(response["available_routines"], json!(["wake"]));
}

#[tokio::test]
async fn should_list_backends_with_virtual_active() {
    let dir = tempfile::tempdir().unwrap();
    let response = send(&config(&dir), json!({"command": "list_backends"})).await;
    assert_eq!(response["success"], true);
    assert_eq!(response["active_backend"], "virtual");
    assert_eq!(response["persistent"], false);
    let names: Vec<&str> = response["backends"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["name"].as_str())
        .collect();
    assert_eq!(names, ["pinctrl", "rppal", "virtual"]);
}

#[tokio::test]
async fn should_echo_serial_through_virtual_loopback() {
    let dir = tempfile::tempdir().unwrap();
    let response = send(
        &config(&dir),
        json!({"command": "sequence", "steps": [
            {"command": "serial_write", "data": "ping\n"},
            {"command": "serial_readline", "as": "reply"},
        ]}),
    )
    .await;
    assert_eq!(response["success"], true, "{response}");
    assert_eq!(response["results"][1]["data"], "ping");
}

// ---------------------------------------------------------------------------
// Process level
// ---------------------------------------------------------------------------

fn pinhub(dir: &Path, args: &[&str], stdin: Option<&str>) -> (Value, Output) {
    let store: PathBuf = dir.join("pin_config.json");
    let mut child = Command::new(env!("CARGO_BIN_EXE_pinhub"))
        .current_dir(dir)
        .env_remove("PINHUB_STORE")
        .env_remove("PINHUB_BACKEND")
        .env_remove("RUST_LOG")
        .env("PINHUB_LOG", "off")
        .arg("--backend")
        .arg("virtual")
        .arg("--store")
        .arg(&store)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let mut input = child.stdin.take().unwrap();
        if let Some(text) = stdin {
            input.write_all(text.as_bytes()).unwrap();
        }
    }
    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    assert_eq!(stdout.lines().count(), 1, "stdout: {stdout}");
    (serde_json::from_str(&stdout).unwrap(), output)
}

#[test]
fn should_exit_zero_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let (response, output) = pinhub(
        dir.path(),
        &["--json", r#"{"command":"register","name":"lamp","pin":17}"#],
        None,
    );
    assert!(output.status.success());
    assert_eq!(response["success"], true);
    assert!(dir.path().join("pin_config.json").exists());
}

#[test]
fn should_exit_non_zero_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (response, output) = pinhub(
        dir.path(),
        &["--json", r#"{"command":"deactivate","device":"ghost"}"#],
        None,
    );
    assert!(!output.status.success());
    assert_eq!(response["error_kind"], "unknown_device");
}

#[test]
fn should_read_request_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let (response, output) = pinhub(dir.path(), &[], Some(r#"{"command":"read_all"}"#));
    assert!(output.status.success());
    assert_eq!(response["success"], true);
}

#[test]
fn should_report_empty_stdin_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (response, output) = pinhub(dir.path(), &[], None);
    assert!(!output.status.success());
    assert_eq!(response["error_kind"], "structural");
}

#[test]
fn should_report_unknown_command() {
    let dir = tempfile::tempdir().unwrap();
    let (response, output) = pinhub(dir.path(), &["--json", r#"{"command":"explode"}"#], None);
    assert!(!output.status.success());
    assert_eq!(response["success"], false);
    assert!(response["error"].as_str().unwrap().contains("explode"));
}

#[test]
fn should_answer_broken_config_file_with_json() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("pinhub.toml"), "[backend\nkind = ").unwrap();
    let (response, output) = pinhub(dir.path(), &["--json", r#"{"command":"list_devices"}"#], None);
    assert!(!output.status.success());
    assert_eq!(response["success"], false);
    assert!(response["error"].as_str().unwrap().contains("configuration"));
}
