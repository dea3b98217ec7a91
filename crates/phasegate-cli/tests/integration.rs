#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn phasegate(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("phasegate").unwrap();
    cmd.current_dir(dir.path()).env("PHASEGATE_ROOT", dir.path());
    cmd
}

fn init_project(dir: &TempDir) {
    phasegate(dir).arg("init").assert().success();
}

fn start_api(dir: &TempDir, name: &str) {
    phasegate(dir).args(["start", name]).assert().success();
}

fn json_of(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.output().unwrap();
    assert!(out.status.success(), "command failed: {out:?}");
    serde_json::from_slice(&out.stdout).unwrap()
}

fn confirm_phase(dir: &TempDir, phase: &str) {
    phasegate(dir)
        .args(["checkpoint", "propose", phase])
        .assert()
        .success();
    phasegate(dir)
        .args(["checkpoint", "ask", phase])
        .assert()
        .success();
    phasegate(dir)
        .args([
            "checkpoint",
            "respond",
            phase,
            "--question",
            "Ready to proceed?",
            "--reply",
            "yes",
            "--response",
            "approve",
        ])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// phasegate init / start
// ---------------------------------------------------------------------------

#[test]
fn init_creates_state_and_config() {
    let dir = TempDir::new().unwrap();
    phasegate(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .phasegate/config.yaml"));

    assert!(dir.path().join(".phasegate/state.yaml").exists());
    assert!(dir.path().join(".phasegate/config.yaml").exists());
    assert!(dir.path().join(".phasegate/sessions").is_dir());
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    phasegate(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:"));
}

#[test]
fn start_requires_init() {
    let dir = TempDir::new().unwrap();
    phasegate(&dir)
        .args(["start", "brandfetch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn start_rejects_unknown_kind_and_duplicates() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    phasegate(&dir)
        .args(["start", "x", "--kind", "mobile"])
        .assert()
        .failure();
    start_api(&dir, "brandfetch");
    phasegate(&dir)
        .args(["start", "brandfetch"])
        .assert()
        .failure();
}

#[test]
fn status_shows_active_workflow() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    phasegate(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow: brandfetch (api)"))
        .stdout(predicate::str::contains("disambiguation"));

    let v = json_of(phasegate(&dir).args(["status", "--json"]));
    assert_eq!(v["workflow"]["name"], "brandfetch");
    assert_eq!(v["workflow"]["phases"]["disambiguation"]["status"], "not_started");
    assert_eq!(v["completion"]["decision"], "deny");
}

// ---------------------------------------------------------------------------
// phasegate gate
// ---------------------------------------------------------------------------

#[test]
fn gate_denies_route_write_before_phases_complete() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    phasegate(&dir)
        .args(["gate", "--path", "src/app/api/v2/brandfetch/route.ts"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("deny"))
        .stdout(predicate::str::contains("disambiguation.status=not_started"));
}

#[test]
fn gate_allows_unguarded_paths() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    phasegate(&dir)
        .args(["gate", "--path", "README.md"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("allow"));
    phasegate(&dir)
        .args(["gate", "--path", "src/app/api/v2/brandfetch/route.ts", "--action", "read"])
        .assert()
        .success();
}

#[test]
fn gate_json_reports_conditions() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    let out = phasegate(&dir)
        .args(["gate", "--json", "--path", "src/app/api/v2/brandfetch/route.ts"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["permissionDecision"], "deny");
    assert_eq!(v["phase"], "disambiguation");
    assert!(v["conditions"].as_array().unwrap().len() >= 1);
}

// ---------------------------------------------------------------------------
// phasegate checkpoint
// ---------------------------------------------------------------------------

#[test]
fn confirmed_checkpoint_completes_phase() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");
    confirm_phase(&dir, "disambiguation");

    let v = json_of(phasegate(&dir).args(["checkpoint", "show", "disambiguation", "--json"]));
    assert_eq!(v["state"]["status"], "complete");
    assert_eq!(v["state"]["checkpoint"]["exit_confirmed"], true);

    // scope is now the first incomplete phase
    phasegate(&dir)
        .args(["checkpoint", "show"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("scope:"));
}

#[test]
fn complete_without_confirmation_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    phasegate(&dir)
        .args(["checkpoint", "complete", "disambiguation"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot complete disambiguation"));
}

#[test]
fn exit_confirmation_cannot_be_forced() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    phasegate(&dir)
        .args(["checkpoint", "set", "disambiguation", "exit_confirmed", "true"])
        .assert()
        .failure();
    phasegate(&dir)
        .args(["checkpoint", "set", "disambiguation", "proposal_shown", "true"])
        .assert()
        .success();
}

#[test]
fn complete_respects_prerequisites() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    // Approved, but disambiguation is still open
    let v = json_of(phasegate(&dir).args([
        "checkpoint",
        "respond",
        "scope",
        "--question",
        "Is this scope right?",
        "--response",
        "approve",
        "--json",
    ]));
    assert_eq!(v["outcome"], "exit_confirmed");
    assert_eq!(v["completed"], false);

    phasegate(&dir)
        .args(["checkpoint", "complete", "scope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("disambiguation"));
}

#[test]
fn change_request_loops_back() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    let v = json_of(phasegate(&dir).args([
        "checkpoint",
        "respond",
        "disambiguation",
        "--question",
        "Does this proposal look right?",
        "--reply",
        "change the provider",
        "--response",
        "request_changes",
        "--json",
    ]));
    assert_eq!(v["outcome"], "loopback");

    let v = json_of(phasegate(&dir).args(["checkpoint", "show", "disambiguation", "--json"]));
    assert_eq!(v["state"]["checkpoint"]["loopbacks"], 1);
    assert_eq!(v["state"]["status"], "in_progress");
}

// ---------------------------------------------------------------------------
// phasegate scope / research / file
// ---------------------------------------------------------------------------

#[test]
fn scope_decisions_drive_coverage() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    phasegate(&dir)
        .args(["scope", "decide", "caching", "implement"])
        .assert()
        .success();
    phasegate(&dir)
        .args(["scope", "decide", "webhooks", "unknown"])
        .assert()
        .success();

    let v = json_of(phasegate(&dir).args(["scope", "show", "--json"]));
    assert_eq!(v["coverage_percent"], 50);
    assert_eq!(v["undecided"], serde_json::json!(["webhooks"]));

    phasegate(&dir)
        .args(["scope", "decide", "webhooks", "defer"])
        .assert()
        .success();
    let v = json_of(phasegate(&dir).args(["scope", "show", "--json"]));
    assert_eq!(v["coverage_percent"], 100);
}

#[test]
fn research_goes_to_initial_phase() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    let v = json_of(phasegate(&dir).args([
        "research",
        "add",
        "web_search",
        "brandfetch api docs",
        "--json",
    ]));
    assert_eq!(v["phase"], "research_initial");

    phasegate(&dir)
        .args(["research", "add", "docs", "x", "--at", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid timestamp"));
}

#[test]
fn file_track_records_created_then_modified() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    for _ in 0..2 {
        phasegate(&dir)
            .args(["file", "track", "src/lib/brandfetch.ts"])
            .assert()
            .success();
    }
    let v = json_of(phasegate(&dir).args(["status", "--json"]));
    assert_eq!(v["workflow"]["files_created"], serde_json::json!(["src/lib/brandfetch.ts"]));
    assert_eq!(v["workflow"]["files_modified"], serde_json::json!(["src/lib/brandfetch.ts"]));
}

// ---------------------------------------------------------------------------
// phasegate generate
// ---------------------------------------------------------------------------

const LOGO_SCHEMA: &str = r#"{
  "properties": {
    "domain": { "type": "string", "description": "Brand domain" },
    "format": { "type": "string", "enum": ["svg", "png"] },
    "size": { "type": "integer", "minimum": 16, "maximum": 512 }
  },
  "required": ["domain"]
}"#;

#[test]
fn generate_emits_examples_and_cases() {
    let dir = TempDir::new().unwrap();
    let schema = dir.path().join("logo.json");
    std::fs::write(&schema, LOGO_SCHEMA).unwrap();

    let v = json_of(phasegate(&dir).args(["generate", "--schema", "logo.json", "--json"]));
    assert_eq!(v["endpoint"], "logo");
    assert_eq!(v["method"], "POST");
    let names: Vec<&str> = v["examples"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"minimal"));
    assert!(names.contains(&"full"));
    assert!(names.contains(&"format=svg"));
    assert!(names.contains(&"format=png"));

    let cases = v["test_cases"].as_array().unwrap();
    assert!(cases
        .iter()
        .any(|c| c["kind"] == "missing_required" && c["target"] == "domain"));
    assert!(cases.iter().any(|c| c["kind"] == "invalid_enum" && c["expected_status"] == 400));
}

#[test]
fn generate_renders_curl_for_humans() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("logo.json"), LOGO_SCHEMA).unwrap();

    phasegate(&dir)
        .args(["generate", "--schema", "logo.json", "--method", "get"])
        .assert()
        .success()
        .stdout(predicate::str::contains("curl -X GET"))
        .stdout(predicate::str::contains("domain="))
        .stdout(predicate::str::contains("Test cases:"));
}

#[test]
fn generate_rejects_inconsistent_schema() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("bad.json"),
        r#"{"properties": {"size": {"type": "integer", "minimum": 10, "maximum": 1}}}"#,
    )
    .unwrap();

    phasegate(&dir)
        .args(["generate", "--schema", "bad.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("schema rejected"));
}

// ---------------------------------------------------------------------------
// phasegate hook
// ---------------------------------------------------------------------------

#[test]
fn pre_action_hook_denies_with_exit_zero() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    phasegate(&dir)
        .args(["hook", "pre-action"])
        .write_stdin(
            r#"{"tool_name": "Write", "tool_input": {"file_path": "src/app/api/v2/brandfetch/route.ts"}}"#,
        )
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""permissionDecision":"deny""#));
}

#[test]
fn hooks_fail_open() {
    let dir = TempDir::new().unwrap();

    // Uninitialized project
    phasegate(&dir)
        .args(["hook", "pre-action"])
        .write_stdin(r#"{"tool_name": "Write", "tool_input": {"file_path": "src/app/api/x/route.ts"}}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""permissionDecision":"allow""#));

    // Malformed payload
    init_project(&dir);
    start_api(&dir, "brandfetch");
    phasegate(&dir)
        .args(["hook", "pre-action"])
        .write_stdin("{not json")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""permissionDecision":"allow""#));
    phasegate(&dir)
        .args(["hook", "post-action"])
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""continue":true"#));
}

#[test]
fn post_action_hook_records_research_and_ticks() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    let out = phasegate(&dir)
        .args(["hook", "post-action"])
        .write_stdin(r#"{"tool_name": "WebSearch", "tool_input": {"query": "brandfetch logo api"}}"#)
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["research_phase"], "research_initial");
    assert_eq!(v["turn_count"], 1);

    let state = std::fs::read_to_string(dir.path().join(".phasegate/state.yaml")).unwrap();
    assert!(state.contains("brandfetch logo api"));
}

#[test]
fn post_action_hook_records_answer() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    let payload = serde_json::json!({
        "tool_name": "AskUserQuestion",
        "tool_input": {
            "question": "Which provider should we use?",
            "options": ["openai", "anthropic"],
            "phase": "interview",
            "decision_key": "provider"
        },
        "tool_response": { "answers": { "Which provider should we use?": "anthropic" } }
    });
    let out = phasegate(&dir)
        .args(["hook", "post-action"])
        .write_stdin(payload.to_string())
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["answer"]["decision_key"], "provider");
    assert_eq!(v["answer"]["phase"], "interview");

    let status = json_of(phasegate(&dir).args(["status", "--json"]));
    assert_eq!(
        status["workflow"]["decisions"]["provider"]["selected_option"],
        "anthropic"
    );
}

// ---------------------------------------------------------------------------
// phasegate session / config
// ---------------------------------------------------------------------------

#[test]
fn session_end_archives_and_marks_interrupted() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");

    let v = json_of(phasegate(&dir).args(["session", "end", "--archive", "--json"]));
    assert_eq!(v["workflow"], "brandfetch");
    assert_eq!(v["interrupted"], true);
    let archived = std::path::PathBuf::from(v["archived_to"].as_str().unwrap());
    assert!(archived.join("state.yaml").exists());

    phasegate(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workflows"));
}

#[test]
fn session_start_lists_interrupted_workflow() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    start_api(&dir, "brandfetch");
    phasegate(&dir).args(["session", "end"]).assert().success();

    phasegate(&dir)
        .args(["hook", "session-start"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""active":"brandfetch""#))
        .stdout(predicate::str::contains(r#""name":"brandfetch""#));
}

#[test]
fn config_validate_passes_on_defaults_and_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    phasegate(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));

    let path = dir.path().join(".phasegate/config.yaml");
    let mut cfg: serde_yaml::Value =
        serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    cfg["generator"]["enum_cap"] = serde_yaml::Value::from(0);
    std::fs::write(&path, serde_yaml::to_string(&cfg).unwrap()).unwrap();

    phasegate(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] generator.enum_cap"));
}
