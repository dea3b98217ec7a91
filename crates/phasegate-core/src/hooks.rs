//! Host hook transport.
//!
//! The host calls these around its own tool use: `pre_action` before a tool
//! runs (may deny), `post_action` after it succeeded (records answers,
//! research and files), plus session start/end. None of them return an
//! error to the host: unreadable input or state fails open.

use crate::config::Config;
use crate::error::Result;
use crate::event::{ActionDescriptor, DecisionCapture, OfferedOption, ResearchSource};
use crate::gate::{self, Decision, GateDecision};
use crate::session::{self, SessionEndReport, SessionSummary};
use crate::store::StateStore;
use crate::types::{ActionKind, Phase};
use crate::workflow::AnswerRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Hook payload. Either the host's raw tool call (`tool_name`,
/// `tool_input`, `tool_response`) or pre-built `action` / `capture` /
/// `source` values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default, alias = "toolName")]
    pub tool_name: String,
    #[serde(default, alias = "toolInput")]
    pub tool_input: Value,
    #[serde(default, alias = "toolResponse", alias = "tool_output")]
    pub tool_response: Value,
    #[serde(default)]
    pub action: Option<ActionDescriptor>,
    #[serde(default)]
    pub capture: Option<DecisionCapture>,
    #[serde(default)]
    pub source: Option<ResearchSource>,
}

const TARGET_KEYS: &[&str] = &["file_path", "filePath", "path", "notebook_path", "url", "query"];
const LIBRARY_KEYS: &[&str] = &["libraryName", "libraryId", "context7CompatibleLibraryID", "topic"];
const REPLY_KEYS: &[&str] = &["response", "result", "answer"];

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn parse_field<T: std::str::FromStr>(value: &Value, key: &str) -> Option<T> {
    value.get(key).and_then(Value::as_str).and_then(|s| s.parse().ok())
}

impl HookInput {
    /// Empty input is an empty payload, not an error.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(raw)?)
    }

    pub fn kind(&self) -> Option<ActionKind> {
        if let Some(action) = &self.action {
            return Some(action.kind);
        }
        (!self.tool_name.is_empty()).then(|| ActionKind::from_tool_name(&self.tool_name))
    }

    pub fn action(&self) -> Option<ActionDescriptor> {
        if let Some(action) = &self.action {
            return Some(action.clone());
        }
        let kind = self.kind()?;
        Some(ActionDescriptor {
            kind,
            target: str_field(&self.tool_input, TARGET_KEYS).map(str::to_string),
            payload: (!self.tool_input.is_null()).then(|| self.tool_input.clone()),
        })
    }

    /// The question and the human's reply, for `AskUserQuestion`-style tools.
    pub fn capture(&self) -> Option<DecisionCapture> {
        if let Some(capture) = &self.capture {
            return Some(capture.clone());
        }
        if self.kind()? != ActionKind::AskUser {
            return None;
        }
        // Newer hosts batch questions; the first one is the one answered.
        let question = self
            .tool_input
            .get("questions")
            .and_then(Value::as_array)
            .and_then(|qs| qs.first())
            .unwrap_or(&self.tool_input);
        let prompt = str_field(question, &["question", "prompt", "prompt_text"])?.to_string();
        let offered_options = question
            .get("options")
            .and_then(Value::as_array)
            .map(|opts| opts.iter().filter_map(offered_option).collect())
            .unwrap_or_default();
        let input = &self.tool_input;

        Some(DecisionCapture {
            human_reply_text: self.reply_text(&prompt).unwrap_or_default(),
            prompt_text: prompt,
            offered_options,
            phase: parse_field::<Phase>(input, "phase"),
            feature: str_field(input, &["feature"]).map(str::to_string),
            category: parse_field(input, "category"),
            decision_key: str_field(input, &["decision_key", "decisionKey"]).map(str::to_string),
            response: parse_field(&self.tool_response, "decision")
                .or_else(|| parse_field(input, "response")),
        })
    }

    fn reply_text(&self, prompt: &str) -> Option<String> {
        let resp = &self.tool_response;
        if let Some(s) = resp.as_str() {
            return Some(s.to_string());
        }
        if let Some(answers) = resp.get("answers").and_then(Value::as_object) {
            let answer = answers
                .get(prompt)
                .or_else(|| answers.values().next())
                .and_then(Value::as_str);
            if let Some(a) = answer {
                return Some(a.to_string());
            }
        }
        str_field(resp, REPLY_KEYS).map(str::to_string)
    }

    /// The research source a search/fetch/docs tool consulted.
    pub fn research_source(&self) -> Option<ResearchSource> {
        if let Some(source) = &self.source {
            return Some(source.clone());
        }
        let input = &self.tool_input;
        let (kind, identifier) = match self.kind()? {
            ActionKind::WebSearch => ("web_search", str_field(input, &["query"])),
            ActionKind::WebFetch => ("web_fetch", str_field(input, &["url"])),
            ActionKind::DocsLookup => ("docs", str_field(input, LIBRARY_KEYS)),
            _ => return None,
        };
        Some(ResearchSource {
            kind: kind.to_string(),
            identifier: identifier.unwrap_or(self.tool_name.as_str()).to_string(),
            timestamp: None,
        })
    }
}

fn offered_option(v: &Value) -> Option<OfferedOption> {
    match v {
        Value::String(s) => Some(OfferedOption {
            value: s.clone(),
            label: s.clone(),
        }),
        Value::Object(_) => {
            let label = str_field(v, &["label"]).unwrap_or_default().to_string();
            let value = str_field(v, &["value"]).map(str::to_string).unwrap_or_else(|| label.clone());
            (!value.is_empty()).then_some(OfferedOption { value, label })
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// What the host reads back from `pre_action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionResponse {
    #[serde(rename = "permissionDecision")]
    pub permission_decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl From<&GateDecision> for PermissionResponse {
    fn from(d: &GateDecision) -> Self {
        PermissionResponse {
            permission_decision: d.decision,
            reason: d.message.clone(),
            conditions: d.reason_strings(),
            phase: d.phase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostActionReport {
    #[serde(rename = "continue")]
    pub proceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<AnswerRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_count: Option<u64>,
    pub reground_due: bool,
}

impl Default for PostActionReport {
    fn default() -> Self {
        PostActionReport {
            proceed: true,
            workflow: None,
            answer: None,
            research_phase: None,
            tracked_file: None,
            turn_count: None,
            reground_due: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Gate a pending action against the active workflow.
pub fn pre_action(store: &StateStore, config: &Config, input: &HookInput, now: DateTime<Utc>) -> GateDecision {
    let Some(action) = input.action() else {
        return GateDecision::allow(None);
    };
    let doc = store.load_lenient();
    let active = doc.as_ref().and_then(|d| d.active_workflow());
    gate::evaluate(&action, active, config, now)
}

/// Record the effects of a completed action on the active workflow.
pub fn post_action(store: &StateStore, config: &Config, input: &HookInput) -> PostActionReport {
    let has_active = store
        .load_lenient()
        .is_some_and(|doc| doc.active_workflow().is_some());
    let Some(kind) = input.kind() else {
        return PostActionReport::default();
    };
    let tracked = kind == ActionKind::AskUser || kind.is_research() || kind.is_guarded();
    if !has_active || !tracked {
        return PostActionReport::default();
    }

    let capture = input.capture();
    let source = input.research_source();
    let file = input
        .action()
        .and_then(|a| a.target)
        .filter(|_| kind.is_guarded())
        .map(|t| relative_to(store.root(), &t));

    let result = store.mutate(|doc| {
        let wf = doc.active_workflow_mut()?;
        let mut report = PostActionReport {
            workflow: Some(wf.name.clone()),
            ..Default::default()
        };
        let now = Utc::now();
        if let Some(capture) = &capture {
            report.answer = Some(wf.record_answer(capture, config, now)?);
        }
        if let Some(source) = &source {
            let at = source.timestamp.unwrap_or(now);
            report.research_phase = Some(wf.record_source(&source.kind, &source.identifier, at)?);
        }
        if let Some(path) = &file {
            wf.track_file(path, now);
            report.tracked_file = Some(path.clone());
        }
        let turns = wf.tick();
        report.turn_count = Some(turns);
        report.reground_due = session::is_reground_due(turns, config.session.reground_interval);
        Ok(report)
    });

    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "post-action hook failed; state unchanged");
        PostActionReport::default()
    })
}

pub fn session_start(store: &StateStore, config: &Config) -> SessionSummary {
    session::session_start(store, config).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "session-start hook failed");
        SessionSummary::default()
    })
}

pub fn session_end(store: &StateStore, archive: bool, now: DateTime<Utc>) -> Option<SessionEndReport> {
    if !store.is_initialized() {
        return None;
    }
    session::session_end(store, archive, now)
        .map_err(|e| tracing::warn!(error = %e, "session-end hook failed"))
        .ok()
}

/// Paths under the project root are tracked relative to it.
fn relative_to(root: &Path, target: &str) -> String {
    let path = Path::new(target);
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| target.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::AnswerOutcome;
    use crate::types::{PhaseStatus, WorkflowKind};
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, StateStore) {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        store.init().unwrap();
        store.start_workflow("brandfetch", WorkflowKind::Api).unwrap();
        (dir, store)
    }

    fn input(value: Value) -> HookInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_payload_parses() {
        let parsed = HookInput::parse("  ").unwrap();
        assert!(parsed.action().is_none());
        assert!(HookInput::parse("{not json").is_err());
    }

    #[test]
    fn write_to_route_is_denied_then_allowed_when_unguarded() {
        let (_dir, store) = store();
        let cfg = Config::default();
        let write = input(json!({
            "tool_name": "Write",
            "tool_input": {"file_path": "src/app/api/v2/brandfetch/route.ts", "content": "x"}
        }));
        let decision = pre_action(&store, &cfg, &write, Utc::now());
        assert_eq!(decision.decision, Decision::Deny);
        assert_eq!(decision.phase, Some(Phase::Disambiguation));

        let resp = PermissionResponse::from(&decision);
        let out = serde_json::to_value(&resp).unwrap();
        assert_eq!(out["permissionDecision"], json!("deny"));
        assert!(!resp.conditions.is_empty());

        let read = input(json!({"tool_name": "Read", "tool_input": {"file_path": "src/app/api/v2/brandfetch/route.ts"}}));
        assert!(pre_action(&store, &cfg, &read, Utc::now()).is_allowed());
    }

    #[test]
    fn uninitialized_or_corrupt_state_fails_open() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        let write = input(json!({"tool_name": "Write", "tool_input": {"file_path": "src/app/api/x/route.ts"}}));
        assert!(pre_action(&store, &Config::default(), &write, Utc::now()).is_allowed());

        store.init().unwrap();
        std::fs::write(crate::paths::state_path(dir.path()), "workflows: [not: a: map").unwrap();
        assert!(pre_action(&store, &Config::default(), &write, Utc::now()).is_allowed());
        let report = post_action(&store, &Config::default(), &write);
        assert!(report.proceed);
        assert!(report.workflow.is_none());
    }

    #[test]
    fn ask_user_answer_is_recorded() {
        let (_dir, store) = store();
        let cfg = Config::default();
        let ask = input(json!({
            "tool_name": "AskUserQuestion",
            "tool_input": {
                "question": "Which provider should we use?",
                "options": [{"value": "openai", "label": "OpenAI"}, {"value": "anthropic", "label": "Anthropic"}]
            },
            "tool_response": "Anthropic"
        }));
        let report = post_action(&store, &cfg, &ask);
        let answer = report.answer.unwrap();
        assert_eq!(answer.phase, Phase::Disambiguation);
        assert_eq!(answer.outcome, AnswerOutcome::Recorded);
        assert_eq!(answer.decision_key, "provider");
        assert_eq!(report.turn_count, Some(1));

        let doc = store.load().unwrap();
        let wf = doc.workflow("brandfetch").unwrap();
        assert_eq!(wf.decisions["provider"].selected_option.as_deref(), Some("anthropic"));
        assert_eq!(wf.status(Phase::Disambiguation), PhaseStatus::InProgress);
    }

    #[test]
    fn batched_questions_and_answer_maps() {
        let ask = input(json!({
            "tool_name": "AskUserQuestion",
            "tool_input": {"questions": [{
                "question": "Ready to proceed?",
                "options": [{"label": "Yes", "description": "go"}, {"label": "No"}]
            }]},
            "tool_response": {"answers": {"Ready to proceed?": "Yes"}}
        }));
        let capture = ask.capture().unwrap();
        assert_eq!(capture.prompt_text, "Ready to proceed?");
        assert_eq!(capture.option_labels(), vec!["Yes", "No"]);
        assert_eq!(capture.human_reply_text, "Yes");
    }

    #[test]
    fn structured_decision_is_read_from_response() {
        let ask = input(json!({
            "tool_name": "AskUserQuestion",
            "tool_input": {"question": "Approve the scope?", "phase": "scope"},
            "tool_response": {"decision": "approve", "response": "looks fine"}
        }));
        let capture = ask.capture().unwrap();
        assert_eq!(capture.phase, Some(Phase::Scope));
        assert_eq!(capture.response, Some(crate::types::StructuredResponse::Approve));
        assert_eq!(capture.human_reply_text, "looks fine");
    }

    #[test]
    fn research_tools_record_sources() {
        let (_dir, store) = store();
        let cfg = Config::default();
        let search = input(json!({"tool_name": "WebSearch", "tool_input": {"query": "brandfetch api docs"}}));
        let report = post_action(&store, &cfg, &search);
        assert_eq!(report.research_phase, Some(Phase::ResearchInitial));

        let docs = input(json!({"tool_name": "mcp__context7__get-library-docs", "tool_input": {"context7CompatibleLibraryID": "/brandfetch/sdk"}}));
        post_action(&store, &cfg, &docs);

        let doc = store.load().unwrap();
        let wf = doc.workflow("brandfetch").unwrap();
        let sources = &wf.phase(Phase::ResearchInitial).unwrap().sources;
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[1].identifier, "/brandfetch/sdk");
        assert!(wf.freshness.last_researched.is_some());
        assert_eq!(wf.turn_count, 2);
    }

    #[test]
    fn writes_are_tracked_relative_to_root() {
        let (dir, store) = store();
        let abs = dir.path().join("src/lib/brandfetch.ts");
        let write = input(json!({"tool_name": "Write", "tool_input": {"file_path": abs.to_string_lossy()}}));
        let report = post_action(&store, &Config::default(), &write);
        assert_eq!(report.tracked_file.as_deref(), Some("src/lib/brandfetch.ts"));

        let edit = input(json!({"tool_name": "Edit", "tool_input": {"file_path": "src/lib/brandfetch.ts"}}));
        post_action(&store, &Config::default(), &edit);
        let doc = store.load().unwrap();
        let wf = doc.workflow("brandfetch").unwrap();
        assert_eq!(wf.files_created, vec!["src/lib/brandfetch.ts"]);
        assert_eq!(wf.files_modified, vec!["src/lib/brandfetch.ts"]);
    }

    #[test]
    fn untracked_tools_leave_state_alone() {
        let (_dir, store) = store();
        let before = store.load().unwrap().revision;
        let report = post_action(&store, &Config::default(), &input(json!({"tool_name": "Bash"})));
        assert!(report.proceed);
        assert_eq!(store.load().unwrap().revision, before);
    }

    #[test]
    fn session_hooks_fail_open() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path());
        assert!(session_end(&store, false, Utc::now()).is_none());
        assert!(session_start(&store, &Config::default()).active.is_none());
    }
}
