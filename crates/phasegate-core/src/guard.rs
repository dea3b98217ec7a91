//! Path-pattern guards: which phases must be complete before a file may be written.

use crate::types::{Phase, WorkflowKind};
use crate::workflow::WorkflowInstance;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// A normalized (forward-slash, lowercase) target path.
#[derive(Debug, Clone)]
pub struct Target {
    path: String,
}

impl Target {
    pub fn new(raw: &str) -> Self {
        Self {
            path: raw.replace('\\', "/").to_lowercase(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    fn has(&self, needle: &str) -> bool {
        self.path.contains(needle)
    }

    fn ends(&self, suffix: &str) -> bool {
        self.path.ends_with(suffix)
    }

    pub fn is_test(&self) -> bool {
        self.has(".test.") || self.has(".spec.") || self.has("/__tests__/")
    }

    fn is_doc(&self) -> bool {
        self.ends(".md") || self.ends(".json")
    }

    fn is_script(&self) -> bool {
        self.ends(".ts") || self.ends(".js")
    }
}

// ---------------------------------------------------------------------------
// Guard
// ---------------------------------------------------------------------------

pub struct Guard {
    pub id: &'static str,
    pub kinds: &'static [WorkflowKind],
    pub matches: fn(&Target) -> bool,
    /// Extra state condition; the guard only applies while it holds.
    pub when: Option<fn(&WorkflowInstance) -> bool>,
    pub phases: &'static [Phase],
}

macro_rules! guard {
    (
        id: $id:expr,
        kinds: $kinds:expr,
        matches: $matches:expr,
        phases: $phases:expr
        $(, when: $when:expr)?
    ) => {
        Guard {
            id: $id,
            kinds: $kinds,
            matches: $matches,
            when: {
                #[allow(unused_assignments, unused_mut)]
                let mut v: Option<fn(&WorkflowInstance) -> bool> = None;
                $(v = Some($when);)?
                v
            },
            phases: $phases,
        }
    };
}

const API_KINDS: &[WorkflowKind] = &[WorkflowKind::Api, WorkflowKind::Combine];
const UI_KINDS: &[WorkflowKind] = &[WorkflowKind::UiComponent, WorkflowKind::UiPage];

const THROUGH_SCHEMA: &[Phase] = &[
    Phase::Disambiguation,
    Phase::Scope,
    Phase::ResearchInitial,
    Phase::Interview,
    Phase::ResearchDeep,
    Phase::SchemaCreation,
];

const THROUGH_ENVIRONMENT: &[Phase] = &[
    Phase::Disambiguation,
    Phase::Scope,
    Phase::ResearchInitial,
    Phase::Interview,
    Phase::ResearchDeep,
    Phase::SchemaCreation,
    Phase::EnvironmentCheck,
];

const THROUGH_RED: &[Phase] = &[
    Phase::Disambiguation,
    Phase::Scope,
    Phase::ResearchInitial,
    Phase::Interview,
    Phase::ResearchDeep,
    Phase::SchemaCreation,
    Phase::EnvironmentCheck,
    Phase::TddRed,
];

// ---------------------------------------------------------------------------
// Matchers
// ---------------------------------------------------------------------------

fn is_schema_file(t: &Target) -> bool {
    t.has("/schemas/") && t.is_script() && !t.is_test()
}

fn is_api_test(t: &Target) -> bool {
    t.is_test() && (t.has("/api/") || t.has(".api.test."))
}

fn is_api_route(t: &Target) -> bool {
    t.has("/api/") && (t.ends("route.ts") || t.ends("route.js")) && !t.is_test()
}

fn is_api_source(t: &Target) -> bool {
    t.has("/api/") && t.is_script() && !t.is_test() && !t.is_doc()
}

fn is_api_module(t: &Target) -> bool {
    is_api_source(t) && !is_api_route(t)
}

fn is_api_docs(t: &Target) -> bool {
    t.has("api-tests-manifest")
        || (t.has("openapi") && (t.ends(".json") || t.ends(".yaml") || t.ends(".yml")))
}

fn is_ui_source(t: &Target) -> bool {
    let component = t.has("/components/") && t.ends(".tsx");
    let page = t.has("/app/") && t.ends("page.tsx");
    (component || page) && !t.is_test() && !t.has(".stories.")
}

fn is_ui_story(t: &Target) -> bool {
    t.has(".stories.")
}

fn green_complete(wf: &WorkflowInstance) -> bool {
    wf.is_complete(Phase::TddGreen)
}

// ---------------------------------------------------------------------------
// Default guards
// ---------------------------------------------------------------------------

pub fn default_guards() -> Vec<Guard> {
    vec![
        guard! {
            id: "schema_file",
            kinds: API_KINDS,
            matches: is_schema_file,
            phases: THROUGH_SCHEMA
        },
        guard! {
            id: "api_test",
            kinds: API_KINDS,
            matches: is_api_test,
            phases: THROUGH_ENVIRONMENT
        },
        guard! {
            id: "api_route",
            kinds: API_KINDS,
            matches: is_api_route,
            phases: THROUGH_RED
        },
        guard! {
            id: "api_module",
            kinds: API_KINDS,
            matches: is_api_module,
            phases: THROUGH_SCHEMA
        },
        // After green, source changes wait for verification.
        guard! {
            id: "api_verify",
            kinds: API_KINDS,
            matches: is_api_source,
            phases: &[Phase::Verify],
            when: green_complete
        },
        guard! {
            id: "api_docs",
            kinds: API_KINDS,
            matches: is_api_docs,
            phases: &[Phase::TddGreen, Phase::Verify]
        },
        guard! {
            id: "ui_source",
            kinds: UI_KINDS,
            matches: is_ui_source,
            phases: THROUGH_RED
        },
        guard! {
            id: "ui_story",
            kinds: UI_KINDS,
            matches: is_ui_story,
            phases: &[Phase::Disambiguation, Phase::Scope, Phase::Interview]
        },
        guard! {
            id: "ui_verify",
            kinds: UI_KINDS,
            matches: is_ui_source,
            phases: &[Phase::Verify],
            when: green_complete
        },
    ]
}

/// A phase that guards the target, and the guard that named it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardedPhase {
    pub phase: Phase,
    pub guard: &'static str,
}

/// Required phases guarding `target` for this instance, deduplicated and in
/// canonical phase order. Phases the instance's kind omits or only
/// recommends are skipped.
pub fn guarded_phases(guards: &[Guard], target: &Target, wf: &WorkflowInstance) -> Vec<GuardedPhase> {
    let registry = wf.registry();
    let mut out: Vec<GuardedPhase> = Vec::new();
    for g in guards {
        if !g.kinds.contains(&wf.kind) || !(g.matches)(target) {
            continue;
        }
        if let Some(when) = g.when {
            if !when(wf) {
                continue;
            }
        }
        for &phase in g.phases {
            let required = registry.spec(phase).is_some_and(|s| s.is_required());
            if required && !out.iter().any(|gp| gp.phase == phase) {
                out.push(GuardedPhase { phase, guard: g.id });
            }
        }
    }
    out.sort_by_key(|gp| gp.phase);
    out
}
