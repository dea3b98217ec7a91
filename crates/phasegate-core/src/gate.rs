//! Gate evaluation: allow or deny an attempted action against workflow state.
//!
//! Evaluation is pure. It reads an instance and returns a decision with the
//! exact conditions that failed; recording anything is left to the caller.

use crate::config::Config;
use crate::event::ActionDescriptor;
use crate::freshness;
use crate::guard::{self, Guard, Target};
use crate::types::{Phase, PhaseStatus};
use crate::workflow::WorkflowInstance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Decision / Condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named boolean or numeric condition behind a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "condition", rename_all = "snake_case")]
pub enum Condition {
    PhaseIncomplete {
        phase: Phase,
        status: PhaseStatus,
    },
    Prerequisite {
        phase: Phase,
        prerequisite: Phase,
    },
    Checkpoint {
        phase: Phase,
        field: String,
        value: bool,
    },
    Quantity {
        phase: Phase,
        name: String,
        actual: u32,
        minimum: u32,
    },
    ResearchStale {
        days_old: i64,
        threshold_days: u32,
    },
    ScopeUndecided {
        features: Vec<String>,
    },
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::PhaseIncomplete { phase, status } => write!(f, "{phase}.status={status}"),
            Condition::Prerequisite { prerequisite, .. } => {
                write!(f, "{prerequisite}.status!=complete")
            }
            Condition::Checkpoint { field, value, .. } => write!(f, "{field}={value}"),
            Condition::Quantity {
                name,
                actual,
                minimum,
                ..
            } => write!(f, "{name}: {actual}/{minimum} minimum"),
            Condition::ResearchStale {
                days_old,
                threshold_days,
            } => write!(f, "research_age_days: {days_old}/{threshold_days} maximum"),
            Condition::ScopeUndecided { features } => {
                write!(f, "undecided_features={}", features.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub decision: Decision,
    #[serde(default)]
    pub reasons: Vec<Condition>,
    /// Phase whose guard failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GateDecision {
    pub fn allow(message: Option<String>) -> Self {
        Self {
            decision: Decision::Allow,
            reasons: Vec::new(),
            phase: None,
            guard: None,
            message,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }

    /// The reasons rendered as `name=value` strings.
    pub fn reason_strings(&self) -> Vec<String> {
        self.reasons.iter().map(|c| c.to_string()).collect()
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Everything that keeps `phase` from being complete right now.
pub fn phase_conditions(wf: &WorkflowInstance, phase: Phase, config: &Config) -> Vec<Condition> {
    let status = wf.status(phase);
    if status == PhaseStatus::Complete {
        return Vec::new();
    }
    let mut reasons = vec![Condition::PhaseIncomplete { phase, status }];
    for prerequisite in wf.missing_prerequisites(phase) {
        reasons.push(Condition::Prerequisite {
            phase,
            prerequisite,
        });
    }
    if let Some(cp) = wf.phase(phase).and_then(|p| p.checkpoint.as_ref()) {
        for (field, value) in cp.flags() {
            if !value {
                reasons.push(Condition::Checkpoint {
                    phase,
                    field: field.to_string(),
                    value,
                });
            }
        }
    }
    for s in wf.shortfalls(phase, config) {
        reasons.push(Condition::Quantity {
            phase,
            name: s.name,
            actual: s.actual,
            minimum: s.minimum,
        });
    }
    reasons
}

fn allow_message(wf: &WorkflowInstance) -> Option<String> {
    wf.decision_summary()
        .map(|summary| format!("{}: decisions {summary}", wf.name))
}

/// Decide whether `action` may proceed against `instance` (the active
/// workflow, if any). Unguarded actions and a missing instance allow.
pub fn evaluate(
    action: &ActionDescriptor,
    instance: Option<&WorkflowInstance>,
    config: &Config,
    now: DateTime<Utc>,
) -> GateDecision {
    evaluate_with(&guard::default_guards(), action, instance, config, now)
}

pub fn evaluate_with(
    guards: &[Guard],
    action: &ActionDescriptor,
    instance: Option<&WorkflowInstance>,
    config: &Config,
    now: DateTime<Utc>,
) -> GateDecision {
    let Some(wf) = instance else {
        return GateDecision::allow(None);
    };
    let target = match action.target.as_deref() {
        Some(t) if action.kind.is_guarded() && !t.is_empty() => Target::new(t),
        _ => return GateDecision::allow(allow_message(wf)),
    };
    let guarded = guard::guarded_phases(guards, &target, wf);
    if guarded.is_empty() {
        return GateDecision::allow(allow_message(wf));
    }

    for gp in &guarded {
        let reasons = phase_conditions(wf, gp.phase, config);
        if reasons.is_empty() {
            continue;
        }
        tracing::debug!(workflow = %wf.name, phase = %gp.phase, guard = gp.guard, "deny");
        let rendered: Vec<String> = reasons.iter().map(|c| c.to_string()).collect();
        return GateDecision {
            decision: Decision::Deny,
            message: Some(format!(
                "{} requires phase '{}' complete for {}: {}",
                target.as_str(),
                gp.phase,
                wf.name,
                rendered.join(", ")
            )),
            reasons,
            phase: Some(gp.phase),
            guard: Some(gp.guard.to_string()),
        };
    }

    if config.freshness.enforce && wf.freshness.enforce {
        let threshold = wf.freshness.threshold(config.freshness.threshold_days);
        let last = wf.freshness.last_researched.as_deref();
        if freshness::is_stale(last, threshold, now) {
            let days_old = freshness::days_old(last, now).unwrap_or_default();
            return GateDecision {
                decision: Decision::Deny,
                reasons: vec![Condition::ResearchStale {
                    days_old,
                    threshold_days: threshold,
                }],
                phase: None,
                guard: Some("research_freshness".to_string()),
                message: Some(format!(
                    "research for {} is {days_old} days old (threshold {threshold}); re-research before continuing",
                    wf.name
                )),
            };
        }
    }

    GateDecision::allow(allow_message(wf))
}

// ---------------------------------------------------------------------------
// Workflow completion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub decision: Decision,
    pub reasons: Vec<Condition>,
    /// Incomplete recommended phases; never blocking.
    pub warnings: Vec<Condition>,
    pub coverage_percent: u32,
}

/// May the workflow finish? Every required phase must be complete and every
/// discovered feature decided.
pub fn evaluate_completion(wf: &WorkflowInstance) -> CompletionReport {
    let mut reasons = Vec::new();
    let mut warnings = Vec::new();
    for spec in &wf.registry().phases {
        let status = wf.status(spec.phase);
        if status == PhaseStatus::Complete {
            continue;
        }
        let condition = Condition::PhaseIncomplete {
            phase: spec.phase,
            status,
        };
        if spec.is_required() {
            reasons.push(condition);
        } else {
            warnings.push(condition);
        }
    }
    if !wf.scope.is_complete() {
        reasons.push(Condition::ScopeUndecided {
            features: wf.scope.undecided().into_iter().map(str::to_string).collect(),
        });
    }
    CompletionReport {
        decision: if reasons.is_empty() {
            Decision::Allow
        } else {
            Decision::Deny
        },
        reasons,
        warnings,
        coverage_percent: wf.scope.coverage_percent(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DecisionCapture;
    use crate::types::{ActionKind, DecisionCategory, WorkflowKind};
    use chrono::Duration;

    fn wf() -> WorkflowInstance {
        WorkflowInstance::new("brandfetch", WorkflowKind::Api, Utc::now()).unwrap()
    }

    fn write(path: &str) -> ActionDescriptor {
        ActionDescriptor::new(ActionKind::Write, path)
    }

    fn complete_through(wf: &mut WorkflowInstance, last: Phase) {
        for p in Phase::all().iter().copied().filter(|p| *p <= last) {
            if let Some(state) = wf.phases.get_mut(&p) {
                state.status = PhaseStatus::Complete;
            }
        }
    }

    #[test]
    fn schema_write_denied_while_schema_phase_open() {
        let mut wf = wf();
        complete_through(&mut wf, Phase::ResearchDeep);
        wf.phases.get_mut(&Phase::SchemaCreation).unwrap().status = PhaseStatus::InProgress;

        let d = evaluate(
            &write("src/lib/schemas/brandfetch.ts"),
            Some(&wf),
            &Config::default(),
            Utc::now(),
        );
        assert_eq!(d.decision, Decision::Deny);
        assert_eq!(d.phase, Some(Phase::SchemaCreation));
        let reasons = d.reason_strings();
        assert!(reasons.contains(&"proposal_shown=false".to_string()));
        assert!(reasons.contains(&"question_asked=false".to_string()));
        assert!(reasons.contains(&"schema_creation.status=in_progress".to_string()));
    }

    #[test]
    fn earliest_failing_phase_wins() {
        let mut wf = wf();
        complete_through(&mut wf, Phase::Disambiguation);
        let d = evaluate(
            &write("src/app/api/v2/brandfetch/route.ts"),
            Some(&wf),
            &Config::default(),
            Utc::now(),
        );
        assert_eq!(d.phase, Some(Phase::Scope));
        assert_eq!(d.guard.as_deref(), Some("api_route"));
    }

    #[test]
    fn guarded_action_denied_for_every_incomplete_guard_phase() {
        let path = "src/app/api/v2/brandfetch/route.ts";
        for last in [Phase::Scope, Phase::Interview, Phase::EnvironmentCheck] {
            let mut wf = wf();
            complete_through(&mut wf, last);
            let d = evaluate(&write(path), Some(&wf), &Config::default(), Utc::now());
            assert_eq!(d.decision, Decision::Deny, "after {last}");
            assert!(d.phase.unwrap() > last);
        }
    }

    #[test]
    fn quantity_shortfall_is_itemized() {
        let mut wf = wf();
        complete_through(&mut wf, Phase::Scope);
        wf.record_source("websearch", "brandfetch", Utc::now()).unwrap();
        let d = evaluate(
            &write("src/app/api/v2/brandfetch/route.ts"),
            Some(&wf),
            &Config::default(),
            Utc::now(),
        );
        assert_eq!(d.phase, Some(Phase::ResearchInitial));
        assert!(d
            .reason_strings()
            .contains(&"sources: 1/2 minimum".to_string()));
    }

    #[test]
    fn unguarded_and_missing_state_allow() {
        let wf = wf();
        let cfg = Config::default();
        assert!(evaluate(&write("README.md"), Some(&wf), &cfg, Utc::now()).is_allowed());
        assert!(evaluate(
            &ActionDescriptor::new(ActionKind::Read, "src/lib/schemas/x.ts"),
            Some(&wf),
            &cfg,
            Utc::now()
        )
        .is_allowed());
        assert!(evaluate(&write("src/lib/schemas/x.ts"), None, &cfg, Utc::now()).is_allowed());
    }

    #[test]
    fn complete_workflow_allows_with_decision_summary() {
        let mut wf = wf();
        complete_through(&mut wf, Phase::Documentation);
        wf.record_answer(
            &DecisionCapture {
                prompt_text: "Which AI provider?".to_string(),
                human_reply_text: "anthropic".to_string(),
                phase: Some(Phase::Interview),
                ..Default::default()
            },
            &Config::default(),
            Utc::now(),
        )
        .unwrap();
        let d = evaluate(
            &write("src/app/api/v2/brandfetch/route.ts"),
            Some(&wf),
            &Config::default(),
            Utc::now(),
        );
        assert!(d.is_allowed());
        assert!(d.message.unwrap().contains("provider=anthropic"));
    }

    #[test]
    fn stale_research_denies_after_phase_guards_pass() {
        let mut wf = wf();
        complete_through(&mut wf, Phase::Documentation);
        let now = Utc::now();
        wf.freshness.touch(now - Duration::days(9));
        let path = "src/app/api/v2/brandfetch/route.ts";
        let cfg = Config::default();

        let d = evaluate(&write(path), Some(&wf), &cfg, now);
        assert_eq!(d.decision, Decision::Deny);
        assert!(matches!(d.reasons[0], Condition::ResearchStale { days_old: 9, threshold_days: 7 }));

        wf.freshness.threshold_days = Some(14);
        assert!(evaluate(&write(path), Some(&wf), &cfg, now).is_allowed());

        wf.freshness.threshold_days = None;
        wf.freshness.enforce = false;
        assert!(evaluate(&write(path), Some(&wf), &cfg, now).is_allowed());
    }

    #[test]
    fn evaluation_does_not_mutate() {
        let wf = wf();
        let before = wf.clone();
        evaluate(&write("src/lib/schemas/x.ts"), Some(&wf), &Config::default(), Utc::now());
        assert_eq!(wf, before);
    }

    #[test]
    fn completion_needs_required_phases_and_scope() {
        let mut wf = wf();
        complete_through(&mut wf, Phase::Documentation);
        wf.phases.get_mut(&Phase::TddRefactor).unwrap().status = PhaseStatus::InProgress;
        wf.record_scope_decision("svg", DecisionCategory::Unknown, Utc::now());

        let report = evaluate_completion(&wf);
        assert_eq!(report.decision, Decision::Deny);
        assert_eq!(report.reasons.len(), 1);
        assert_eq!(report.reasons[0].to_string(), "undecided_features=svg");
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.coverage_percent, 0);

        wf.record_scope_decision("svg", DecisionCategory::Skip, Utc::now());
        assert_eq!(evaluate_completion(&wf).decision, Decision::Allow);
    }
}
