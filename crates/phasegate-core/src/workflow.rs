use crate::checkpoint::{Answer, AnswerOutcome, CheckpointField, CheckpointState};
use crate::config::Config;
use crate::error::{FlowError, Result};
use crate::event::DecisionCapture;
use crate::freshness::Freshness;
use crate::paths::{self, slugify};
use crate::registry::Registry;
use crate::scope::{self, ScopeCoverage};
use crate::types::{DecisionCategory, Phase, PhaseStatus, QuestionType, WorkflowKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MAX_RESEARCH_QUERIES: usize = 50;

// ---------------------------------------------------------------------------
// Phase-level records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub kind: String,
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    pub question_type: QuestionType,
    #[serde(default)]
    pub structured: bool,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<QuestionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_count: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl PhaseState {
    pub fn is_complete(&self) -> bool {
        self.status == PhaseStatus::Complete
    }

    pub fn exit_confirmed(&self) -> bool {
        self.checkpoint.as_ref().is_some_and(|c| c.exit_confirmed)
    }

    fn start(&mut self, now: DateTime<Utc>) {
        if self.status == PhaseStatus::NotStarted {
            self.status = PhaseStatus::InProgress;
            self.started_at = Some(now);
        }
    }
}

/// A numeric requirement a phase has not met yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub name: String,
    pub actual: u32,
    pub minimum: u32,
}

// ---------------------------------------------------------------------------
// Instance-level records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub phase: Phase,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted_phase: Option<Phase>,
}

/// Result of applying a [`DecisionCapture`] to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    pub phase: Phase,
    pub outcome: AnswerOutcome,
    pub question_type: QuestionType,
    pub decision_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<DecisionCategory>,
    /// The confirmed phase was completed as a side effect.
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// WorkflowInstance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub name: String,
    pub kind: WorkflowKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub phases: BTreeMap<Phase, PhaseState>,
    #[serde(default)]
    pub decisions: BTreeMap<String, DecisionRecord>,
    #[serde(default)]
    pub scope: ScopeCoverage,
    #[serde(default)]
    pub files_created: Vec<String>,
    #[serde(default)]
    pub files_modified: Vec<String>,
    #[serde(default)]
    pub turn_count: u64,
    #[serde(default)]
    pub freshness: Freshness,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub research_queries: Vec<String>,
    #[serde(default)]
    pub session: SessionMarker,
}

impl WorkflowInstance {
    pub fn new(name: &str, kind: WorkflowKind, now: DateTime<Utc>) -> Result<Self> {
        paths::validate_name(name)?;
        let phases = Registry::for_kind(kind)
            .phases
            .iter()
            .map(|spec| {
                let state = PhaseState {
                    checkpoint: spec.checkpoint.then(CheckpointState::default),
                    ..Default::default()
                };
                (spec.phase, state)
            })
            .collect();
        Ok(Self {
            name: name.to_string(),
            kind,
            created_at: now,
            updated_at: now,
            phases,
            decisions: BTreeMap::new(),
            scope: ScopeCoverage::default(),
            files_created: Vec::new(),
            files_modified: Vec::new(),
            turn_count: 0,
            freshness: Freshness::default(),
            research_queries: Vec::new(),
            session: SessionMarker::default(),
        })
    }

    pub fn registry(&self) -> &'static Registry {
        Registry::for_kind(self.kind)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn phase(&self, phase: Phase) -> Option<&PhaseState> {
        self.phases.get(&phase)
    }

    pub fn status(&self, phase: Phase) -> PhaseStatus {
        self.phase(phase).map(|p| p.status).unwrap_or_default()
    }

    pub fn is_complete(&self, phase: Phase) -> bool {
        self.status(phase) == PhaseStatus::Complete
    }

    /// First phase of this kind that is not complete.
    pub fn current_phase(&self) -> Option<Phase> {
        self.registry().phases().find(|p| !self.is_complete(*p))
    }

    pub fn has_phase_in_progress(&self) -> bool {
        self.phases
            .values()
            .any(|p| p.status == PhaseStatus::InProgress)
    }

    /// Prerequisites of `phase` that are not complete yet.
    pub fn missing_prerequisites(&self, phase: Phase) -> Vec<Phase> {
        self.registry()
            .prerequisites(phase)
            .iter()
            .copied()
            .filter(|p| !self.is_complete(*p))
            .collect()
    }

    /// Numeric requirements `phase` has not met under `config`.
    pub fn shortfalls(&self, phase: Phase, config: &Config) -> Vec<Shortfall> {
        let Some(state) = self.phase(phase) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        match phase {
            Phase::ResearchInitial => {
                let actual = state.sources.len() as u32;
                if actual < config.research.min_sources {
                    out.push(Shortfall {
                        name: "sources".to_string(),
                        actual,
                        minimum: config.research.min_sources,
                    });
                }
            }
            Phase::Interview => {
                let asked = state.questions.len() as u32;
                if asked < config.interview.min_questions {
                    out.push(Shortfall {
                        name: "questions".to_string(),
                        actual: asked,
                        minimum: config.interview.min_questions,
                    });
                }
                let structured = state.questions.iter().filter(|q| q.structured).count() as u32;
                if structured < config.interview.min_structured {
                    out.push(Shortfall {
                        name: "structured_questions".to_string(),
                        actual: structured,
                        minimum: config.interview.min_structured,
                    });
                }
            }
            _ => {}
        }
        out
    }

    /// One-line summary of recorded decisions, for allow messages.
    pub fn decision_summary(&self) -> Option<String> {
        if self.decisions.is_empty() {
            return None;
        }
        let parts: Vec<String> = self
            .decisions
            .iter()
            .map(|(key, d)| {
                let value = d
                    .selected_option
                    .as_deref()
                    .or(d.response.as_deref())
                    .unwrap_or("-");
                format!("{key}={value}")
            })
            .collect();
        Some(parts.join(", "))
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    fn phase_mut(&mut self, phase: Phase) -> Result<&mut PhaseState> {
        let kind = self.kind;
        if !self.registry().contains(phase) {
            return Err(FlowError::PhaseNotInWorkflow {
                phase: phase.to_string(),
                kind: kind.to_string(),
            });
        }
        Ok(self.phases.entry(phase).or_default())
    }

    fn checkpoint_mut(&mut self, phase: Phase) -> Result<&mut CheckpointState> {
        let has_checkpoint = self.registry().spec(phase).is_some_and(|s| s.checkpoint);
        let state = self.phase_mut(phase)?;
        if !has_checkpoint {
            return Err(FlowError::InvalidTransition {
                from: phase.to_string(),
                to: "checkpoint".to_string(),
                reason: "phase has no checkpoint".to_string(),
            });
        }
        Ok(state.checkpoint.get_or_insert_with(CheckpointState::default))
    }

    pub fn start_phase(&mut self, phase: Phase, now: DateTime<Utc>) -> Result<()> {
        let state = self.phase_mut(phase)?;
        if state.is_complete() {
            return Err(FlowError::InvalidTransition {
                from: PhaseStatus::Complete.to_string(),
                to: PhaseStatus::InProgress.to_string(),
                reason: format!("'{phase}' is complete; use loopback to reopen it"),
            });
        }
        state.start(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn show_proposal(&mut self, phase: Phase, now: DateTime<Utc>) -> Result<()> {
        self.phase_mut(phase)?.start(now);
        self.checkpoint_mut(phase)?.show_proposal();
        self.updated_at = now;
        Ok(())
    }

    /// Record that a decision request was issued for `phase`.
    pub fn ask_question(
        &mut self,
        phase: Phase,
        question_type: QuestionType,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.phase_mut(phase)?.start(now);
        self.checkpoint_mut(phase)?.ask(question_type);
        self.updated_at = now;
        Ok(())
    }

    pub fn set_checkpoint_field(
        &mut self,
        phase: Phase,
        field: CheckpointField,
        value: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.phase_mut(phase)?.start(now);
        self.checkpoint_mut(phase)?.set(field, value)?;
        self.updated_at = now;
        Ok(())
    }

    /// Complete `phase` once its prerequisites, checkpoint and quantities allow.
    /// Completing an already complete phase is a no-op.
    pub fn complete_phase(&mut self, phase: Phase, config: &Config, now: DateTime<Utc>) -> Result<()> {
        let state = self.phase_mut(phase)?;
        if state.is_complete() {
            return Ok(());
        }
        let needs_exit = state.checkpoint.is_some();
        let exit_confirmed = state.exit_confirmed();

        if let Some(prerequisite) = self.missing_prerequisites(phase).first() {
            return Err(FlowError::PrerequisiteIncomplete {
                phase: phase.to_string(),
                prerequisite: prerequisite.to_string(),
            });
        }
        if needs_exit && !exit_confirmed {
            return Err(FlowError::CheckpointNotConfirmed(phase.to_string()));
        }
        if let Some(s) = self.shortfalls(phase, config).into_iter().next() {
            return Err(FlowError::QuantityShortfall {
                phase: phase.to_string(),
                name: s.name,
                actual: s.actual,
                minimum: s.minimum,
            });
        }

        let state = self.phase_mut(phase)?;
        state.start(now);
        state.status = PhaseStatus::Complete;
        state.completed_at = Some(now);
        self.updated_at = now;
        tracing::info!(workflow = %self.name, %phase, "phase complete");
        Ok(())
    }

    /// Reopen `phase` for another proposal round.
    pub fn loopback(&mut self, phase: Phase, now: DateTime<Utc>) -> Result<()> {
        let state = self.phase_mut(phase)?;
        state.status = PhaseStatus::InProgress;
        state.completed_at = None;
        if state.started_at.is_none() {
            state.started_at = Some(now);
        }
        if let Some(cp) = state.checkpoint.as_mut() {
            cp.loopback();
        }
        self.updated_at = now;
        tracing::info!(workflow = %self.name, %phase, "loopback");
        Ok(())
    }

    /// Apply a human's answer: checkpoint protocol, decision record and,
    /// where the question is a feature decision, scope coverage.
    pub fn record_answer(
        &mut self,
        capture: &DecisionCapture,
        config: &Config,
        now: DateTime<Utc>,
    ) -> Result<AnswerRecord> {
        let phase = match capture.phase {
            Some(p) => p,
            None => self
                .current_phase()
                .unwrap_or(Phase::Documentation),
        };
        let labels = capture.option_labels();
        let selected = capture.selected_option();
        let reply = capture.human_reply_text.trim();

        let state = self.phase_mut(phase)?;
        state.start(now);
        let answer = Answer {
            prompt: &capture.prompt_text,
            option_labels: labels.clone(),
            reply,
            selected_option: selected,
            response: capture.response,
        };
        // A complete phase keeps its confirmed checkpoint; reopening it is an
        // explicit loopback.
        let complete = state.is_complete();
        let (outcome, question_type) = match state.checkpoint.as_mut() {
            Some(cp) if !complete => {
                let outcome = cp.answer(&answer);
                (outcome, cp.question_type)
            }
            _ => (
                AnswerOutcome::Recorded,
                crate::checkpoint::classify_question(&capture.prompt_text, &labels),
            ),
        };
        state.questions.push(QuestionRecord {
            prompt: capture.prompt_text.chars().take(200).collect(),
            options: labels.iter().map(|s| s.to_string()).collect(),
            reply: (!reply.is_empty()).then(|| reply.chars().take(200).collect()),
            selected_option: selected.map(str::to_string),
            question_type,
            structured: capture.is_structured(),
            asked_at: now,
        });
        if outcome == AnswerOutcome::Loopback {
            state.status = PhaseStatus::InProgress;
            state.completed_at = None;
        }

        let decision_key = capture
            .decision_key
            .clone()
            .unwrap_or_else(|| derive_decision_key(&capture.prompt_text, self.decisions.len() + 1));
        self.decisions.insert(
            decision_key.clone(),
            DecisionRecord {
                phase,
                question: capture.prompt_text.chars().take(200).collect(),
                response: (!reply.is_empty()).then(|| reply.chars().take(200).collect()),
                selected_option: selected.map(str::to_string),
                recorded_at: now,
            },
        );

        let scoped = capture.feature.is_some()
            || capture.category.is_some()
            || scope::is_feature_decision(&capture.prompt_text, reply);
        let (feature, category) = if scoped {
            let name = scope::resolve_feature_name(
                capture.feature.as_deref(),
                &capture.prompt_text,
                self.scope.discovered.len() + 1,
            );
            let category = capture
                .category
                .unwrap_or_else(|| scope::categorize_reply(reply));
            self.scope
                .record_decision(&name, category, Some(&capture.prompt_text), now);
            (Some(name), Some(category))
        } else {
            (None, None)
        };

        let completed = outcome == AnswerOutcome::ExitConfirmed
            && self.complete_phase(phase, config, now).is_ok();
        self.updated_at = now;
        tracing::info!(workflow = %self.name, %phase, ?outcome, completed, "answer recorded");

        Ok(AnswerRecord {
            phase,
            outcome,
            question_type,
            decision_key,
            feature,
            category,
            completed,
        })
    }

    pub fn record_scope_decision(
        &mut self,
        feature: &str,
        category: DecisionCategory,
        now: DateTime<Utc>,
    ) {
        self.scope.record_decision(feature, category, None, now);
        self.updated_at = now;
    }

    /// Phase that receives the next research source: initial research, then
    /// deep research, then re-research during verification.
    pub fn research_target(&self) -> Phase {
        let registry = self.registry();
        let verify_open = self.is_complete(Phase::TddGreen);
        [Phase::ResearchInitial, Phase::ResearchDeep, Phase::Verify]
            .into_iter()
            .filter(|p| registry.contains(*p))
            .filter(|p| *p != Phase::Verify || verify_open)
            .find(|p| !self.is_complete(*p))
            .or_else(|| registry.contains(Phase::ResearchInitial).then_some(Phase::ResearchInitial))
            .or_else(|| self.current_phase())
            .unwrap_or(Phase::Documentation)
    }

    /// Append a research source and reset the freshness clock.
    pub fn record_source(
        &mut self,
        kind: &str,
        identifier: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Phase> {
        let phase = self.research_target();
        let state = self.phase_mut(phase)?;
        state.start(timestamp);
        state.sources.push(SourceRecord {
            kind: kind.to_string(),
            identifier: identifier.chars().take(500).collect(),
            timestamp,
        });
        self.freshness.touch(timestamp);
        self.research_queries.push(identifier.chars().take(200).collect());
        if self.research_queries.len() > MAX_RESEARCH_QUERIES {
            let excess = self.research_queries.len() - MAX_RESEARCH_QUERIES;
            self.research_queries.drain(..excess);
        }
        self.updated_at = timestamp;
        Ok(phase)
    }

    pub fn set_schema_file(&mut self, path: &str, now: DateTime<Utc>) -> Result<()> {
        let state = self.phase_mut(Phase::SchemaCreation)?;
        state.start(now);
        state.schema_file = Some(path.to_string());
        self.updated_at = now;
        Ok(())
    }

    pub fn set_test_count(&mut self, count: u32, now: DateTime<Utc>) -> Result<()> {
        let state = self.phase_mut(Phase::TddRed)?;
        state.start(now);
        state.test_count = Some(count);
        self.updated_at = now;
        Ok(())
    }

    /// Record a written file. A path seen for the first time is "created";
    /// later writes count as modifications.
    pub fn track_file(&mut self, path: &str, now: DateTime<Utc>) {
        if self.files_created.iter().any(|p| p == path) {
            if !self.files_modified.iter().any(|p| p == path) {
                self.files_modified.push(path.to_string());
            }
        } else {
            self.files_created.push(path.to_string());
        }
        self.updated_at = now;
    }

    pub fn tick(&mut self) -> u64 {
        self.turn_count += 1;
        self.turn_count
    }

    pub fn mark_interrupted(&mut self, now: DateTime<Utc>) {
        self.session.interrupted_at = Some(now);
        self.session.interrupted_phase = self.current_phase();
    }

    pub fn clear_interruption(&mut self) {
        self.session = SessionMarker::default();
    }
}

/// Stable key for a decision, from the topic its question is about.
pub fn derive_decision_key(prompt: &str, ordinal: usize) -> String {
    let q = prompt.to_lowercase();
    let key = if q.contains("provider") {
        "provider"
    } else if q.contains("purpose") {
        "purpose"
    } else if q.contains("format") {
        "response_format"
    } else if q.contains("parameter") && q.contains("required") {
        "required_params"
    } else if q.contains("parameter") && q.contains("optional") {
        "optional_params"
    } else if q.contains("error") {
        "error_handling"
    } else if q.contains("api key") {
        "api_key_handling"
    } else if q.contains("service") || q.contains("external") {
        "external_services"
    } else {
        let slug = slugify(prompt, 5);
        return if slug.is_empty() {
            format!("decision-{ordinal}")
        } else {
            slug
        };
    };
    key.to_string()
}
