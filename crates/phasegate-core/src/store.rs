//! The one place state is mutated.
//!
//! Every write goes through [`StateStore::mutate`], which holds the state
//! lock for the whole read-modify-write and refuses to overwrite a document
//! whose revision moved underneath it.

use crate::checkpoint::CheckpointField;
use crate::config::Config;
use crate::error::{FlowError, Result};
use crate::event::{DecisionCapture, ResearchSource};
use crate::io::{self, StateLock};
use crate::paths;
use crate::state::StateDocument;
use crate::types::{DecisionCategory, Phase, QuestionType, WorkflowKind};
use crate::workflow::{AnswerRecord, PhaseState, WorkflowInstance};
use chrono::Utc;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_initialized(&self) -> bool {
        paths::state_path(&self.root).exists()
    }

    /// Create `.phasegate/` and an empty state document. Returns false when
    /// the document already existed.
    pub fn init(&self) -> Result<bool> {
        io::ensure_dir(&paths::phasegate_dir(&self.root))?;
        io::ensure_dir(&paths::sessions_dir(&self.root))?;
        if self.is_initialized() {
            return Ok(false);
        }
        StateDocument::new().save(&self.root)?;
        Ok(true)
    }

    pub fn load(&self) -> Result<StateDocument> {
        StateDocument::load(&self.root)
    }

    /// Read-only load for gate evaluation: a missing or malformed document
    /// yields `None` ("no active workflow").
    pub fn load_lenient(&self) -> Option<StateDocument> {
        match self.load() {
            Ok(doc) => Some(doc),
            Err(FlowError::NotInitialized) => None,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable state document, treating as no active workflow");
                None
            }
        }
    }

    /// Locked read-modify-write. `f`'s changes are persisted only if it
    /// succeeds and nobody else wrote the document in the meantime.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut StateDocument) -> Result<T>) -> Result<T> {
        let _lock = StateLock::acquire(&paths::lock_path(&self.root))?;
        let mut doc = self.load()?;
        let expected = doc.revision;
        let out = f(&mut doc)?;

        let found = self.load()?.revision;
        if found != expected {
            return Err(FlowError::ConcurrentModification { expected, found });
        }
        doc.revision = expected + 1;
        doc.last_updated = Utc::now();
        doc.save(&self.root)?;
        tracing::debug!(revision = doc.revision, "state saved");
        Ok(out)
    }

    /// Mutate one instance: `name`, or the active one when `None`.
    pub fn mutate_workflow<T>(
        &self,
        name: Option<&str>,
        f: impl FnOnce(&mut WorkflowInstance) -> Result<T>,
    ) -> Result<T> {
        self.mutate(|doc| {
            let name = doc.resolve_name(name)?;
            f(doc.workflow_mut(&name)?)
        })
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    pub fn start_workflow(&self, name: &str, kind: WorkflowKind) -> Result<WorkflowInstance> {
        self.mutate(|doc| {
            let instance = WorkflowInstance::new(name, kind, Utc::now())?;
            doc.insert(instance.clone())?;
            tracing::info!(workflow = name, %kind, "workflow started");
            Ok(instance)
        })
    }

    pub fn set_active(&self, name: &str) -> Result<()> {
        self.mutate(|doc| doc.set_active(name))
    }

    pub fn get_phase(&self, name: Option<&str>, phase: Phase) -> Result<PhaseState> {
        let doc = self.load()?;
        let name = doc.resolve_name(name)?;
        let wf = doc.workflow(&name)?;
        wf.phase(phase)
            .cloned()
            .ok_or_else(|| FlowError::PhaseNotInWorkflow {
                phase: phase.to_string(),
                kind: wf.kind.to_string(),
            })
    }

    pub fn show_proposal(&self, name: Option<&str>, phase: Phase) -> Result<()> {
        self.mutate_workflow(name, |wf| wf.show_proposal(phase, Utc::now()))
    }

    pub fn ask_question(
        &self,
        name: Option<&str>,
        phase: Phase,
        question_type: QuestionType,
    ) -> Result<()> {
        self.mutate_workflow(name, |wf| wf.ask_question(phase, question_type, Utc::now()))
    }

    pub fn set_checkpoint_field(
        &self,
        name: Option<&str>,
        phase: Phase,
        field: CheckpointField,
        value: bool,
    ) -> Result<()> {
        self.mutate_workflow(name, |wf| {
            wf.set_checkpoint_field(phase, field, value, Utc::now())
        })
    }

    pub fn record_answer(
        &self,
        name: Option<&str>,
        capture: &DecisionCapture,
        config: &Config,
    ) -> Result<AnswerRecord> {
        self.mutate_workflow(name, |wf| wf.record_answer(capture, config, Utc::now()))
    }

    pub fn record_scope_decision(
        &self,
        name: Option<&str>,
        feature: &str,
        category: DecisionCategory,
    ) -> Result<()> {
        self.mutate_workflow(name, |wf| {
            wf.record_scope_decision(feature, category, Utc::now());
            Ok(())
        })
    }

    pub fn record_source(&self, name: Option<&str>, source: &ResearchSource) -> Result<Phase> {
        let at = source.timestamp.unwrap_or_else(Utc::now);
        self.mutate_workflow(name, |wf| {
            wf.record_source(&source.kind, &source.identifier, at)
        })
    }

    pub fn complete_phase(&self, name: Option<&str>, phase: Phase, config: &Config) -> Result<()> {
        self.mutate_workflow(name, |wf| wf.complete_phase(phase, config, Utc::now()))
    }

    pub fn loopback(&self, name: Option<&str>, phase: Phase) -> Result<()> {
        self.mutate_workflow(name, |wf| wf.loopback(phase, Utc::now()))
    }

    pub fn track_file(&self, name: Option<&str>, path: &str) -> Result<()> {
        self.mutate_workflow(name, |wf| {
            wf.track_file(path, Utc::now());
            Ok(())
        })
    }
}
