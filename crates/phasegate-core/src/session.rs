//! Session start/end bookkeeping: resume hints, re-ground reminders,
//! interruption markers and archiving of finished workflows.

use crate::config::Config;
use crate::error::Result;
use crate::gate::{evaluate_completion, CompletionReport, Decision};
use crate::io;
use crate::paths;
use crate::state::StateDocument;
use crate::store::StateStore;
use crate::types::{Phase, WorkflowKind};
use crate::workflow::WorkflowInstance;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterruptedWorkflow {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub active: Option<String>,
    pub kind: Option<WorkflowKind>,
    pub current_phase: Option<Phase>,
    pub turn_count: u64,
    pub reground_due: bool,
    pub interrupted: Vec<InterruptedWorkflow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decisions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_percent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEndReport {
    pub workflow: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionReport>,
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_to: Option<PathBuf>,
}

pub fn is_reground_due(turn_count: u64, interval: u32) -> bool {
    interval > 0 && turn_count > 0 && turn_count % u64::from(interval) == 0
}

/// Summarize the document for a new session without touching it.
pub fn summarize(doc: &StateDocument, config: &Config) -> SessionSummary {
    let active = doc.active_workflow();
    let mut interrupted: Vec<InterruptedWorkflow> = doc
        .workflows
        .values()
        .filter(|wf| {
            let is_active = doc.active.as_deref() == Some(wf.name.as_str());
            if is_active {
                wf.session.interrupted_at.is_some()
            } else {
                wf.has_phase_in_progress() || wf.session.interrupted_at.is_some()
            }
        })
        .map(|wf| InterruptedWorkflow {
            name: wf.name.clone(),
            phase: wf.session.interrupted_phase.or_else(|| wf.current_phase()),
            interrupted_at: wf.session.interrupted_at,
        })
        .collect();
    interrupted.sort_by(|a, b| a.name.cmp(&b.name));

    match active {
        Some(wf) => SessionSummary {
            active: Some(wf.name.clone()),
            kind: Some(wf.kind),
            current_phase: wf.current_phase(),
            turn_count: wf.turn_count,
            reground_due: is_reground_due(wf.turn_count, config.session.reground_interval),
            interrupted,
            decisions: wf.decision_summary(),
            coverage_percent: Some(wf.scope.coverage_percent()),
        },
        None => SessionSummary {
            interrupted,
            ..Default::default()
        },
    }
}

/// Summarize, then clear the active instance's interruption marker since
/// the new session resumes it.
pub fn session_start(store: &StateStore, config: &Config) -> Result<SessionSummary> {
    let Some(doc) = store.load_lenient() else {
        return Ok(SessionSummary::default());
    };
    let summary = summarize(&doc, config);
    let resumed = doc
        .active_workflow()
        .is_some_and(|wf| wf.session.interrupted_at.is_some());
    if resumed {
        store.mutate_workflow(None, |wf| {
            wf.clear_interruption();
            Ok(())
        })?;
        tracing::info!(workflow = ?summary.active, "resumed interrupted workflow");
    }
    Ok(summary)
}

/// Run the completion check on the active instance. An incomplete instance
/// is marked interrupted. With `archive`, the instance is written under
/// `.phasegate/sessions/` and dropped from the document.
pub fn session_end(store: &StateStore, archive: bool, now: DateTime<Utc>) -> Result<SessionEndReport> {
    let root = store.root().to_path_buf();
    store.mutate(|doc| {
        let Some(name) = doc.active.clone() else {
            return Ok(SessionEndReport {
                workflow: None,
                completion: None,
                interrupted: false,
                archived_to: None,
            });
        };

        let wf = doc.workflow_mut(&name)?;
        let completion = evaluate_completion(wf);
        let interrupted = completion.decision != Decision::Allow;
        if interrupted {
            wf.mark_interrupted(now);
        }

        let archived_to = if archive {
            let dir = write_archive(&root, wf, now)?;
            doc.remove(&name)?;
            tracing::info!(workflow = %name, dir = %dir.display(), "workflow archived");
            Some(dir)
        } else {
            None
        };

        Ok(SessionEndReport {
            workflow: Some(name),
            completion: Some(completion),
            interrupted,
            archived_to,
        })
    })
}

fn write_archive(root: &Path, wf: &WorkflowInstance, now: DateTime<Utc>) -> Result<PathBuf> {
    let stamp = now.format("%Y%m%d-%H%M%S").to_string();
    let dir = paths::session_archive_dir(root, &wf.name, &stamp);
    io::ensure_dir(&dir)?;
    io::atomic_write(&dir.join("state.yaml"), serde_yaml::to_string(wf)?.as_bytes())?;
    let mut files = wf.files_created.join("\n");
    if !files.is_empty() {
        files.push('\n');
    }
    io::atomic_write(&dir.join("files-created.txt"), files.as_bytes())?;
    Ok(dir)
}
