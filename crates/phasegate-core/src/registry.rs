//! Per-kind phase registries.
//!
//! Every workflow kind shares the canonical phase order from [`Phase::all`];
//! a kind selects a subset, marks each member required or recommended, and
//! derives its dependency chain from that selection. Registries are built
//! once and handed out as `&'static` references, so an instance's kind fixes
//! its registry for life.

use crate::types::{Phase, Requirement, WorkflowKind};
use serde::Serialize;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// PhaseSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseSpec {
    pub phase: Phase,
    pub requirement: Requirement,
    /// Whether completion needs a human-confirmed exit.
    pub checkpoint: bool,
    pub depends_on: Vec<Phase>,
}

impl PhaseSpec {
    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Registry {
    pub kind: WorkflowKind,
    pub phases: Vec<PhaseSpec>,
}

impl Registry {
    pub fn for_kind(kind: WorkflowKind) -> &'static Registry {
        static API: OnceLock<Registry> = OnceLock::new();
        static COMBINE: OnceLock<Registry> = OnceLock::new();
        static UI_COMPONENT: OnceLock<Registry> = OnceLock::new();
        static UI_PAGE: OnceLock<Registry> = OnceLock::new();
        let cell = match kind {
            WorkflowKind::Api => &API,
            WorkflowKind::Combine => &COMBINE,
            WorkflowKind::UiComponent => &UI_COMPONENT,
            WorkflowKind::UiPage => &UI_PAGE,
        };
        cell.get_or_init(|| Registry::build(kind))
    }

    fn build(kind: WorkflowKind) -> Registry {
        let mut phases: Vec<PhaseSpec> = Vec::new();
        let mut last_required: Option<Phase> = None;
        for &phase in Phase::all() {
            let Some(requirement) = membership(kind, phase) else {
                continue;
            };
            phases.push(PhaseSpec {
                phase,
                requirement,
                checkpoint: !matches!(phase, Phase::TddGreen | Phase::TddRefactor),
                depends_on: last_required.into_iter().collect(),
            });
            if requirement == Requirement::Required {
                last_required = Some(phase);
            }
        }
        Registry { kind, phases }
    }

    pub fn spec(&self, phase: Phase) -> Option<&PhaseSpec> {
        self.phases.iter().find(|s| s.phase == phase)
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.spec(phase).is_some()
    }

    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases.iter().map(|s| s.phase)
    }

    pub fn required(&self) -> impl Iterator<Item = Phase> + '_ {
        self.phases
            .iter()
            .filter(|s| s.is_required())
            .map(|s| s.phase)
    }

    pub fn prerequisites(&self, phase: Phase) -> &[Phase] {
        self.spec(phase)
            .map(|s| s.depends_on.as_slice())
            .unwrap_or(&[])
    }
}

/// Which phases a kind includes, and how strongly.
fn membership(kind: WorkflowKind, phase: Phase) -> Option<Requirement> {
    use Requirement::{Recommended, Required};
    match (kind, phase) {
        (_, Phase::TddRefactor) => Some(Recommended),
        (WorkflowKind::Api, Phase::ResearchDeep) => Some(Recommended),
        (WorkflowKind::Api | WorkflowKind::Combine, _) => Some(Required),

        (_, Phase::ResearchDeep) => None,
        (_, Phase::ResearchInitial | Phase::SchemaCreation) => Some(Recommended),
        (WorkflowKind::UiPage, Phase::EnvironmentCheck) => Some(Recommended),
        (WorkflowKind::UiComponent, Phase::EnvironmentCheck) => None,
        (_, _) => Some(Required),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_registry_covers_every_phase_in_order() {
        let reg = Registry::for_kind(WorkflowKind::Api);
        let phases: Vec<Phase> = reg.phases().collect();
        assert_eq!(phases, Phase::all());
        assert_eq!(
            reg.spec(Phase::ResearchDeep).unwrap().requirement,
            Requirement::Recommended
        );
    }

    #[test]
    fn combine_requires_deep_research() {
        let reg = Registry::for_kind(WorkflowKind::Combine);
        assert!(reg.spec(Phase::ResearchDeep).unwrap().is_required());
        assert_eq!(reg.prerequisites(Phase::SchemaCreation), &[Phase::ResearchDeep]);
    }

    #[test]
    fn dependencies_skip_recommended_phases() {
        let reg = Registry::for_kind(WorkflowKind::Api);
        assert_eq!(reg.prerequisites(Phase::SchemaCreation), &[Phase::Interview]);
        assert_eq!(reg.prerequisites(Phase::Documentation), &[Phase::Verify]);
        assert!(reg.prerequisites(Phase::Disambiguation).is_empty());
    }

    #[test]
    fn ui_component_omits_backend_phases() {
        let reg = Registry::for_kind(WorkflowKind::UiComponent);
        assert!(!reg.contains(Phase::ResearchDeep));
        assert!(!reg.contains(Phase::EnvironmentCheck));
        assert!(reg.contains(Phase::TddRed));
        let required: Vec<Phase> = reg.required().collect();
        assert!(!required.contains(&Phase::SchemaCreation));
        assert_eq!(reg.prerequisites(Phase::TddRed), &[Phase::Interview]);
    }

    #[test]
    fn ui_page_recommends_environment_check() {
        let reg = Registry::for_kind(WorkflowKind::UiPage);
        assert_eq!(
            reg.spec(Phase::EnvironmentCheck).unwrap().requirement,
            Requirement::Recommended
        );
    }

    #[test]
    fn green_and_refactor_have_no_checkpoint() {
        let reg = Registry::for_kind(WorkflowKind::Api);
        assert!(!reg.spec(Phase::TddGreen).unwrap().checkpoint);
        assert!(!reg.spec(Phase::TddRefactor).unwrap().checkpoint);
        assert!(reg.spec(Phase::Verify).unwrap().checkpoint);
    }
}
