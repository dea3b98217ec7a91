use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Disambiguation,
    Scope,
    ResearchInitial,
    Interview,
    ResearchDeep,
    SchemaCreation,
    EnvironmentCheck,
    TddRed,
    TddGreen,
    Verify,
    TddRefactor,
    Documentation,
}

impl Phase {
    /// Canonical order shared by every workflow kind.
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Disambiguation,
            Phase::Scope,
            Phase::ResearchInitial,
            Phase::Interview,
            Phase::ResearchDeep,
            Phase::SchemaCreation,
            Phase::EnvironmentCheck,
            Phase::TddRed,
            Phase::TddGreen,
            Phase::Verify,
            Phase::TddRefactor,
            Phase::Documentation,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Disambiguation => "disambiguation",
            Phase::Scope => "scope",
            Phase::ResearchInitial => "research_initial",
            Phase::Interview => "interview",
            Phase::ResearchDeep => "research_deep",
            Phase::SchemaCreation => "schema_creation",
            Phase::EnvironmentCheck => "environment_check",
            Phase::TddRed => "tdd_red",
            Phase::TddGreen => "tdd_green",
            Phase::Verify => "verify",
            Phase::TddRefactor => "tdd_refactor",
            Phase::Documentation => "documentation",
        }
    }

    pub fn is_research(self) -> bool {
        matches!(self, Phase::ResearchInitial | Phase::ResearchDeep)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = crate::error::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Phase::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| crate::error::FlowError::InvalidPhase(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// PhaseStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

impl PhaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseStatus::NotStarted => "not_started",
            PhaseStatus::InProgress => "in_progress",
            PhaseStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkflowKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    #[default]
    Api,
    Combine,
    UiComponent,
    UiPage,
}

impl WorkflowKind {
    pub fn all() -> &'static [WorkflowKind] {
        &[
            WorkflowKind::Api,
            WorkflowKind::Combine,
            WorkflowKind::UiComponent,
            WorkflowKind::UiPage,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowKind::Api => "api",
            WorkflowKind::Combine => "combine",
            WorkflowKind::UiComponent => "ui_component",
            WorkflowKind::UiPage => "ui_page",
        }
    }

    pub fn is_ui(self) -> bool {
        matches!(self, WorkflowKind::UiComponent | WorkflowKind::UiPage)
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowKind {
    type Err = crate::error::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(WorkflowKind::Api),
            "combine" => Ok(WorkflowKind::Combine),
            "ui_component" | "ui-component" | "component" => Ok(WorkflowKind::UiComponent),
            "ui_page" | "ui-page" | "page" => Ok(WorkflowKind::UiPage),
            _ => Err(crate::error::FlowError::InvalidWorkflowKind(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Requirement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// Blocks workflow completion.
    Required,
    /// Warns only.
    Recommended,
}

impl Requirement {
    pub fn as_str(self) -> &'static str {
        match self {
            Requirement::Required => "required",
            Requirement::Recommended => "recommended",
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Write,
    Edit,
    Read,
    AskUser,
    WebSearch,
    WebFetch,
    DocsLookup,
    Other,
}

impl ActionKind {
    /// Map a host tool name (`Write`, `MultiEdit`, `mcp__context7__get-library-docs`, ...)
    /// onto an action kind. Unknown tools map to [`ActionKind::Other`].
    pub fn from_tool_name(tool: &str) -> ActionKind {
        match tool {
            "Write" => ActionKind::Write,
            "Edit" | "MultiEdit" | "NotebookEdit" => ActionKind::Edit,
            "Read" => ActionKind::Read,
            "AskUserQuestion" => ActionKind::AskUser,
            "WebSearch" => ActionKind::WebSearch,
            "WebFetch" => ActionKind::WebFetch,
            t if t.starts_with("mcp__context7") => ActionKind::DocsLookup,
            t => t.parse().unwrap_or(ActionKind::Other),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Write => "write",
            ActionKind::Edit => "edit",
            ActionKind::Read => "read",
            ActionKind::AskUser => "ask_user",
            ActionKind::WebSearch => "web_search",
            ActionKind::WebFetch => "web_fetch",
            ActionKind::DocsLookup => "docs_lookup",
            ActionKind::Other => "other",
        }
    }

    /// Only file mutations are guarded by phase gates.
    pub fn is_guarded(self) -> bool {
        matches!(self, ActionKind::Write | ActionKind::Edit)
    }

    pub fn is_research(self) -> bool {
        matches!(
            self,
            ActionKind::WebSearch | ActionKind::WebFetch | ActionKind::DocsLookup
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = crate::error::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "write" => Ok(ActionKind::Write),
            "edit" => Ok(ActionKind::Edit),
            "read" => Ok(ActionKind::Read),
            "ask_user" | "ask-user" => Ok(ActionKind::AskUser),
            "web_search" | "web-search" => Ok(ActionKind::WebSearch),
            "web_fetch" | "web-fetch" => Ok(ActionKind::WebFetch),
            "docs_lookup" | "docs-lookup" => Ok(ActionKind::DocsLookup),
            "other" => Ok(ActionKind::Other),
            _ => Err(crate::error::FlowError::InvalidValue {
                field: "action kind",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// QuestionType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    ExitConfirmation,
    DataCollection,
    Clarification,
    #[default]
    Unknown,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionType::ExitConfirmation => "exit_confirmation",
            QuestionType::DataCollection => "data_collection",
            QuestionType::Clarification => "clarification",
            QuestionType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = crate::error::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "exit_confirmation" | "exit" => Ok(QuestionType::ExitConfirmation),
            "data_collection" | "data" => Ok(QuestionType::DataCollection),
            "clarification" => Ok(QuestionType::Clarification),
            "unknown" => Ok(QuestionType::Unknown),
            _ => Err(crate::error::FlowError::InvalidValue {
                field: "question type",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCategory {
    Implement,
    Defer,
    Skip,
    Unknown,
}

impl DecisionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionCategory::Implement => "implement",
            DecisionCategory::Defer => "defer",
            DecisionCategory::Skip => "skip",
            DecisionCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DecisionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DecisionCategory {
    type Err = crate::error::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "implement" => Ok(DecisionCategory::Implement),
            "defer" => Ok(DecisionCategory::Defer),
            "skip" => Ok(DecisionCategory::Skip),
            "unknown" => Ok(DecisionCategory::Unknown),
            _ => Err(crate::error::FlowError::InvalidValue {
                field: "decision category",
                value: s.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// StructuredResponse
// ---------------------------------------------------------------------------

/// Closed response supplied directly by a decision-capture event. When
/// present it replaces lexical classification of the human's reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredResponse {
    Approve,
    RequestChanges,
    Abort,
}

impl StructuredResponse {
    pub fn as_str(self) -> &'static str {
        match self {
            StructuredResponse::Approve => "approve",
            StructuredResponse::RequestChanges => "request_changes",
            StructuredResponse::Abort => "abort",
        }
    }
}

impl fmt::Display for StructuredResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StructuredResponse {
    type Err = crate::error::FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(StructuredResponse::Approve),
            "request_changes" | "request-changes" => Ok(StructuredResponse::RequestChanges),
            "abort" => Ok(StructuredResponse::Abort),
            _ => Err(crate::error::FlowError::InvalidValue {
                field: "response",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parse_accepts_kebab_case() {
        assert_eq!("research-initial".parse::<Phase>().unwrap(), Phase::ResearchInitial);
        assert_eq!("tdd_red".parse::<Phase>().unwrap(), Phase::TddRed);
        assert!("shipping".parse::<Phase>().is_err());
    }

    #[test]
    fn phase_order_is_canonical() {
        let all = Phase::all();
        assert_eq!(all.first(), Some(&Phase::Disambiguation));
        assert_eq!(all.last(), Some(&Phase::Documentation));
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn tool_names_map_to_actions() {
        assert_eq!(ActionKind::from_tool_name("Write"), ActionKind::Write);
        assert_eq!(ActionKind::from_tool_name("MultiEdit"), ActionKind::Edit);
        assert_eq!(
            ActionKind::from_tool_name("mcp__context7__get-library-docs"),
            ActionKind::DocsLookup
        );
        assert_eq!(ActionKind::from_tool_name("Bash"), ActionKind::Other);
        assert_eq!(ActionKind::from_tool_name("edit"), ActionKind::Edit);
    }

    #[test]
    fn kind_aliases() {
        assert_eq!("page".parse::<WorkflowKind>().unwrap(), WorkflowKind::UiPage);
        assert!("mobile".parse::<WorkflowKind>().is_err());
    }
}
