use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("not initialized: run 'phasegate init'")]
    NotInitialized,

    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("workflow already exists: {0}")]
    WorkflowExists(String),

    #[error("no active workflow: run 'phasegate start <name>'")]
    NoActiveWorkflow,

    #[error("invalid workflow name '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidName(String),

    #[error("invalid phase: {0}")]
    InvalidPhase(String),

    #[error("phase '{phase}' is not part of a {kind} workflow")]
    PhaseNotInWorkflow { phase: String, kind: String },

    #[error("invalid {field} '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("invalid workflow kind: {0}")]
    InvalidWorkflowKind(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("phase '{phase}' requires '{prerequisite}' to be complete")]
    PrerequisiteIncomplete { phase: String, prerequisite: String },

    #[error("phase '{0}' has no confirmed exit: the human has not approved it")]
    CheckpointNotConfirmed(String),

    #[error("phase '{phase}' needs {name} >= {minimum} (has {actual})")]
    QuantityShortfall {
        phase: String,
        name: String,
        actual: u32,
        minimum: u32,
    },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("state is locked by another invocation: {0}")]
    StateLocked(String),

    #[error("state changed underneath this invocation (expected revision {expected}, found {found})")]
    ConcurrentModification { expected: u64, found: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
