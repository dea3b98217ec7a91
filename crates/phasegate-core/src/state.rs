use crate::error::{FlowError, Result};
use crate::paths;
use crate::workflow::WorkflowInstance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// StateDocument
// ---------------------------------------------------------------------------

/// The single persisted source of truth: every workflow instance keyed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Bumped on every successful write; compared before the next one.
    #[serde(default)]
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
    #[serde(default)]
    pub workflows: BTreeMap<String, WorkflowInstance>,
    pub last_updated: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Default for StateDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl StateDocument {
    pub fn new() -> Self {
        Self {
            version: 1,
            revision: 0,
            active: None,
            workflows: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::state_path(root);
        if !path.exists() {
            return Err(FlowError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let state: StateDocument = serde_yaml::from_str(&data)?;
        Ok(state)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::state_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // ---------------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------------

    pub fn workflow(&self, name: &str) -> Result<&WorkflowInstance> {
        self.workflows
            .get(name)
            .ok_or_else(|| FlowError::WorkflowNotFound(name.to_string()))
    }

    pub fn workflow_mut(&mut self, name: &str) -> Result<&mut WorkflowInstance> {
        self.workflows
            .get_mut(name)
            .ok_or_else(|| FlowError::WorkflowNotFound(name.to_string()))
    }

    /// The active instance, if one is set and still present.
    pub fn active_workflow(&self) -> Option<&WorkflowInstance> {
        self.active.as_deref().and_then(|n| self.workflows.get(n))
    }

    pub fn active_workflow_mut(&mut self) -> Result<&mut WorkflowInstance> {
        let name = self.active.clone().ok_or(FlowError::NoActiveWorkflow)?;
        self.workflow_mut(&name)
    }

    /// `name` if given, else the active instance's name.
    pub fn resolve_name(&self, name: Option<&str>) -> Result<String> {
        match name {
            Some(n) => Ok(n.to_string()),
            None => self.active.clone().ok_or(FlowError::NoActiveWorkflow),
        }
    }

    // ---------------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------------

    pub fn insert(&mut self, instance: WorkflowInstance) -> Result<()> {
        if self.workflows.contains_key(&instance.name) {
            return Err(FlowError::WorkflowExists(instance.name));
        }
        self.active = Some(instance.name.clone());
        self.workflows.insert(instance.name.clone(), instance);
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        self.workflow(name)?;
        self.active = Some(name.to_string());
        self.last_updated = Utc::now();
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<WorkflowInstance> {
        let instance = self
            .workflows
            .remove(name)
            .ok_or_else(|| FlowError::WorkflowNotFound(name.to_string()))?;
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        self.last_updated = Utc::now();
        Ok(instance)
    }
}
