//! Inputs supplied by the host and its collaborators.

use crate::types::{ActionKind, DecisionCategory, Phase, StructuredResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An attempted host action, e.g. "write file X".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "targetPath")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ActionDescriptor {
    pub fn new(kind: ActionKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: Some(target.into()),
            payload: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferedOption {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub label: String,
}

/// A human's answer to a structured question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionCapture {
    #[serde(alias = "promptText", alias = "question")]
    pub prompt_text: String,
    #[serde(default, alias = "offeredOptions", alias = "options")]
    pub offered_options: Vec<OfferedOption>,
    #[serde(default, alias = "humanReplyText", alias = "reply")]
    pub human_reply_text: String,
    /// Phase the question belongs to; defaults to the first incomplete phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Explicit feature identifier for scope decisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<DecisionCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "decisionKey")]
    pub decision_key: Option<String>,
    /// Structured verdict; overrides lexical classification when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<StructuredResponse>,
}

impl DecisionCapture {
    pub fn option_labels(&self) -> Vec<&str> {
        self.offered_options
            .iter()
            .map(|o| if o.label.is_empty() { o.value.as_str() } else { o.label.as_str() })
            .collect()
    }

    /// The offered option the reply picked, matched on value or label.
    pub fn selected_option(&self) -> Option<&str> {
        let reply = self.human_reply_text.trim().to_lowercase();
        if reply.is_empty() {
            return None;
        }
        let exact = self.offered_options.iter().find(|o| {
            o.value.to_lowercase() == reply || o.label.to_lowercase() == reply
        });
        exact
            .or_else(|| {
                self.offered_options
                    .iter()
                    .find(|o| !o.label.is_empty() && reply.contains(&o.label.to_lowercase()))
            })
            .map(|o| if o.value.is_empty() { o.label.as_str() } else { o.value.as_str() })
    }

    pub fn is_structured(&self) -> bool {
        !self.offered_options.is_empty()
    }
}

/// One research source appended by a research collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchSource {
    pub kind: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
