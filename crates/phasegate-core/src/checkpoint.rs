//! Human-confirmation protocol inside a phase.
//!
//! `not_started -> proposal_shown -> question_asked -> user_responded -> exit_confirmed`,
//! with a loopback from `user_responded` to `proposal_shown` when the human
//! asks for changes. A phase with a checkpoint may only complete once
//! `exit_confirmed` is set.

use crate::error::{FlowError, Result};
use crate::types::{QuestionType, StructuredResponse};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// CheckpointState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub proposal_shown: bool,
    #[serde(default)]
    pub question_asked: bool,
    #[serde(default)]
    pub user_responded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_option: Option<String>,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub exit_confirmed: bool,
    #[serde(default)]
    pub loopbacks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStage {
    NotStarted,
    ProposalShown,
    QuestionAsked,
    UserResponded,
    ExitConfirmed,
}

impl fmt::Display for CheckpointStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckpointStage::NotStarted => "not_started",
            CheckpointStage::ProposalShown => "proposal_shown",
            CheckpointStage::QuestionAsked => "question_asked",
            CheckpointStage::UserResponded => "user_responded",
            CheckpointStage::ExitConfirmed => "exit_confirmed",
        };
        f.write_str(s)
    }
}

/// A protocol flag that may be set directly by a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointField {
    ProposalShown,
    QuestionAsked,
    UserResponded,
    ExitConfirmed,
}

impl CheckpointField {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointField::ProposalShown => "proposal_shown",
            CheckpointField::QuestionAsked => "question_asked",
            CheckpointField::UserResponded => "user_responded",
            CheckpointField::ExitConfirmed => "exit_confirmed",
        }
    }
}

impl std::str::FromStr for CheckpointField {
    type Err = FlowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.replace('-', "_").as_str() {
            "proposal_shown" => Ok(CheckpointField::ProposalShown),
            "question_asked" => Ok(CheckpointField::QuestionAsked),
            "user_responded" => Ok(CheckpointField::UserResponded),
            "exit_confirmed" => Ok(CheckpointField::ExitConfirmed),
            _ => Err(FlowError::InvalidValue {
                field: "checkpoint field",
                value: s.to_string(),
            }),
        }
    }
}

/// What a recorded answer did to the checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Stored, checkpoint unchanged otherwise (data collection or an ambiguous reply).
    Recorded,
    ExitConfirmed,
    Loopback,
    Aborted,
}

/// One answered decision request.
#[derive(Debug, Clone, Default)]
pub struct Answer<'a> {
    pub prompt: &'a str,
    pub option_labels: Vec<&'a str>,
    pub reply: &'a str,
    pub selected_option: Option<&'a str>,
    pub response: Option<StructuredResponse>,
}

impl CheckpointState {
    pub fn stage(&self) -> CheckpointStage {
        if self.exit_confirmed {
            CheckpointStage::ExitConfirmed
        } else if self.question_asked && self.user_responded {
            CheckpointStage::UserResponded
        } else if self.question_asked {
            CheckpointStage::QuestionAsked
        } else if self.proposal_shown {
            CheckpointStage::ProposalShown
        } else {
            CheckpointStage::NotStarted
        }
    }

    /// The four protocol flags in order, for deny reasons.
    pub fn flags(&self) -> [(&'static str, bool); 4] {
        [
            ("proposal_shown", self.proposal_shown),
            ("question_asked", self.question_asked),
            ("user_responded", self.user_responded),
            ("exit_confirmed", self.exit_confirmed),
        ]
    }

    /// Set one flag directly. Raising `exit_confirmed` is refused: only an
    /// answered exit-confirmation question may do that. Clearing a flag also
    /// clears every later one.
    pub fn set(&mut self, field: CheckpointField, value: bool) -> Result<()> {
        let refuse = |reason: &str| FlowError::InvalidTransition {
            from: self.stage().to_string(),
            to: field.as_str().to_string(),
            reason: reason.to_string(),
        };
        match (field, value) {
            (CheckpointField::ExitConfirmed, true) => {
                return Err(refuse("exit can only be confirmed by an affirmative answer"));
            }
            (CheckpointField::UserResponded, true) if !self.question_asked => {
                return Err(refuse("no question has been asked"));
            }
            _ => {}
        }
        match (field, value) {
            (CheckpointField::ProposalShown, v) => {
                self.proposal_shown = v;
                if !v {
                    self.question_asked = false;
                    self.user_responded = false;
                    self.exit_confirmed = false;
                }
            }
            (CheckpointField::QuestionAsked, v) => {
                self.question_asked = v;
                if !v {
                    self.user_responded = false;
                    self.exit_confirmed = false;
                }
            }
            (CheckpointField::UserResponded, v) => {
                self.user_responded = v;
                if !v {
                    self.exit_confirmed = false;
                }
            }
            (CheckpointField::ExitConfirmed, _) => self.exit_confirmed = false,
        }
        Ok(())
    }

    pub fn show_proposal(&mut self) {
        self.proposal_shown = true;
    }

    /// Issue a new decision request. Clears any previous reply.
    pub fn ask(&mut self, question_type: QuestionType) {
        self.question_asked = true;
        self.user_responded = false;
        self.user_response = None;
        self.selected_option = None;
        self.question_type = question_type;
        self.exit_confirmed = false;
    }

    /// Record an answered question and advance or loop back accordingly.
    ///
    /// A structured response is authoritative and marks the question as an
    /// exit confirmation. Without one, the prompt is classified lexically and
    /// only an unambiguous affirmative reply to an exit-confirmation question
    /// confirms the exit.
    pub fn answer(&mut self, answer: &Answer<'_>) -> AnswerOutcome {
        let question_type = match answer.response {
            Some(_) => QuestionType::ExitConfirmation,
            None => classify_question(answer.prompt, &answer.option_labels),
        };
        if question_type == QuestionType::ExitConfirmation && !self.question_asked {
            // The confirmation request itself presents the proposal.
            self.proposal_shown = true;
        }
        self.ask(question_type);

        let reply = answer.reply.trim();
        self.user_responded = !reply.is_empty() || answer.response.is_some();
        if !reply.is_empty() {
            self.user_response = Some(truncate(reply, 200));
        }
        self.selected_option = answer.selected_option.map(str::to_string);

        match answer.response {
            Some(StructuredResponse::Approve) => {
                self.exit_confirmed = true;
                AnswerOutcome::ExitConfirmed
            }
            Some(StructuredResponse::RequestChanges) => {
                self.loopback();
                AnswerOutcome::Loopback
            }
            Some(StructuredResponse::Abort) => AnswerOutcome::Aborted,
            None if question_type != QuestionType::ExitConfirmation || !self.user_responded => {
                AnswerOutcome::Recorded
            }
            None => {
                if is_affirmative(reply, &answer.option_labels) {
                    self.exit_confirmed = true;
                    AnswerOutcome::ExitConfirmed
                } else if is_change_request(reply) {
                    self.loopback();
                    AnswerOutcome::Loopback
                } else {
                    AnswerOutcome::Recorded
                }
            }
        }
    }

    /// Return to `proposal_shown`: the revised proposal must be asked about again.
    pub fn loopback(&mut self) {
        self.proposal_shown = true;
        self.question_asked = false;
        self.user_responded = false;
        self.exit_confirmed = false;
        self.loopbacks += 1;
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Lexical classification
// ---------------------------------------------------------------------------

const EXIT_PATTERNS: &[&str] = &[
    "proceed",
    "continue",
    "ready to",
    "move to",
    "is this correct",
    "all correct",
    "looks correct",
    "approve",
    "confirm",
    "complete",
    "shall i",
    "does this match",
    "ready for",
    "start tdd",
    "start tests",
    "begin",
    "next phase",
    "move on",
    "go ahead",
];

const EXIT_OPTION_PATTERNS: &[&str] = &[
    "yes",
    "proceed",
    "continue",
    "approve",
    "confirm",
    "ready",
    "looks good",
    "correct",
    "done",
    "complete",
];

const DATA_PATTERNS: &[&str] = &[
    "which",
    "what",
    "how should",
    "prefer",
    "want",
    "format",
    "handling",
    "strategy",
    "method",
];

const CLARIFY_PATTERNS: &[&str] = &["clarify", "explain", "more detail", "what do you mean"];

/// Classify a decision request from its prompt and offered option labels.
///
/// Data-collection phrasing is checked first, so a clarification request
/// that also reads as a data question ("what do you mean") classifies as
/// data collection.
pub fn classify_question(prompt: &str, option_labels: &[&str]) -> QuestionType {
    let prompt = prompt.to_lowercase();
    if EXIT_PATTERNS.iter().any(|p| prompt.contains(p)) {
        return QuestionType::ExitConfirmation;
    }
    let exit_option = option_labels.iter().any(|label| {
        let label = label.to_lowercase();
        EXIT_OPTION_PATTERNS.iter().any(|p| label.contains(p))
    });
    if exit_option {
        return QuestionType::ExitConfirmation;
    }
    if DATA_PATTERNS.iter().any(|p| prompt.contains(p)) {
        return QuestionType::DataCollection;
    }
    if CLARIFY_PATTERNS.iter().any(|p| prompt.contains(p)) {
        return QuestionType::Clarification;
    }
    QuestionType::Unknown
}

fn affirmative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:yes|yep|yeah|y|proceed|continue|approved?|confirm(?:ed)?|correct|ready|go|ok|okay|looks good|sounds good|perfect|great|fine|done|all good|lgtm)\b",
        )
        .unwrap()
    })
}

fn negative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:no|nope|not yet|not quite|change[sd]?|changing|modify|modif(?:ied|ications?)|add more|wait|hold on|don't|do not|stop)\b",
        )
        .unwrap()
    })
}

/// Does the reply express a change request (negative intent)?
pub fn is_change_request(reply: &str) -> bool {
    negative_re().is_match(&reply.to_lowercase())
}

/// Is the human's reply an unambiguous approval?
///
/// Negative-intent words win over affirmative ones, in the reply itself and
/// in any option label the reply selects.
pub fn is_affirmative(reply: &str, option_labels: &[&str]) -> bool {
    let reply = reply.trim().to_lowercase();
    if reply.is_empty() || negative_re().is_match(&reply) {
        return false;
    }
    if affirmative_re().is_match(&reply) {
        return true;
    }
    option_labels.iter().any(|label| {
        let label = label.trim().to_lowercase();
        if label.is_empty() || !(reply.contains(&label) || label.contains(&reply)) {
            return false;
        }
        !negative_re().is_match(&label) && affirmative_re().is_match(&label)
    })
}
