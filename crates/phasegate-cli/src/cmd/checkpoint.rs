use crate::cmd::open_store;
use crate::output::{mark, print_json};
use anyhow::Context;
use clap::Subcommand;
use phasegate_core::{
    checkpoint::CheckpointField,
    config::Config,
    event::{DecisionCapture, OfferedOption},
    store::StateStore,
    types::{DecisionCategory, Phase, QuestionType, StructuredResponse},
};
use std::path::Path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum CheckpointSubcommand {
    /// Show a phase's status and checkpoint flags
    Show {
        /// Phase (default: current phase)
        phase: Option<String>,
    },

    /// Record that the phase's proposal was shown to the human
    Propose { phase: Option<String> },

    /// Record that a question was asked
    Ask {
        phase: Option<String>,
        /// exit_confirmation, data_collection or clarification
        #[arg(long = "type", value_name = "TYPE", default_value = "exit_confirmation")]
        question_type: String,
    },

    /// Set one checkpoint flag directly
    Set {
        phase: String,
        /// proposal_shown, question_asked, user_responded or exit_confirmed
        field: String,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },

    /// Record the human's answer to a question
    Respond {
        /// Phase the question belongs to (default: current phase)
        phase: Option<String>,
        #[arg(long)]
        question: String,
        #[arg(long, default_value = "")]
        reply: String,
        /// Offered option as VALUE or VALUE=LABEL (repeatable)
        #[arg(long = "option", value_name = "OPTION")]
        options: Vec<String>,
        /// Structured verdict: approve, request_changes or abort
        #[arg(long)]
        response: Option<String>,
        /// Feature this answer decides
        #[arg(long)]
        feature: Option<String>,
        /// Scope category: implement, skip or defer
        #[arg(long)]
        category: Option<String>,
        /// Decision key (default: derived from the question)
        #[arg(long)]
        key: Option<String>,
    },

    /// Send a phase back to in-progress
    Loopback { phase: String },

    /// Complete a phase if its gates are satisfied
    Complete { phase: String },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
    workflow: Option<&str>,
    subcmd: CheckpointSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(root)?;
    match subcmd {
        CheckpointSubcommand::Show { phase } => {
            let phase = resolve_phase(&store, workflow, phase.as_deref())?;
            show(&store, workflow, phase, json)
        }
        CheckpointSubcommand::Propose { phase } => {
            let phase = resolve_phase(&store, workflow, phase.as_deref())?;
            store.show_proposal(workflow, phase)?;
            done(json, phase, "proposal shown")
        }
        CheckpointSubcommand::Ask {
            phase,
            question_type,
        } => {
            let phase = resolve_phase(&store, workflow, phase.as_deref())?;
            let qt: QuestionType = question_type.parse()?;
            store.ask_question(workflow, phase, qt)?;
            done(json, phase, &format!("{qt} question asked"))
        }
        CheckpointSubcommand::Set {
            phase,
            field,
            value,
        } => {
            let phase: Phase = phase.parse()?;
            let field: CheckpointField = field.parse()?;
            store.set_checkpoint_field(workflow, phase, field, value)?;
            done(json, phase, &format!("{}={value}", field.as_str()))
        }
        CheckpointSubcommand::Respond {
            phase,
            question,
            reply,
            options,
            response,
            feature,
            category,
            key,
        } => {
            let phase = resolve_phase(&store, workflow, phase.as_deref())?;
            let capture = DecisionCapture {
                prompt_text: question,
                offered_options: options.iter().map(|o| parse_option(o)).collect(),
                human_reply_text: reply,
                phase: Some(phase),
                feature,
                category: category
                    .map(|c| c.parse::<DecisionCategory>())
                    .transpose()?,
                decision_key: key,
                response: response
                    .map(|r| r.parse::<StructuredResponse>())
                    .transpose()?,
            };
            respond(&store, workflow, &capture, &Config::load_or_default(root), json)
        }
        CheckpointSubcommand::Loopback { phase } => {
            let phase: Phase = phase.parse()?;
            store.loopback(workflow, phase)?;
            done(json, phase, "looped back to in_progress")
        }
        CheckpointSubcommand::Complete { phase } => {
            let phase: Phase = phase.parse()?;
            store
                .complete_phase(workflow, phase, &Config::load_or_default(root))
                .with_context(|| format!("cannot complete {phase}"))?;
            done(json, phase, "complete")
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The named phase, or the workflow's first incomplete phase.
fn resolve_phase(
    store: &StateStore,
    workflow: Option<&str>,
    phase: Option<&str>,
) -> anyhow::Result<Phase> {
    if let Some(p) = phase {
        return Ok(p.parse()?);
    }
    let doc = store.load()?;
    let name = doc.resolve_name(workflow)?;
    doc.workflow(&name)?
        .current_phase()
        .ok_or_else(|| anyhow::anyhow!("workflow '{name}' has no incomplete phase; name one explicitly"))
}

/// `VALUE` or `VALUE=LABEL`.
fn parse_option(raw: &str) -> OfferedOption {
    match raw.split_once('=') {
        Some((value, label)) => OfferedOption {
            value: value.trim().to_string(),
            label: label.trim().to_string(),
        },
        None => OfferedOption {
            value: raw.trim().to_string(),
            label: raw.trim().to_string(),
        },
    }
}

fn done(json: bool, phase: Phase, what: &str) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({ "phase": phase, "result": what }))
    } else {
        println!("{phase}: {what}");
        Ok(())
    }
}

fn show(store: &StateStore, workflow: Option<&str>, phase: Phase, json: bool) -> anyhow::Result<()> {
    let state = store.get_phase(workflow, phase)?;
    if json {
        return print_json(&serde_json::json!({ "phase": phase, "state": state }));
    }

    println!("{phase}: {}", state.status);
    let Some(cp) = &state.checkpoint else {
        println!("  (no checkpoint)");
        return Ok(());
    };
    println!("  stage: {}", cp.stage());
    for (name, flag) in cp.flags() {
        println!("  [{}] {name}", mark(flag));
    }
    if let Some(response) = &cp.user_response {
        println!("  response: {response}");
    }
    if cp.loopbacks > 0 {
        println!("  loopbacks: {}", cp.loopbacks);
    }
    Ok(())
}

fn respond(
    store: &StateStore,
    workflow: Option<&str>,
    capture: &DecisionCapture,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    let record = store.record_answer(workflow, capture, config)?;
    if json {
        return print_json(&record);
    }
    println!("{}: {:?} ({})", record.phase, record.outcome, record.question_type);
    println!("  decision: {}", record.decision_key);
    if let (Some(feature), Some(category)) = (&record.feature, record.category) {
        println!("  scope:    {feature} -> {category}");
    }
    if record.completed {
        println!("  {} complete", record.phase);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_with_and_without_label() {
        let o = parse_option("openai=OpenAI");
        assert_eq!(o.value, "openai");
        assert_eq!(o.label, "OpenAI");
        let o = parse_option("yes");
        assert_eq!(o.value, "yes");
        assert_eq!(o.label, "yes");
    }
}
