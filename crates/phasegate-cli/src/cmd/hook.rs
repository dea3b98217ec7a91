//! Host hook transport. Every handler reads one JSON payload from stdin and
//! writes one JSON line to stdout. Hooks never fail the host: unreadable
//! input allows the action and the process exits zero.

use crate::output::print_json_line;
use chrono::Utc;
use clap::Subcommand;
use phasegate_core::{
    config::Config,
    gate::GateDecision,
    hooks::{self, HookInput, PermissionResponse, PostActionReport},
    store::StateStore,
};
use std::io::Read;
use std::path::Path;

#[derive(Subcommand)]
pub enum HookSubcommand {
    /// Gate a pending tool call
    PreAction,
    /// Record the effects of a finished tool call
    PostAction,
    /// Print the resume summary for a new session
    SessionStart,
    /// Completion check and interruption marker at session end
    SessionEnd {
        /// Archive the active workflow under .phasegate/sessions/
        #[arg(long)]
        archive: bool,
    },
}

pub fn run(root: &Path, subcmd: HookSubcommand) -> anyhow::Result<()> {
    let store = StateStore::new(root);
    let config = Config::load_or_default(root);
    let input = read_input();

    match subcmd {
        HookSubcommand::PreAction => {
            let decision = match &input {
                Some(input) => hooks::pre_action(&store, &config, input, Utc::now()),
                None => GateDecision::allow(None),
            };
            print_json_line(&PermissionResponse::from(&decision))
        }
        HookSubcommand::PostAction => {
            let report = match &input {
                Some(input) => hooks::post_action(&store, &config, input),
                None => PostActionReport::default(),
            };
            print_json_line(&report)
        }
        HookSubcommand::SessionStart => {
            print_json_line(&hooks::session_start(&store, &config))
        }
        HookSubcommand::SessionEnd { archive } => {
            match hooks::session_end(&store, archive, Utc::now()) {
                Some(report) => print_json_line(&report),
                None => print_json_line(&serde_json::json!({ "workflow": null })),
            }
        }
    }
}

/// The stdin payload, or `None` when it cannot be read or parsed.
fn read_input() -> Option<HookInput> {
    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        tracing::warn!(error = %e, "failed to read hook input");
        return None;
    }
    HookInput::parse(&raw)
        .map_err(|e| tracing::warn!(error = %e, "malformed hook input, allowing"))
        .ok()
}
