use crate::cmd::open_store;
use crate::output::print_json;
use chrono::Utc;
use clap::Subcommand;
use phasegate_core::{config::Config, session};
use std::path::Path;

#[derive(Subcommand)]
pub enum SessionSubcommand {
    /// Show what a new session should resume
    Start,
    /// Check completion of the active workflow and mark it interrupted if unfinished
    End {
        /// Archive the active workflow under .phasegate/sessions/
        #[arg(long)]
        archive: bool,
    },
}

pub fn run(root: &Path, subcmd: SessionSubcommand, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    match subcmd {
        SessionSubcommand::Start => {
            let summary = session::session_start(&store, &Config::load_or_default(root))?;
            if json {
                return print_json(&summary);
            }
            match &summary.active {
                Some(name) => {
                    let phase = summary
                        .current_phase
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "done".to_string());
                    println!("Active: {name} at {phase} (turn {})", summary.turn_count);
                    if let Some(decisions) = &summary.decisions {
                        println!("  decisions: {decisions}");
                    }
                    if let Some(pct) = summary.coverage_percent {
                        println!("  scope coverage: {pct}%");
                    }
                    if summary.reground_due {
                        println!("  re-ground: review decisions before continuing");
                    }
                }
                None => println!("No active workflow."),
            }
            for wf in &summary.interrupted {
                let phase = wf.phase.map(|p| p.to_string()).unwrap_or_default();
                println!("Interrupted: {} {phase}", wf.name);
            }
            Ok(())
        }
        SessionSubcommand::End { archive } => {
            let report = session::session_end(&store, archive, Utc::now())?;
            if json {
                return print_json(&report);
            }
            let Some(name) = &report.workflow else {
                println!("No active workflow.");
                return Ok(());
            };
            match &report.completion {
                Some(c) if report.interrupted => {
                    println!("{name}: incomplete, marked interrupted");
                    for reason in &c.reasons {
                        println!("  - {reason}");
                    }
                }
                _ => println!("{name}: complete"),
            }
            if let Some(dir) = &report.archived_to {
                println!("Archived to {}", dir.display());
            }
            Ok(())
        }
    }
}
