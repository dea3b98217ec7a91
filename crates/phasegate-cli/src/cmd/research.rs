use crate::cmd::open_store;
use crate::output::print_json;
use clap::Subcommand;
use phasegate_core::{event::ResearchSource, freshness::parse_timestamp};
use std::path::Path;

#[derive(Subcommand)]
pub enum ResearchSubcommand {
    /// Append a source to the workflow's current research phase
    Add {
        /// Source kind, e.g. web_search, web_fetch, docs
        kind: String,
        /// Query, URL or library identifier
        identifier: String,
        /// RFC 3339 timestamp (default: now)
        #[arg(long)]
        at: Option<String>,
    },
}

pub fn run(
    root: &Path,
    workflow: Option<&str>,
    subcmd: ResearchSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(root)?;
    match subcmd {
        ResearchSubcommand::Add {
            kind,
            identifier,
            at,
        } => {
            let timestamp = match at.as_deref() {
                Some(raw) => Some(
                    parse_timestamp(raw)
                        .ok_or_else(|| anyhow::anyhow!("invalid timestamp '{raw}'"))?,
                ),
                None => None,
            };
            let source = ResearchSource {
                kind,
                identifier,
                timestamp,
            };
            let phase = store.record_source(workflow, &source)?;
            if json {
                print_json(&serde_json::json!({ "phase": phase, "source": source }))
            } else {
                println!("{phase}: recorded {} '{}'", source.kind, source.identifier);
                Ok(())
            }
        }
    }
}
