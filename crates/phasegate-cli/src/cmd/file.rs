use crate::cmd::open_store;
use crate::output::print_json;
use chrono::Utc;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum FileSubcommand {
    /// Record a file written by the workflow
    Track { path: String },

    /// Record the schema file produced in schema_creation
    Schema { path: String },

    /// Record how many failing tests tdd_red produced
    Tests { count: u32 },
}

pub fn run(
    root: &Path,
    workflow: Option<&str>,
    subcmd: FileSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let (key, value) = match subcmd {
        FileSubcommand::Track { path } => {
            store.track_file(workflow, &path)?;
            ("tracked", path)
        }
        FileSubcommand::Schema { path } => {
            store.mutate_workflow(workflow, |wf| wf.set_schema_file(&path, Utc::now()))?;
            ("schema_file", path)
        }
        FileSubcommand::Tests { count } => {
            store.mutate_workflow(workflow, |wf| wf.set_test_count(count, Utc::now()))?;
            ("test_count", count.to_string())
        }
    };

    if json {
        print_json(&serde_json::json!({ key: value }))
    } else {
        println!("{key}: {value}");
        Ok(())
    }
}
