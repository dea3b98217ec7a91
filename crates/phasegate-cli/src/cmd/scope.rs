use crate::cmd::open_store;
use crate::output::{print_json, print_table};
use clap::Subcommand;
use phasegate_core::types::DecisionCategory;
use std::path::Path;

#[derive(Subcommand)]
pub enum ScopeSubcommand {
    /// Record an outcome for a feature (discovers it if new)
    Decide {
        feature: String,
        /// implement, skip, defer, or unknown (discover only)
        category: String,
    },

    /// Show discovered features and their outcomes
    Show,
}

pub fn run(
    root: &Path,
    workflow: Option<&str>,
    subcmd: ScopeSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let store = open_store(root)?;
    match subcmd {
        ScopeSubcommand::Decide { feature, category } => {
            let category: DecisionCategory = category.parse()?;
            store.record_scope_decision(workflow, &feature, category)?;
            if json {
                print_json(&serde_json::json!({ "feature": feature, "category": category }))
            } else {
                println!("{feature} -> {category}");
                Ok(())
            }
        }
        ScopeSubcommand::Show => {
            let doc = store.load()?;
            let name = doc.resolve_name(workflow)?;
            let scope = &doc.workflow(&name)?.scope;
            if json {
                return print_json(&serde_json::json!({
                    "scope": scope,
                    "undecided": scope.undecided(),
                    "coverage_percent": scope.coverage_percent(),
                }));
            }
            if scope.discovered.is_empty() {
                println!("No features discovered.");
                return Ok(());
            }
            let rows = scope
                .discovered
                .iter()
                .map(|f| {
                    vec![
                        f.name.clone(),
                        scope
                            .outcome(&f.name)
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "undecided".to_string()),
                    ]
                })
                .collect();
            print_table(&["FEATURE", "OUTCOME"], rows);
            println!("\nCoverage: {}%", scope.coverage_percent());
            Ok(())
        }
    }
}
