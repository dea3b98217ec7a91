use crate::cmd::open_store;
use crate::output::{print_json, print_table};
use phasegate_core::{
    config::Config,
    gate::{evaluate_completion, phase_conditions},
    state::StateDocument,
    workflow::WorkflowInstance,
};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    let doc = store.load()?;

    let wf = match name {
        Some(n) => Some(doc.workflow(n)?),
        None => doc.active_workflow(),
    };
    match wf {
        Some(wf) => show_workflow(wf, &Config::load_or_default(root), json),
        None => list_workflows(&doc, json),
    }
}

// ---------------------------------------------------------------------------
// No active workflow
// ---------------------------------------------------------------------------

fn list_workflows(doc: &StateDocument, json: bool) -> anyhow::Result<()> {
    if json {
        let items: Vec<serde_json::Value> = doc
            .workflows
            .values()
            .map(|wf| {
                serde_json::json!({
                    "name": wf.name,
                    "kind": wf.kind,
                    "current_phase": wf.current_phase(),
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "active": doc.active,
            "workflows": items,
        }));
    }

    if doc.workflows.is_empty() {
        println!("No workflows. Start one with `phasegate start <name>`.");
        return Ok(());
    }
    println!("No active workflow.\n");
    let rows = doc
        .workflows
        .values()
        .map(|wf| {
            vec![
                wf.name.clone(),
                wf.kind.to_string(),
                wf.current_phase()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "done".to_string()),
            ]
        })
        .collect();
    print_table(&["NAME", "KIND", "PHASE"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// One workflow
// ---------------------------------------------------------------------------

fn show_workflow(wf: &WorkflowInstance, config: &Config, json: bool) -> anyhow::Result<()> {
    let completion = evaluate_completion(wf);

    if json {
        return print_json(&serde_json::json!({
            "workflow": wf,
            "completion": completion,
        }));
    }

    println!("Workflow: {} ({})", wf.name, wf.kind);
    if let Some(phase) = wf.current_phase() {
        println!("Phase:    {phase}");
    }
    println!("Turns:    {}", wf.turn_count);
    println!();

    let rows = wf
        .registry()
        .phases
        .iter()
        .map(|spec| {
            let checkpoint = wf
                .phase(spec.phase)
                .and_then(|s| s.checkpoint.as_ref())
                .map(|cp| cp.stage().to_string())
                .unwrap_or_else(|| "-".to_string());
            let blockers: Vec<String> = phase_conditions(wf, spec.phase, config)
                .iter()
                .map(|c| c.to_string())
                .collect();
            vec![
                spec.phase.to_string(),
                spec.requirement.to_string(),
                wf.status(spec.phase).to_string(),
                checkpoint,
                if blockers.is_empty() {
                    "-".to_string()
                } else {
                    blockers.join("; ")
                },
            ]
        })
        .collect();
    print_table(&["PHASE", "REQUIREMENT", "STATUS", "CHECKPOINT", "BLOCKERS"], rows);

    if let Some(summary) = wf.decision_summary() {
        println!("\nDecisions: {summary}");
    }
    println!("Scope coverage: {}%", completion.coverage_percent);
    let undecided = wf.scope.undecided();
    if !undecided.is_empty() {
        println!("Undecided: {}", undecided.join(", "));
    }
    if !completion.warnings.is_empty() {
        let warnings: Vec<String> = completion.warnings.iter().map(|c| c.to_string()).collect();
        println!("Recommended, not done: {}", warnings.join(", "));
    }
    Ok(())
}
