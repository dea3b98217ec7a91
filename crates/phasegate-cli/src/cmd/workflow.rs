use crate::cmd::open_store;
use crate::output::print_json;
use anyhow::Context;
use phasegate_core::types::WorkflowKind;
use std::path::Path;

pub fn start(root: &Path, name: &str, kind: &str, json: bool) -> anyhow::Result<()> {
    let kind: WorkflowKind = kind.parse()?;
    let store = open_store(root)?;
    let instance = store
        .start_workflow(name, kind)
        .with_context(|| format!("failed to start workflow '{name}'"))?;

    if json {
        return print_json(&instance);
    }
    let first = instance
        .current_phase()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("Started {kind} workflow '{name}' (active)");
    println!("  phases: {}", instance.registry().phases.len());
    println!("  next:   {first}");
    Ok(())
}

pub fn use_workflow(root: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let store = open_store(root)?;
    store.set_active(name)?;

    if json {
        return print_json(&serde_json::json!({ "active": name }));
    }
    println!("Active workflow: {name}");
    Ok(())
}
