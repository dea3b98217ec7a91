use crate::cmd::open_store;
use crate::output::print_json;
use chrono::Utc;
use phasegate_core::{
    config::Config, event::ActionDescriptor, gate::evaluate, hooks::PermissionResponse,
    types::ActionKind,
};
use std::path::Path;

pub fn run(
    root: &Path,
    path: Option<&str>,
    action: &str,
    workflow: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let kind: ActionKind = action.parse()?;
    let store = open_store(root)?;
    let config = Config::load_or_default(root);
    let doc = store.load()?;
    let instance = match workflow {
        Some(name) => Some(doc.workflow(name)?),
        None => doc.active_workflow(),
    };

    let descriptor = ActionDescriptor {
        kind,
        target: path.map(str::to_string),
        payload: None,
    };
    let decision = evaluate(&descriptor, instance, &config, Utc::now());

    if json {
        print_json(&PermissionResponse::from(&decision))?;
    } else {
        println!("{}", decision.decision);
        if let Some(message) = &decision.message {
            println!("  {message}");
        }
        for reason in decision.reason_strings() {
            println!("  - {reason}");
        }
    }

    if !decision.is_allowed() {
        let guard = decision.guard.as_deref().unwrap_or("gate");
        anyhow::bail!("{guard} denied {kind}");
    }
    Ok(())
}
