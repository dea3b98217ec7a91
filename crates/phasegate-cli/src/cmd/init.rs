use crate::output::print_json;
use anyhow::Context;
use phasegate_core::{config::Config, paths, store::StateStore};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let project_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());

    let config_created = if paths::config_path(root).exists() {
        false
    } else {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
        true
    };

    let store = StateStore::new(root);
    let state_created = store.init().context("failed to write state.yaml")?;

    if json {
        return print_json(&serde_json::json!({
            "root": root.display().to_string(),
            "config_created": config_created,
            "state_created": state_created,
        }));
    }

    println!("Initializing phasegate in: {}", root.display());
    let label = |created: bool| if created { "created:" } else { "exists: " };
    println!("  {} {}", label(config_created), paths::CONFIG_FILE);
    println!("  {} {}", label(state_created), paths::STATE_FILE);
    Ok(())
}
