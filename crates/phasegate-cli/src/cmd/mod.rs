pub mod checkpoint;
pub mod config;
pub mod file;
pub mod gate;
pub mod generate;
pub mod hook;
pub mod init;
pub mod research;
pub mod scope;
pub mod session;
pub mod status;
pub mod workflow;

use phasegate_core::store::StateStore;
use std::path::Path;

/// A store for `root`, refusing to operate on an uninitialized project.
pub fn open_store(root: &Path) -> anyhow::Result<StateStore> {
    let store = StateStore::new(root);
    if !store.is_initialized() {
        anyhow::bail!("not initialized: run `phasegate init` first");
    }
    Ok(store)
}
