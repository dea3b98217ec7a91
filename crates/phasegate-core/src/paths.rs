use crate::error::{FlowError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const PHASEGATE_DIR: &str = ".phasegate";
pub const SESSIONS_DIR: &str = ".phasegate/sessions";

pub const CONFIG_FILE: &str = ".phasegate/config.yaml";
pub const STATE_FILE: &str = ".phasegate/state.yaml";
pub const LOCK_FILE: &str = ".phasegate/state.lock";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn phasegate_dir(root: &Path) -> PathBuf {
    root.join(PHASEGATE_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

pub fn lock_path(root: &Path) -> PathBuf {
    root.join(LOCK_FILE)
}

pub fn sessions_dir(root: &Path) -> PathBuf {
    root.join(SESSIONS_DIR)
}

/// Archive directory for a finished workflow, e.g. `.phasegate/sessions/brandfetch-20260102-101500`.
pub fn session_archive_dir(root: &Path, name: &str, stamp: &str) -> PathBuf {
    sessions_dir(root).join(format!("{name}-{stamp}"))
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(FlowError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Lowercase `text`, collapse every run of non-alphanumerics into a single
/// hyphen and cap the result at `max_words` words.
pub fn slugify(text: &str, max_words: usize) -> String {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(max_words)
        .collect();
    words.join("-")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
