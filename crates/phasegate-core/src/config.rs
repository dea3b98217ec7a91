use crate::error::{FlowError, Result};
use crate::freshness::DEFAULT_THRESHOLD_DAYS;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessConfig {
    #[serde(default = "default_threshold_days")]
    pub threshold_days: u32,
    #[serde(default = "default_true")]
    pub enforce: bool,
}

fn default_threshold_days() -> u32 {
    DEFAULT_THRESHOLD_DAYS
}

fn default_true() -> bool {
    true
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            threshold_days: default_threshold_days(),
            enforce: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_min_sources")]
    pub min_sources: u32,
}

fn default_min_sources() -> u32 {
    2
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            min_sources: default_min_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    #[serde(default = "default_min_questions")]
    pub min_questions: u32,
    /// How many of those questions must offer explicit options.
    #[serde(default = "default_min_structured")]
    pub min_structured: u32,
}

fn default_min_questions() -> u32 {
    5
}

fn default_min_structured() -> u32 {
    3
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            min_questions: default_min_questions(),
            min_structured: default_min_structured(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Remind the agent of the workflow context every N tracked turns.
    #[serde(default = "default_reground_interval")]
    pub reground_interval: u32,
}

fn default_reground_interval() -> u32 {
    7
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reground_interval: default_reground_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_enum_cap")]
    pub enum_cap: usize,
}

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_api_prefix() -> String {
    "/api/v2".to_string()
}

fn default_enum_cap() -> usize {
    4
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_prefix: default_api_prefix(),
            enum_cap: default_enum_cap(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub interview: InterviewConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Config::new("project")
    }
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
            },
            freshness: FreshnessConfig::default(),
            research: ResearchConfig::default(),
            interview: InterviewConfig::default(),
            session: SessionConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(FlowError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load the project config, falling back to defaults when it is missing
    /// or unreadable. Used by host hooks, which must never fail.
    pub fn load_or_default(root: &Path) -> Self {
        match Config::load(root) {
            Ok(cfg) => cfg,
            Err(FlowError::NotInitialized) => Config::default(),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable config, using defaults");
                Config::default()
            }
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.freshness.enforce && self.freshness.threshold_days == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "freshness.threshold_days is 0: any research older than a day blocks writes"
                    .to_string(),
            });
        }
        if self.research.min_sources == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "research.min_sources is 0: research can complete without any source"
                    .to_string(),
            });
        }
        if self.interview.min_structured > self.interview.min_questions {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "interview.min_structured ({}) exceeds interview.min_questions ({})",
                    self.interview.min_structured, self.interview.min_questions
                ),
            });
        }
        if self.session.reground_interval == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "session.reground_interval is 0: re-ground reminders are disabled"
                    .to_string(),
            });
        }
        if self.generator.enum_cap == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "generator.enum_cap must be at least 1".to_string(),
            });
        }
        let url = &self.generator.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("generator.base_url '{url}' must start with http:// or https://"),
            });
        }
        if !self.generator.api_prefix.is_empty() && !self.generator.api_prefix.starts_with('/') {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "generator.api_prefix '{}' should start with '/'",
                    self.generator.api_prefix
                ),
            });
        }

        warnings
    }
}
