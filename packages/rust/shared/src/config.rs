//! Application configuration for recap.
//!
//! User config lives at `~/.recap/recap.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RecapError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "recap.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".recap";

// ---------------------------------------------------------------------------
// Config structs (matching recap.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Action extraction tuning.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Resource recommendation settings.
    #[serde(default)]
    pub recommendation: RecommendationConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default artifact output directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Number of meetings processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output_dir() -> String {
    "recap-output".into()
}
fn default_concurrency() -> usize {
    4
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Items scoring at or below this confidence are discarded.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Added once when any matched rule is a modal/imperative marker.
    #[serde(default = "default_bonus")]
    pub modal_bonus: f64,

    /// Added once when a second-person trigger names another participant.
    #[serde(default = "default_bonus")]
    pub addressee_bonus: f64,

    /// Collapse action items with the same normalized description.
    #[serde(default = "default_true")]
    pub merge_duplicates: bool,

    /// Optional TOML rule table; the built-in table is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            modal_bonus: default_bonus(),
            addressee_bonus: default_bonus(),
            merge_duplicates: true,
            rules_path: None,
        }
    }
}

fn default_min_confidence() -> f64 {
    0.2
}
fn default_bonus() -> f64 {
    0.15
}
fn default_true() -> bool {
    true
}

/// `[recommendation]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationConfig {
    /// Optional TOML resource catalog; the built-in catalog is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_base_path: Option<String>,
}

impl AppConfig {
    /// Reject numeric settings that would make scoring meaningless.
    pub fn validate(&self) -> Result<()> {
        let ex = &self.extraction;
        if !(0.0..1.0).contains(&ex.min_confidence) {
            return Err(RecapError::config(format!(
                "extraction.min_confidence must be in [0, 1), got {}",
                ex.min_confidence
            )));
        }
        for (name, value) in [
            ("modal_bonus", ex.modal_bonus),
            ("addressee_bonus", ex.addressee_bonus),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(RecapError::config(format!(
                    "extraction.{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.defaults.concurrency == 0 {
            return Err(RecapError::config("defaults.concurrency must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.recap/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| RecapError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.recap/recap.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RecapError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| RecapError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RecapError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RecapError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RecapError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
