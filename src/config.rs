use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::{entry::DEFAULT_FIELD_ORDER, pdf::ScanLimits, search::SearchSettings};

/// Environment variable naming a config file to use instead of the default location.
pub const CONFIG_ENV: &str = "PDFLU_CONFIG";

/// Settings loaded from `~/.config/pdflu/pdflu.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pdflu: GeneralConfig,
    /// The `[parsing]` table.
    pub parsing: ScanLimits,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub max_query_results: usize,
    /// Contact address sent to Crossref; empty keeps requests out of the polite pool.
    pub polite_pool_email: String,
    pub use_clipboard: bool,
    /// Lines of the first page shown on request in interactive mode.
    pub show_first_lines: usize,
    pub field_order: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            max_query_results: 10,
            polite_pool_email: String::new(),
            use_clipboard: false,
            show_first_lines: 10,
            field_order: DEFAULT_FIELD_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("pdflu")
            .join("pdflu.toml")
    }

    /// Load `explicit` if given, where any failure is an error. Otherwise load the default file,
    /// falling back to defaults when it does not exist.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if !path.exists() {
                    log::debug!("no config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                Self::load_from(&path)
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("invalid config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn search_settings(&self) -> SearchSettings {
        let email = self.pdflu.polite_pool_email.trim();
        SearchSettings {
            limit: self.pdflu.max_query_results,
            mailto: (!email.is_empty()).then(|| email.to_string()),
        }
    }
}
