//! Engine configuration.
//!
//! Defaults the engine applies when a descriptor is silent: page sizes,
//! placeholders, date patterns and the search debounce. They are passed
//! explicitly into every component; nothing reads them from global state.
//! The optional `engine.toml` lives in the platform config directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Runtime configuration, optionally loaded from `engine.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub query: QueryDefaults,

    #[serde(default)]
    pub format: FormatDefaults,

    #[serde(default)]
    pub session: SessionDefaults,
}

impl EngineConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from a file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(source) => Self::from_toml_str(&source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(e.to_string())),
        }
    }

    /// Load from the platform config directory.
    pub fn load() -> Result<Self, ConfigError> {
        let path = engine_config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }
}

/// Pagination defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    /// Page size when neither the toolbar state nor the descriptor sets one.
    pub default_page_size: usize,
    /// Upper bound for pages without `pageSizeOptions`.
    pub max_page_size: usize,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            max_page_size: 500,
        }
    }
}

/// Formatting defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatDefaults {
    /// Shown for null, missing and non-numeric values.
    pub empty_placeholder: String,
    pub date_pattern: String,
    pub datetime_pattern: String,
    /// Badge colour for values absent from a `colorMap`.
    pub badge_default_color: String,
}

impl Default for FormatDefaults {
    fn default() -> Self {
        Self {
            empty_placeholder: "—".to_string(),
            date_pattern: "%b %-d, %Y".to_string(),
            datetime_pattern: "%b %-d, %Y %H:%M".to_string(),
            badge_default_color: "gray".to_string(),
        }
    }
}

/// Page session defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub search_debounce_ms: u64,
}

impl SessionDefaults {
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            search_debounce_ms: 300,
        }
    }
}

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pageview"))
}

/// Get the path to engine.toml.
pub fn engine_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("engine.toml"))
}
