//! Engine configuration
//!
//! Loaded from an optional TOML file and `UNDOSCOPE_`-prefixed environment
//! variables, in that order of precedence (environment wins).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{Result, UndoScopeError};
use crate::logging::LogLevel;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "UNDOSCOPE";

/// Configuration for the undo/redo engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of scopes kept on the undo stack (0 = unlimited)
    pub max_undo_depth: usize,
    /// Maximum number of scopes kept on the redo stack (0 = unlimited)
    pub max_redo_depth: usize,
    /// Whether new containers record inverses by default
    pub track_by_default: bool,
    /// Minimum log level for [`crate::logging::init_logging`]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_undo_depth: 100,
            max_redo_depth: 100,
            track_by_default: true,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("undoscope")
            .join("config.toml")
    }

    /// Load from the default path plus environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load from `path` (optional on disk) plus environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        let engine: EngineConfig = config.try_deserialize()?;
        engine.validate()?;
        Ok(engine)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.log_level().is_none() {
            return Err(UndoScopeError::validation_error(format!(
                "Unknown log level: {}",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Parsed log level
    pub fn log_level(&self) -> Option<LogLevel> {
        LogLevel::parse(&self.log_level)
    }
}
