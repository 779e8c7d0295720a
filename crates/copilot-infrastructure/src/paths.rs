//! Unified path management for copilot-shell files.
//!
//! Configuration lives under the platform config directory, generated plugin
//! scripts under the data directory.
//!
//! ```text
//! ~/.config/copilot-shell/         # Config directory
//! ├── config.json                  # Backend selection, endpoints, API keys
//! └── logs/                        # Daily rolling log files
//!     └── copilot.log.YYYY-MM-DD
//!
//! ~/.local/share/copilot-shell/    # Data directory
//! └── scripts/                     # Plugin generated scripts (mode 0700)
//! ```

use std::path::PathBuf;

use copilot_core::{CopilotError, Result};

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "copilot-shell";

pub struct CopilotPaths;

impl CopilotPaths {
    /// Returns the copilot-shell configuration directory.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| CopilotError::config("cannot determine the configuration directory"))
    }

    /// Returns the copilot-shell data directory.
    ///
    /// Falls back to the config directory on platforms without a data dir.
    pub fn data_dir() -> Result<PathBuf> {
        match dirs::data_dir() {
            Some(dir) => Ok(dir.join(APP_DIR)),
            None => Self::config_dir(),
        }
    }

    /// Path to `config.json`.
    ///
    /// The file carries API keys and is written with mode 0600 on Unix.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn scripts_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("scripts"))
    }

    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let config_dir = CopilotPaths::config_dir().unwrap();
        assert!(config_dir.ends_with(APP_DIR));
    }

    #[test]
    fn test_config_file() {
        let config_file = CopilotPaths::config_file().unwrap();
        assert!(config_file.ends_with("config.json"));
        assert!(config_file.starts_with(CopilotPaths::config_dir().unwrap()));
    }

    #[test]
    fn test_scripts_dir() {
        let scripts_dir = CopilotPaths::scripts_dir().unwrap();
        assert!(scripts_dir.ends_with("scripts"));
        assert!(scripts_dir.starts_with(CopilotPaths::data_dir().unwrap()));
    }

    #[test]
    fn test_logs_dir() {
        let logs_dir = CopilotPaths::logs_dir().unwrap();
        assert!(logs_dir.ends_with("logs"));
    }
}
