//! JSON storage for [`CopilotConfig`].

use std::fs;
use std::path::{Path, PathBuf};

use copilot_core::{Backend, CopilotConfig, CopilotError, Result};

use crate::paths::CopilotPaths;

/// Reads and writes `config.json`.
#[derive(Debug, Clone)]
pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    /// Storage at the default location.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(CopilotPaths::config_file()?))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the config, creating the file with defaults when missing.
    pub fn load(&self) -> Result<CopilotConfig> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "config file missing, writing defaults");
            let config = CopilotConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let content = fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(|e| CopilotError::Serialization {
            format: "JSON".to_string(),
            message: format!("{}: {e}", self.path.display()),
        })
    }

    /// Writes the config as pretty JSON with a trailing newline.
    pub fn save(&self, config: &CopilotConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut json = serde_json::to_string_pretty(config)?;
        json.push('\n');
        fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Resets the file to defaults.
    pub fn init(&self) -> Result<CopilotConfig> {
        let config = CopilotConfig::default();
        self.save(&config)?;
        Ok(config)
    }

    /// Sets one key and saves. Unknown keys are ignored and return `false`.
    pub fn update(&self, key: &str, value: &str) -> Result<bool> {
        let mut config = self.load()?;
        if !config.set(key, value)? {
            tracing::warn!(key, "ignoring unknown config key");
            return Ok(false);
        }
        self.save(&config)?;
        Ok(true)
    }
}

/// Environment variables consulted after the file is loaded.
pub const ENV_BACKEND: &str = "COPILOT_BACKEND";
pub const ENV_MODEL_URL: &str = "COPILOT_MODEL_URL";
pub const ENV_MODEL_NAME: &str = "COPILOT_MODEL_NAME";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Applies environment overrides through `lookup`.
///
/// `OPENAI_API_KEY` only fills an empty `model_api_key`. An unparsable
/// backend name is logged and ignored.
pub fn apply_env_overrides(config: &mut CopilotConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(raw) = var(ENV_BACKEND) {
        match raw.parse::<Backend>() {
            Ok(backend) => config.backend = backend,
            Err(e) => tracing::warn!(error = %e, "ignoring {ENV_BACKEND}"),
        }
    }
    if let Some(url) = var(ENV_MODEL_URL) {
        config.model_url = url;
    }
    if let Some(name) = var(ENV_MODEL_NAME) {
        config.model_name = name;
    }
    if config.model_api_key.is_empty() {
        if let Some(key) = var(ENV_OPENAI_API_KEY) {
            config.model_api_key = key;
        }
    }
}

/// [`apply_env_overrides`] against the process environment.
pub fn apply_process_env(config: &mut CopilotConfig) {
    apply_env_overrides(config, |key| std::env::var(key).ok());
}
