//! Configuration model shared by the backends and the CLI.
//!
//! The struct mirrors the keys of `config.json`; loading and saving live in
//! `copilot-infrastructure`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CopilotError;

pub const DEFAULT_SPARK_URL: &str = "wss://spark-api.xf-yun.com/v3.5/chat";
pub const DEFAULT_SPARK_DOMAIN: &str = "generalv3.5";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_SPARK_MAX_TOKENS: u32 = 4096;

/// Which LLM backend answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The Framework agent service (sessions, plugins, workflows).
    #[default]
    Framework,
    /// iFlytek Spark over websocket.
    Spark,
    /// Any OpenAI-compatible chat completions endpoint.
    #[serde(rename = "openai")]
    OpenAi,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Framework => "framework",
            Backend::Spark => "spark",
            Backend::OpenAi => "openai",
        }
    }

    /// Whether the backend understands plugin workflows.
    pub fn supports_plugins(&self) -> bool {
        matches!(self, Backend::Framework)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = CopilotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "framework" => Ok(Backend::Framework),
            "spark" => Ok(Backend::Spark),
            "openai" => Ok(Backend::OpenAi),
            other => Err(CopilotError::config(format!("unknown backend '{other}'"))),
        }
    }
}

/// How a question is phrased to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// General question, commands are extracted from the Markdown answer.
    #[default]
    Chat,
    /// Ask for a single-line shell command.
    Shell,
    /// Framework plugin workflow with user-selected plugins.
    Flow,
    /// Framework diagnosis plugin.
    Diagnose,
    /// Framework tuning plugin.
    Tuning,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Chat => "chat",
            QueryMode::Shell => "shell",
            QueryMode::Flow => "flow",
            QueryMode::Diagnose => "diagnose",
            QueryMode::Tuning => "tuning",
        }
    }

    /// Human readable name used in notices.
    pub fn display_name(&self) -> &'static str {
        match self {
            QueryMode::Chat => "Smart Q&A",
            QueryMode::Shell => "Shell Command",
            QueryMode::Flow => "Smart Workflow",
            QueryMode::Diagnose => "Smart Diagnosis",
            QueryMode::Tuning => "Smart Tuning",
        }
    }

    /// Modes that only the Framework backend can serve.
    pub fn requires_plugins(&self) -> bool {
        matches!(self, QueryMode::Flow | QueryMode::Diagnose | QueryMode::Tuning)
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root configuration structure for `config.json`.
///
/// Every field has a default so that partially written files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    pub backend: Backend,
    pub query_mode: QueryMode,
    pub advanced_mode: bool,
    pub debug_mode: bool,
    pub spark_app_id: String,
    pub spark_api_key: String,
    pub spark_api_secret: String,
    pub spark_url: String,
    pub spark_domain: String,
    pub framework_url: String,
    pub framework_api_key: String,
    pub model_url: String,
    pub model_api_key: String,
    pub model_name: String,
    /// Token budget; `None` selects the backend default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            query_mode: QueryMode::default(),
            advanced_mode: false,
            debug_mode: false,
            spark_app_id: String::new(),
            spark_api_key: String::new(),
            spark_api_secret: String::new(),
            spark_url: DEFAULT_SPARK_URL.to_string(),
            spark_domain: DEFAULT_SPARK_DOMAIN.to_string(),
            framework_url: String::new(),
            framework_api_key: String::new(),
            model_url: String::new(),
            model_api_key: String::new(),
            model_name: String::new(),
            max_tokens: None,
        }
    }
}

impl CopilotConfig {
    /// Keys accepted by [`CopilotConfig::set`].
    pub const KEYS: &'static [&'static str] = &[
        "backend",
        "query_mode",
        "advanced_mode",
        "debug_mode",
        "spark_app_id",
        "spark_api_key",
        "spark_api_secret",
        "spark_url",
        "spark_domain",
        "framework_url",
        "framework_api_key",
        "model_url",
        "model_api_key",
        "model_name",
        "max_tokens",
    ];

    /// Sets a single key from its textual form.
    ///
    /// Returns `Ok(false)` when the key is unknown, leaving the config untouched.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool, CopilotError> {
        let parse_bool = |v: &str| -> Result<bool, CopilotError> {
            match v.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Ok(true),
                "false" | "0" | "no" | "n" => Ok(false),
                other => Err(CopilotError::config(format!("'{other}' is not a boolean"))),
            }
        };

        match key {
            "backend" => self.backend = value.parse()?,
            "query_mode" => {
                self.query_mode = serde_json::from_value(serde_json::Value::String(
                    value.trim().to_lowercase(),
                ))
                .map_err(|_| CopilotError::config(format!("unknown query mode '{value}'")))?
            }
            "advanced_mode" => self.advanced_mode = parse_bool(value)?,
            "debug_mode" => self.debug_mode = parse_bool(value)?,
            "spark_app_id" => self.spark_app_id = value.to_string(),
            "spark_api_key" => self.spark_api_key = value.to_string(),
            "spark_api_secret" => self.spark_api_secret = value.to_string(),
            "spark_url" => self.spark_url = value.to_string(),
            "spark_domain" => self.spark_domain = value.to_string(),
            "framework_url" => self.framework_url = value.to_string(),
            "framework_api_key" => self.framework_api_key = value.to_string(),
            "model_url" => self.model_url = value.to_string(),
            "model_api_key" => self.model_api_key = value.to_string(),
            "model_name" => self.model_name = value.to_string(),
            "max_tokens" => {
                let parsed = value
                    .trim()
                    .parse::<u32>()
                    .map_err(|e| CopilotError::config(format!("invalid max_tokens: {e}")))?;
                self.max_tokens = Some(parsed);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Token budget for the OpenAI-compatible backend.
    pub fn openai_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    /// Token budget for the Spark backend.
    pub fn spark_max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_SPARK_MAX_TOKENS)
    }
}
