use clap::{ArgGroup, Parser};

use copilot_core::{Backend, QueryMode};

#[derive(Debug, Parser)]
#[command(name = "copilot")]
#[command(version, about = "Ask an LLM about your system and run the commands it suggests", long_about = None)]
#[command(group(ArgGroup::new("mode").args(["chat", "shell", "flow", "diagnose", "tuning"])))]
pub struct Cli {
    /// Question to ask; starts an interactive session when omitted
    pub question: Option<String>,

    /// General question and answer
    #[arg(short, long)]
    pub chat: bool,

    /// Ask for a single shell command
    #[arg(short, long)]
    pub shell: bool,

    /// Run a plugin workflow (framework backend only)
    #[arg(short = 'p', long = "plugin")]
    pub flow: bool,

    /// Diagnose this machine (framework backend only)
    #[arg(short, long)]
    pub diagnose: bool,

    /// Tune this machine (framework backend only)
    #[arg(short, long)]
    pub tuning: bool,

    /// Reset the configuration file to defaults and exit
    #[arg(long)]
    pub init: bool,

    /// Use this backend instead of the configured one
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<Backend>,

    /// Persist a configuration value and exit
    #[arg(long = "config", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub settings: Vec<(String, String)>,
}

impl Cli {
    /// The mode picked on the command line, if any.
    pub fn mode(&self) -> Option<QueryMode> {
        [
            (self.chat, QueryMode::Chat),
            (self.shell, QueryMode::Shell),
            (self.flow, QueryMode::Flow),
            (self.diagnose, QueryMode::Diagnose),
            (self.tuning, QueryMode::Tuning),
        ]
        .into_iter()
        .find_map(|(set, mode)| set.then_some(mode))
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
