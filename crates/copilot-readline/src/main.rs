use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use copilot_core::{CopilotConfig, QueryMode, messages};
use copilot_infrastructure::{
    ConfigStorage, CopilotPaths, HostInfo, ScriptStorage, apply_process_env,
};
use copilot_interaction::{PromptContext, ServiceOptions, create_service};

mod cli;
mod console;
mod logging;
mod renderer;
mod repl;

use cli::Cli;
use console::ReadlinePrompter;
use renderer::TerminalRenderer;
use repl::App;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let code = run(cli).await?;
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let storage = ConfigStorage::new()?;

    if cli.init {
        storage.init()?;
        println!("Configuration reset: {}", storage.path().display());
        return Ok(0);
    }

    if !cli.settings.is_empty() {
        for (key, value) in &cli.settings {
            if !storage.update(key, value)? {
                eprintln!("{}", format!("Unknown configuration key: {key}").red());
                eprintln!("Valid keys: {}", CopilotConfig::KEYS.join(", "));
                return Ok(1);
            }
        }
        return Ok(0);
    }

    let mut config = storage.load()?;
    apply_process_env(&mut config);
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    let mode = cli.mode().unwrap_or(config.query_mode);

    let _log_guard = logging::init(&CopilotPaths::logs_dir()?, config.debug_mode)?;
    tracing::info!(backend = %config.backend, %mode, "starting");

    if mode.requires_plugins() && !config.backend.supports_plugins() {
        println!("{}", messages::mode_unsupported(mode.display_name()).yellow());
        return Ok(1);
    }

    let host = HostInfo::detect();
    let mut options = ServiceOptions::new(PromptContext::new(host.os_name.clone(), host.is_root))
        .with_script_writer(Arc::new(ScriptStorage::new()?));
    if let Some(ip) = host.local_ip {
        options = options.with_host_ip(ip.to_string());
    }

    let mut renderer = TerminalRenderer::new();
    let mut service = match create_service(&config, options, &mut renderer).await {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "backend configuration rejected");
            println!("{}", messages::NOT_CONFIGURED.red());
            return Ok(1);
        }
    };

    let mut prompter = ReadlinePrompter::new()?;
    let plugins = if mode == QueryMode::Flow {
        let available = service.list_plugins().await;
        if available.is_empty() {
            println!("{}", messages::NO_PLUGINS.red());
            return Ok(1);
        }
        prompter.select_plugins(&available)
    } else {
        Vec::new()
    };

    let mut app = App::new(service, mode, plugins, prompter);
    match cli.question {
        Some(question) => Ok(app.ask(&question).await),
        None => app.run_interactive().await,
    }
}
