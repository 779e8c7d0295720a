//! The question loop.

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;

use copilot_core::{QueryMode, messages};
use copilot_execution::{CommandReview, Explainer, ReviewOutcome, SystemCommandRunner};
use copilot_interaction::{Exchange, ExchangeController, LlmService, Query};

use crate::console::{CliHelper, ReadlinePrompter, is_exit};
use crate::renderer::TerminalRenderer;

/// One configured backend plus the terminal around it.
pub struct App {
    controller: ExchangeController<TerminalRenderer>,
    mode: QueryMode,
    plugins: Vec<String>,
    prompter: ReadlinePrompter,
    runner: SystemCommandRunner,
}

impl App {
    pub fn new(
        service: Box<dyn LlmService>,
        mode: QueryMode,
        plugins: Vec<String>,
        prompter: ReadlinePrompter,
    ) -> Self {
        Self {
            controller: ExchangeController::new(service),
            mode,
            plugins,
            prompter,
            runner: SystemCommandRunner::new(),
        }
    }

    /// Asks one question, then reviews the commands in the answer.
    ///
    /// Ctrl-C while the answer streams cancels the exchange only.
    /// Returns the exit code of the last executed command.
    pub async fn ask(&mut self, question: &str) -> i32 {
        let query = Query::new(question, self.mode).with_plugins(self.plugins.clone());
        let cancel = self.controller.start(query, TerminalRenderer::new());

        let finished = {
            let finish = self.controller.finish();
            tokio::pin!(finish);
            loop {
                tokio::select! {
                    finished = &mut finish => break finished,
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("interrupt received, cancelling exchange");
                        cancel.cancel();
                    }
                }
            }
        };

        let Some(finished) = finished else {
            return 1;
        };
        if finished.cancelled {
            println!();
            return ReviewOutcome::NoOp.exit_code();
        }

        let result = finished.result;
        if let Some(code) = &result.code {
            println!();
            println!("{}", "Python code (not executed):".bold());
            println!("{}", code.cyan());
        }

        let mut service = self.controller.lock_service().await;
        let mut explainer = TerminalExplainer {
            service: &mut **service,
        };
        CommandReview::new(&mut self.prompter, &mut self.runner)
            .run(result.commands, &mut explainer)
            .await
            .exit_code()
    }

    /// Reads questions until `exit`, Ctrl-C or Ctrl-D.
    pub async fn run_interactive(&mut self) -> Result<i32> {
        let mut rl = Editor::new()?;
        rl.set_helper(Some(CliHelper::new()));

        println!("{}", messages::EXIT_PROMPT.bright_black());
        let prompt = format!("[{}] >> ", self.mode.display_name());

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if is_exit(trimmed) {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);
                    println!();
                    let code = self.ask(trimmed).await;
                    tracing::debug!(exit_code = code, "question handled");
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(0)
    }
}

/// Streams explanations to the terminal; Ctrl-C stops the stream.
struct TerminalExplainer<'a> {
    service: &'a mut dyn LlmService,
}

#[async_trait]
impl Explainer for TerminalExplainer<'_> {
    async fn explain(&mut self, cmd: &str) {
        let cancel = CancellationToken::new();
        let mut renderer = TerminalRenderer::new();
        println!();

        let explain = self
            .service
            .explain_shell_command(cmd, Exchange::new(&mut renderer, &cancel));
        tokio::pin!(explain);
        loop {
            tokio::select! {
                _ = &mut explain => break,
                _ = tokio::signal::ctrl_c() => cancel.cancel(),
            }
        }
    }
}
