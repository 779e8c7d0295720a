//! Running confirmed commands as child processes.

use copilot_core::messages;
use std::io;
use std::process::{Command, ExitStatus};

use crate::classify::{CommandPlan, builtin_prefix, plan_command};

/// Exit code reported for commands that never started.
pub const LAUNCH_FAILURE_CODE: i32 = 1;

/// How a single command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process ran; signal deaths are reported as `128 + signal`.
    Exited(i32),
    /// Not found on `PATH`, but the name is a shell builtin.
    Builtin(String),
    /// Not found on `PATH`.
    NotFound(String),
    /// The command could not be started at all.
    Invalid(String),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Exited(code) => *code,
            _ => LAUNCH_FAILURE_CODE,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code() == 0
    }

    /// Explanation to show for commands that never started.
    pub fn message(&self) -> Option<String> {
        match self {
            RunOutcome::Exited(_) => None,
            RunOutcome::Builtin(prefix) => Some(messages::exec_builtin(prefix)),
            RunOutcome::NotFound(error) => Some(messages::exec_not_found(error)),
            RunOutcome::Invalid(error) => Some(messages::exec_value_error(error)),
        }
    }
}

/// Executes one confirmed command and waits for it.
pub trait CommandRunner {
    fn run(&mut self, cmd: &str) -> RunOutcome;
}

/// Runs commands on the local machine with inherited stdio.
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    shell: String,
}

impl SystemCommandRunner {
    pub const FALLBACK_SHELL: &'static str = "/bin/sh";

    /// Uses `$SHELL`, or `/bin/sh` when it is unset.
    pub fn new() -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Self::FALLBACK_SHELL.to_string());
        Self::with_shell(shell)
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for SystemCommandRunner {
    fn run(&mut self, cmd: &str) -> RunOutcome {
        match plan_command(cmd) {
            CommandPlan::Shell { script } => {
                tracing::debug!(shell = %self.shell, %script, "running through shell");
                match Command::new(&self.shell).arg("-c").arg(&script).status() {
                    Ok(status) => RunOutcome::Exited(exit_code(status)),
                    Err(e) => RunOutcome::Invalid(e.to_string()),
                }
            }
            CommandPlan::Direct { program, args } => {
                tracing::debug!(%program, ?args, "running directly");
                match Command::new(&program).args(&args).status() {
                    Ok(status) => RunOutcome::Exited(exit_code(status)),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => match builtin_prefix(cmd) {
                        Some(prefix) => RunOutcome::Builtin(prefix.to_string()),
                        None => RunOutcome::NotFound(format!("{program}: {e}")),
                    },
                    Err(e) => RunOutcome::Invalid(e.to_string()),
                }
            }
            CommandPlan::Invalid { reason } => RunOutcome::Invalid(reason),
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => LAUNCH_FAILURE_CODE,
    }
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(LAUNCH_FAILURE_CODE)
}
