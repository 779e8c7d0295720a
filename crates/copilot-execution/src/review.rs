//! The command review loop.
//!
//! Extracted commands are never run without the user picking an action. The
//! loop keeps presenting the (possibly edited) list until the user executes
//! something or cancels.

use async_trait::async_trait;

use copilot_core::{CommandCandidate, messages};

use crate::runner::CommandRunner;

/// What the user can do with the presented commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Execute,
    ExecuteAll,
    ExecuteSelected,
    Explain,
    Edit,
    Cancel,
}

impl Action {
    const SINGLE: &'static [Action] = &[Action::Execute, Action::Explain, Action::Edit, Action::Cancel];
    const MULTIPLE: &'static [Action] = &[
        Action::ExecuteAll,
        Action::ExecuteSelected,
        Action::Execute,
        Action::Explain,
        Action::Edit,
        Action::Cancel,
    ];

    /// Actions offered for a list of one command or of several.
    pub fn choices(has_multiple: bool) -> &'static [Action] {
        if has_multiple {
            Self::MULTIPLE
        } else {
            Self::SINGLE
        }
    }

    pub fn label(&self, has_multiple: bool) -> &'static str {
        match self {
            Action::Execute if has_multiple => "Execute one command",
            Action::Execute => "Execute the command",
            Action::ExecuteAll => "Execute all commands",
            Action::ExecuteSelected => "Execute selected commands",
            Action::Explain => "Explain a command",
            Action::Edit => "Edit a command",
            Action::Cancel => "Cancel",
        }
    }
}

/// Interactive choices the review loop asks for.
///
/// Index-returning methods refer to positions in the slice they were given.
pub trait Prompter {
    /// Shows the current command list.
    fn present(&mut self, commands: &[CommandCandidate]);

    fn select_action(&mut self, has_multiple: bool) -> Action;

    /// Picks one command; `None` goes back to the action menu.
    fn select_command(&mut self, commands: &[CommandCandidate]) -> Option<usize>;

    /// Picks any number of commands for a batch.
    fn select_commands(&mut self, commands: &[CommandCandidate]) -> Vec<usize>;

    /// Line editor pre-filled with `initial`; `None` when the edit was aborted.
    fn edit_text(&mut self, initial: &str) -> Option<String>;

    /// Shows an execution notice.
    fn report(&mut self, message: &str);
}

/// Streams an explanation of a command somewhere the user can read it.
///
/// The binary implements this over the configured backend.
#[async_trait]
pub trait Explainer: Send {
    async fn explain(&mut self, cmd: &str);
}

/// How a review ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Nothing was executed.
    NoOp,
    /// A batch ran; carries the exit code of the last command that ran.
    Completed(i32),
}

impl ReviewOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ReviewOutcome::NoOp => 0,
            ReviewOutcome::Completed(code) => *code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Presenting,
    Explaining(usize),
    Editing(usize),
    Executing(Vec<usize>),
    Terminal(ReviewOutcome),
}

/// Drives one review of an extracted command list.
pub struct CommandReview<'a> {
    prompter: &'a mut dyn Prompter,
    runner: &'a mut dyn CommandRunner,
}

impl<'a> CommandReview<'a> {
    pub fn new(prompter: &'a mut dyn Prompter, runner: &'a mut dyn CommandRunner) -> Self {
        Self { prompter, runner }
    }

    /// Runs the loop until the user executes or cancels.
    pub async fn run(
        &mut self,
        commands: Vec<CommandCandidate>,
        explainer: &mut dyn Explainer,
    ) -> ReviewOutcome {
        let mut commands = commands;
        let mut state = if commands.is_empty() {
            State::Terminal(ReviewOutcome::NoOp)
        } else {
            State::Presenting
        };

        loop {
            state = match state {
                State::Presenting => {
                    self.prompter.present(&commands);
                    self.choose(&commands)
                }
                State::Explaining(index) => {
                    explainer.explain(commands[index].as_str()).await;
                    State::Presenting
                }
                State::Editing(index) => {
                    let edited = self
                        .prompter
                        .edit_text(commands[index].as_str())
                        .and_then(CommandCandidate::new);
                    if let Some(edited) = edited {
                        commands[index] = edited;
                    }
                    State::Presenting
                }
                State::Executing(targets) => {
                    State::Terminal(ReviewOutcome::Completed(self.execute(&commands, &targets)))
                }
                State::Terminal(outcome) => return outcome,
            };
        }
    }

    fn choose(&mut self, commands: &[CommandCandidate]) -> State {
        let has_multiple = commands.len() > 1;
        match self.prompter.select_action(has_multiple) {
            Action::Cancel => State::Terminal(ReviewOutcome::NoOp),
            Action::ExecuteAll => State::Executing((0..commands.len()).collect()),
            Action::ExecuteSelected => {
                let mut picked: Vec<usize> = self
                    .prompter
                    .select_commands(commands)
                    .into_iter()
                    .filter(|i| *i < commands.len())
                    .collect();
                picked.sort_unstable();
                picked.dedup();
                if picked.is_empty() {
                    State::Terminal(ReviewOutcome::NoOp)
                } else {
                    State::Executing(picked)
                }
            }
            Action::Execute => self
                .pick_one(commands)
                .map_or(State::Presenting, |i| State::Executing(vec![i])),
            Action::Explain => self
                .pick_one(commands)
                .map_or(State::Presenting, State::Explaining),
            Action::Edit => self
                .pick_one(commands)
                .map_or(State::Presenting, State::Editing),
        }
    }

    fn pick_one(&mut self, commands: &[CommandCandidate]) -> Option<usize> {
        if commands.len() == 1 {
            return Some(0);
        }
        self.prompter
            .select_command(commands)
            .filter(|i| *i < commands.len())
    }

    /// Runs `targets` in order and stops at the first failure.
    fn execute(&mut self, commands: &[CommandCandidate], targets: &[usize]) -> i32 {
        let mut last = 0;
        for cmd in targets.iter().map(|i| commands[*i].as_str()) {
            tracing::info!(%cmd, "executing command");
            let outcome = self.runner.run(cmd);
            if let Some(message) = outcome.message() {
                self.prompter.report(&message);
            }
            last = outcome.exit_code();
            tracing::info!(%cmd, exit_code = last, "command finished");
            if last != 0 {
                self.prompter.report(&messages::exec_failed(cmd, last));
                break;
            }
        }
        last
    }
}
