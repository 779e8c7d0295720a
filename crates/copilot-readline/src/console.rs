//! rustyline front end: the main prompt helper and the review menus.

use std::borrow::Cow::{self, Borrowed, Owned};

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, DefaultEditor, Helper};

use copilot_core::{CommandCandidate, PluginDescriptor};
use copilot_execution::{Action, Prompter};

const EXIT_COMMAND: &str = "exit";

/// Completion, highlighting and hints for the question prompt.
#[derive(Clone)]
pub struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    pub fn new() -> Self {
        Self {
            commands: vec![EXIT_COMMAND.to_string()],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if line.is_empty() {
            return Ok((0, vec![]));
        }

        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if is_exit(line) {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Owned(hint.bright_black().to_string())
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.is_empty() || line.contains(' ') {
            return None;
        }
        self.commands
            .iter()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Validator for CliHelper {}

/// Whether the input asks to leave the session.
pub fn is_exit(line: &str) -> bool {
    line.trim().to_lowercase().starts_with(EXIT_COMMAND)
}

/// Review menus read from the terminal.
pub struct ReadlinePrompter {
    editor: DefaultEditor,
}

impl ReadlinePrompter {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }

    /// `None` on Ctrl-C, Ctrl-D or a terminal error.
    fn read(&mut self, prompt: &str) -> Option<String> {
        match self.editor.readline(prompt) {
            Ok(line) => Some(line),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => None,
            Err(e) => {
                tracing::warn!(error = %e, "reading selection failed");
                None
            }
        }
    }

    /// Lets the user pick the plugins of a workflow question.
    ///
    /// Returns plugin ids.
    pub fn select_plugins(&mut self, plugins: &[PluginDescriptor]) -> Vec<String> {
        println!("{}", "Available plugins:".bold());
        for (i, plugin) in plugins.iter().enumerate() {
            println!("  {}) {}", i + 1, plugin.label());
        }
        let prompt = format!("Select plugins (e.g. 1,3 or all) [1-{}]: ", plugins.len());
        self.read(&prompt)
            .map(|input| parse_selection(&input, plugins.len()))
            .unwrap_or_default()
            .into_iter()
            .map(|i| plugins[i].id.clone())
            .collect()
    }
}

impl Prompter for ReadlinePrompter {
    fn present(&mut self, commands: &[CommandCandidate]) {
        println!();
        println!("{}", "Commands:".bold());
        for (i, cmd) in commands.iter().enumerate() {
            println!("  {} {}", format!("{}.", i + 1).bright_black(), cmd.as_str().cyan());
        }
        println!();
    }

    fn select_action(&mut self, has_multiple: bool) -> Action {
        let choices = Action::choices(has_multiple);
        for (i, action) in choices.iter().enumerate() {
            println!("  {}) {}", i + 1, action.label(has_multiple));
        }
        let prompt = format!("Select an action [1-{}]: ", choices.len());
        loop {
            let Some(input) = self.read(&prompt) else {
                return Action::Cancel;
            };
            if let Some(i) = parse_choice(&input, choices.len()) {
                return choices[i];
            }
            println!("{}", "Please enter one of the listed numbers.".yellow());
        }
    }

    fn select_command(&mut self, commands: &[CommandCandidate]) -> Option<usize> {
        let prompt = format!("Select a command [1-{}]: ", commands.len());
        self.read(&prompt)
            .and_then(|input| parse_choice(&input, commands.len()))
    }

    fn select_commands(&mut self, commands: &[CommandCandidate]) -> Vec<usize> {
        let prompt = format!("Select commands (e.g. 1,3 or all) [1-{}]: ", commands.len());
        self.read(&prompt)
            .map(|input| parse_selection(&input, commands.len()))
            .unwrap_or_default()
    }

    fn edit_text(&mut self, initial: &str) -> Option<String> {
        match self.editor.readline_with_initial("Edit: ", (initial, "")) {
            Ok(line) => Some(line),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => None,
            Err(e) => {
                tracing::warn!(error = %e, "editing command failed");
                None
            }
        }
    }

    fn report(&mut self, message: &str) {
        println!("{}", message.yellow());
    }
}

/// Parses a 1-based menu choice into an index.
fn parse_choice(input: &str, len: usize) -> Option<usize> {
    let n: usize = input.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

/// Parses `1,3`, `2 4` or `all` into sorted 0-based indices.
///
/// Unknown tokens and out-of-range numbers are skipped.
fn parse_selection(input: &str, len: usize) -> Vec<usize> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return (0..len).collect();
    }

    let mut picked: Vec<usize> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|token| parse_choice(token, len))
        .collect();
    picked.sort_unstable();
    picked.dedup();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice(" 2 ", 3), Some(1));
        assert_eq!(parse_choice("0", 3), None);
        assert_eq!(parse_choice("4", 3), None);
        assert_eq!(parse_choice("two", 3), None);
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("3, 1 1", 3), vec![0, 2]);
        assert_eq!(parse_selection("ALL", 2), vec![0, 1]);
        assert_eq!(parse_selection("9,x", 2), Vec::<usize>::new());
        assert!(parse_selection("", 2).is_empty());
    }

    #[test]
    fn test_exit_prefix() {
        assert!(is_exit("exit"));
        assert!(is_exit("  EXIT now"));
        assert!(!is_exit("how do I exit vim"));
    }
}
