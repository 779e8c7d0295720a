//! Code block extraction from Markdown answers.
//!
//! Shell blocks become an ordered, de-duplicated list of command candidates;
//! Python blocks are concatenated into a single code string.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::answer::{Answer, CommandCandidate, LlmResult};

static SHELL_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:bash|sh|shell)[ \t]*\r?\n(.*?)\r?\n\s*```")
        .expect("shell block pattern is valid")
});

static PYTHON_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```python[ \t]*\r?\n(.*?)\r?\n\s*```").expect("python block pattern is valid")
});

/// Extracts shell commands from every `bash`/`sh`/`shell` fenced block.
///
/// Lines are trimmed; empty lines and `#` comments are dropped; a command
/// seen twice is kept once, at its first position.
pub fn extract_shell_commands(markdown: &str) -> Vec<CommandCandidate> {
    let lines = SHELL_BLOCK
        .captures_iter(markdown)
        .filter_map(|caps| caps.get(1))
        .flat_map(|body| body.as_str().lines())
        .filter_map(CommandCandidate::new)
        .filter(|candidate| !candidate.is_comment());
    dedup(lines)
}

/// Concatenates the bodies of all `python` fenced blocks, double-newline joined.
pub fn extract_python_code(markdown: &str) -> Option<String> {
    let blocks: Vec<&str> = PYTHON_BLOCK
        .captures_iter(markdown)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str())
        .collect();

    if blocks.is_empty() {
        None
    } else {
        Some(blocks.join("\n\n"))
    }
}

/// Produces the review input for a finished answer.
///
/// Structured commands from plugin payloads take precedence, skip Markdown
/// extraction entirely and are kept in order, duplicates included.
pub fn extract(answer: &Answer) -> LlmResult {
    if !answer.commands.is_empty() {
        tracing::debug!(
            count = answer.commands.len(),
            "using structured plugin commands"
        );
        return LlmResult {
            commands: answer
                .commands
                .iter()
                .filter_map(CommandCandidate::new)
                .collect(),
            code: None,
        };
    }

    LlmResult {
        commands: extract_shell_commands(&answer.text),
        code: extract_python_code(&answer.text),
    }
}

fn dedup(candidates: impl Iterator<Item = CommandCandidate>) -> Vec<CommandCandidate> {
    let mut seen = HashSet::new();
    candidates
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}
