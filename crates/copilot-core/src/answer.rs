//! Per-exchange answer types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mutable accumulator for one question/response cycle.
///
/// Created empty at the start of each query and only mutated by the
/// [`Accumulator`](crate::accumulator::Accumulator) while the stream is read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    /// Cumulative decoded answer content.
    pub text: String,
    /// Latest follow-up question hint surfaced by the backend.
    pub suggestion: Option<String>,
    /// Commands emitted by structured plugin payloads.
    ///
    /// When non-empty these take precedence over Markdown extraction.
    pub commands: Vec<String>,
}

impl Answer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears everything, as a content-policy reset does.
    pub fn reset(&mut self) {
        self.text.clear();
        self.suggestion = None;
        self.commands.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.commands.is_empty()
    }
}

/// One extracted shell command.
///
/// Always trimmed and non-empty. Comment filtering and de-duplication are
/// list-level rules applied by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandCandidate(String);

impl CommandCandidate {
    /// Returns `None` for blank input.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_comment(&self) -> bool {
        self.0.starts_with('#')
    }
}

impl fmt::Display for CommandCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandCandidate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What one call to a backend yields for the review loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmResult {
    /// Ordered, de-duplicated command candidates.
    pub commands: Vec<CommandCandidate>,
    /// Concatenated bodies of embedded non-shell code blocks.
    pub code: Option<String>,
}

impl LlmResult {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.code.is_none()
    }
}
