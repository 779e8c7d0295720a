//! Live terminal output for streamed answers.

use std::io::{self, Write};

use colored::Colorize;
use crossterm::cursor::MoveToPreviousLine;
use crossterm::queue;
use crossterm::terminal::{self, Clear, ClearType};

use copilot_core::{Renderer, messages};

const FALLBACK_COLUMNS: usize = 80;
const PLACEHOLDER: &str = "Thinking...";

/// Redraws the whole answer in place on every frame.
///
/// Frames taller than the screen leave scrolled-off rows behind.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    drawn_rows: usize,
    placeholder: bool,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_drawn(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.drawn_rows > 0 {
            let up = u16::try_from(self.drawn_rows).unwrap_or(u16::MAX);
            queue!(out, MoveToPreviousLine(up), Clear(ClearType::FromCursorDown))?;
            self.drawn_rows = 0;
        }
        Ok(())
    }

    fn draw(&mut self, content: &str, suggestion: Option<&str>) -> io::Result<()> {
        let columns = terminal::size()
            .map(|(cols, _)| usize::from(cols))
            .unwrap_or(FALLBACK_COLUMNS);

        let mut out = io::stdout().lock();
        self.clear_drawn(&mut out)?;
        writeln!(out, "{}", style_markdown(content))?;
        let mut rows = rows_needed(content, columns);
        if let Some(hint) = suggestion {
            let hint = messages::suggestion(hint);
            writeln!(out, "\n{}", hint.bright_black().italic())?;
            rows += 1 + rows_needed(&hint, columns);
        }
        out.flush()?;

        self.drawn_rows = rows;
        Ok(())
    }
}

impl Renderer for TerminalRenderer {
    /// Shows a placeholder until the first frame arrives.
    fn begin(&mut self) {
        self.drawn_rows = 0;
        self.placeholder = true;
        let mut out = io::stdout().lock();
        if writeln!(out, "{}", PLACEHOLDER.bright_black()).and_then(|_| out.flush()).is_ok() {
            self.drawn_rows = 1;
        }
    }

    fn render(&mut self, content: &str, suggestion: Option<&str>) {
        self.placeholder = false;
        if let Err(e) = self.draw(content, suggestion) {
            tracing::debug!(error = %e, "terminal redraw failed");
        }
    }

    fn finish(&mut self) {
        if self.placeholder {
            let mut out = io::stdout().lock();
            if let Err(e) = self.clear_drawn(&mut out).and_then(|_| out.flush()) {
                tracing::debug!(error = %e, "clearing placeholder failed");
            }
            self.placeholder = false;
        }
        self.drawn_rows = 0;
    }
}

/// Terminal rows `text` occupies once wrapped at `columns`.
fn rows_needed(text: &str, columns: usize) -> usize {
    let columns = columns.max(1);
    text.split('\n')
        .map(|line| line.chars().count().div_ceil(columns).max(1))
        .sum()
}

/// Light Markdown highlighting: fenced code in cyan, headings in bold.
fn style_markdown(text: &str) -> String {
    let mut in_code = false;
    text.split('\n')
        .map(|line| {
            let fence = line.trim_start().starts_with("```");
            if fence {
                in_code = !in_code;
                return line.bright_black().to_string();
            }
            if in_code {
                line.cyan().to_string()
            } else if line.starts_with('#') {
                line.bold().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
