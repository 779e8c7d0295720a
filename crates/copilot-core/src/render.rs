//! Render sink consumed by the accumulator.

/// Receives the cumulative answer and is responsible for terminal presentation.
///
/// Every call carries the complete text so far, never just the newest
/// fragment, so implementations can re-render Markdown with full context.
pub trait Renderer: Send {
    /// Called once before the first frame of an exchange.
    fn begin(&mut self) {}

    /// Replaces the visible output with `content` and an optional hint.
    fn render(&mut self, content: &str, suggestion: Option<&str>);

    /// Called once after the exchange ended, whatever the outcome.
    fn finish(&mut self) {}
}

/// A renderer that records every frame, for tests and headless runs.
#[derive(Debug, Default, Clone)]
pub struct RecordingRenderer {
    pub frames: Vec<(String, Option<String>)>,
    pub finished: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The content of the most recent frame.
    pub fn last_content(&self) -> Option<&str> {
        self.frames.last().map(|(content, _)| content.as_str())
    }

    pub fn last_suggestion(&self) -> Option<&str> {
        self.frames
            .last()
            .and_then(|(_, suggestion)| suggestion.as_deref())
    }
}

impl Renderer for RecordingRenderer {
    fn begin(&mut self) {
        self.finished = false;
    }

    fn render(&mut self, content: &str, suggestion: Option<&str>) {
        self.frames
            .push((content.to_string(), suggestion.map(str::to_string)));
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}
