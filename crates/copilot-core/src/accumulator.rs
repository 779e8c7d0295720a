//! Folds decoded stream events into an [`Answer`] and drives live redisplay.

use std::sync::Arc;

use crate::answer::{Answer, LlmResult};
use crate::config::Backend;
use crate::event::{ExtractPayload, StreamEvent};
use crate::extractor;
use crate::messages;
use crate::render::Renderer;
use crate::script::{ScriptWriter, script_invocation};

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The backend signalled completion, or the stream closed cleanly.
    Completed,
    /// Content-policy violation; the answer was discarded.
    Rejected,
    /// Transport failure, protocol error, or server error marker.
    Failed,
}

impl ExchangeOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExchangeOutcome::Completed)
    }
}

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Finished(ExchangeOutcome),
}

/// Exchange-scoped accumulator.
///
/// Every accepted event re-renders the full cumulative text. Once a terminal
/// event was applied, later events are ignored.
pub struct Accumulator {
    backend: Backend,
    debug: bool,
    answer: Answer,
    script_writer: Option<Arc<dyn ScriptWriter>>,
    outcome: Option<ExchangeOutcome>,
}

impl Accumulator {
    pub fn new(backend: Backend, debug: bool) -> Self {
        Self {
            backend,
            debug,
            answer: Answer::new(),
            script_writer: None,
            outcome: None,
        }
    }

    /// Enables persistence of `script` fields in extract payloads.
    pub fn with_script_writer(mut self, writer: Arc<dyn ScriptWriter>) -> Self {
        self.script_writer = Some(writer);
        self
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn outcome(&self) -> Option<ExchangeOutcome> {
        self.outcome
    }

    pub fn apply(&mut self, event: StreamEvent, renderer: &mut dyn Renderer) -> Progress {
        if let Some(outcome) = self.outcome {
            return Progress::Finished(outcome);
        }

        match event {
            StreamEvent::ContentDelta(delta) => {
                if !delta.is_empty() {
                    self.answer.text.push_str(&delta);
                    self.redraw(renderer);
                }
                Progress::Continue
            }
            StreamEvent::Suggestion(text) => {
                if self.answer.suggestion.is_none() && !text.trim().is_empty() {
                    self.answer.suggestion = Some(text);
                    self.redraw(renderer);
                }
                Progress::Continue
            }
            StreamEvent::Extract(payload) => {
                self.apply_extract(payload);
                self.redraw(renderer);
                Progress::Continue
            }
            StreamEvent::ControlUnknown(raw) => {
                if self.debug {
                    let notice = messages::unknown_content(&raw);
                    let content = if self.answer.text.is_empty() {
                        notice
                    } else {
                        format!("{}\n\n{notice}", self.answer.text)
                    };
                    renderer.render(&content, None);
                } else {
                    tracing::trace!(len = raw.len(), "dropping unparsable stream line");
                }
                Progress::Continue
            }
            StreamEvent::ControlDone => self.finish_with(ExchangeOutcome::Completed),
            StreamEvent::ControlError => {
                if self.answer.text.is_empty() {
                    renderer.render(messages::FRAMEWORK_STREAM_ERROR, None);
                } else {
                    tracing::warn!("server error marker after partial answer, keeping content");
                }
                self.finish_with(ExchangeOutcome::Failed)
            }
            StreamEvent::ControlSensitive => {
                tracing::info!("answer rejected by content policy");
                self.answer.reset();
                renderer.render(messages::SENSITIVE_NOTICE, None);
                self.finish_with(ExchangeOutcome::Rejected)
            }
            StreamEvent::ProtocolError { code, message } => {
                tracing::warn!(code, %message, "protocol error inside stream");
                self.answer.reset();
                renderer.render(&messages::protocol_error(code, &message), None);
                self.finish_with(ExchangeOutcome::Failed)
            }
            StreamEvent::ConnectionProblem(err) => {
                tracing::warn!(backend = %self.backend, error = %err, "transport failure");
                self.answer.reset();
                renderer.render(&messages::transport_failure(self.backend, &err), None);
                self.finish_with(ExchangeOutcome::Failed)
            }
        }
    }

    /// Called when the stream closed without a terminal event.
    pub fn end_of_stream(&mut self) -> ExchangeOutcome {
        *self.outcome.get_or_insert(ExchangeOutcome::Completed)
    }

    /// Runs the extractor over the accumulated answer.
    pub fn result(&self) -> LlmResult {
        extractor::extract(&self.answer)
    }

    fn finish_with(&mut self, outcome: ExchangeOutcome) -> Progress {
        self.outcome = Some(outcome);
        Progress::Finished(outcome)
    }

    fn apply_extract(&mut self, payload: ExtractPayload) {
        if let Some(output) = payload.output.filter(|o| !o.is_empty()) {
            self.answer.text = output;
        }
        if let Some(shell) = payload.shell.filter(|s| !s.trim().is_empty()) {
            self.answer.commands.push(shell);
        }
        if let Some(script) = payload.script.filter(|s| !s.trim().is_empty()) {
            match &self.script_writer {
                Some(writer) => match writer.write_script(&script) {
                    Ok(path) => self.answer.commands.push(script_invocation(&path)),
                    Err(e) => tracing::error!(error = %e, "failed to persist plugin script"),
                },
                None => tracing::warn!("plugin script received without a script writer"),
            }
        }
    }

    fn redraw(&self, renderer: &mut dyn Renderer) {
        renderer.render(&self.answer.text, self.answer.suggestion.as_deref());
    }
}
