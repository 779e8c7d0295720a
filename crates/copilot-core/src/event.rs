//! Semantic events decoded from transport frames.

use serde::Deserialize;

use crate::error::TransportError;

/// Structured plugin output carried by Framework `extract` frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtractPayload {
    /// Authoritative final report; replaces the accumulated text.
    #[serde(default)]
    pub output: Option<String>,
    /// A ready-made single-line command.
    #[serde(default)]
    pub shell: Option<String>,
    /// A ready-made script, persisted before it is offered.
    #[serde(default)]
    pub script: Option<String>,
}

impl ExtractPayload {
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(str::is_empty);
        blank(&self.output) && blank(&self.shell) && blank(&self.script)
    }
}

/// One event decoded from a line or websocket frame.
///
/// Never persisted; consumed immediately by the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text to append to the answer.
    ContentDelta(String),
    /// Follow-up question hint.
    Suggestion(String),
    /// Structured plugin payload.
    Extract(ExtractPayload),
    /// Terminal marker, the answer is complete.
    ControlDone,
    /// The server reported a failure through the `[ERROR]` sentinel.
    ControlError,
    /// Content-policy violation, the answer must be discarded.
    ControlSensitive,
    /// A line that was neither JSON nor a known sentinel.
    ControlUnknown(String),
    /// Non-zero status code inside a successfully connected stream.
    ProtocolError { code: i64, message: String },
    /// Transport-level failure.
    ConnectionProblem(TransportError),
}

impl StreamEvent {
    /// Whether this event ends the exchange.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::ControlDone
                | StreamEvent::ControlError
                | StreamEvent::ControlSensitive
                | StreamEvent::ProtocolError { .. }
                | StreamEvent::ConnectionProblem(_)
        )
    }
}

/// Literal tokens that may appear instead of JSON.
pub const SENTINEL_DONE: &str = "[DONE]";
pub const SENTINEL_ERROR: &str = "[ERROR]";
pub const SENTINEL_SENSITIVE: &str = "[SENSITIVE]";

/// Second stage of line classification: match the sentinel table.
///
/// Anything that is not a known sentinel becomes `ControlUnknown`.
pub fn classify_sentinel(payload: &str) -> StreamEvent {
    match payload {
        SENTINEL_DONE => StreamEvent::ControlDone,
        SENTINEL_ERROR => StreamEvent::ControlError,
        SENTINEL_SENSITIVE => StreamEvent::ControlSensitive,
        other => StreamEvent::ControlUnknown(other.to_string()),
    }
}
