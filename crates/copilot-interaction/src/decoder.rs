//! Stream decoder: one line or websocket frame in, semantic events out.
//!
//! Classification is two-stage. A payload is first parsed as JSON and mapped
//! through the backend's frame shape; anything that is not JSON is matched
//! against the sentinel table. Decoding never fails: anomalies become
//! [`StreamEvent::ControlUnknown`] and the accumulator decides what to show.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use copilot_core::event::classify_sentinel;
use copilot_core::{ExtractPayload, StreamEvent};

/// Event-stream data marker.
pub const DATA_PREFIX: &str = "data:";

/// Removes the `data:` marker and surrounding whitespace.
pub fn strip_data_prefix(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix(DATA_PREFIX).map_or(line, str::trim)
}

/// Parses `payload` as JSON into `T`, or classifies it as a sentinel.
fn classify<T: DeserializeOwned>(payload: &str) -> Result<T, StreamEvent> {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => serde_json::from_value(value)
            .map_err(|_| StreamEvent::ControlUnknown(payload.to_string())),
        Err(_) => Err(classify_sentinel(payload)),
    }
}

fn decode_line<T: DeserializeOwned>(
    line: &str,
    into_events: impl FnOnce(T) -> Vec<StreamEvent>,
) -> Vec<StreamEvent> {
    let payload = strip_data_prefix(line);
    if payload.is_empty() {
        return Vec::new();
    }
    match classify::<T>(payload) {
        Ok(frame) => into_events(frame),
        Err(event) => vec![event],
    }
}

/// Reads an optional side-channel field; a value of the wrong shape
/// becomes the default instead of failing the whole frame.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

// OpenAI-compatible chunks

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    #[serde(default, deserialize_with = "lenient")]
    delta: OpenAiDelta,
    #[serde(default, deserialize_with = "lenient")]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default, deserialize_with = "lenient")]
    content: Option<String>,
}

/// Decodes one line of an OpenAI-compatible chat completion stream.
///
/// `choices[0].finish_reason == "stop"` ends the exchange.
pub fn decode_openai_line(line: &str) -> Vec<StreamEvent> {
    decode_line(line, |chunk: OpenAiChunk| {
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Vec::new();
        };
        let mut events = Vec::new();
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            events.push(StreamEvent::ContentDelta(content));
        }
        if choice.finish_reason.as_deref() == Some("stop") {
            events.push(StreamEvent::ControlDone);
        }
        events
    })
}

// Framework frames

#[derive(Debug, Deserialize)]
struct FrameworkFrame {
    #[serde(default, deserialize_with = "lenient")]
    content: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    search_suggestions: Vec<Value>,
    #[serde(default, deserialize_with = "lenient", rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FrameworkSuggestion {
    #[serde(default)]
    name: Option<String>,
    question: String,
}

impl FrameworkSuggestion {
    fn display(&self) -> String {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("**{name}** {}", self.question),
            None => self.question.clone(),
        }
    }
}

/// `data` of an extract frame is either an object or a JSON string holding one.
fn extract_payload(data: Value) -> Option<ExtractPayload> {
    let payload = match data {
        Value::String(raw) => serde_json::from_str(&raw).ok()?,
        other => serde_json::from_value(other).ok()?,
    };
    Some(payload)
}

/// Decodes one line of a Framework chat stream.
pub fn decode_framework_line(line: &str) -> Vec<StreamEvent> {
    let raw = strip_data_prefix(line).to_string();
    decode_line(line, move |frame: FrameworkFrame| {
        let mut events = Vec::new();
        if let Some(content) = frame.content.filter(|c| !c.is_empty()) {
            events.push(StreamEvent::ContentDelta(content));
        }
        if frame.kind.as_deref() == Some("extract") {
            match frame.data.and_then(extract_payload) {
                Some(payload) if !payload.is_empty() => events.push(StreamEvent::Extract(payload)),
                Some(_) => {}
                None => events.push(StreamEvent::ControlUnknown(raw)),
            }
        }
        let first = frame.search_suggestions.into_iter().next();
        if let Some(suggestion) =
            first.and_then(|v| serde_json::from_value::<FrameworkSuggestion>(v).ok())
        {
            events.push(StreamEvent::Suggestion(suggestion.display()));
        }
        events
    })
}

// Spark frames

#[derive(Debug, Deserialize)]
struct SparkFrame {
    header: SparkHeader,
    #[serde(default)]
    payload: Option<SparkPayload>,
}

#[derive(Debug, Deserialize)]
struct SparkHeader {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct SparkPayload {
    choices: SparkChoices,
}

#[derive(Debug, Deserialize)]
struct SparkChoices {
    status: i64,
    #[serde(default)]
    text: Vec<SparkText>,
}

#[derive(Debug, Deserialize)]
struct SparkText {
    #[serde(default)]
    content: String,
}

/// Spark marks the last frame of an answer with this status.
pub const SPARK_STATUS_LAST: i64 = 2;

/// Decodes one Spark websocket text frame.
///
/// A non-zero header code is a protocol error and carries no content.
pub fn decode_spark_frame(frame: &str) -> Vec<StreamEvent> {
    decode_line(frame, |frame: SparkFrame| {
        if frame.header.code != 0 {
            return vec![StreamEvent::ProtocolError {
                code: frame.header.code,
                message: frame.header.message,
            }];
        }
        let Some(payload) = frame.payload else {
            return Vec::new();
        };
        let mut events = Vec::new();
        if let Some(text) = payload.choices.text.into_iter().next() {
            if !text.content.is_empty() {
                events.push(StreamEvent::ContentDelta(text.content));
            }
        }
        if payload.choices.status == SPARK_STATUS_LAST {
            events.push(StreamEvent::ControlDone);
        }
        events
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_data_prefix() {
        assert_eq!(strip_data_prefix("data: {\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_data_prefix("data:[DONE]"), "[DONE]");
        assert_eq!(strip_data_prefix("  [DONE]  "), "[DONE]");
    }

    #[test]
    fn test_openai_delta_and_stop() {
        let line = r#"data: {"id":"x","choices":[{"index":0,"delta":{"content":"hi"},"finish_reason":null}]}"#;
        assert_eq!(
            decode_openai_line(line),
            vec![StreamEvent::ContentDelta("hi".into())]
        );

        let last = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(decode_openai_line(last), vec![StreamEvent::ControlDone]);
    }

    #[test]
    fn test_openai_done_sentinel_and_blank_lines() {
        assert_eq!(decode_openai_line("data: [DONE]"), vec![StreamEvent::ControlDone]);
        assert!(decode_openai_line("").is_empty());
        assert!(decode_openai_line("data: ").is_empty());
    }

    #[test]
    fn test_non_json_line_is_unknown() {
        assert_eq!(
            decode_openai_line(": keep-alive"),
            vec![StreamEvent::ControlUnknown(": keep-alive".into())]
        );
    }

    #[test]
    fn test_json_with_wrong_shape_is_unknown() {
        assert_eq!(
            decode_openai_line(r#"data: {"choices": "nope"}"#),
            vec![StreamEvent::ControlUnknown(r#"{"choices": "nope"}"#.into())]
        );
    }

    #[test]
    fn test_openai_null_delta_keeps_stop() {
        let line = r#"data: {"choices":[{"delta":null,"finish_reason":"stop"}]}"#;
        assert_eq!(decode_openai_line(line), vec![StreamEvent::ControlDone]);

        let odd = r#"data: {"choices":[{"delta":{"content":7},"finish_reason":"stop"}]}"#;
        assert_eq!(decode_openai_line(odd), vec![StreamEvent::ControlDone]);
    }

    #[test]
    fn test_framework_bad_suggestions_keep_content() {
        let null = r#"data: {"content":"hello","search_suggestions":null}"#;
        assert_eq!(
            decode_framework_line(null),
            vec![StreamEvent::ContentDelta("hello".into())]
        );

        let no_question = r#"data: {"content":"hi","search_suggestions":[{"name":"x"}]}"#;
        assert_eq!(
            decode_framework_line(no_question),
            vec![StreamEvent::ContentDelta("hi".into())]
        );

        let not_a_list = r#"data: {"content":"ok","search_suggestions":"soon"}"#;
        assert_eq!(
            decode_framework_line(not_a_list),
            vec![StreamEvent::ContentDelta("ok".into())]
        );
    }

    #[test]
    fn test_framework_sentinels() {
        assert_eq!(decode_framework_line("data: [DONE]"), vec![StreamEvent::ControlDone]);
        assert_eq!(decode_framework_line("data: [ERROR]"), vec![StreamEvent::ControlError]);
        assert_eq!(
            decode_framework_line("data: [SENSITIVE]"),
            vec![StreamEvent::ControlSensitive]
        );
    }

    #[test]
    fn test_framework_content_and_suggestion() {
        let line = r#"data: {"content":"Use df","search_suggestions":[{"name":"Disk","question":"How to clean /var?"}]}"#;
        assert_eq!(
            decode_framework_line(line),
            vec![
                StreamEvent::ContentDelta("Use df".into()),
                StreamEvent::Suggestion("**Disk** How to clean /var?".into()),
            ]
        );
    }

    #[test]
    fn test_framework_extract_object_and_string() {
        let object = r#"data: {"content":"","type":"extract","data":{"shell":"uptime"}}"#;
        assert_eq!(
            decode_framework_line(object),
            vec![StreamEvent::Extract(ExtractPayload {
                shell: Some("uptime".into()),
                ..Default::default()
            })]
        );

        let string = r#"data: {"type":"extract","data":"{\"output\":\"report\",\"script\":\"echo 1\"}"}"#;
        assert_eq!(
            decode_framework_line(string),
            vec![StreamEvent::Extract(ExtractPayload {
                output: Some("report".into()),
                script: Some("echo 1".into()),
                shell: None,
            })]
        );
    }

    #[test]
    fn test_framework_bad_extract_data_is_unknown() {
        let line = r#"data: {"type":"extract","data":"not json"}"#;
        assert!(matches!(
            decode_framework_line(line).as_slice(),
            [StreamEvent::ControlUnknown(_)]
        ));
    }

    #[test]
    fn test_spark_frames() {
        let mid = r#"{"header":{"code":0,"message":"Success","sid":"s","status":1},"payload":{"choices":{"status":1,"seq":0,"text":[{"content":"Hel","role":"assistant","index":0}]}}}"#;
        assert_eq!(
            decode_spark_frame(mid),
            vec![StreamEvent::ContentDelta("Hel".into())]
        );

        let last = r#"{"header":{"code":0,"message":"Success"},"payload":{"choices":{"status":2,"text":[{"content":"lo"}]}}}"#;
        assert_eq!(
            decode_spark_frame(last),
            vec![
                StreamEvent::ContentDelta("lo".into()),
                StreamEvent::ControlDone
            ]
        );
    }

    #[test]
    fn test_spark_error_code() {
        let frame = r#"{"header":{"code":10013,"message":"input content audit failed","sid":"s"}}"#;
        assert_eq!(
            decode_spark_frame(frame),
            vec![StreamEvent::ProtocolError {
                code: 10013,
                message: "input content audit failed".into()
            }]
        );
    }
}
