//! Fixed user-facing messages.
//!
//! Every failure class ends up as one of these strings in the render sink.

use crate::config::Backend;
use crate::error::TransportError;

pub const BRAND_NAME: &str = "Copilot";

pub const SENSITIVE_NOTICE: &str = "Sensitive content detected, please rephrase your question.";
pub const FRAMEWORK_STREAM_ERROR: &str =
    "The Copilot agent ran into an error, please contact your administrator.";
pub const SESSION_EXPIRED: &str = "The current session has expired, please exit and retry.";
pub const TOO_MANY_REQUESTS: &str = "Too many requests, please try again later.";
pub const ENDED_PREMATURELY: &str =
    "The request was aborted unexpectedly, please check your network connection.";
pub const INVALID_API_KEY: &str =
    "The Copilot agent API key is invalid, please check the configuration file.";
pub const NO_PLUGINS: &str =
    "Failed to fetch plugins or the plugin list is empty. Please ask your administrator to check the backend.";
pub const EXIT_PROMPT: &str = "Type \"exit\" or press Ctrl+C to end the conversation";
pub const NOT_CONFIGURED: &str = "The LLM backend is not configured correctly, please check the configuration file.";

/// Message shown for an unparsable line when debug mode is on.
pub fn unknown_content(raw: &str) -> String {
    format!("The {BRAND_NAME} agent returned unknown content:\n```json\n{raw}\n```")
}

/// Message for a non-zero status inside a Spark frame.
pub fn protocol_error(code: i64, message: &str) -> String {
    format!("Request error: {code}\n{message}")
}

/// Follow-up question hint rendered below an answer.
pub fn suggestion(text: &str) -> String {
    format!("**You can continue asking:** {text}")
}

/// Troubleshooting text for a failed Spark websocket handshake.
pub fn spark_handshake_failed(spark_url: &str) -> String {
    format!(
        "Request error\n\n\
         Please check whether appid and api_key are correct, or whether the network is reachable.\n\
         Run \"vi ~/.config/copilot-shell/config.json\" to view and edit the configuration;\n\
         or try ping {spark_url}"
    )
}

/// Maps a transport failure to the message the given backend shows for it.
pub fn transport_failure(backend: Backend, err: &TransportError) -> String {
    match (backend, err) {
        (_, TransportError::Handshake { url, .. }) => spark_handshake_failed(url),
        (_, TransportError::TooManyRequests) => TOO_MANY_REQUESTS.to_string(),
        (_, TransportError::EndedPrematurely(_)) => ENDED_PREMATURELY.to_string(),
        (_, TransportError::InvalidApiKey) => INVALID_API_KEY.to_string(),
        (Backend::Framework, TransportError::Unauthorized) => SESSION_EXPIRED.to_string(),
        (_, TransportError::Unauthorized) => request_failed(401),
        (_, TransportError::Status(code)) => request_failed(*code),
        (Backend::Framework, TransportError::Connection(_)) => format!(
            "Failed to connect to the {BRAND_NAME} agent, please check your network connection."
        ),
        (Backend::Framework, TransportError::Timeout) => format!(
            "The {BRAND_NAME} agent request timed out, please check your network connection."
        ),
        (Backend::Framework, _) => format!(
            "The {BRAND_NAME} agent request failed, please check your network connection."
        ),
        (Backend::Spark, _) => {
            "Failed to access the model, please check your network connection.".to_string()
        }
        (Backend::OpenAi, TransportError::Connection(_)) => {
            "Failed to connect to the model.".to_string()
        }
        (Backend::OpenAi, TransportError::Timeout) => "Request to the model timed out.".to_string(),
        (Backend::OpenAi, _) => "Request to the model failed.".to_string(),
    }
}

pub fn request_failed(code: u16) -> String {
    format!("Request failed: {code}")
}

pub fn exec_builtin(prefix: &str) -> String {
    format!("Shell builtin \"{prefix}\" cannot be run here, please copy it and run it manually")
}

pub fn exec_value_error(error: &str) -> String {
    format!("Error while executing the command: {error}")
}

pub fn exec_not_found(error: &str) -> String {
    format!("Command not found: {error}")
}

pub fn exec_failed(cmd: &str, exit_code: i32) -> String {
    format!("Command \"{cmd}\" aborted with exit code {exit_code}")
}

pub fn mode_unsupported(mode_name: &str) -> String {
    format!(
        "The current LLM backend does not support {mode_name}.\n\
         The {BRAND_NAME} agent framework is recommended."
    )
}
