//! OpenAI-compatible chat completions over HTTP streaming.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use copilot_core::{
    Accumulator, Backend, ChatMessage, CopilotConfig, CopilotError, LlmResult, Result,
    SessionContext, messages,
};

use crate::decoder::decode_openai_line;
use crate::prompts::{self, PromptContext};
use crate::service::{Exchange, LlmService, Query, settle};
use crate::transport;

/// Default bound on one whole exchange, body included.
pub const OPENAI_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.1;
const TOP_P: f32 = 0.95;

/// Backend for any endpoint that speaks the chat completions protocol.
///
/// `url` is the full completions endpoint, it is not extended.
pub struct OpenAiService {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
    debug: bool,
    prompt_ctx: PromptContext,
    session: SessionContext,
}

impl OpenAiService {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        prompt_ctx: PromptContext,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| CopilotError::internal(format!("failed to build HTTP client: {e}")))?;
        let max_tokens = copilot_core::config::DEFAULT_MAX_TOKENS;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            timeout: OPENAI_TIMEOUT,
            debug: false,
            prompt_ctx,
            session: SessionContext::new(max_tokens),
        })
    }

    pub fn from_config(config: &CopilotConfig, prompt_ctx: PromptContext) -> Result<Self> {
        if config.model_url.trim().is_empty() {
            return Err(CopilotError::config("model_url is not set"));
        }
        Ok(Self::new(
            config.model_url.trim(),
            &config.model_api_key,
            &config.model_name,
            prompt_ctx,
        )?
        .with_max_tokens(config.openai_max_tokens())
        .with_debug(config.debug_mode))
    }

    /// Sets the token budget; resets the conversation history.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self.session = SessionContext::new(max_tokens);
        self
    }

    /// Overrides [`OPENAI_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    fn request_body(&self) -> ChatRequest<'_> {
        let mut messages = Vec::with_capacity(self.session.history.len() + 1);
        messages.push(ChatMessage::system(prompts::system_prompt(&self.prompt_ctx)));
        messages.extend(self.session.history.messages().iter().cloned());
        ChatRequest {
            model: &self.model,
            messages,
            stream: true,
            max_tokens: self.max_tokens,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        }
    }

    async fn exchange(&mut self, question: String, ex: Exchange<'_>) -> LlmResult {
        self.session.history.begin_exchange(question);
        let body = self.request_body();

        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        tracing::info!(
            url = %self.url,
            model = %self.model,
            turns = body.messages.len(),
            "sending chat completion request"
        );

        let mut acc = Accumulator::new(Backend::OpenAi, self.debug);
        ex.renderer.begin();
        let http =
            transport::stream_exchange(request, decode_openai_line, &mut acc, ex.renderer, ex.cancel)
                .await;
        ex.renderer.finish();

        settle(&mut self.session.history, &acc, http.end)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[async_trait]
impl LlmService for OpenAiService {
    fn backend(&self) -> Backend {
        Backend::OpenAi
    }

    async fn get_llm_result(&mut self, query: &Query, ex: Exchange<'_>) -> LlmResult {
        if query.mode.requires_plugins() {
            ex.renderer
                .render(&messages::mode_unsupported(query.mode.display_name()), None);
            return LlmResult::default();
        }
        let question = prompts::question_for_mode(&query.text, query.mode, &self.prompt_ctx);
        self.exchange(question, ex).await
    }

    async fn explain_shell_command(&mut self, cmd: &str, ex: Exchange<'_>) {
        self.exchange(prompts::explain_prompt(cmd), ex).await;
    }

    fn session(&self) -> &SessionContext {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> OpenAiService {
        OpenAiService::new(
            "http://localhost:11434/v1/chat/completions",
            "",
            "qwen2.5",
            PromptContext::new("openEuler 24.03", false),
        )
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let mut svc = service().with_max_tokens(1024);
        svc.session.history.begin_exchange("how much memory is free?");
        let body = serde_json::to_value(svc.request_body()).unwrap();

        assert_eq!(body["model"], "qwen2.5");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "how much memory is free?");
        assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = CopilotConfig::default();
        let ctx = PromptContext::new("Linux", false);
        assert!(OpenAiService::from_config(&config, ctx).is_err());
    }
}
