//! Framework agent backend: sessions, conversations, plugins and chat.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use copilot_core::session::SESSION_COOKIE;
use copilot_core::{
    Accumulator, Backend, CopilotConfig, CopilotError, LlmResult, PluginDescriptor, QueryMode,
    Renderer, Result, ScriptWriter, SessionContext, TransportError, messages,
};

use crate::decoder::decode_framework_line;
use crate::prompts::{self, PromptContext};
use crate::service::{Exchange, LlmService, Query, settle};
use crate::transport::{self, ExchangeEnd, classify_reqwest_error, classify_status};

/// Default bound on one chat exchange, body included.
pub const CHAT_TIMEOUT: Duration = Duration::from_secs(300);
/// Bound on bootstrap and control requests.
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
const LANGUAGE: &str = "en";

pub const DIAGNOSE_PLUGIN: &str = "euler-copilot-rca";
pub const TUNING_PLUGIN: &str = "euler-copilot-tune";

const SESSION_PATH: &str = "/api/client/session";
const CONVERSATION_PATH: &str = "/api/client/conversation";
const PLUGIN_PATH: &str = "/api/client/plugin";
const CHAT_PATH: &str = "/api/client/chat";
const STOP_PATH: &str = "/api/client/stop";

/// Response envelope of the Framework control endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: String,
    result: T,
}

#[derive(Debug, Deserialize)]
struct SessionResult {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct ConversationResult {
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    question: &'a str,
    conversation_id: &'a str,
    language: &'a str,
    user_selected_plugins: Vec<PluginRef<'a>>,
}

#[derive(Debug, Serialize)]
struct PluginRef<'a> {
    plugin_name: &'a str,
}

pub struct FrameworkService {
    client: Client,
    base_url: String,
    api_key: String,
    chat_timeout: Duration,
    debug: bool,
    prompt_ctx: PromptContext,
    host_ip: Option<String>,
    script_writer: Option<Arc<dyn ScriptWriter>>,
    session: SessionContext,
}

impl FrameworkService {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        prompt_ctx: PromptContext,
    ) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| CopilotError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chat_timeout: CHAT_TIMEOUT,
            debug: false,
            prompt_ctx,
            host_ip: None,
            script_writer: None,
            session: SessionContext::new(copilot_core::config::DEFAULT_MAX_TOKENS),
        })
    }

    pub fn from_config(config: &CopilotConfig, prompt_ctx: PromptContext) -> Result<Self> {
        if config.framework_url.trim().is_empty() {
            return Err(CopilotError::config("framework_url is not set"));
        }
        Ok(
            Self::new(config.framework_url.trim(), &config.framework_api_key, prompt_ctx)?
                .with_debug(config.debug_mode),
        )
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Address quoted in diagnosis and tuning questions.
    pub fn with_host_ip(mut self, ip: impl Into<String>) -> Self {
        self.host_ip = Some(ip.into());
        self
    }

    pub fn with_script_writer(mut self, writer: Arc<dyn ScriptWriter>) -> Self {
        self.script_writer = Some(writer);
        self
    }

    /// Overrides [`CHAT_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.chat_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.bearer_auth(&self.api_key);
        match &self.session.session_id {
            Some(id) => request.header(header::COOKIE, format!("{SESSION_COOKIE}={id}")),
            None => request,
        }
    }

    /// Sends a control request and decodes the `result` of its envelope.
    async fn control<T: DeserializeOwned>(
        &mut self,
        request: RequestBuilder,
    ) -> std::result::Result<T, TransportError> {
        let response = self
            .authorized(request)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        if let Some(err) = classify_status(response.status()) {
            return Err(err);
        }

        self.session.refresh_session(
            response
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| TransportError::Request(format!("unexpected response body: {e}")))?;
        if !envelope.message.is_empty() {
            tracing::debug!(message = %envelope.message, "framework control response");
        }
        Ok(envelope.result)
    }

    /// Requests a fresh session id. `401` means the API key is invalid.
    pub async fn update_session_id(&mut self) -> std::result::Result<(), TransportError> {
        let request = self.client.post(self.url(SESSION_PATH));
        let result: SessionResult = self.control(request).await.map_err(|e| match e {
            TransportError::Unauthorized => TransportError::InvalidApiKey,
            other => other,
        })?;
        self.session.session_id = Some(result.session_id);
        tracing::info!("framework session established");
        Ok(())
    }

    /// Starts a new server-side conversation.
    pub async fn create_new_conversation(&mut self) -> std::result::Result<(), TransportError> {
        let request = self.client.post(self.url(CONVERSATION_PATH));
        let result: ConversationResult = self.control(request).await?;
        tracing::info!(conversation_id = %result.conversation_id, "conversation created");
        self.session.conversation_id = Some(result.conversation_id);
        Ok(())
    }

    /// Fetches and caches the plugin list.
    pub async fn get_plugins(
        &mut self,
    ) -> std::result::Result<Vec<PluginDescriptor>, TransportError> {
        let request = self.client.get(self.url(PLUGIN_PATH));
        let plugins: Vec<PluginDescriptor> = self.control(request).await?;
        tracing::info!(count = plugins.len(), "plugins fetched");
        self.session.plugins = plugins.clone();
        Ok(plugins)
    }

    /// Session and conversation setup, rendering any failure.
    ///
    /// The service stays usable after a failure; the next chat surfaces the
    /// problem again.
    pub async fn bootstrap(&mut self, renderer: &mut dyn Renderer) -> bool {
        let result = match self.update_session_id().await {
            Ok(()) => self.create_new_conversation().await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "framework bootstrap failed");
                renderer.render(&messages::transport_failure(Backend::Framework, &e), None);
                false
            }
        }
    }

    /// Plugins and question text actually sent for `query`.
    fn plan(&self, query: &Query) -> (String, Vec<String>) {
        let ip = self.host_ip.as_deref();
        match query.mode {
            QueryMode::Chat => (
                prompts::framework_prompt(&query.text, &self.prompt_ctx),
                Vec::new(),
            ),
            QueryMode::Shell => (prompts::shell_prompt(&query.text), Vec::new()),
            QueryMode::Flow => (query.text.clone(), query.plugins.clone()),
            QueryMode::Diagnose => (
                prompts::plugin_prompt(&query.text, ip),
                vec![DIAGNOSE_PLUGIN.to_string()],
            ),
            QueryMode::Tuning => (
                prompts::plugin_prompt(&query.text, ip),
                vec![TUNING_PLUGIN.to_string()],
            ),
        }
    }

    async fn chat(&mut self, question: &str, plugins: &[String], ex: Exchange<'_>) -> LlmResult {
        let body = ChatBody {
            question,
            conversation_id: self.session.conversation_id.as_deref().unwrap_or_default(),
            language: LANGUAGE,
            user_selected_plugins: plugins
                .iter()
                .map(|name| PluginRef { plugin_name: name })
                .collect(),
        };
        let request = self
            .authorized(self.client.post(self.url(CHAT_PATH)))
            .timeout(self.chat_timeout)
            .json(&body);
        tracing::info!(plugins = plugins.len(), "sending framework chat request");

        let mut acc = Accumulator::new(Backend::Framework, self.debug);
        if let Some(writer) = &self.script_writer {
            acc = acc.with_script_writer(Arc::clone(writer));
        }

        ex.renderer.begin();
        let http = transport::stream_exchange(
            request,
            decode_framework_line,
            &mut acc,
            ex.renderer,
            ex.cancel,
        )
        .await;
        ex.renderer.finish();

        match http.end {
            ExchangeEnd::Cancelled => self.stop().await,
            ExchangeEnd::Finished(_) => self
                .session
                .refresh_session(http.set_cookie.iter().map(String::as_str)),
        }
        settle(&mut self.session.history, &acc, http.end)
    }
}

#[async_trait]
impl LlmService for FrameworkService {
    fn backend(&self) -> Backend {
        Backend::Framework
    }

    async fn get_llm_result(&mut self, query: &Query, ex: Exchange<'_>) -> LlmResult {
        let (question, plugins) = self.plan(query);
        self.chat(&question, &plugins, ex).await
    }

    async fn explain_shell_command(&mut self, cmd: &str, ex: Exchange<'_>) {
        self.chat(&prompts::explain_prompt(cmd), &[], ex).await;
    }

    fn session(&self) -> &SessionContext {
        &self.session
    }

    async fn list_plugins(&mut self) -> Vec<PluginDescriptor> {
        match self.get_plugins().await {
            Ok(plugins) => plugins,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch plugins");
                Vec::new()
            }
        }
    }

    async fn stop(&mut self) {
        let request = self
            .authorized(self.client.post(self.url(STOP_PATH)))
            .timeout(STOP_TIMEOUT);
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("stop request acknowledged")
            }
            Ok(response) => tracing::warn!(status = %response.status(), "stop request rejected"),
            Err(e) => tracing::warn!(error = %e, "stop request failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> FrameworkService {
        FrameworkService::new("http://framework.local/", "key", PromptContext::new("openEuler", true))
            .unwrap()
            .with_host_ip("192.168.1.10")
    }

    #[test]
    fn test_base_url_trailing_slash_removed() {
        assert_eq!(service().url(CHAT_PATH), "http://framework.local/api/client/chat");
    }

    #[test]
    fn test_plan_selects_fixed_plugins() {
        let svc = service();
        let (question, plugins) = svc.plan(&Query::new("why is the load high", QueryMode::Diagnose));
        assert_eq!(plugins, vec![DIAGNOSE_PLUGIN.to_string()]);
        assert!(question.contains("192.168.1.10"));

        let (_, plugins) = svc.plan(&Query::new("tune nginx", QueryMode::Tuning));
        assert_eq!(plugins, vec![TUNING_PLUGIN.to_string()]);
    }

    #[test]
    fn test_plan_flow_uses_selected_plugins() {
        let svc = service();
        let query = Query::new("deploy", QueryMode::Flow).with_plugins(vec!["a".into(), "b".into()]);
        let (question, plugins) = svc.plan(&query);
        assert_eq!(question, "deploy");
        assert_eq!(plugins, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_chat_body_shape() {
        let body = ChatBody {
            question: "q",
            conversation_id: "c1",
            language: "en",
            user_selected_plugins: vec![PluginRef { plugin_name: "p" }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "question": "q",
                "conversation_id": "c1",
                "language": "en",
                "user_selected_plugins": [{"plugin_name": "p"}]
            })
        );
    }
}
