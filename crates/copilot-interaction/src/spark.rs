//! iFlytek Spark backend over a signed websocket.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use futures::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use url::Url;

use copilot_core::config::DEFAULT_SPARK_DOMAIN;
use copilot_core::{
    Accumulator, Backend, ChatMessage, CopilotConfig, CopilotError, LlmResult, Progress, Result,
    SessionContext, StreamEvent, TransportError, messages,
};

use crate::decoder::decode_spark_frame;
use crate::prompts::{self, PromptContext};
use crate::service::{Exchange, LlmService, Query, settle};
use crate::transport::ExchangeEnd;

/// Default bound on the websocket handshake.
pub const SPARK_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default bound on the wait for each answer frame.
pub const SPARK_READ_TIMEOUT: Duration = Duration::from_secs(60);
const TEMPERATURE: f32 = 0.5;
const UID: &str = "1234";

type HmacSha256 = Hmac<Sha256>;

/// Current time in the RFC 1123 form the signature expects.
pub fn rfc1123_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Builds the authenticated websocket URL for `spark_url` at `date`.
///
/// The signature is HMAC-SHA256 over `host`, `date` and the request line,
/// keyed with the API secret. It is wrapped into a base64 authorization
/// value and carried in the query string with `date` and `host`.
pub fn signed_url(spark_url: &str, api_key: &str, api_secret: &str, date: &str) -> Result<String> {
    let mut url = Url::parse(spark_url)
        .map_err(|e| CopilotError::config(format!("invalid spark_url '{spark_url}': {e}")))?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(CopilotError::config(format!("spark_url '{spark_url}' has no host"))),
    };

    let signature_origin = format!("host: {host}\ndate: {date}\nGET {} HTTP/1.1", url.path());
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|e| CopilotError::internal(format!("invalid HMAC key: {e}")))?;
    mac.update(signature_origin.as_bytes());
    let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

    let authorization_origin = format!(
        "api_key=\"{api_key}\", algorithm=\"hmac-sha256\", headers=\"host date request-line\", signature=\"{signature}\""
    );
    let authorization = BASE64_STANDARD.encode(authorization_origin);

    url.query_pairs_mut()
        .append_pair("authorization", &authorization)
        .append_pair("date", date)
        .append_pair("host", &host);
    Ok(url.into())
}

pub struct SparkService {
    app_id: String,
    api_key: String,
    api_secret: String,
    spark_url: String,
    domain: String,
    max_tokens: u32,
    connect_timeout: Duration,
    read_timeout: Duration,
    debug: bool,
    prompt_ctx: PromptContext,
    session: SessionContext,
}

impl SparkService {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        spark_url: impl Into<String>,
        prompt_ctx: PromptContext,
    ) -> Self {
        let max_tokens = copilot_core::config::DEFAULT_SPARK_MAX_TOKENS;
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            spark_url: spark_url.into(),
            domain: DEFAULT_SPARK_DOMAIN.to_string(),
            max_tokens,
            connect_timeout: SPARK_CONNECT_TIMEOUT,
            read_timeout: SPARK_READ_TIMEOUT,
            debug: false,
            prompt_ctx,
            session: SessionContext::new(max_tokens),
        }
    }

    pub fn from_config(config: &CopilotConfig, prompt_ctx: PromptContext) -> Result<Self> {
        if config.spark_app_id.is_empty() || config.spark_api_key.is_empty() {
            return Err(CopilotError::config("spark_app_id and spark_api_key must be set"));
        }
        Ok(Self::new(
            &config.spark_app_id,
            &config.spark_api_key,
            &config.spark_api_secret,
            &config.spark_url,
            prompt_ctx,
        )
        .with_domain(&config.spark_domain)
        .with_max_tokens(config.spark_max_tokens())
        .with_debug(config.debug_mode))
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets the token budget; resets the conversation history.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self.session = SessionContext::new(max_tokens);
        self
    }

    /// Overrides [`SPARK_CONNECT_TIMEOUT`].
    pub fn with_connect_timeout(mut self, limit: Duration) -> Self {
        self.connect_timeout = limit;
        self
    }

    /// Overrides [`SPARK_READ_TIMEOUT`].
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.read_timeout = limit;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The request frame for the current history.
    ///
    /// The system prompt is only understood by the `generalv3.5` domain.
    fn request_frame(&self) -> serde_json::Value {
        let mut text: Vec<ChatMessage> = Vec::with_capacity(self.session.history.len() + 1);
        if self.domain == DEFAULT_SPARK_DOMAIN {
            text.push(ChatMessage::system(prompts::system_prompt(&self.prompt_ctx)));
        }
        text.extend(self.session.history.messages().iter().cloned());

        json!({
            "header": {
                "app_id": self.app_id,
                "uid": UID,
            },
            "parameter": {
                "chat": {
                    "domain": self.domain,
                    "temperature": TEMPERATURE,
                    "max_tokens": self.max_tokens,
                    "auditing": "default",
                }
            },
            "payload": {
                "message": {
                    "text": text
                }
            }
        })
    }

    fn classify_connect_error(&self, err: WsError) -> TransportError {
        match err {
            WsError::Http(response) => TransportError::Handshake {
                url: self.spark_url.clone(),
                detail: format!("HTTP {}", response.status()),
            },
            other => TransportError::WebSocket(other.to_string()),
        }
    }

    /// Runs one websocket exchange, folding frames into `acc`.
    async fn run_socket(&self, acc: &mut Accumulator, ex: &mut Exchange<'_>) -> ExchangeEnd {
        let url = match signed_url(&self.spark_url, &self.api_key, &self.api_secret, &rfc1123_now())
        {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(error = %e, "cannot sign spark url");
                return fail(acc, ex, TransportError::Request(e.to_string()));
            }
        };

        tracing::info!(spark_url = %self.spark_url, domain = %self.domain, "connecting to spark");
        let connected = tokio::select! {
            biased;
            _ = ex.cancel.cancelled() => return ExchangeEnd::Cancelled,
            connected = timeout(self.connect_timeout, connect_async(url.as_str())) => connected,
        };
        let mut socket = match connected {
            Ok(Ok((socket, _response))) => socket,
            Ok(Err(e)) => return fail(acc, ex, self.classify_connect_error(e)),
            Err(_) => {
                tracing::warn!(limit = ?self.connect_timeout, "spark handshake timed out");
                return fail(acc, ex, TransportError::Timeout);
            }
        };

        let frame = self.request_frame().to_string();
        if let Err(e) = socket.send(Message::Text(frame)).await {
            return fail(acc, ex, TransportError::WebSocket(e.to_string()));
        }

        let mut frames = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = ex.cancel.cancelled() => {
                    let _ = socket.close(None).await;
                    return ExchangeEnd::Cancelled;
                }
                next = timeout(self.read_timeout, socket.next()) => next,
            };
            let Ok(next) = next else {
                tracing::warn!(frames, limit = ?self.read_timeout, "spark frame wait timed out");
                let _ = socket.close(None).await;
                return fail(acc, ex, TransportError::Timeout);
            };

            let text = match next {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => break,
                Some(Err(e)) => return fail(acc, ex, TransportError::WebSocket(e.to_string())),
            };
            frames += 1;

            for event in decode_spark_frame(&text) {
                if let Progress::Finished(outcome) = acc.apply(event, ex.renderer) {
                    tracing::debug!(frames, ?outcome, "spark exchange finished");
                    let _ = socket.close(None).await;
                    return ExchangeEnd::Finished(outcome);
                }
            }
        }

        tracing::debug!(frames, "spark socket closed without final frame");
        ExchangeEnd::Finished(acc.end_of_stream())
    }

    async fn exchange(&mut self, question: String, mut ex: Exchange<'_>) -> LlmResult {
        self.session.history.begin_exchange(question);
        let mut acc = Accumulator::new(Backend::Spark, self.debug);

        ex.renderer.begin();
        let end = self.run_socket(&mut acc, &mut ex).await;
        ex.renderer.finish();

        settle(&mut self.session.history, &acc, end)
    }
}

fn fail(acc: &mut Accumulator, ex: &mut Exchange<'_>, err: TransportError) -> ExchangeEnd {
    match acc.apply(StreamEvent::ConnectionProblem(err), ex.renderer) {
        Progress::Finished(outcome) => ExchangeEnd::Finished(outcome),
        Progress::Continue => ExchangeEnd::Finished(copilot_core::ExchangeOutcome::Failed),
    }
}

#[async_trait]
impl LlmService for SparkService {
    fn backend(&self) -> Backend {
        Backend::Spark
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
