//! The backend capability trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use copilot_core::{
    Accumulator, Backend, ConversationHistory, LlmResult, PluginDescriptor, QueryMode, Renderer,
    SessionContext,
};

use crate::transport::ExchangeEnd;

/// One user question and how to ask it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub mode: QueryMode,
    /// Plugin names selected for a `flow` question.
    pub plugins: Vec<String>,
}

impl Query {
    pub fn new(text: impl Into<String>, mode: QueryMode) -> Self {
        Self {
            text: text.into(),
            mode,
            plugins: Vec::new(),
        }
    }

    pub fn with_plugins(mut self, plugins: Vec<String>) -> Self {
        self.plugins = plugins;
        self
    }
}

/// Per-exchange collaborators: where output goes and how to stop.
pub struct Exchange<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub cancel: &'a CancellationToken,
}

impl<'a> Exchange<'a> {
    pub fn new(renderer: &'a mut dyn Renderer, cancel: &'a CancellationToken) -> Self {
        Self { renderer, cancel }
    }
}

/// A streaming LLM backend.
///
/// Methods take `&mut self`, so a service can only run one exchange at a time
/// against its [`SessionContext`]. Failures never escape: they are rendered
/// and the call yields an empty [`LlmResult`].
#[async_trait]
pub trait LlmService: Send {
    fn backend(&self) -> Backend;

    /// Streams the answer to `query` and returns the extracted commands.
    async fn get_llm_result(&mut self, query: &Query, exchange: Exchange<'_>) -> LlmResult;

    /// Streams an explanation of `cmd`. Yields no commands.
    async fn explain_shell_command(&mut self, cmd: &str, exchange: Exchange<'_>);

    fn session(&self) -> &SessionContext;

    /// Plugins the backend offers; empty when it has none.
    async fn list_plugins(&mut self) -> Vec<PluginDescriptor> {
        Vec::new()
    }

    /// Best-effort request asking the server to stop generating.
    async fn stop(&mut self) {}
}

/// Closes the history bookkeeping of an exchange and produces its result.
///
/// Only a completed exchange records the assistant turn; anything else drops
/// the pending user turn. A cancelled exchange yields nothing.
pub(crate) fn settle(
    history: &mut ConversationHistory,
    acc: &Accumulator,
    end: ExchangeEnd,
) -> LlmResult {
    match end {
        ExchangeEnd::Finished(outcome) if outcome.is_completed() => {
            history.complete_exchange(acc.answer().text.clone());
            acc.result()
        }
        ExchangeEnd::Finished(outcome) => {
            tracing::debug!(?outcome, "exchange did not complete");
            history.abort_exchange();
            acc.result()
        }
        ExchangeEnd::Cancelled => {
            tracing::info!("exchange cancelled");
            history.abort_exchange();
            LlmResult::default()
        }
    }
}
