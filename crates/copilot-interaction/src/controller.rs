//! Enforces a single in-flight exchange per service.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use copilot_core::{LlmResult, Renderer};

use crate::service::{Exchange, LlmService, Query};

type SharedService = Arc<Mutex<Box<dyn LlmService>>>;

/// What a spawned exchange hands back.
pub struct Finished<R> {
    pub result: LlmResult,
    pub renderer: R,
    pub cancelled: bool,
}

struct InFlight<R> {
    cancel: CancellationToken,
    handle: JoinHandle<Finished<R>>,
}

/// Owns a backend and runs exchanges against it as tasks.
///
/// Starting a new exchange cancels the one in flight first, so the session
/// state is never touched by two exchanges at once.
pub struct ExchangeController<R> {
    service: SharedService,
    in_flight: Option<InFlight<R>>,
}

impl<R: Renderer + 'static> ExchangeController<R> {
    pub fn new(service: Box<dyn LlmService>) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            in_flight: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|inflight| !inflight.handle.is_finished())
    }

    /// Spawns an exchange for `query`, cancelling any previous one.
    ///
    /// Returns the token that cancels this exchange.
    pub fn start(&mut self, query: Query, renderer: R) -> CancellationToken {
        self.cancel();

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let service = Arc::clone(&self.service);
        let handle = tokio::spawn(async move {
            let mut renderer = renderer;
            let mut service = service.lock().await;
            let result = service
                .get_llm_result(&query, Exchange::new(&mut renderer, &token))
                .await;
            Finished {
                result,
                renderer,
                cancelled: token.is_cancelled(),
            }
        });

        self.in_flight = Some(InFlight {
            cancel: cancel.clone(),
            handle,
        });
        cancel
    }

    /// Cancels the in-flight exchange, if any.
    ///
    /// The task still runs to completion so the service can tidy up; the
    /// next [`finish`](Self::finish) or [`lock_service`](Self::lock_service)
    /// waits for it.
    pub fn cancel(&self) {
        if let Some(inflight) = &self.in_flight {
            inflight.cancel.cancel();
        }
    }

    /// Waits for the current exchange.
    ///
    /// `None` when nothing was started or the task panicked.
    pub async fn finish(&mut self) -> Option<Finished<R>> {
        let inflight = self.in_flight.take()?;
        match inflight.handle.await {
            Ok(finished) => Some(finished),
            Err(e) => {
                tracing::error!(error = %e, "exchange task failed");
                None
            }
        }
    }

    /// Exclusive access to the service once no exchange is running.
    pub async fn lock_service(&self) -> MutexGuard<'_, Box<dyn LlmService>> {
        self.service.lock().await
    }
}
