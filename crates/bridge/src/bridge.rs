//! Per-request orchestration.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use bytes::Bytes;
use futures::FutureExt;

use crate::{
    config::BridgeConfig,
    context::CallContext,
    dispatch::dispatch,
    error::{Fault, FaultKind, Stage},
    gateway::LedgerGateway,
    identity::{CredentialStore, IdentityResolver},
    metrics::MetricsSnapshot,
    normalize::{NormalizedResponse, normalize},
    operation::{Book, Mode, OperationRequest},
    session::SessionManager,
};

/// Runs ledger operations on behalf of callers.
///
/// Each call to [`execute`](Self::execute) opens its own session as the
/// configured identity, runs exactly one operation, releases the session and
/// folds the outcome into a [`NormalizedResponse`]. No fault escapes `execute`,
/// and neither does a panic raised by the ledger client: it is reported as a
/// [`FaultKind::TransactionFailure`] after the session has been released.
///
/// Safe to share across concurrent requests (wrap in an [`Arc`]).
#[derive(Debug)]
pub struct LedgerBridge {
    sessions: SessionManager,
}

impl LedgerBridge {
    /// Creates a bridge over `store` and `gateway`.
    ///
    /// The identity cache is sized from `config`.
    #[must_use]
    pub fn new(
        config: BridgeConfig,
        store: Arc<dyn CredentialStore>,
        gateway: Arc<dyn LedgerGateway>,
    ) -> Self {
        let resolver = IdentityResolver::with_cache(
            store,
            config.identity_cache_ttl(),
            config.identity_cache_capacity(),
        );
        Self { sessions: SessionManager::new(Arc::new(config), Arc::new(resolver), gateway) }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        self.sessions.config()
    }

    /// Returns the session manager.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Returns a snapshot of the bridge counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.sessions.metrics().snapshot()
    }

    /// Runs `request` and returns its single response.
    #[tracing::instrument(
        skip_all,
        fields(operation = request.name(), identity = self.config().identity())
    )]
    pub async fn execute(&self, request: &OperationRequest, ctx: &CallContext) -> NormalizedResponse {
        let outcome = AssertUnwindSafe(self.invoke(request, ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(panic_fault(request.mode(), payload.as_ref())));
        let response = normalize(request.mode(), outcome);

        match response.fault() {
            Some(fault) => {
                self.sessions.metrics().record_fault(fault.kind());
                tracing::warn!(
                    kind = %fault.kind(),
                    stage = %fault.stage(),
                    error = %fault.message(),
                    "request failed"
                );
            },
            None => tracing::info!("request completed"),
        }

        response
    }

    /// Looks up every copy of `book_name` held at `location`.
    pub async fn query_book(
        &self,
        book_name: impl Into<String>,
        location: impl Into<String>,
        ctx: &CallContext,
    ) -> NormalizedResponse {
        self.execute(&OperationRequest::query_book(book_name, location), ctx).await
    }

    /// Registers `book` on the ledger.
    pub async fn create_book(&self, book: Book, ctx: &CallContext) -> NormalizedResponse {
        self.execute(&OperationRequest::create_book(book), ctx).await
    }

    async fn invoke(&self, request: &OperationRequest, ctx: &CallContext) -> Result<Bytes, Fault> {
        let config = self.sessions.config();
        let session = self.sessions.open_session(config.identity(), config.channel(), ctx).await?;
        let outcome = dispatch(&session, request, ctx).await;
        session.close();
        outcome
    }
}

fn panic_fault(mode: Mode, payload: &(dyn Any + Send)) -> Fault {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    let stage = match mode {
        Mode::Read => Stage::Evaluate,
        Mode::Write => Stage::Submit,
    };
    tracing::error!(%stage, panic = %detail, "ledger client panicked");
    Fault::new(FaultKind::TransactionFailure, stage, format!("ledger client panicked: {detail}"))
}
