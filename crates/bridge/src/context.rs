//! Per-call timeout and cancellation.

use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Fault, Stage};

/// Caller-supplied bounds for one request.
///
/// Every network-facing stage (identity lookup, connect, channel binding,
/// evaluate, submit) runs under the tighter of its configured timeout and the
/// time left before this context's deadline, and stops as soon as the
/// cancellation token fires.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bookledger_bridge::CallContext;
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let ctx = CallContext::new()
///     .with_timeout(Duration::from_secs(10))
///     .with_cancellation(token.clone());
///
/// // Elsewhere, e.g. when the client disconnects:
/// token.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// Creates a context with no deadline and a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Uses `token` to observe cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Returns the deadline, if one was set.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns whether the request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the bound for a stage whose configured timeout is `stage_timeout`.
    pub(crate) fn bound(&self, stage_timeout: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => {
                stage_timeout.min(deadline.saturating_duration_since(Instant::now()))
            },
            None => stage_timeout,
        }
    }

    /// Runs `fut` as `stage`, bounded by `limit` and by cancellation.
    ///
    /// The future is dropped when either bound fires.
    pub(crate) async fn run<F, T>(&self, stage: Stage, limit: Duration, fut: F) -> Result<T, Fault>
    where
        F: Future<Output = Result<T, Fault>>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::warn!(%stage, "request cancelled");
                Err(Fault::cancelled(stage))
            },
            result = tokio::time::timeout(limit, fut) => match result {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(%stage, limit_ms = limit.as_millis() as u64, "stage timed out");
                    Err(Fault::timeout(stage, limit))
                },
            },
        }
    }
}
