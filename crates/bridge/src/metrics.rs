//! Bridge counters.
//!
//! All counters are independent and monotonically increasing, so they use
//! `Ordering::Relaxed`. A [`MetricsSnapshot`] reads them one after another and
//! may be slightly inconsistent across counters under concurrent load.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{error::FaultKind, operation::Mode};

/// Counters for sessions, invocations and faults.
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    sessions_opened: AtomicU64,
    sessions_released: AtomicU64,
    evaluations: AtomicU64,
    submissions: AtomicU64,
    identity_not_found: AtomicU64,
    credential_store: AtomicU64,
    connection_failure: AtomicU64,
    transaction_failure: AtomicU64,
    malformed_payload: AtomicU64,
    timeout: AtomicU64,
    cancelled: AtomicU64,
}

/// Point-in-time copy of [`BridgeMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Connections opened.
    pub sessions_opened: u64,
    /// Connections released.
    pub sessions_released: u64,
    /// Read-only invocations attempted.
    pub evaluations: u64,
    /// Write invocations attempted.
    pub submissions: u64,
    /// `IdentityNotFound` faults.
    pub identity_not_found: u64,
    /// `CredentialStore` faults.
    pub credential_store: u64,
    /// `ConnectionFailure` faults.
    pub connection_failure: u64,
    /// `TransactionFailure` faults.
    pub transaction_failure: u64,
    /// `MalformedPayload` faults.
    pub malformed_payload: u64,
    /// `Timeout` faults.
    pub timeout: u64,
    /// `Cancelled` faults.
    pub cancelled: u64,
}

impl MetricsSnapshot {
    /// Sessions opened but not yet released.
    #[must_use]
    pub fn open_sessions(&self) -> u64 {
        self.sessions_opened.saturating_sub(self.sessions_released)
    }

    /// Total faults of every kind.
    #[must_use]
    pub fn total_faults(&self) -> u64 {
        self.identity_not_found
            + self.credential_store
            + self.connection_failure
            + self.transaction_failure
            + self.malformed_payload
            + self.timeout
            + self.cancelled
    }
}

impl BridgeMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_session_released(&self) {
        self.sessions_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invocation(&self, mode: Mode) {
        let counter = match mode {
            Mode::Read => &self.evaluations,
            Mode::Write => &self.submissions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fault(&self, kind: FaultKind) {
        let counter = match kind {
            FaultKind::IdentityNotFound => &self.identity_not_found,
            FaultKind::CredentialStore => &self.credential_store,
            FaultKind::ConnectionFailure => &self.connection_failure,
            FaultKind::TransactionFailure => &self.transaction_failure,
            FaultKind::MalformedPayload => &self.malformed_payload,
            FaultKind::Timeout => &self.timeout,
            FaultKind::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_released: self.sessions_released.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            submissions: self.submissions.load(Ordering::Relaxed),
            identity_not_found: self.identity_not_found.load(Ordering::Relaxed),
            credential_store: self.credential_store.load(Ordering::Relaxed),
            connection_failure: self.connection_failure.load(Ordering::Relaxed),
            transaction_failure: self.transaction_failure.load(Ordering::Relaxed),
            malformed_payload: self.malformed_payload.load(Ordering::Relaxed),
            timeout: self.timeout.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}
