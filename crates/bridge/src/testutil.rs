//! Shared test utilities for bridge testing.
//!
//! [`StubGateway`] is a scripted [`LedgerGateway`] that counts connects and
//! disconnects and records every invocation, so tests can check how the bridge
//! drives the ledger without a network. It is feature-gated behind `testutil`
//! to keep it out of production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! bookledger-bridge = { path = "../bridge", features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use bookledger_bridge::testutil::{StubGateway, test_bridge};
//!
//! let gateway = StubGateway::new().with_evaluate_response(r#"[{"bookName":"B1"}]"#);
//! let bridge = test_bridge(&gateway);
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::{
    bridge::LedgerBridge,
    config::BridgeConfig,
    error::GatewayError,
    gateway::{ConnectOptions, Contract, GatewayConnection, LedgerGateway},
    identity::{Identity, MemoryWallet},
    operation::Mode,
};

/// A contract call observed by [`StubGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Evaluate or submit.
    pub mode: Mode,
    /// Operation name.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default)]
struct Script {
    connect_error: Option<GatewayError>,
    contract_error: Option<GatewayError>,
    evaluate: Option<Result<Bytes, GatewayError>>,
    submit: Option<Result<Bytes, GatewayError>>,
    connect_latency: Duration,
    invoke_latency: Duration,
    invoke_panic: Option<String>,
}

#[derive(Debug, Default)]
struct StubState {
    script: Mutex<Script>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    invocations: Mutex<Vec<Invocation>>,
    last_discovery: Mutex<Option<bool>>,
}

/// Scripted [`LedgerGateway`] for tests.
///
/// By default every connect succeeds, reads return `[]` and writes return an
/// empty payload. Clones share the script and the counters.
#[derive(Debug, Clone, Default)]
pub struct StubGateway {
    state: Arc<StubState>,
}

impl StubGateway {
    /// Creates a stub that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every connect with `err`.
    #[must_use]
    pub fn fail_connect(self, err: GatewayError) -> Self {
        self.state.script.lock().connect_error = Some(err);
        self
    }

    /// Fails every channel/contract resolution with `err`.
    #[must_use]
    pub fn fail_contract(self, err: GatewayError) -> Self {
        self.state.script.lock().contract_error = Some(err);
        self
    }

    /// Returns `payload` from every evaluate.
    #[must_use]
    pub fn with_evaluate_response(self, payload: impl Into<Bytes>) -> Self {
        self.state.script.lock().evaluate = Some(Ok(payload.into()));
        self
    }

    /// Fails every evaluate with `err`.
    #[must_use]
    pub fn fail_evaluate(self, err: GatewayError) -> Self {
        self.state.script.lock().evaluate = Some(Err(err));
        self
    }

    /// Returns `payload` from every submit.
    #[must_use]
    pub fn with_submit_response(self, payload: impl Into<Bytes>) -> Self {
        self.state.script.lock().submit = Some(Ok(payload.into()));
        self
    }

    /// Fails every submit with `err`.
    #[must_use]
    pub fn fail_submit(self, err: GatewayError) -> Self {
        self.state.script.lock().submit = Some(Err(err));
        self
    }

    /// Delays every connect by `latency`.
    #[must_use]
    pub fn with_connect_latency(self, latency: Duration) -> Self {
        self.state.script.lock().connect_latency = latency;
        self
    }

    /// Delays every evaluate and submit by `latency`.
    #[must_use]
    pub fn with_invoke_latency(self, latency: Duration) -> Self {
        self.state.script.lock().invoke_latency = latency;
        self
    }

    /// Panics with `message` inside every evaluate and submit.
    #[must_use]
    pub fn panic_on_invoke(self, message: impl Into<String>) -> Self {
        self.state.script.lock().invoke_panic = Some(message.into());
        self
    }

    /// Number of successful connects.
    #[must_use]
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of disconnects.
    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Every invocation seen so far, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.invocations.lock().clone()
    }

    /// Discovery setting passed to the most recent connect.
    #[must_use]
    pub fn last_discovery_setting(&self) -> Option<bool> {
        *self.state.last_discovery.lock()
    }

    fn script(&self) -> Script {
        self.state.script.lock().clone()
    }
}

#[async_trait]
impl LedgerGateway for StubGateway {
    async fn connect(
        &self,
        _identity: &Identity,
        options: ConnectOptions,
    ) -> Result<Box<dyn GatewayConnection>, GatewayError> {
        let script = self.script();
        *self.state.last_discovery.lock() = Some(options.discovery_enabled);
        if !script.connect_latency.is_zero() {
            tokio::time::sleep(script.connect_latency).await;
        }
        if let Some(err) = script.connect_error {
            return Err(err);
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubConnection { gateway: self.clone(), open: true }))
    }
}

struct StubConnection {
    gateway: StubGateway,
    open: bool,
}

#[async_trait]
impl GatewayConnection for StubConnection {
    async fn contract(
        &self,
        _channel: &str,
        _contract: &str,
    ) -> Result<Arc<dyn Contract>, GatewayError> {
        if !self.open {
            return Err(GatewayError::Disconnected);
        }
        if let Some(err) = self.gateway.script().contract_error {
            return Err(err);
        }
        Ok(Arc::new(StubContract { gateway: self.gateway.clone() }))
    }

    fn disconnect(&mut self) {
        if std::mem::replace(&mut self.open, false) {
            self.gateway.state.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct StubContract {
    gateway: StubGateway,
}

impl StubContract {
    #[allow(clippy::panic)]
    async fn invoke(&self, mode: Mode, name: &str, args: &[String]) -> Result<Bytes, GatewayError> {
        self.gateway.state.invocations.lock().push(Invocation {
            mode,
            name: name.to_owned(),
            args: args.to_vec(),
        });

        let script = self.gateway.script();
        if !script.invoke_latency.is_zero() {
            tokio::time::sleep(script.invoke_latency).await;
        }
        if let Some(message) = script.invoke_panic {
            panic!("{message}");
        }
        match mode {
            Mode::Read => script.evaluate.unwrap_or_else(|| Ok(Bytes::from_static(b"[]"))),
            Mode::Write => script.submit.unwrap_or_else(|| Ok(Bytes::new())),
        }
    }
}

#[async_trait]
impl Contract for StubContract {
    async fn evaluate_transaction(
        &self,
        name: &str,
        args: &[String],
    ) -> Result<Bytes, GatewayError> {
        self.invoke(Mode::Read, name, args).await
    }

    async fn submit_transaction(&self, name: &str, args: &[String]) -> Result<Bytes, GatewayError> {
        self.invoke(Mode::Write, name, args).await
    }
}

/// A wallet holding only `user1` of `Org1MSP`.
#[must_use]
pub fn test_wallet() -> MemoryWallet {
    MemoryWallet::with_identities([Identity::new(
        "user1",
        "Org1MSP",
        "-----BEGIN CERTIFICATE-----\ntest\n-----END CERTIFICATE-----\n",
    )])
}

/// A bridge with default configuration over [`test_wallet`] and `gateway`.
#[must_use]
pub fn test_bridge(gateway: &StubGateway) -> LedgerBridge {
    LedgerBridge::new(BridgeConfig::default(), Arc::new(test_wallet()), Arc::new(gateway.clone()))
}
