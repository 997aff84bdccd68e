//! Session management.
//!
//! A [`Session`] is a request-private, single-use handle to a contract on a
//! channel, bound to one identity. It owns exactly one gateway connection and
//! releases it exactly once: either explicitly through [`Session::close`] or,
//! if the request ends any other way (early return, timeout, cancellation,
//! panic), when the session is dropped.

use std::{sync::Arc, time::Duration};

use fail::fail_point;

use crate::{
    config::BridgeConfig,
    context::CallContext,
    error::{Fault, FaultKind, Stage},
    gateway::{ConnectOptions, Contract, GatewayConnection, LedgerGateway},
    identity::IdentityResolver,
    metrics::BridgeMetrics,
};

/// Releases its connection on drop unless already released.
struct ConnectionGuard {
    connection: Option<Box<dyn GatewayConnection>>,
    metrics: Arc<BridgeMetrics>,
}

impl ConnectionGuard {
    fn new(connection: Box<dyn GatewayConnection>, metrics: Arc<BridgeMetrics>) -> Self {
        metrics.record_session_opened();
        Self { connection: Some(connection), metrics }
    }

    fn get(&self) -> Option<&dyn GatewayConnection> {
        self.connection.as_deref()
    }

    fn release(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect();
            self.metrics.record_session_released();
            tracing::debug!("gateway connection released");
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// An open, identity-bound handle to a contract.
///
/// Never shared across requests. Closing consumes the session, so no operation
/// can be attempted on a closed session.
pub struct Session {
    identity: String,
    channel: String,
    contract_name: String,
    contract: Arc<dyn Contract>,
    evaluate_timeout: Duration,
    submit_timeout: Duration,
    metrics: Arc<BridgeMetrics>,
    // Declared last so the contract handle is dropped before the connection.
    guard: ConnectionGuard,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("channel", &self.channel)
            .field("contract", &self.contract_name)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Returns the identity label the session is bound to.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the channel the session is bound to.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the name of the resolved contract.
    #[must_use]
    pub fn contract_name(&self) -> &str {
        &self.contract_name
    }

    /// Returns whether the underlying connection is still held.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.guard.get().is_some()
    }

    /// Releases the connection.
    pub fn close(mut self) {
        self.guard.release();
    }

    pub(crate) fn contract(&self) -> &dyn Contract {
        self.contract.as_ref()
    }

    pub(crate) fn evaluate_timeout(&self) -> Duration {
        self.evaluate_timeout
    }

    pub(crate) fn submit_timeout(&self) -> Duration {
        self.submit_timeout
    }

    pub(crate) fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }
}

/// Opens sessions against the configured network.
///
/// Holds only immutable configuration and shared, read-only collaborators;
/// safe to share across concurrent requests.
pub struct SessionManager {
    config: Arc<BridgeConfig>,
    resolver: Arc<IdentityResolver>,
    gateway: Arc<dyn LedgerGateway>,
    metrics: Arc<BridgeMetrics>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("channel", &self.config.channel())
            .field("contract", &self.config.contract())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates a session manager.
    #[must_use]
    pub fn new(
        config: Arc<BridgeConfig>,
        resolver: Arc<IdentityResolver>,
        gateway: Arc<dyn LedgerGateway>,
    ) -> Self {
        Self { config, resolver, gateway, metrics: Arc::new(BridgeMetrics::new()) }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the identity resolver.
    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Returns the shared counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// Opens a session for `identity_label` on `channel`.
    ///
    /// Resolves the identity first; if it does not exist, no connection is
    /// attempted. Otherwise connects with discovery disabled, binds the channel
    /// and resolves the configured contract. If anything after the connect
    /// fails, the connection is released before the fault is returned.
    ///
    /// # Errors
    ///
    /// - [`FaultKind::IdentityNotFound`] / [`FaultKind::CredentialStore`] from identity resolution
    /// - [`FaultKind::ConnectionFailure`] if connecting or binding fails
    /// - [`FaultKind::Timeout`] / [`FaultKind::Cancelled`] if `ctx` or the connect timeout fires
    #[tracing::instrument(skip(self, ctx), fields(contract = %self.config.contract()))]
    pub async fn open_session(
        &self,
        identity_label: &str,
        channel: &str,
        ctx: &CallContext,
    ) -> Result<Session, Fault> {
        let connect_timeout = self.config.connect_timeout();

        let identity = ctx
            .run(Stage::Identity, ctx.bound(connect_timeout), self.resolver.resolve(identity_label))
            .await?;

        let options =
            ConnectOptions { network: Arc::clone(self.config.network()), discovery_enabled: false };
        let connection = ctx
            .run(Stage::Connect, ctx.bound(connect_timeout), async {
                self.gateway
                    .connect(&identity, options)
                    .await
                    .map_err(|e| Fault::from_gateway(Stage::Connect, &e))
            })
            .await?;
        let guard = ConnectionGuard::new(connection, Arc::clone(&self.metrics));

        fail_point!("session-after-connect", |_| {
            Err(Fault::new(
                FaultKind::ConnectionFailure,
                Stage::Channel,
                "injected failure after connect",
            ))
        });

        let contract_name = self.config.contract();
        let contract = ctx
            .run(Stage::Channel, ctx.bound(connect_timeout), async {
                let connection = guard.get().ok_or_else(|| {
                    Fault::new(FaultKind::ConnectionFailure, Stage::Channel, "connection released")
                })?;
                connection
                    .contract(channel, contract_name)
                    .await
                    .map_err(|e| Fault::from_gateway(Stage::Channel, &e))
            })
            .await?;

        tracing::debug!("session opened");

        Ok(Session {
            identity: identity.label.clone(),
            channel: channel.to_owned(),
            contract_name: contract_name.to_owned(),
            contract,
            evaluate_timeout: self.config.evaluate_timeout(),
            submit_timeout: self.config.submit_timeout(),
            metrics: Arc::clone(&self.metrics),
            guard,
        })
    }
}
