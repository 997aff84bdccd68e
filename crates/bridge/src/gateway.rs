//! Ledger network client abstraction.
//!
//! The bridge treats the ledger network as an opaque transactional service.
//! These traits are the seam between the bridge and whatever client actually
//! talks to peers and orderers:
//!
//! ```text
//! LedgerGateway::connect(identity)  ──►  GatewayConnection
//!                                           │ contract(channel, name)
//!                                           ▼
//!                                        Contract
//!                                  evaluate_transaction / submit_transaction
//! ```
//!
//! [`MemoryNetwork`](crate::memory::MemoryNetwork) is an in-process
//! implementation for development.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{config::NetworkProfile, error::GatewayError, identity::Identity};

/// Options for opening a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Static network topology to connect to.
    pub network: Arc<NetworkProfile>,
    /// Whether peers may be discovered dynamically. The bridge always passes
    /// `false` and targets the static topology.
    pub discovery_enabled: bool,
}

/// Opens identity-scoped connections to a ledger network.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Connects to the network as `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Connection`] if the network cannot be reached or
    /// refuses the identity.
    async fn connect(
        &self,
        identity: &Identity,
        options: ConnectOptions,
    ) -> Result<Box<dyn GatewayConnection>, GatewayError>;
}

/// An open connection to the network.
#[async_trait]
pub trait GatewayConnection: Send + Sync {
    /// Binds `channel` and resolves the `contract` deployed on it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ChannelNotFound`] or
    /// [`GatewayError::ContractNotFound`] if either cannot be resolved.
    async fn contract(
        &self,
        channel: &str,
        contract: &str,
    ) -> Result<Arc<dyn Contract>, GatewayError>;

    /// Releases the connection. Called exactly once by the bridge.
    fn disconnect(&mut self);
}

/// A contract deployed on a channel.
#[async_trait]
pub trait Contract: Send + Sync {
    /// Executes `name` against current state without committing.
    async fn evaluate_transaction(&self, name: &str, args: &[String])
    -> Result<Bytes, GatewayError>;

    /// Endorses, orders and commits `name`; returns after the commit.
    async fn submit_transaction(&self, name: &str, args: &[String]) -> Result<Bytes, GatewayError>;
}
