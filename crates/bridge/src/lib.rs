//! Identity-scoped bridge between catalog requests and a permissioned ledger.
//!
//! A caller asks the bridge to run one named operation (look up a book,
//! register a book). The bridge resolves the configured identity from a
//! credential store, opens a session to the ledger network as that identity,
//! evaluates or submits the transaction, releases the session and folds
//! whatever happened into exactly one response.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LedgerBridge                           │
//! │        open ─► dispatch ─► close ─► normalize               │
//! ├──────────────────────┬──────────────────────────────────────┤
//! │    SessionManager    │   dispatch        │   normalize      │
//! │  (identity, connect, │ (evaluate/submit) │ (Ok / Ack / Err) │
//! │   channel, contract) │                   │                  │
//! ├──────────────────────┴───────────────────┴──────────────────┤
//! │  IdentityResolver (moka TTL cache)   │  LedgerGateway trait  │
//! │  CredentialStore trait               │                       │
//! ├──────────────────┬───────────────────┼───────────┬───────────┤
//! │ FileSystemWallet │   MemoryWallet    │ (network) │MemoryNet. │
//! └──────────────────┴───────────────────┴───────────┴───────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use bookledger_bridge::{
//!     BridgeConfig, CallContext, Identity, LedgerBridge, MemoryNetwork, MemoryWallet,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let wallet = MemoryWallet::with_identities([Identity::new("user1", "Org1MSP", "cert")]);
//!     let network = MemoryNetwork::default().with_channel("mychannel");
//!     let bridge = LedgerBridge::new(BridgeConfig::default(), Arc::new(wallet), Arc::new(network));
//!
//!     let response = bridge.query_book("B1", "L1", &CallContext::new()).await;
//!     assert!(response.is_ok());
//!     assert_eq!(response.into_body(), serde_json::json!([]));
//! }
//! ```
//!
//! # Error Handling
//!
//! Everything that can go wrong inside a request is a [`Fault`]: a
//! [`FaultKind`], the [`Stage`] it happened in and the raw diagnostic message.
//! [`LedgerBridge::execute`] never returns a fault directly; it is always
//! folded into [`NormalizedResponse::Rejected`].
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the [`testutil`] module with a scripted stub gateway and wallet
//!   helpers. Enable this in `[dev-dependencies]` for integration tests.
//! - **`failpoints`**: Activates the `session-after-connect` and `dispatch-before-invoke` fail
//!   points.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod memory;
pub mod metrics;
pub mod normalize;
pub mod operation;
pub mod session;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use bridge::LedgerBridge;
pub use config::{BridgeConfig, NetworkProfile};
pub use context::CallContext;
pub use dispatch::dispatch;
pub use error::{ConfigError, CredentialStoreError, Fault, FaultKind, GatewayError, Result, Stage};
pub use gateway::{ConnectOptions, Contract, GatewayConnection, LedgerGateway};
pub use identity::{CredentialStore, FileSystemWallet, Identity, IdentityResolver, MemoryWallet};
pub use memory::{MemoryNetwork, catalog_seed};
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use normalize::{NormalizedResponse, ResponseStatus, SUBMIT_ACKNOWLEDGEMENT, normalize};
pub use operation::{Book, Mode, OperationRequest};
pub use session::{Session, SessionManager};
