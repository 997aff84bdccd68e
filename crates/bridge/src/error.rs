//! Error types for the ledger bridge.
//!
//! Every failure the bridge can observe is eventually folded into a [`Fault`],
//! the single value type that the response normalizer turns into an error
//! response. The layer-specific error enums below exist so that each
//! collaborator (ledger client, credential store, configuration loader) can
//! report failures in its own vocabulary before the bridge classifies them.
//!
//! # Fault Kinds
//!
//! - [`FaultKind::IdentityNotFound`] - The identity label is absent from the credential store
//! - [`FaultKind::CredentialStore`] - The credential store itself could not be read
//! - [`FaultKind::ConnectionFailure`] - Connecting, or binding the channel/contract, failed
//! - [`FaultKind::TransactionFailure`] - The ledger rejected or failed to commit the operation
//! - [`FaultKind::MalformedPayload`] - A read succeeded but its payload is not structured data
//! - [`FaultKind::Timeout`] - A stage exceeded its time bound
//! - [`FaultKind::Cancelled`] - The caller cancelled the request

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Result type alias for bridge operations that can fault.
pub type Result<T> = std::result::Result<T, Fault>;

/// Classification of a bridge failure.
///
/// # Non-exhaustive
///
/// New kinds may be added without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FaultKind {
    /// The requested identity does not exist in the credential store.
    ///
    /// Detected before any network call. Recoverable only by provisioning the
    /// identity out-of-band.
    IdentityNotFound,
    /// The credential store could not be read (I/O error, corrupt identity).
    CredentialStore,
    /// Network or session establishment failed.
    ConnectionFailure,
    /// The ledger rejected or failed to commit a read or write operation.
    TransactionFailure,
    /// A successful read produced content that does not decode as JSON.
    MalformedPayload,
    /// A stage exceeded its configured or caller-supplied time bound.
    Timeout,
    /// The caller cancelled the request while a stage was in flight.
    Cancelled,
}

impl FaultKind {
    /// Returns a stable snake_case label for logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityNotFound => "identity_not_found",
            Self::CredentialStore => "credential_store",
            Self::ConnectionFailure => "connection_failure",
            Self::TransactionFailure => "transaction_failure",
            Self::MalformedPayload => "malformed_payload",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request stage at which a fault originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolving the caller identity from the credential store.
    Identity,
    /// Opening the network connection.
    Connect,
    /// Binding the channel and resolving the contract.
    Channel,
    /// Evaluating a read-only transaction.
    Evaluate,
    /// Submitting a state-changing transaction.
    Submit,
    /// Decoding a successful payload.
    Decode,
}

impl Stage {
    /// Returns a stable lowercase label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Connect => "connect",
            Self::Channel => "channel",
            Self::Evaluate => "evaluate",
            Self::Submit => "submit",
            Self::Decode => "decode",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified bridge failure.
///
/// Carries the raw diagnostic message of whatever failed. The message is what
/// the caller eventually sees in the error response; kind and stage are used
/// for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed ({kind}): {message}")]
pub struct Fault {
    kind: FaultKind,
    stage: Stage,
    message: String,
}

impl Fault {
    /// Creates a fault from its parts.
    #[must_use]
    pub fn new(kind: FaultKind, stage: Stage, message: impl Into<String>) -> Self {
        Self { kind, stage, message: message.into() }
    }

    /// Creates an `IdentityNotFound` fault for the given label.
    #[must_use]
    pub fn identity_not_found(label: &str) -> Self {
        Self::new(
            FaultKind::IdentityNotFound,
            Stage::Identity,
            format!("An identity for the user \"{label}\" does not exist in the wallet"),
        )
    }

    /// Creates a `MalformedPayload` fault.
    #[must_use]
    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::new(FaultKind::MalformedPayload, Stage::Decode, message)
    }

    /// Creates a `Timeout` fault for a stage bounded by `after`.
    #[must_use]
    pub fn timeout(stage: Stage, after: std::time::Duration) -> Self {
        Self::new(
            FaultKind::Timeout,
            stage,
            format!("{stage} did not complete within {}ms", after.as_millis()),
        )
    }

    /// Creates a `Cancelled` fault.
    #[must_use]
    pub fn cancelled(stage: Stage) -> Self {
        Self::new(FaultKind::Cancelled, stage, format!("request cancelled during {stage}"))
    }

    /// Classifies a ledger-client error raised at `stage`.
    ///
    /// Transport-level errors become [`FaultKind::ConnectionFailure`]; anything
    /// the ledger itself reported about the transaction becomes
    /// [`FaultKind::TransactionFailure`]. The message is kept verbatim.
    #[must_use]
    pub fn from_gateway(stage: Stage, err: &GatewayError) -> Self {
        let kind = match err {
            GatewayError::Connection { .. }
            | GatewayError::ChannelNotFound { .. }
            | GatewayError::ContractNotFound { .. }
            | GatewayError::Disconnected => FaultKind::ConnectionFailure,
            GatewayError::Endorsement { .. }
            | GatewayError::Chaincode { .. }
            | GatewayError::Ordering { .. }
            | GatewayError::Commit { .. } => FaultKind::TransactionFailure,
        };
        Self::new(kind, stage, err.to_string())
    }

    /// Returns the fault classification.
    #[must_use]
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Returns the stage the fault originated in.
    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns the raw diagnostic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consumes the fault, returning its message.
    #[must_use]
    pub fn into_message(self) -> String {
        self.message
    }
}

impl From<CredentialStoreError> for Fault {
    fn from(err: CredentialStoreError) -> Self {
        Self::new(FaultKind::CredentialStore, Stage::Identity, err.to_string())
    }
}

/// Errors reported by a ledger network client.
///
/// Implementations of [`LedgerGateway`](crate::gateway::LedgerGateway) map their
/// transport and protocol errors onto these variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The connection to the network could not be established or was lost.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The requested channel is not part of the connected network.
    #[error("channel not found: {channel}")]
    ChannelNotFound {
        /// The channel that was requested.
        channel: String,
    },

    /// The requested contract is not deployed on the channel.
    #[error("contract '{contract}' is not deployed on channel '{channel}'")]
    ContractNotFound {
        /// The channel that was searched.
        channel: String,
        /// The contract that was requested.
        contract: String,
    },

    /// The proposal was rejected by the endorsing peers.
    #[error("{message}")]
    Endorsement {
        /// Description returned by the endorsers.
        message: String,
    },

    /// The contract returned an error response.
    #[error("{message}")]
    Chaincode {
        /// The error message returned by the contract.
        message: String,
    },

    /// The ordering service did not accept the transaction.
    #[error("{message}")]
    Ordering {
        /// Description returned by the orderer.
        message: String,
    },

    /// The transaction was ordered but not committed as valid.
    #[error("{message}")]
    Commit {
        /// Validation code or description of the commit failure.
        message: String,
    },

    /// The connection was already disconnected.
    #[error("gateway connection is disconnected")]
    Disconnected,
}

impl GatewayError {
    /// Creates a `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into() }
    }

    /// Creates a `Chaincode` error.
    #[must_use]
    pub fn chaincode(message: impl Into<String>) -> Self {
        Self::Chaincode { message: message.into() }
    }
}

/// Errors raised while reading identities from a credential store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CredentialStoreError {
    /// The label cannot name an identity (empty, or contains path separators).
    #[error("invalid identity label: {label:?}")]
    InvalidLabel {
        /// The rejected label.
        label: String,
    },

    /// Reading the identity from the store failed.
    #[error("failed to read identity '{label}': {source}")]
    Io {
        /// The identity being read.
        label: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The stored identity could not be decoded.
    #[error("identity '{label}' is corrupt: {message}")]
    Corrupt {
        /// The identity being decoded.
        label: String,
        /// Description of the decoding failure.
        message: String,
    },
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The file that was being parsed.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}
