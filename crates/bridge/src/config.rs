//! Configuration for the ledger bridge.
//!
//! This module provides [`BridgeConfig`], the immutable, process-wide settings
//! handed to the [`SessionManager`](crate::SessionManager) at construction, and
//! [`NetworkProfile`], the static description of the ledger network topology
//! (peers, orderers, channels) loaded once at startup.
//!
//! Nothing in this module is mutated after construction. The bridge reads the
//! configuration for every request but never writes it back.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default channel the bridge binds sessions to.
pub const DEFAULT_CHANNEL: &str = "mychannel";

/// Default contract resolved within the channel.
pub const DEFAULT_CONTRACT: &str = "library";

/// Default identity label used to sign transactions.
pub const DEFAULT_IDENTITY: &str = "user1";

/// Default bound on opening a connection and binding the channel (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a read-only evaluation (30 seconds).
pub const DEFAULT_EVALUATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default bound on a submit, including ordering and commit (60 seconds).
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time-to-live for resolved identities (5 minutes).
pub const DEFAULT_IDENTITY_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached identities.
pub const DEFAULT_IDENTITY_CACHE_CAPACITY: u64 = 1_000;

/// Configuration for the [`LedgerBridge`](crate::LedgerBridge).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use bookledger_bridge::BridgeConfig;
///
/// let config = BridgeConfig::builder()
///     .channel("mychannel")
///     .contract("library")
///     .identity("user1")
///     .submit_timeout(Duration::from_secs(120))
///     .build()?;
///
/// assert_eq!(config.channel(), "mychannel");
/// # Ok::<(), bookledger_bridge::ConfigError>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Channel every session is bound to.
    #[serde(default = "default_channel")]
    pub(crate) channel: String,

    /// Contract resolved within the channel.
    #[serde(default = "default_contract")]
    pub(crate) contract: String,

    /// Identity label used to sign every transaction.
    #[serde(default = "default_identity")]
    pub(crate) identity: String,

    /// Bound on connecting and binding the channel.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub(crate) connect_timeout: Duration,

    /// Bound on a read-only evaluation.
    #[serde(with = "humantime_serde", default = "default_evaluate_timeout")]
    pub(crate) evaluate_timeout: Duration,

    /// Bound on a submit, including ordering and commit.
    #[serde(with = "humantime_serde", default = "default_submit_timeout")]
    pub(crate) submit_timeout: Duration,

    /// Time-to-live of cached identities.
    #[serde(with = "humantime_serde", default = "default_identity_cache_ttl")]
    pub(crate) identity_cache_ttl: Duration,

    /// Maximum number of cached identities.
    #[serde(default = "default_identity_cache_capacity")]
    pub(crate) identity_cache_capacity: u64,

    /// Static network topology. Loaded separately from its own file.
    #[serde(skip)]
    pub(crate) network: Arc<NetworkProfile>,
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_owned()
}

fn default_contract() -> String {
    DEFAULT_CONTRACT.to_owned()
}

fn default_identity() -> String {
    DEFAULT_IDENTITY.to_owned()
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_evaluate_timeout() -> Duration {
    DEFAULT_EVALUATE_TIMEOUT
}

fn default_submit_timeout() -> Duration {
    DEFAULT_SUBMIT_TIMEOUT
}

fn default_identity_cache_ttl() -> Duration {
    DEFAULT_IDENTITY_CACHE_TTL
}

fn default_identity_cache_capacity() -> u64 {
    DEFAULT_IDENTITY_CACHE_CAPACITY
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            contract: default_contract(),
            identity: default_identity(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            evaluate_timeout: DEFAULT_EVALUATE_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            identity_cache_ttl: DEFAULT_IDENTITY_CACHE_TTL,
            identity_cache_capacity: DEFAULT_IDENTITY_CACHE_CAPACITY,
            network: Arc::default(),
        }
    }
}

#[bon::bon]
impl BridgeConfig {
    /// Creates a new configuration, validating all fields.
    ///
    /// # Optional Fields
    ///
    /// * `channel` - Channel name (default: `mychannel`).
    /// * `contract` - Contract name (default: `library`).
    /// * `identity` - Identity label (default: `user1`).
    /// * `connect_timeout` - Connect bound (default: 5 seconds).
    /// * `evaluate_timeout` - Evaluate bound (default: 30 seconds).
    /// * `submit_timeout` - Submit bound (default: 60 seconds).
    /// * `identity_cache_ttl` - Identity cache TTL (default: 5 minutes).
    /// * `identity_cache_capacity` - Identity cache capacity (default: 1000).
    /// * `network` - Network profile (default: empty profile).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a name is empty, a timeout is zero,
    /// or the network profile declares channels but not the configured one.
    #[builder]
    pub fn new(
        #[builder(into, default = DEFAULT_CHANNEL.to_owned())] channel: String,
        #[builder(into, default = DEFAULT_CONTRACT.to_owned())] contract: String,
        #[builder(into, default = DEFAULT_IDENTITY.to_owned())] identity: String,
        #[builder(default = DEFAULT_CONNECT_TIMEOUT)] connect_timeout: Duration,
        #[builder(default = DEFAULT_EVALUATE_TIMEOUT)] evaluate_timeout: Duration,
        #[builder(default = DEFAULT_SUBMIT_TIMEOUT)] submit_timeout: Duration,
        #[builder(default = DEFAULT_IDENTITY_CACHE_TTL)] identity_cache_ttl: Duration,
        #[builder(default = DEFAULT_IDENTITY_CACHE_CAPACITY)] identity_cache_capacity: u64,
        #[builder(default)] network: NetworkProfile,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            channel,
            contract,
            identity,
            connect_timeout,
            evaluate_timeout,
            submit_timeout,
            identity_cache_ttl,
            identity_cache_capacity,
            network: Arc::new(network),
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file and validates it.
    ///
    /// Missing fields take their defaults. The network profile is not part of
    /// the file; attach it with [`with_network`](Self::with_network).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if validation
    /// fails.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Returns this configuration bound to `network`, re-validating the channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the profile declares channels but not
    /// the configured one.
    pub fn with_network(mut self, network: NetworkProfile) -> Result<Self, ConfigError> {
        self.network = Arc::new(network);
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.channel.is_empty() {
            return Err(ConfigError::Invalid("channel cannot be empty".into()));
        }
        if self.contract.is_empty() {
            return Err(ConfigError::Invalid("contract cannot be empty".into()));
        }
        if self.identity.is_empty() {
            return Err(ConfigError::Invalid("identity cannot be empty".into()));
        }
        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("evaluate_timeout", self.evaluate_timeout),
            ("submit_timeout", self.submit_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        if !self.network.channels.is_empty() && !self.network.declares_channel(&self.channel) {
            return Err(ConfigError::Invalid(format!(
                "channel '{}' is not declared in network profile '{}'",
                self.channel, self.network.name
            )));
        }
        Ok(())
    }

    /// Returns the channel name.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the contract name.
    #[must_use]
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Returns the identity label.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Returns the connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the evaluate timeout.
    #[must_use]
    pub fn evaluate_timeout(&self) -> Duration {
        self.evaluate_timeout
    }

    /// Returns the submit timeout.
    #[must_use]
    pub fn submit_timeout(&self) -> Duration {
        self.submit_timeout
    }

    /// Returns the identity cache TTL.
    #[must_use]
    pub fn identity_cache_ttl(&self) -> Duration {
        self.identity_cache_ttl
    }

    /// Returns the identity cache capacity.
    #[must_use]
    pub fn identity_cache_capacity(&self) -> u64 {
        self.identity_cache_capacity
    }

    /// Returns the network profile.
    #[must_use]
    pub fn network(&self) -> &Arc<NetworkProfile> {
        &self.network
    }
}

/// Static description of a ledger network, in connection-profile format.
///
/// Only the fields the bridge reads are modelled; unknown fields are ignored
/// so real-world profiles load unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    /// Profile name.
    #[serde(default)]
    pub name: String,

    /// Profile schema version.
    #[serde(default)]
    pub version: String,

    /// Client section naming the organization this process acts for.
    #[serde(default)]
    pub client: Option<ClientSection>,

    /// Organizations keyed by name.
    #[serde(default)]
    pub organizations: BTreeMap<String, Organization>,

    /// Peer endpoints keyed by name.
    #[serde(default)]
    pub peers: BTreeMap<String, Endpoint>,

    /// Ordering service endpoints keyed by name.
    #[serde(default)]
    pub orderers: BTreeMap<String, Endpoint>,

    /// Certificate authority endpoints keyed by name.
    #[serde(default)]
    pub certificate_authorities: BTreeMap<String, Endpoint>,

    /// Channels keyed by name.
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelSection>,
}

/// The `client` section of a connection profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSection {
    /// Organization the client belongs to.
    #[serde(default)]
    pub organization: String,
}

/// An organization entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Membership service provider id.
    pub mspid: String,
    /// Peers owned by the organization.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Certificate authorities of the organization.
    #[serde(default)]
    pub certificate_authorities: Vec<String>,
}

/// A network endpoint (peer, orderer or CA).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Endpoint URL, e.g. `grpc://localhost:7051`.
    pub url: String,
    /// Client options passed through to the transport.
    #[serde(default)]
    pub grpc_options: BTreeMap<String, serde_json::Value>,
}

/// A channel entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelSection {
    /// Orderers serving the channel.
    #[serde(default)]
    pub orderers: Vec<String>,
    /// Peers joined to the channel, with their roles.
    #[serde(default)]
    pub peers: BTreeMap<String, serde_json::Value>,
}

impl NetworkProfile {
    /// Loads a profile from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: PathBuf::from(path), source })
    }

    /// Returns whether the profile declares `channel`.
    #[must_use]
    pub fn declares_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Returns the MSP id of the client organization, if declared.
    #[must_use]
    pub fn client_msp_id(&self) -> Option<&str> {
        let org = &self.client.as_ref()?.organization;
        self.organizations.get(org).map(|o| o.mspid.as_str())
    }
}
