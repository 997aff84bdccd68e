//! In-process ledger network for development.
//!
//! [`MemoryNetwork`] implements [`LedgerGateway`] without any peers or
//! orderers. Each channel holds an ordered key/value world state, and the only
//! deployed contract is the book catalog:
//!
//! | Function     | Arguments                                      | Effect                                    |
//! |--------------|------------------------------------------------|-------------------------------------------|
//! | `queryBook`  | bookName, location                             | JSON array of every book at that location |
//! | `createBook` | bookName, author, publisher, location, library | stores the book (replacing any previous)  |
//! | `initLedger` | (ignored)                                      | stores the [`catalog_seed`] books         |
//!
//! Books are keyed by the composite key `(bookName, [location, library])`, so a
//! query is a prefix scan over `(bookName, [location])`.
//!
//! `evaluate_transaction` runs the function against current state but never
//! writes; only `submit_transaction` commits.
//!
//! # Limitations
//!
//! - State is not persisted and is lost when the process exits
//! - No endorsement policy, ordering or validation; submits commit immediately
//! - Identities are only checked against the MSP ids declared in the profile

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::RwLock;

use crate::{
    config::{DEFAULT_CONTRACT, NetworkProfile},
    error::GatewayError,
    gateway::{ConnectOptions, Contract, GatewayConnection, LedgerGateway},
    identity::Identity,
    operation::Book,
};

/// Title, author, publisher and location of the seeded catalog entries.
const SEED_TITLE: (&str, &str, &str, &str) = ("연금술사", "파울로 코엘료", "문학동네", "고양시");

/// Number of libraries holding a copy in the seeded catalog.
const SEED_LIBRARIES: usize = 9;

/// Returns the books `initLedger` commits: one title held by nine libraries at
/// the same location.
#[must_use]
pub fn catalog_seed() -> Vec<Book> {
    let (book_name, author, publisher, location) = SEED_TITLE;
    (0..SEED_LIBRARIES)
        .map(|i| Book {
            book_name: book_name.to_owned(),
            author: author.to_owned(),
            publisher: publisher.to_owned(),
            location: location.to_owned(),
            library: format!("백석 도서관{i}"),
        })
        .collect()
}

/// Separator used by composite keys.
const KEY_DELIMITER: char = '\u{0}';

/// Builds a composite key from an object type and its attributes.
fn composite_key(object_type: &str, attributes: &[&str]) -> String {
    let mut key = String::with_capacity(
        2 + object_type.len() + attributes.iter().map(|a| a.len() + 1).sum::<usize>(),
    );
    key.push(KEY_DELIMITER);
    key.push_str(object_type);
    key.push(KEY_DELIMITER);
    for attribute in attributes {
        key.push_str(attribute);
        key.push(KEY_DELIMITER);
    }
    key
}

/// World state of one channel.
#[derive(Debug, Default)]
struct ChannelState {
    entries: RwLock<BTreeMap<String, Bytes>>,
}

impl ChannelState {
    fn scan_prefix(&self, prefix: &str) -> Vec<Bytes> {
        self.entries
            .read()
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.clone())
            .collect()
    }

    fn put(&self, key: String, value: Bytes) {
        self.entries.write().insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

struct NetworkState {
    contract: String,
    channels: RwLock<BTreeMap<String, Arc<ChannelState>>>,
    msp_ids: BTreeSet<String>,
    active_connections: AtomicUsize,
}

/// In-process [`LedgerGateway`] hosting the book catalog contract.
///
/// Cheaply cloneable; all clones share the same channels and state.
#[derive(Clone)]
pub struct MemoryNetwork {
    state: Arc<NetworkState>,
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("contract", &self.state.contract)
            .field("channels", &self.channels())
            .field("active_connections", &self.active_connections())
            .finish()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new(DEFAULT_CONTRACT)
    }
}

impl MemoryNetwork {
    /// Creates a network with no channels that accepts any identity.
    #[must_use]
    pub fn new(contract: impl Into<String>) -> Self {
        Self::with_msp_ids(contract, BTreeSet::new())
    }

    fn with_msp_ids(contract: impl Into<String>, msp_ids: BTreeSet<String>) -> Self {
        Self {
            state: Arc::new(NetworkState {
                contract: contract.into(),
                channels: RwLock::new(BTreeMap::new()),
                msp_ids,
                active_connections: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a network with the channels declared by `profile`.
    ///
    /// If the profile declares organizations, only identities from one of
    /// their MSPs may connect.
    #[must_use]
    pub fn from_profile(profile: &NetworkProfile, contract: impl Into<String>) -> Self {
        let msp_ids = profile.organizations.values().map(|org| org.mspid.clone()).collect();
        let network = Self::with_msp_ids(contract, msp_ids);
        for channel in profile.channels.keys() {
            network.create_channel(channel);
        }
        network
    }

    /// Adds an empty channel. Does nothing if it already exists.
    pub fn create_channel(&self, channel: &str) {
        self.state.channels.write().entry(channel.to_owned()).or_default();
    }

    /// Builder-style [`create_channel`](Self::create_channel).
    #[must_use]
    pub fn with_channel(self, channel: &str) -> Self {
        self.create_channel(channel);
        self
    }

    /// Returns the channel names.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.state.channels.read().keys().cloned().collect()
    }

    /// Returns the number of connections not yet disconnected.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.state.active_connections.load(Ordering::Acquire)
    }

    /// Returns the number of committed records on `channel`.
    #[must_use]
    pub fn record_count(&self, channel: &str) -> usize {
        self.state.channels.read().get(channel).map_or(0, |state| state.len())
    }

    /// Commits `books` directly to `channel`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Chaincode`] if a book cannot be encoded.
    pub fn seed(
        &self,
        channel: &str,
        books: impl IntoIterator<Item = Book>,
    ) -> Result<(), GatewayError> {
        let state = {
            let mut channels = self.state.channels.write();
            Arc::clone(channels.entry(channel.to_owned()).or_default())
        };
        for book in books {
            let (key, value) = encode_book(&book)?;
            state.put(key, value);
        }
        Ok(())
    }

    /// Commits the [`catalog_seed`] books to `channel`, as `initLedger` would.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Chaincode`] if a book cannot be encoded.
    pub fn init_ledger(&self, channel: &str) -> Result<(), GatewayError> {
        self.seed(channel, catalog_seed())
    }
}

#[async_trait]
impl LedgerGateway for MemoryNetwork {
    #[tracing::instrument(skip_all, fields(identity = %identity.label, msp_id = %identity.msp_id))]
    async fn connect(
        &self,
        identity: &Identity,
        options: ConnectOptions,
    ) -> Result<Box<dyn GatewayConnection>, GatewayError> {
        if options.discovery_enabled {
            tracing::debug!("discovery requested; memory network only serves its static topology");
        }
        if !self.state.msp_ids.is_empty() && !self.state.msp_ids.contains(&identity.msp_id) {
            return Err(GatewayError::connection(format!(
                "identity '{}' belongs to MSP '{}', which is not a member of the network",
                identity.label, identity.msp_id
            )));
        }

        self.state.active_connections.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(MemoryConnection { network: self.clone(), open: true }))
    }
}

struct MemoryConnection {
    network: MemoryNetwork,
    open: bool,
}

#[async_trait]
impl GatewayConnection for MemoryConnection {
    async fn contract(
        &self,
        channel: &str,
        contract: &str,
    ) -> Result<Arc<dyn Contract>, GatewayError> {
        if !self.open {
            return Err(GatewayError::Disconnected);
        }
        let state = self
            .network
            .state
            .channels
            .read()
            .get(channel)
            .cloned()
            .ok_or_else(|| GatewayError::ChannelNotFound { channel: channel.to_owned() })?;
        if contract != self.network.state.contract {
            return Err(GatewayError::ContractNotFound {
                channel: channel.to_owned(),
                contract: contract.to_owned(),
            });
        }
        Ok(Arc::new(CatalogContract { state }))
    }

    fn disconnect(&mut self) {
        if std::mem::replace(&mut self.open, false) {
            self.network.state.active_connections.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// The book catalog contract bound to one channel.
struct CatalogContract {
    state: Arc<ChannelState>,
}

impl CatalogContract {
    fn invoke(&self, name: &str, args: &[String], commit: bool) -> Result<Bytes, GatewayError> {
        match name {
            "queryBook" => self.query_book(args),
            "createBook" => self.create_book(args, commit),
            "initLedger" => self.init_ledger(commit),
            _ => Err(GatewayError::chaincode("Invalid Smart Contract function name.")),
        }
    }

    fn query_book(&self, args: &[String]) -> Result<Bytes, GatewayError> {
        let [book_name, location] = args else {
            return Err(GatewayError::chaincode("Incorrect number of arguments. Expecting 2"));
        };

        let records = self.state.scan_prefix(&composite_key(book_name, &[location.as_str()]));

        let capacity = 2 + records.iter().map(|r| r.len() + 1).sum::<usize>();
        let mut buffer = BytesMut::with_capacity(capacity);
        buffer.put_u8(b'[');
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                buffer.put_u8(b',');
            }
            buffer.put_slice(record);
        }
        buffer.put_u8(b']');
        Ok(buffer.freeze())
    }

    fn create_book(&self, args: &[String], commit: bool) -> Result<Bytes, GatewayError> {
        let [book_name, author, publisher, location, library] = args else {
            return Err(GatewayError::chaincode("Incorrect number of arguments. Expecting 5"));
        };

        let book = Book {
            book_name: book_name.clone(),
            author: author.clone(),
            publisher: publisher.clone(),
            location: location.clone(),
            library: library.clone(),
        };
        let (key, value) = encode_book(&book)?;
        if commit {
            self.state.put(key, value);
        }
        Ok(Bytes::new())
    }

    fn init_ledger(&self, commit: bool) -> Result<Bytes, GatewayError> {
        let entries =
            catalog_seed().iter().map(encode_book).collect::<Result<Vec<_>, GatewayError>>()?;
        if commit {
            for (key, value) in entries {
                self.state.put(key, value);
            }
        }
        Ok(Bytes::new())
    }
}

fn encode_book(book: &Book) -> Result<(String, Bytes), GatewayError> {
    let key = composite_key(&book.book_name, &[book.location.as_str(), book.library.as_str()]);
    let value = serde_json::to_vec(book).map_err(|e| GatewayError::chaincode(e.to_string()))?;
    Ok((key, Bytes::from(value)))
}

#[async_trait]
impl Contract for CatalogContract {
    async fn evaluate_transaction(
        &self,
        name: &str,
        args: &[String],
    ) -> Result<Bytes, GatewayError> {
        self.invoke(name, args, false)
    }

    async fn submit_transaction(&self, name: &str, args: &[String]) -> Result<Bytes, GatewayError> {
        self.invoke(name, args, true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::config::DEFAULT_CHANNEL;

    fn identity() -> Identity {
        Identity::new("user1", "Org1MSP", "cert")
    }

    fn options() -> ConnectOptions {
        ConnectOptions { network: Arc::new(NetworkProfile::default()), discovery_enabled: false }
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|a| (*a).to_owned()).collect()
    }

    async fn contract(network: &MemoryNetwork) -> Arc<dyn Contract> {
        let connection = network.connect(&identity(), options()).await.unwrap();
        connection.contract(DEFAULT_CHANNEL, DEFAULT_CONTRACT).await.unwrap()
    }

    #[test]
    fn test_composite_key_layout() {
        assert_eq!(composite_key("B1", &["L1", "Lib1"]), "\u{0}B1\u{0}L1\u{0}Lib1\u{0}");
        assert_eq!(composite_key("B1", &["L1"]), "\u{0}B1\u{0}L1\u{0}");
    }

    #[tokio::test]
    async fn test_create_then_query() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);
        let contract = contract(&network).await;

        contract
            .submit_transaction("createBook", &strings(&["B1", "A1", "P1", "L1", "Lib1"]))
            .await
            .unwrap();
        contract
            .submit_transaction("createBook", &strings(&["B1", "A1", "P1", "L1", "Lib2"]))
            .await
            .unwrap();
        contract
            .submit_transaction("createBook", &strings(&["B1", "A1", "P1", "L2", "Lib3"]))
            .await
            .unwrap();

        let payload =
            contract.evaluate_transaction("queryBook", &strings(&["B1", "L1"])).await.unwrap();
        let books: Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(
            books,
            json!([
                {"bookName": "B1", "author": "A1", "publisher": "P1", "location": "L1", "library": "Lib1"},
                {"bookName": "B1", "author": "A1", "publisher": "P1", "location": "L1", "library": "Lib2"},
            ])
        );
    }

    #[tokio::test]
    async fn test_query_does_not_match_location_prefix() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);
        let contract = contract(&network).await;
        contract
            .submit_transaction("createBook", &strings(&["B1", "A1", "P1", "L10", "Lib1"]))
            .await
            .unwrap();

        let payload =
            contract.evaluate_transaction("queryBook", &strings(&["B1", "L1"])).await.unwrap();

        assert_eq!(&payload[..], b"[]");
    }

    #[tokio::test]
    async fn test_create_is_an_upsert() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);
        let contract = contract(&network).await;

        for author in ["A1", "A2"] {
            contract
                .submit_transaction("createBook", &strings(&["B1", author, "P1", "L1", "Lib1"]))
                .await
                .unwrap();
        }

        assert_eq!(network.record_count(DEFAULT_CHANNEL), 1);
        let payload =
            contract.evaluate_transaction("queryBook", &strings(&["B1", "L1"])).await.unwrap();
        let books: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(books[0]["author"], "A2");
    }

    #[tokio::test]
    async fn test_evaluate_never_commits() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);
        let contract = contract(&network).await;

        contract
            .evaluate_transaction("createBook", &strings(&["B1", "A1", "P1", "L1", "Lib1"]))
            .await
            .unwrap();

        assert_eq!(network.record_count(DEFAULT_CHANNEL), 0);
    }

    #[tokio::test]
    async fn test_argument_count_is_checked() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);
        let contract = contract(&network).await;

        let err = contract.evaluate_transaction("queryBook", &strings(&["B1"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Incorrect number of arguments. Expecting 2");

        let err = contract.submit_transaction("createBook", &strings(&["B1"])).await.unwrap_err();
        assert_eq!(err.to_string(), "Incorrect number of arguments. Expecting 5");
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);
        let contract = contract(&network).await;

        let err = contract.evaluate_transaction("deleteBook", &[]).await.unwrap_err();

        assert_eq!(err, GatewayError::chaincode("Invalid Smart Contract function name."));
    }

    #[tokio::test]
    async fn test_unknown_channel_and_contract() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);
        let connection = network.connect(&identity(), options()).await.unwrap();

        let err = connection.contract("otherchannel", DEFAULT_CONTRACT).await.err().unwrap();
        assert!(matches!(err, GatewayError::ChannelNotFound { .. }));

        let err = connection.contract(DEFAULT_CHANNEL, "fabcar").await.err().unwrap();
        assert!(matches!(err, GatewayError::ContractNotFound { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_is_tracked_once() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);

        let mut connection = network.connect(&identity(), options()).await.unwrap();
        assert_eq!(network.active_connections(), 1);

        connection.disconnect();
        connection.disconnect();

        assert_eq!(network.active_connections(), 0);
        let err = connection.contract(DEFAULT_CHANNEL, DEFAULT_CONTRACT).await.err().unwrap();
        assert_eq!(err, GatewayError::Disconnected);
    }

    #[tokio::test]
    async fn test_profile_restricts_msp() {
        let profile: NetworkProfile = serde_json::from_value(json!({
            "name": "basic-network",
            "organizations": { "Org1": { "mspid": "Org1MSP" } },
            "channels": { "mychannel": {} }
        }))
        .unwrap();
        let network = MemoryNetwork::from_profile(&profile, DEFAULT_CONTRACT);
        assert_eq!(network.channels(), vec!["mychannel".to_owned()]);

        let outsider = Identity::new("user2", "Org2MSP", "cert");
        let err = network.connect(&outsider, options()).await.err().unwrap();
        assert!(matches!(err, GatewayError::Connection { .. }));

        assert!(network.connect(&identity(), options()).await.is_ok());
    }

    #[tokio::test]
    async fn test_seed_commits_books() {
        let network = MemoryNetwork::default();
        let book = Book::builder()
            .book_name("B1")
            .author("A1")
            .publisher("P1")
            .location("L1")
            .library("Lib1")
            .build();

        network.seed(DEFAULT_CHANNEL, [book]).unwrap();

        assert_eq!(network.record_count(DEFAULT_CHANNEL), 1);
    }

    #[tokio::test]
    async fn test_init_ledger_seeds_catalog_on_submit() {
        let network = MemoryNetwork::default().with_channel(DEFAULT_CHANNEL);
        let contract = contract(&network).await;

        contract.evaluate_transaction("initLedger", &[]).await.unwrap();
        assert_eq!(network.record_count(DEFAULT_CHANNEL), 0);

        contract.submit_transaction("initLedger", &[]).await.unwrap();
        assert_eq!(network.record_count(DEFAULT_CHANNEL), 9);

        let payload = contract
            .evaluate_transaction("queryBook", &strings(&["연금술사", "고양시"]))
            .await
            .unwrap();
        let books: Value = serde_json::from_slice(&payload).unwrap();
        let books = books.as_array().unwrap();
        assert_eq!(books.len(), 9);
        assert_eq!(books[0]["library"], "백석 도서관0");
        assert_eq!(books[8]["library"], "백석 도서관8");
    }

    #[test]
    fn test_init_ledger_helper_matches_contract_seed() {
        let network = MemoryNetwork::default();

        network.init_ledger(DEFAULT_CHANNEL).unwrap();

        assert_eq!(network.channels(), vec![DEFAULT_CHANNEL.to_owned()]);
        assert_eq!(network.record_count(DEFAULT_CHANNEL), catalog_seed().len());
    }
}
