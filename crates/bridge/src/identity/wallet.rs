//! Credential store implementations.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;

use super::{CredentialStore, Identity, validate_label};
use crate::error::CredentialStoreError;

/// On-disk identity metadata, as written by the enrollment tooling.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletEntry {
    name: String,
    mspid: String,
    enrollment: Enrollment,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Enrollment {
    #[serde(default)]
    signing_identity: String,
    identity: EnrollmentCertificate,
}

#[derive(Debug, Deserialize)]
struct EnrollmentCertificate {
    certificate: String,
}

/// Credential store backed by a wallet directory.
///
/// Each identity lives in `<root>/<label>/<label>`. The wallet is only read;
/// identities are provisioned by external enrollment tooling.
#[derive(Debug, Clone)]
pub struct FileSystemWallet {
    root: PathBuf,
}

impl FileSystemWallet {
    /// Creates a wallet rooted at `root`. The directory does not need to exist
    /// yet; a missing directory simply holds no identities.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the wallet directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, label: &str) -> PathBuf {
        self.root.join(label).join(label)
    }
}

#[async_trait]
impl CredentialStore for FileSystemWallet {
    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    async fn exists(&self, label: &str) -> Result<bool, CredentialStoreError> {
        validate_label(label)?;
        tokio::fs::try_exists(self.entry_path(label))
            .await
            .map_err(|source| CredentialStoreError::Io { label: label.to_owned(), source })
    }

    #[tracing::instrument(skip(self), fields(root = %self.root.display()))]
    async fn get(&self, label: &str) -> Result<Option<Identity>, CredentialStoreError> {
        validate_label(label)?;

        let raw = match tokio::fs::read_to_string(self.entry_path(label)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CredentialStoreError::Io { label: label.to_owned(), source });
            },
        };

        let entry: WalletEntry = serde_json::from_str(&raw).map_err(|e| {
            CredentialStoreError::Corrupt { label: label.to_owned(), message: e.to_string() }
        })?;

        if entry.name != label {
            return Err(CredentialStoreError::Corrupt {
                label: label.to_owned(),
                message: format!("entry is named '{}'", entry.name),
            });
        }

        Ok(Some(Identity {
            label: entry.name,
            msp_id: entry.mspid,
            certificate: entry.enrollment.identity.certificate,
            signing_identity: entry.enrollment.signing_identity,
        }))
    }
}

/// In-memory credential store for tests and development.
///
/// Cheaply cloneable; all clones share the same identities.
#[derive(Debug, Clone, Default)]
pub struct MemoryWallet {
    identities: Arc<RwLock<HashMap<String, Identity>>>,
}

impl MemoryWallet {
    /// Creates an empty wallet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a wallet holding `identities`.
    #[must_use]
    pub fn with_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        let wallet = Self::new();
        for identity in identities {
            wallet.insert(identity);
        }
        wallet
    }

    /// Stores an identity under its label, replacing any previous entry.
    pub fn insert(&self, identity: Identity) {
        self.identities.write().insert(identity.label.clone(), identity);
    }

    /// Removes the identity stored under `label`.
    pub fn remove(&self, label: &str) -> Option<Identity> {
        self.identities.write().remove(label)
    }
}

#[async_trait]
impl CredentialStore for MemoryWallet {
    async fn exists(&self, label: &str) -> Result<bool, CredentialStoreError> {
        validate_label(label)?;
        Ok(self.identities.read().contains_key(label))
    }

    async fn get(&self, label: &str) -> Result<Option<Identity>, CredentialStoreError> {
        validate_label(label)?;
        Ok(self.identities.read().get(label).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const USER1: &str = r#"{
        "name": "user1",
        "mspid": "Org1MSP",
        "roles": null,
        "affiliation": "",
        "enrollmentSecret": "",
        "enrollment": {
            "signingIdentity": "4f1c0d6d",
            "identity": { "certificate": "-----BEGIN CERTIFICATE-----\nMIIC\n-----END CERTIFICATE-----\n" }
        }
    }"#;

    fn write_entry(root: &Path, label: &str, contents: &str) {
        let dir = root.join(label);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(label), contents).unwrap();
    }

    #[tokio::test]
    async fn test_filesystem_wallet_reads_identity() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "user1", USER1);
        let wallet = FileSystemWallet::new(dir.path());

        assert!(wallet.exists("user1").await.unwrap());
        let identity = wallet.get("user1").await.unwrap().expect("identity present");
        assert_eq!(identity.label, "user1");
        assert_eq!(identity.msp_id, "Org1MSP");
        assert_eq!(identity.signing_identity, "4f1c0d6d");
        assert!(identity.certificate.starts_with("-----BEGIN CERTIFICATE-----"));
    }

    #[tokio::test]
    async fn test_filesystem_wallet_missing_identity() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = FileSystemWallet::new(dir.path());

        assert!(!wallet.exists("user1").await.unwrap());
        assert!(wallet.get("user1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filesystem_wallet_missing_root_holds_nothing() {
        let wallet = FileSystemWallet::new("/nonexistent/wallet");

        assert!(!wallet.exists("user1").await.unwrap());
        assert!(wallet.get("user1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filesystem_wallet_corrupt_identity() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "user1", "{ not json");
        let wallet = FileSystemWallet::new(dir.path());

        let err = wallet.get("user1").await.unwrap_err();
        assert!(matches!(err, CredentialStoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_filesystem_wallet_rejects_mismatched_name() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "admin", USER1);
        let wallet = FileSystemWallet::new(dir.path());

        let err = wallet.get("admin").await.unwrap_err();
        assert!(err.to_string().contains("named 'user1'"), "{err}");
    }

    #[tokio::test]
    async fn test_filesystem_wallet_rejects_traversal() {
        let wallet = FileSystemWallet::new("/tmp/wallet");

        let err = wallet.get("../etc").await.unwrap_err();
        assert!(matches!(err, CredentialStoreError::InvalidLabel { .. }));
    }

    #[tokio::test]
    async fn test_memory_wallet_insert_and_remove() {
        let wallet = MemoryWallet::new();
        wallet.insert(Identity::new("user1", "Org1MSP", "cert"));

        assert!(wallet.exists("user1").await.unwrap());
        assert_eq!(wallet.get("user1").await.unwrap().unwrap().msp_id, "Org1MSP");

        wallet.remove("user1");
        assert!(!wallet.exists("user1").await.unwrap());
    }
}
