//! Caller identities and the credential stores that hold them.
//!
//! The bridge never provisions identities. It only asks a [`CredentialStore`]
//! whether a label exists and, if so, reads it. [`IdentityResolver`] adds a
//! TTL cache in front of the store so the per-request lookup does not hit the
//! filesystem every time.
//!
//! # Store Layout
//!
//! [`FileSystemWallet`] reads the layout produced by the ledger's enrollment
//! tooling:
//!
//! ```text
//! wallet/
//! └── user1/
//!     ├── user1                      identity metadata (JSON)
//!     ├── <signing-identity>-priv    private key (not read by the bridge)
//!     └── <signing-identity>-pub     public key  (not read by the bridge)
//! ```

mod resolver;
mod wallet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use resolver::IdentityResolver;
pub use wallet::{FileSystemWallet, MemoryWallet};

use crate::error::CredentialStoreError;

/// A named credential reference used to sign transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Label the identity is stored under (e.g. `user1`).
    pub label: String,
    /// Membership service provider the identity belongs to.
    pub msp_id: String,
    /// PEM-encoded enrollment certificate.
    pub certificate: String,
    /// Name of the signing key pair in the store.
    pub signing_identity: String,
}

impl Identity {
    /// Creates an identity from its parts.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        msp_id: impl Into<String>,
        certificate: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            msp_id: msp_id.into(),
            certificate: certificate.into(),
            signing_identity: String::new(),
        }
    }
}

/// Read-only access to stored identities.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns whether an identity is stored under `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if the label is invalid or the store cannot be read.
    async fn exists(&self, label: &str) -> Result<bool, CredentialStoreError>;

    /// Reads the identity stored under `label`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(identity))` if the identity exists
    /// - `Ok(None)` if it doesn't
    /// - `Err(...)` if the store cannot be read or the identity is corrupt
    async fn get(&self, label: &str) -> Result<Option<Identity>, CredentialStoreError>;
}

/// Rejects labels that cannot safely name a store entry.
pub(crate) fn validate_label(label: &str) -> Result<(), CredentialStoreError> {
    if label.is_empty()
        || label == "."
        || label == ".."
        || label.contains(['/', '\\', '\0'])
    {
        return Err(CredentialStoreError::InvalidLabel { label: label.to_owned() });
    }
    Ok(())
}
