//! Cached identity resolution.

use std::{sync::Arc, time::Duration};

use moka::future::Cache;

use super::{CredentialStore, Identity};
use crate::{
    config::{DEFAULT_IDENTITY_CACHE_CAPACITY, DEFAULT_IDENTITY_CACHE_TTL},
    error::Fault,
};

/// Resolves identity labels through a [`CredentialStore`], caching hits.
///
/// # Cache Strategy
///
/// - Only successful lookups are cached. A missing identity is looked up again
///   on the next request, so an identity provisioned out-of-band is picked up
///   without waiting for a TTL.
/// - Entries expire after the configured TTL, bounding how long a removed
///   identity keeps being used.
/// - Store errors are never cached.
///
/// Safe to share across concurrent requests.
pub struct IdentityResolver {
    store: Arc<dyn CredentialStore>,
    cache: Cache<String, Arc<Identity>>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    /// Creates a resolver with the default TTL and capacity.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_cache(store, DEFAULT_IDENTITY_CACHE_TTL, DEFAULT_IDENTITY_CACHE_CAPACITY)
    }

    /// Creates a resolver with an explicit cache TTL and capacity.
    #[must_use]
    pub fn with_cache(store: Arc<dyn CredentialStore>, ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();
        Self { store, cache }
    }

    /// Resolves `label` to an identity.
    ///
    /// # Errors
    ///
    /// - [`FaultKind::IdentityNotFound`](crate::FaultKind::IdentityNotFound) if the store has no
    ///   such identity
    /// - [`FaultKind::CredentialStore`](crate::FaultKind::CredentialStore) if the store cannot be
    ///   read
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, label: &str) -> Result<Arc<Identity>, Fault> {
        if let Some(identity) = self.cache.get(label).await {
            tracing::debug!(cache = "hit", "identity resolved");
            return Ok(identity);
        }
        tracing::debug!(cache = "miss", "identity resolved");

        match self.store.get(label).await? {
            Some(identity) => {
                let identity = Arc::new(identity);
                self.cache.insert(label.to_owned(), Arc::clone(&identity)).await;
                Ok(identity)
            },
            None => {
                tracing::warn!(
                    identity = label,
                    "identity does not exist in the wallet; provision it before retrying"
                );
                Err(Fault::identity_not_found(label))
            },
        }
    }

    /// Drops any cached entry for `label`.
    pub async fn invalidate(&self, label: &str) {
        self.cache.invalidate(label).await;
    }
}
