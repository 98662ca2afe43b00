//! Feature persistence.
//!
//! [`FeatureStore`] is the only component that touches the backing store. It
//! keeps the last-known collection in a single in-memory slot: reads go
//! through to the backend only while the slot is empty, and every save
//! replaces the slot before writing through. The slot never holds a
//! collection the backend refused.
//!
//! The backend is resolved once, in precedence order:
//! 1. a caller-supplied [`StorageAdapter`]
//! 2. a [`RemoteCollection`] when the `cloud` backend is configured
//! 3. the [`LocalStore`] SQLite default

pub mod local;
pub mod remote;
mod schema;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{Config, StorageBackend};
use crate::models::{Feature, FeatureId};

pub use local::LocalStore;
pub use remote::{HttpCollection, RemoteCollection, WriteBatch, WriteOp};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Errors from a caller-supplied adapter, passed through unchanged.
    #[error(transparent)]
    Adapter(anyhow::Error),

    #[error("Remote collection error: {0}")]
    Remote(anyhow::Error),

    #[error("Local store error: {0}")]
    Local(anyhow::Error),

    #[error("Duplicate feature id: {0}")]
    DuplicateId(FeatureId),
}

/// Caller-supplied persistence for the whole feature collection.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get(&self) -> anyhow::Result<Vec<Feature>>;
    async fn save(&self, features: &[Feature]) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub enum Backend {
    Adapter(Arc<dyn StorageAdapter>),
    Remote(Arc<dyn RemoteCollection>),
    Local(LocalStore),
}

impl Backend {
    /// Pick the backend for this configuration.
    ///
    /// `remote` overrides the HTTP collection built from `remote_endpoint`,
    /// and `local` an already opened store in place of `db_path`. A `cloud`
    /// configuration with no collection available falls back to the local
    /// store.
    pub fn resolve(
        config: &Config,
        adapter: Option<Arc<dyn StorageAdapter>>,
        remote: Option<Arc<dyn RemoteCollection>>,
        local: Option<LocalStore>,
    ) -> Result<Self, StoreError> {
        if let Some(adapter) = adapter {
            return Ok(Self::Adapter(adapter));
        }
        if config.storage_backend == StorageBackend::Cloud {
            let remote = remote.or_else(|| {
                config.remote_endpoint.as_ref().map(|url| {
                    Arc::new(HttpCollection::new(url.clone(), config.api_key.clone()))
                        as Arc<dyn RemoteCollection>
                })
            });
            match remote {
                Some(remote) => return Ok(Self::Remote(remote)),
                None => tracing::warn!("Cloud storage configured without a remote collection, using local store"),
            }
        }
        if let Some(local) = local {
            return Ok(Self::Local(local));
        }
        let path = config
            .resolved_db_path()
            .map_err(|e| StoreError::Local(e.into()))?;
        let local = LocalStore::open(path).map_err(StoreError::Local)?;
        Ok(Self::Local(local))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Adapter(_) => "adapter",
            Self::Remote(_) => "remote",
            Self::Local(_) => "local",
        }
    }
}

pub struct FeatureStore {
    backend: Backend,
    cache: Mutex<Option<Vec<Feature>>>,
}

impl FeatureStore {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            cache: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    fn cached(&self) -> Option<Vec<Feature>> {
        self.cache.lock().expect("feature cache lock poisoned").clone()
    }

    fn replace_cache(&self, features: Vec<Feature>) -> Option<Vec<Feature>> {
        self.cache
            .lock()
            .expect("feature cache lock poisoned")
            .replace(features)
    }

    fn restore_cache(&self, previous: Option<Vec<Feature>>) {
        *self.cache.lock().expect("feature cache lock poisoned") = previous;
    }

    /// All stored features, from the cache when it is populated.
    pub async fn list(&self) -> Result<Vec<Feature>, StoreError> {
        if let Some(features) = self.cached() {
            return Ok(features);
        }

        let features = match &self.backend {
            Backend::Adapter(adapter) => adapter.get().await.map_err(StoreError::Adapter)?,
            Backend::Remote(remote) => remote.fetch_all().await.map_err(StoreError::Remote)?,
            Backend::Local(local) => local.read_features().map_err(StoreError::Local)?,
        };
        tracing::debug!("Loaded {} features from {} backend", features.len(), self.backend.kind());

        self.replace_cache(features.clone());
        Ok(features)
    }

    pub async fn get(&self, id: FeatureId) -> Result<Option<Feature>, StoreError> {
        Ok(self.list().await?.into_iter().find(|f| f.id == id))
    }

    /// Replace the whole collection: cache first, then the backend. A failed
    /// backend write puts the previous cache contents back.
    pub async fn save(&self, features: Vec<Feature>) -> Result<(), StoreError> {
        let mut seen = HashSet::with_capacity(features.len());
        if let Some(dup) = features.iter().find(|f| !seen.insert(f.id)) {
            return Err(StoreError::DuplicateId(dup.id));
        }

        let previous = self.replace_cache(features.clone());
        let written = self.write_through(&features, previous.as_deref()).await;
        if let Err(e) = &written {
            tracing::warn!(
                "Write to {} backend failed, keeping previous cache: {}",
                self.backend.kind(),
                e
            );
            self.restore_cache(previous);
        }
        written
    }

    async fn write_through(
        &self,
        features: &[Feature],
        previous: Option<&[Feature]>,
    ) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Adapter(adapter) => adapter.save(features).await.map_err(StoreError::Adapter),
            Backend::Remote(remote) => {
                let mut batch = WriteBatch::default();
                for feature in features {
                    batch.set(feature);
                }
                let kept: HashSet<FeatureId> = features.iter().map(|f| f.id).collect();
                for gone in previous.into_iter().flatten().filter(|f| !kept.contains(&f.id)) {
                    batch.delete(gone.id);
                }
                if batch.is_empty() {
                    return Ok(());
                }
                remote.commit(batch).await.map_err(StoreError::Remote)
            }
            Backend::Local(local) => local.write_features(features).map_err(StoreError::Local),
        }
    }

    /// Append one feature. Not atomic with respect to concurrent callers.
    pub async fn add(&self, feature: Feature) -> Result<(), StoreError> {
        let mut features = self.list().await?;
        if features.iter().any(|f| f.id == feature.id) {
            return Err(StoreError::DuplicateId(feature.id));
        }
        features.push(feature);
        self.save(features).await
    }

    /// Remove one feature. Returns whether it was present; the collection is
    /// re-saved either way.
    pub async fn remove(&self, id: FeatureId) -> Result<bool, StoreError> {
        let features = self.list().await?;
        let before = features.len();
        let remaining: Vec<Feature> = features.into_iter().filter(|f| f.id != id).collect();
        let removed = remaining.len() != before;
        self.save(remaining).await?;
        Ok(removed)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        // Populate the slot first so a remote backend knows what to delete.
        self.list().await?;
        self.save(Vec::new()).await
    }
}
