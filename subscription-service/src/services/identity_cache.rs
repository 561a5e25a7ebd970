//! Identity lookups: subscription -> bundle and bundle -> account.
//!
//! Both mappings never change once established, so entries are inserted if
//! absent and never invalidated. Loads are single-flight per key.

use crate::error::StoreError;
use crate::services::metrics;
use crate::services::store::SubscriptionStore;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupType {
    SubscriptionToBundle,
    BundleToAccount,
}

impl LookupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LookupType::SubscriptionToBundle => "subscription_to_bundle",
            LookupType::BundleToAccount => "bundle_to_account",
        }
    }
}

/// Loads an identity mapping on a cache miss.
#[async_trait]
pub trait IdentityLoader: Send + Sync {
    async fn load(&self, lookup: LookupType, id: Uuid) -> Result<Option<Uuid>, StoreError>;
}

/// Loader backed by the subscription store.
pub struct StoreLoader {
    store: Arc<dyn SubscriptionStore>,
}

impl StoreLoader {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityLoader for StoreLoader {
    async fn load(&self, lookup: LookupType, id: Uuid) -> Result<Option<Uuid>, StoreError> {
        match lookup {
            LookupType::SubscriptionToBundle => self.store.get_bundle_id_for_subscription(id).await,
            LookupType::BundleToAccount => self.store.get_account_id_for_bundle(id).await,
        }
    }
}

type CacheKey = (LookupType, Uuid);

pub struct IdentityCache {
    loader: Arc<dyn IdentityLoader>,
    enabled: bool,
    entries: DashMap<CacheKey, Uuid>,
    gates: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl IdentityCache {
    pub fn new(loader: Arc<dyn IdentityLoader>, enabled: bool) -> Self {
        Self {
            loader,
            enabled,
            entries: DashMap::new(),
            gates: DashMap::new(),
        }
    }

    /// Cached value, loading it on a miss. Loader failures are logged and
    /// reported as "not found".
    pub async fn get_or_load(&self, lookup: LookupType, id: Uuid) -> Option<Uuid> {
        if !self.enabled {
            return self.load(lookup, id).await;
        }

        let key = (lookup, id);
        if let Some(value) = self.cached(&key) {
            return Some(value);
        }

        let gate = self
            .gates
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = gate.lock().await;

        // Another caller may have loaded it while we waited.
        if let Some(value) = self.cached(&key) {
            return Some(value);
        }

        let loaded = self.load(lookup, id).await;
        let value = loaded.map(|v| *self.entries.entry(key).or_insert(v));

        drop(guard);
        self.gates.remove(&key);
        value
    }

    /// Record a mapping the caller just established.
    pub fn put_if_absent(&self, lookup: LookupType, id: Uuid, value: Uuid) {
        if self.enabled {
            self.entries.entry((lookup, id)).or_insert(value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cached(&self, key: &CacheKey) -> Option<Uuid> {
        let value = self.entries.get(key).map(|v| *v);
        if value.is_some() {
            metrics::record_identity_lookup(key.0.as_str(), "hit");
        }
        value
    }

    async fn load(&self, lookup: LookupType, id: Uuid) -> Option<Uuid> {
        match self.loader.load(lookup, id).await {
            Ok(Some(value)) => {
                metrics::record_identity_lookup(lookup.as_str(), "loaded");
                Some(value)
            }
            Ok(None) => {
                metrics::record_identity_lookup(lookup.as_str(), "not_found");
                None
            }
            Err(e) => {
                tracing::warn!(
                    lookup = lookup.as_str(),
                    id = %id,
                    error = %e,
                    "Identity lookup failed, treating as not found"
                );
                metrics::record_identity_lookup(lookup.as_str(), "error");
                None
            }
        }
    }
}
