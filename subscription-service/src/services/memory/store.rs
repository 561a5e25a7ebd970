use crate::error::StoreError;
use crate::models::{Bundle, CreateBundle, Page, SubscriptionRecord, TransitionEvent};
use crate::services::store::SubscriptionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct StoreState {
    // Insertion order doubles as listing order.
    bundles: Vec<Bundle>,
    subscriptions: Vec<SubscriptionRecord>,
}

impl StoreState {
    fn bundle_mut(&mut self, bundle_id: Uuid) -> Option<&mut Bundle> {
        self.bundles.iter_mut().find(|b| b.bundle_id == bundle_id)
    }

    fn subscription_mut(&mut self, subscription_id: Uuid) -> Option<&mut SubscriptionRecord> {
        self.subscriptions
            .iter_mut()
            .find(|s| s.subscription_id == subscription_id)
    }
}

/// Store keeping everything in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of write calls received, successful or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn count_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn page(bundles: Vec<Bundle>, offset: u64, limit: u64) -> Page<Bundle> {
    let total_count = bundles.len() as u64;
    let items = bundles
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    Page {
        items,
        offset,
        total_count,
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn get_bundle(&self, bundle_id: Uuid) -> Result<Option<Bundle>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .bundles
            .iter()
            .find(|b| b.bundle_id == bundle_id)
            .cloned())
    }

    async fn get_bundles_for_key(&self, external_key: &str) -> Result<Vec<Bundle>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .bundles
            .iter()
            .filter(|b| b.external_key.as_deref() == Some(external_key))
            .cloned()
            .collect())
    }

    async fn get_bundles_for_account(&self, account_id: Uuid) -> Result<Vec<Bundle>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .bundles
            .iter()
            .filter(|b| b.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_bundles_for_account_and_key(
        &self,
        account_id: Uuid,
        external_key: &str,
    ) -> Result<Vec<Bundle>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .bundles
            .iter()
            .filter(|b| b.account_id == account_id && b.external_key.as_deref() == Some(external_key))
            .cloned()
            .collect())
    }

    async fn list_bundles(&self, offset: u64, limit: u64) -> Result<Page<Bundle>, StoreError> {
        let state = self.state.read().await;
        Ok(page(state.bundles.clone(), offset, limit))
    }

    async fn search_bundles(
        &self,
        search_key: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Page<Bundle>, StoreError> {
        let state = self.state.read().await;
        let matches = state
            .bundles
            .iter()
            .filter(|b| {
                b.bundle_id.to_string() == search_key
                    || b.account_id.to_string() == search_key
                    || b.external_key.as_deref() == Some(search_key)
            })
            .cloned()
            .collect();
        Ok(page(matches, offset, limit))
    }

    async fn create_bundle(&self, bundle: CreateBundle) -> Result<Bundle, StoreError> {
        self.count_write();
        let mut state = self.state.write().await;
        if state.bundles.iter().any(|b| b.bundle_id == bundle.bundle_id) {
            return Err(StoreError::Conflict(format!(
                "bundle {} already exists",
                bundle.bundle_id
            )));
        }
        let bundle = bundle.into_bundle();
        state.bundles.push(bundle.clone());
        Ok(bundle)
    }

    async fn update_bundle_external_key(
        &self,
        bundle_id: Uuid,
        external_key: &str,
        updated_utc: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.count_write();
        let mut state = self.state.write().await;
        let bundle = state
            .bundle_mut(bundle_id)
            .ok_or_else(|| StoreError::NotFound(format!("bundle {bundle_id}")))?;
        bundle.external_key = Some(external_key.to_string());
        bundle.updated_utc = updated_utc;
        Ok(())
    }

    async fn get_account_id_for_bundle(&self, bundle_id: Uuid) -> Result<Option<Uuid>, StoreError> {
        Ok(self.get_bundle(bundle_id).await?.map(|b| b.account_id))
    }

    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.subscription_id == subscription_id)
            .cloned())
    }

    async fn get_subscriptions_for_bundle(
        &self,
        bundle_id: Uuid,
    ) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.bundle_id == bundle_id)
            .cloned()
            .collect())
    }

    async fn get_subscriptions_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<SubscriptionRecord>, StoreError> {
        let state = self.state.read().await;
        let bundle_ids: Vec<Uuid> = state
            .bundles
            .iter()
            .filter(|b| b.account_id == account_id)
            .map(|b| b.bundle_id)
            .collect();
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| bundle_ids.contains(&s.bundle_id))
            .cloned()
            .collect())
    }

    async fn get_bundle_id_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .get_subscription(subscription_id)
            .await?
            .map(|s| s.bundle_id))
    }

    async fn create_subscriptions(&self, records: Vec<SubscriptionRecord>) -> Result<(), StoreError> {
        self.count_write();
        let mut state = self.state.write().await;
        for record in &records {
            if !state.bundles.iter().any(|b| b.bundle_id == record.bundle_id) {
                return Err(StoreError::NotFound(format!("bundle {}", record.bundle_id)));
            }
            if state
                .subscriptions
                .iter()
                .any(|s| s.subscription_id == record.subscription_id)
            {
                return Err(StoreError::Conflict(format!(
                    "subscription {} already exists",
                    record.subscription_id
                )));
            }
        }
        state.subscriptions.extend(records);
        Ok(())
    }

    async fn append_events(&self, events: Vec<TransitionEvent>) -> Result<(), StoreError> {
        self.count_write();
        let mut state = self.state.write().await;
        if let Some(missing) = events.iter().find(|e| {
            !state
                .subscriptions
                .iter()
                .any(|s| s.subscription_id == e.subscription_id)
        }) {
            return Err(StoreError::NotFound(format!(
                "subscription {}",
                missing.subscription_id
            )));
        }
        for event in events {
            if let Some(record) = state.subscription_mut(event.subscription_id) {
                record.events.push(event);
            }
        }
        Ok(())
    }

    async fn update_charged_through_date(
        &self,
        subscription_id: Uuid,
        charged_through_date: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.count_write();
        let mut state = self.state.write().await;
        let record = state
            .subscription_mut(subscription_id)
            .ok_or_else(|| StoreError::NotFound(format!("subscription {subscription_id}")))?;
        record.charged_through_date = Some(charged_through_date);
        Ok(())
    }
}
