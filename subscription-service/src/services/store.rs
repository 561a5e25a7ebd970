//! Persistence collaborator for bundles and subscriptions.

use crate::error::StoreError;
use crate::models::{
    Bundle, CreateBundle, Page, ProductCategory, SubscriptionRecord, TransitionEvent,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage for bundles, subscription records and their event streams.
///
/// Writes are expected to be serialized per bundle by the implementation; the
/// core only pre-checks against the snapshot it reads.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_bundle(&self, bundle_id: Uuid) -> Result<Option<Bundle>, StoreError>;

    async fn get_bundles_for_key(&self, external_key: &str) -> Result<Vec<Bundle>, StoreError>;

    async fn get_bundles_for_account(&self, account_id: Uuid) -> Result<Vec<Bundle>, StoreError>;

    async fn get_bundles_for_account_and_key(
        &self,
        account_id: Uuid,
        external_key: &str,
    ) -> Result<Vec<Bundle>, StoreError>;

    async fn list_bundles(&self, offset: u64, limit: u64) -> Result<Page<Bundle>, StoreError>;

    /// Bundles whose id, account id or external key matches `search_key`.
    async fn search_bundles(
        &self,
        search_key: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Page<Bundle>, StoreError>;

    async fn create_bundle(&self, bundle: CreateBundle) -> Result<Bundle, StoreError>;

    async fn update_bundle_external_key(
        &self,
        bundle_id: Uuid,
        external_key: &str,
        updated_utc: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn get_account_id_for_bundle(&self, bundle_id: Uuid) -> Result<Option<Uuid>, StoreError>;

    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, StoreError>;

    async fn get_subscriptions_for_bundle(
        &self,
        bundle_id: Uuid,
    ) -> Result<Vec<SubscriptionRecord>, StoreError>;

    async fn get_subscriptions_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<SubscriptionRecord>, StoreError>;

    async fn get_bundle_id_for_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Uuid>, StoreError>;

    /// Insert new subscriptions with their initial events.
    async fn create_subscriptions(&self, records: Vec<SubscriptionRecord>) -> Result<(), StoreError>;

    /// Append events to existing subscriptions.
    async fn append_events(&self, events: Vec<TransitionEvent>) -> Result<(), StoreError>;

    async fn update_charged_through_date(
        &self,
        subscription_id: Uuid,
        charged_through_date: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Most recently created base subscription of the bundle.
    async fn get_base_subscription(
        &self,
        bundle_id: Uuid,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        Ok(self
            .get_subscriptions_for_bundle(bundle_id)
            .await?
            .into_iter()
            .filter(|r| r.category == ProductCategory::Base)
            .max_by_key(|r| r.created_utc))
    }
}
