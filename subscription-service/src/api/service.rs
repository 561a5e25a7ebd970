//! SubscriptionInternalApi: reads, identity lookups and shared plumbing.

use crate::config::SubscriptionConfig;
use crate::error::SubscriptionError;
use crate::lifecycle::{all_transitions, sort_for_bundle_listing};
use crate::models::{
    Bundle, CallContext, EffectiveSubscriptionEvent, Subscription, SubscriptionRecord,
};
use crate::services::{
    record_api_request, record_api_request_duration, record_error, Catalog, CatalogProvider,
    IdentityCache, LookupType, StoreLoader, SubscriptionStore,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Subscription core API.
pub struct SubscriptionInternalApi {
    pub(super) store: Arc<dyn SubscriptionStore>,
    pub(super) catalogs: Arc<dyn CatalogProvider>,
    pub(super) identities: IdentityCache,
    pub(super) config: SubscriptionConfig,
}

impl SubscriptionInternalApi {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        catalogs: Arc<dyn CatalogProvider>,
        config: SubscriptionConfig,
    ) -> Self {
        let loader = Arc::new(StoreLoader::new(store.clone()));
        Self {
            identities: IdentityCache::new(loader, config.identity_cache.enabled),
            store,
            catalogs,
            config,
        }
    }

    pub fn config(&self) -> &SubscriptionConfig {
        &self.config
    }

    pub(super) async fn catalog(&self, ctx: &CallContext) -> Result<Arc<dyn Catalog>, SubscriptionError> {
        Ok(self.catalogs.full_catalog(ctx).await?)
    }

    /// Subscriptions of a bundle folded as of `now`, in canonical order.
    pub(super) fn fold(records: &[SubscriptionRecord], now: DateTime<Utc>) -> Vec<Subscription> {
        let mut subscriptions: Vec<Subscription> = records
            .iter()
            .map(|r| Subscription::rebuild(r, &[], now))
            .collect();
        sort_for_bundle_listing(&mut subscriptions);
        subscriptions
    }

    pub(super) async fn subscription_record(
        &self,
        subscription_id: Uuid,
    ) -> Result<SubscriptionRecord, SubscriptionError> {
        self.store
            .get_subscription(subscription_id)
            .await?
            .ok_or(SubscriptionError::InvalidSubscriptionId(subscription_id))
    }

    pub(super) fn check_external_key(&self, key: Option<&str>) -> Result<(), SubscriptionError> {
        let max = self.config.bundles.max_external_key_length;
        match key.map(|k| k.chars().count()) {
            Some(length) if length > max => {
                Err(SubscriptionError::ExternalKeyTooLong { length, max })
            }
            _ => Ok(()),
        }
    }

    /// Record request metrics for `result` and log failures.
    pub(super) fn observe<T>(
        method: &str,
        start: Instant,
        result: &Result<T, SubscriptionError>,
    ) {
        match result {
            Ok(_) => record_api_request(method, "ok"),
            Err(e) => {
                tracing::warn!(error = %e, method, "Subscription operation failed");
                record_error(e.error_type(), method);
                record_api_request(method, "error");
            }
        }
        record_api_request_duration(method, start.elapsed().as_secs_f64());
    }

    #[tracing::instrument(skip(self, ctx), fields(method = "get_subscription_from_id"))]
    pub async fn get_subscription_from_id(
        &self,
        ctx: &CallContext,
        subscription_id: Uuid,
    ) -> Result<Subscription, SubscriptionError> {
        let start = Instant::now();
        let method = "get_subscription_from_id";

        let result: Result<_, SubscriptionError> = async {
            let record = self.subscription_record(subscription_id).await?;
            Ok(Subscription::rebuild(&record, &[], ctx.created_date))
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self, ctx), fields(method = "get_subscriptions_for_bundle"))]
    pub async fn get_subscriptions_for_bundle(
        &self,
        ctx: &CallContext,
        bundle_id: Uuid,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_subscriptions_for_bundle";

        let result: Result<_, SubscriptionError> = async {
            let records = self.store.get_subscriptions_for_bundle(bundle_id).await?;
            tracing::debug!(bundle_id = %bundle_id, count = records.len(), "Loaded bundle subscriptions");
            Ok(Self::fold(&records, ctx.created_date))
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    /// Subscriptions of the context account, grouped by bundle.
    #[tracing::instrument(skip(self, ctx), fields(method = "get_subscriptions_for_account", account_id = %ctx.account_id))]
    pub async fn get_subscriptions_for_account(
        &self,
        ctx: &CallContext,
    ) -> Result<HashMap<Uuid, Vec<Subscription>>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_subscriptions_for_account";

        let result: Result<_, SubscriptionError> = async {
            let records = self.store.get_subscriptions_for_account(ctx.account_id).await?;
            let mut by_bundle: HashMap<Uuid, Vec<SubscriptionRecord>> = HashMap::new();
            for record in records {
                by_bundle.entry(record.bundle_id).or_default().push(record);
            }
            Ok(by_bundle
                .into_iter()
                .map(|(bundle_id, records)| (bundle_id, Self::fold(&records, ctx.created_date)))
                .collect())
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self, ctx), fields(method = "get_base_subscription"))]
    pub async fn get_base_subscription(
        &self,
        ctx: &CallContext,
        bundle_id: Uuid,
    ) -> Result<Subscription, SubscriptionError> {
        let start = Instant::now();
        let method = "get_base_subscription";

        let result: Result<_, SubscriptionError> = async {
            let record = self
                .store
                .get_base_subscription(bundle_id)
                .await?
                .ok_or(SubscriptionError::NoSuchBaseSubscription(bundle_id))?;
            Ok(Subscription::rebuild(&record, &[], ctx.created_date))
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    /// Every transition of `subscription`, past and future.
    pub fn get_all_transitions(&self, subscription: &Subscription) -> Vec<EffectiveSubscriptionEvent> {
        all_transitions(subscription)
    }

    #[tracing::instrument(skip(self), fields(method = "get_bundle_from_id"))]
    pub async fn get_bundle_from_id(&self, bundle_id: Uuid) -> Result<Bundle, SubscriptionError> {
        let start = Instant::now();
        let method = "get_bundle_from_id";

        let result: Result<_, SubscriptionError> = async {
            self.store
                .get_bundle(bundle_id)
                .await?
                .ok_or(SubscriptionError::InvalidBundleId(bundle_id))
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(method = "get_account_id_from_bundle_id"))]
    pub async fn get_account_id_from_bundle_id(
        &self,
        bundle_id: Uuid,
    ) -> Result<Uuid, SubscriptionError> {
        let start = Instant::now();
        let method = "get_account_id_from_bundle_id";

        let result = self
            .identities
            .get_or_load(LookupType::BundleToAccount, bundle_id)
            .await
            .ok_or(SubscriptionError::InvalidBundleId(bundle_id));

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(method = "get_bundle_id_from_subscription_id"))]
    pub async fn get_bundle_id_from_subscription_id(
        &self,
        subscription_id: Uuid,
    ) -> Result<Uuid, SubscriptionError> {
        let start = Instant::now();
        let method = "get_bundle_id_from_subscription_id";

        let result = self
            .identities
            .get_or_load(LookupType::SubscriptionToBundle, subscription_id)
            .await
            .ok_or(SubscriptionError::NoBundleForSubscription(subscription_id));

        Self::observe(method, start, &result);
        result
    }

    /// Two hops: subscription to bundle, then bundle to account.
    #[tracing::instrument(skip(self), fields(method = "get_account_id_from_subscription_id"))]
    pub async fn get_account_id_from_subscription_id(
        &self,
        subscription_id: Uuid,
    ) -> Result<Uuid, SubscriptionError> {
        let start = Instant::now();
        let method = "get_account_id_from_subscription_id";

        let result: Result<_, SubscriptionError> = async {
            let bundle_id = self
                .identities
                .get_or_load(LookupType::SubscriptionToBundle, subscription_id)
                .await
                .ok_or(SubscriptionError::NoBundleForSubscription(subscription_id))?;
            let account_id = self
                .identities
                .get_or_load(LookupType::BundleToAccount, bundle_id)
                .await;
            account_id.ok_or_else(|| {
                tracing::warn!(bundle_id = %bundle_id, subscription_id = %subscription_id, "Bundle has no account");
                SubscriptionError::InvalidBundleId(bundle_id)
            })
        }
        .await;

        Self::observe(method, start, &result);
        result
    }
}
