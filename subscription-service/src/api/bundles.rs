//! Bundle creation, lookup and external keys.

use super::service::SubscriptionInternalApi;
use crate::error::SubscriptionError;
use crate::models::{Bundle, CallContext, CreateBundle, Page, ProductCategory};
use crate::services::{record_subscription_operation, LookupType};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

/// A bundle validated for creation but not yet written.
#[derive(Debug, Clone)]
pub(super) struct PlannedBundle {
    pub create: CreateBundle,
    /// Inactive bundles whose key moves out of the way first.
    pub renames: Vec<(Uuid, String)>,
}

/// Key an inactive bundle is renamed to when a new bundle takes its key.
pub(super) fn cancelled_bundle_key(bundle_id: Uuid, key: &str) -> String {
    format!("cancelled-{bundle_id}-{key}")
}

impl SubscriptionInternalApi {
    /// Bundle holding the active subscriptions for `key`, across accounts.
    ///
    /// A bundle is active when one of its non-add-on subscriptions has not
    /// ended by `now`.
    pub(super) async fn find_active_bundle_for_key(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Bundle>, SubscriptionError> {
        for bundle in self.store.get_bundles_for_key(key).await? {
            let records = self.store.get_subscriptions_for_bundle(bundle.bundle_id).await?;
            let active = Self::fold(&records, now)
                .iter()
                .filter(|s| s.category != ProductCategory::AddOn)
                .any(|s| s.is_live_after(now));
            if active {
                return Ok(Some(bundle));
            }
        }
        Ok(None)
    }

    /// Validate a new bundle without writing anything.
    ///
    /// `pending_keys` carries keys claimed earlier in the same request.
    pub(super) async fn plan_bundle(
        &self,
        ctx: &CallContext,
        account_id: Uuid,
        external_key: Option<&str>,
        rename_cancelled_bundle_if_exist: bool,
        pending_keys: &mut HashSet<String>,
    ) -> Result<PlannedBundle, SubscriptionError> {
        self.check_external_key(external_key)?;

        let mut renames = Vec::new();
        if let Some(key) = external_key {
            if !pending_keys.insert(key.to_string()) {
                return Err(SubscriptionError::ActiveBundleKeyConflict(key.to_string()));
            }
            if self
                .find_active_bundle_for_key(key, ctx.created_date)
                .await?
                .is_some()
            {
                return Err(SubscriptionError::ActiveBundleKeyConflict(key.to_string()));
            }
            if rename_cancelled_bundle_if_exist {
                renames = self
                    .store
                    .get_bundles_for_account_and_key(account_id, key)
                    .await?
                    .into_iter()
                    .map(|b| (b.bundle_id, cancelled_bundle_key(b.bundle_id, key)))
                    .collect();
            }
        }

        Ok(PlannedBundle {
            create: CreateBundle {
                bundle_id: Uuid::new_v4(),
                account_id,
                external_key: external_key.map(str::to_string),
                created_utc: ctx.created_date,
            },
            renames,
        })
    }

    pub(super) async fn commit_bundle(
        &self,
        ctx: &CallContext,
        planned: PlannedBundle,
    ) -> Result<Bundle, SubscriptionError> {
        for (bundle_id, renamed) in &planned.renames {
            tracing::info!(bundle_id = %bundle_id, renamed = %renamed, "Renaming inactive bundle");
            self.store
                .update_bundle_external_key(*bundle_id, renamed, ctx.created_date)
                .await?;
        }
        let bundle = self.store.create_bundle(planned.create).await?;
        self.identities
            .put_if_absent(LookupType::BundleToAccount, bundle.bundle_id, bundle.account_id);

        tracing::info!(
            bundle_id = %bundle.bundle_id,
            account_id = %bundle.account_id,
            external_key = ?bundle.external_key,
            "Bundle created"
        );
        record_subscription_operation("create_bundle");
        Ok(bundle)
    }

    #[tracing::instrument(skip(self, ctx), fields(method = "create_bundle_for_account"))]
    pub async fn create_bundle_for_account(
        &self,
        ctx: &CallContext,
        account_id: Uuid,
        external_key: Option<&str>,
        rename_cancelled_bundle_if_exist: bool,
    ) -> Result<Bundle, SubscriptionError> {
        let start = Instant::now();
        let method = "create_bundle_for_account";

        let result: Result<_, SubscriptionError> = async {
            let planned = self
                .plan_bundle(
                    ctx,
                    account_id,
                    external_key,
                    rename_cancelled_bundle_if_exist,
                    &mut HashSet::new(),
                )
                .await?;
            self.commit_bundle(ctx, planned).await
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self, ctx), fields(method = "update_external_key"))]
    pub async fn update_external_key(
        &self,
        ctx: &CallContext,
        bundle_id: Uuid,
        external_key: &str,
    ) -> Result<(), SubscriptionError> {
        let start = Instant::now();
        let method = "update_external_key";

        let result: Result<_, SubscriptionError> = async {
            self.check_external_key(Some(external_key))?;
            self.store
                .get_bundle(bundle_id)
                .await?
                .ok_or(SubscriptionError::InvalidBundleId(bundle_id))?;
            self.store
                .update_bundle_external_key(bundle_id, external_key, ctx.created_date)
                .await?;
            record_subscription_operation("update_external_key");
            Ok(())
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self, ctx), fields(method = "get_active_bundle_for_key"))]
    pub async fn get_active_bundle_for_key(
        &self,
        ctx: &CallContext,
        external_key: &str,
    ) -> Result<Option<Bundle>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_active_bundle_for_key";

        let result = self.find_active_bundle_for_key(external_key, ctx.created_date).await;

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(method = "get_bundles_for_key"))]
    pub async fn get_bundles_for_key(
        &self,
        external_key: &str,
    ) -> Result<Vec<Bundle>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_bundles_for_key";

        let result = self
            .store
            .get_bundles_for_key(external_key)
            .await
            .map_err(SubscriptionError::from);

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self, ctx), fields(method = "get_bundles_for_account", account_id = %ctx.account_id))]
    pub async fn get_bundles_for_account(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<Bundle>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_bundles_for_account";

        let result = self
            .store
            .get_bundles_for_account(ctx.account_id)
            .await
            .map_err(SubscriptionError::from);

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self, ctx), fields(method = "get_bundles_for_account_and_key", account_id = %ctx.account_id))]
    pub async fn get_bundles_for_account_and_key(
        &self,
        ctx: &CallContext,
        external_key: &str,
    ) -> Result<Vec<Bundle>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_bundles_for_account_and_key";

        let result = self
            .store
            .get_bundles_for_account_and_key(ctx.account_id, external_key)
            .await
            .map_err(SubscriptionError::from);

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(method = "get_bundles"))]
    pub async fn get_bundles(&self, offset: u64, limit: u64) -> Result<Page<Bundle>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_bundles";

        let result = self
            .store
            .list_bundles(offset, limit)
            .await
            .map_err(SubscriptionError::from);

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(method = "search_bundles"))]
    pub async fn search_bundles(
        &self,
        search_key: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Page<Bundle>, SubscriptionError> {
        let start = Instant::now();
        let method = "search_bundles";

        let result = self
            .store
            .search_bundles(search_key, offset, limit)
            .await
            .map_err(SubscriptionError::from);

        Self::observe(method, start, &result);
        result
    }

    /// Ids of every base and standalone subscription filed under `external_key`.
    #[tracing::instrument(skip(self), fields(method = "get_non_addon_subscription_ids_for_key"))]
    pub async fn get_non_addon_subscription_ids_for_key(
        &self,
        external_key: &str,
    ) -> Result<Vec<Uuid>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_non_addon_subscription_ids_for_key";

        let result: Result<_, SubscriptionError> = async {
            let mut ids = Vec::new();
            for bundle in self.store.get_bundles_for_key(external_key).await? {
                let records = self.store.get_subscriptions_for_bundle(bundle.bundle_id).await?;
                ids.extend(
                    records
                        .iter()
                        .filter(|r| r.category != ProductCategory::AddOn)
                        .map(|r| r.subscription_id),
                );
            }
            Ok(ids)
        }
        .await;

        Self::observe(method, start, &result);
        result
    }
}
