//! Creation of base subscriptions with their add-ons.
//!
//! Every batch of a request is validated against the stored state before
//! anything is written, so a rejected batch leaves no partial bundle behind.

use super::bundles::PlannedBundle;
use super::service::SubscriptionInternalApi;
use crate::error::SubscriptionError;
use crate::lifecycle::{
    build_record, check_addon_for_product, check_addon_limit, classify_and_order,
    resolve_bundle_start_date, BundleSnapshot,
};
use crate::models::{
    Bundle, CallContext, Plan, SubscriptionBundle, SubscriptionRecord, SubscriptionSpecifier,
    SubscriptionWithAddOnsSpecifier,
};
use crate::services::{record_subscription_operation, Catalog, LookupType};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

enum TargetBundle {
    Existing(Bundle),
    New(PlannedBundle),
}

impl TargetBundle {
    fn bundle_id(&self) -> Uuid {
        match self {
            TargetBundle::Existing(bundle) => bundle.bundle_id,
            TargetBundle::New(planned) => planned.create.bundle_id,
        }
    }

    fn external_key(&self) -> Option<&str> {
        match self {
            TargetBundle::Existing(bundle) => bundle.external_key.as_deref(),
            TargetBundle::New(planned) => planned.create.external_key.as_deref(),
        }
    }
}

/// One validated batch, ready to be written.
struct PlannedBatch {
    target: TargetBundle,
    records: Vec<SubscriptionRecord>,
}

impl SubscriptionInternalApi {
    /// Create one bundle's worth of subscriptions per specifier.
    ///
    /// Specifiers whose entitlements all refer to existing subscriptions are
    /// skipped and produce no entry in the result.
    #[tracing::instrument(
        skip(self, ctx, specifiers),
        fields(method = "create_base_subscriptions_with_addons", account_id = %ctx.account_id, batches = specifiers.len())
    )]
    pub async fn create_base_subscriptions_with_addons(
        &self,
        ctx: &CallContext,
        specifiers: &[SubscriptionWithAddOnsSpecifier],
        rename_cancelled_bundle_if_exist: bool,
    ) -> Result<Vec<SubscriptionBundle>, SubscriptionError> {
        let start = Instant::now();
        let method = "create_base_subscriptions_with_addons";

        let result: Result<_, SubscriptionError> = async {
            let catalog = self.catalog(ctx).await?;

            let mut pending_keys = HashSet::new();
            let mut in_flight: HashMap<Uuid, Vec<Plan>> = HashMap::new();
            let mut planned = Vec::with_capacity(specifiers.len());
            for specifier in specifiers {
                if let Some(batch) = self
                    .plan_batch(
                        ctx,
                        catalog.as_ref(),
                        specifier,
                        rename_cancelled_bundle_if_exist,
                        &mut pending_keys,
                        &mut in_flight,
                    )
                    .await?
                {
                    planned.push(batch);
                }
            }

            let mut created = Vec::with_capacity(planned.len());
            for batch in planned {
                created.push(self.commit_batch(ctx, batch).await?);
            }
            Ok(created)
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    async fn plan_batch(
        &self,
        ctx: &CallContext,
        catalog: &dyn Catalog,
        specifier: &SubscriptionWithAddOnsSpecifier,
        rename_cancelled_bundle_if_exist: bool,
        pending_keys: &mut HashSet<String>,
        in_flight: &mut HashMap<Uuid, Vec<Plan>>,
    ) -> Result<Option<PlannedBatch>, SubscriptionError> {
        let now = ctx.created_date;
        let raw_date = specifier
            .billing_effective_date
            .map(|d| ctx.to_utc_date_time(d))
            .unwrap_or(now);

        let batch = classify_and_order(&specifier.entitlements, catalog, raw_date)?;
        if batch.is_empty() {
            tracing::debug!("Batch only refers to existing subscriptions, skipping");
            return Ok(None);
        }

        let key = specifier.bundle_external_key.as_deref();
        let existing = match (specifier.bundle_id, key) {
            (Some(bundle_id), _) => {
                let bundle = self.store.get_bundle(bundle_id).await?.ok_or_else(|| {
                    SubscriptionError::InvalidSpecifierBatch(format!("unknown bundle {bundle_id}"))
                })?;
                if key.is_some_and(|k| bundle.external_key.as_deref() != Some(k)) {
                    return Err(SubscriptionError::InvalidSpecifierBatch(format!(
                        "bundle {bundle_id} does not carry external key {}",
                        key.unwrap_or_default()
                    )));
                }
                if bundle.account_id != ctx.account_id {
                    return Err(SubscriptionError::InvalidSpecifierBatch(format!(
                        "bundle {bundle_id} belongs to another account"
                    )));
                }
                Some(bundle)
            }
            (None, Some(key)) if !batch.establishes_bundle => {
                let bundle = self
                    .find_active_bundle_for_key(key, now)
                    .await?
                    .ok_or_else(|| SubscriptionError::NoBaseSubscription(key.to_string()))?;
                if bundle.account_id != ctx.account_id {
                    return Err(SubscriptionError::ActiveBundleKeyConflict(key.to_string()));
                }
                Some(bundle)
            }
            _ => None,
        };

        let target = match existing {
            Some(bundle) => TargetBundle::Existing(bundle),
            None if batch.establishes_bundle => TargetBundle::New(
                self.plan_bundle(ctx, ctx.account_id, key, rename_cancelled_bundle_if_exist, pending_keys)
                    .await?,
            ),
            None => {
                return Err(SubscriptionError::InvalidSpecifierBatch(
                    "add-ons need an existing bundle".to_string(),
                ))
            }
        };
        let bundle_id = target.bundle_id();
        let bundle_label = target
            .external_key()
            .map(str::to_string)
            .unwrap_or_else(|| bundle_id.to_string());

        let records = match &target {
            TargetBundle::Existing(_) => self.store.get_subscriptions_for_bundle(bundle_id).await?,
            TargetBundle::New(_) => Vec::new(),
        };
        let snapshot = BundleSnapshot::new(bundle_id, target.external_key().map(str::to_string), &records, now);
        let base = snapshot.base();

        // Add-ons joining an existing base never start before it.
        let requested = match (specifier.billing_effective_date, base) {
            (None, Some(base)) if !batch.establishes_bundle => raw_date.max(base.start_date),
            _ => raw_date,
        };

        let bundle_in_flight = in_flight.entry(bundle_id).or_default();
        bundle_in_flight.extend(batch.addon_plans().into_iter().cloned());
        let in_flight_plans: Vec<&Plan> = bundle_in_flight.iter().collect();

        let mut new_records = Vec::with_capacity(batch.entitlements.len());
        let mut bundle_start_date = None;
        for entitlement in &batch.entitlements {
            let start_date = match (&bundle_start_date, batch.base()) {
                (Some(started), Some(new_base)) => {
                    check_addon_for_product(catalog, &new_base.plan.product.name, &entitlement.plan)?;
                    *started
                }
                _ => resolve_bundle_start_date(
                    catalog,
                    &entitlement.plan,
                    &bundle_label,
                    snapshot.anchor_for(entitlement.plan.category()),
                    requested,
                )?,
            };
            if batch.establishes_bundle && bundle_start_date.is_none() {
                bundle_start_date = Some(start_date);
            }
            check_addon_limit(&entitlement.plan, snapshot.subscriptions(), &in_flight_plans)?;

            let spec = SubscriptionSpecifier {
                subscription_id: Uuid::new_v4(),
                bundle_id,
                bundle_external_key: target.external_key().map(str::to_string),
                plan: entitlement.plan.clone(),
                initial_phase: entitlement.spec.phase_type,
                bundle_start_date: start_date,
                align_start_date: requested,
                effective_date: requested,
                processed_date: now,
                migrated: specifier.migrated,
            };
            new_records.push(build_record(catalog, &spec)?);
        }

        tracing::debug!(
            bundle_id = %bundle_id,
            subscriptions = new_records.len(),
            requested = %requested,
            "Batch validated"
        );
        Ok(Some(PlannedBatch {
            target,
            records: new_records,
        }))
    }

    async fn commit_batch(
        &self,
        ctx: &CallContext,
        batch: PlannedBatch,
    ) -> Result<SubscriptionBundle, SubscriptionError> {
        let bundle = match batch.target {
            TargetBundle::Existing(bundle) => bundle,
            TargetBundle::New(planned) => self.commit_bundle(ctx, planned).await?,
        };

        self.store.create_subscriptions(batch.records.clone()).await?;
        for record in &batch.records {
            self.identities.put_if_absent(
                LookupType::SubscriptionToBundle,
                record.subscription_id,
                record.bundle_id,
            );
            record_subscription_operation("create");
        }

        tracing::info!(
            bundle_id = %bundle.bundle_id,
            subscriptions = batch.records.len(),
            "Subscriptions created"
        );
        Ok(SubscriptionBundle {
            subscriptions: Self::fold(&batch.records, ctx.created_date),
            bundle,
        })
    }
}
