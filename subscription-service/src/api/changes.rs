//! Cancellation, billing cycle day and charged-through updates.

use super::service::SubscriptionInternalApi;
use crate::error::SubscriptionError;
use crate::lifecycle::events::{bcd_change_event, cancel_event};
use crate::lifecycle::{
    default_bill_cycle_day_local, effective_date_for_new_bcd, effective_date_for_policy,
    BcdEffectiveDate, BillingAnchor, BundleSnapshot,
};
use crate::models::{BillingActionPolicy, CallContext, ProductCategory, Subscription};
use crate::services::{record_subscription_operation, Catalog};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

/// Billing alignment and BCD a subscription follows under the catalog.
pub(super) fn billing_anchor(
    ctx: &CallContext,
    catalog: &dyn Catalog,
    bcd_cache: &mut HashMap<Uuid, u32>,
    subscription: &Subscription,
    base: Option<&Subscription>,
    account_bcd: Option<u32>,
) -> Result<BillingAnchor, SubscriptionError> {
    let plan_name = subscription
        .plan_name()
        .ok_or(SubscriptionError::InvalidSubscriptionId(subscription.subscription_id))?;
    let plan = catalog.find_plan(plan_name, ctx.created_date)?;
    let alignment = catalog.billing_alignment(&plan, subscription.current_phase);
    let bcd = default_bill_cycle_day_local(bcd_cache, ctx, subscription, base, alignment, account_bcd);
    Ok(BillingAnchor {
        alignment: Some(alignment),
        bill_cycle_day_local: Some(bcd),
    })
}

impl SubscriptionInternalApi {
    /// Cancel each subscription under `policy`.
    ///
    /// Cancelling a base also cancels the bundle's add-ons that are still
    /// live, on the same date or at their own start if that is later.
    /// Subscriptions that already carry an end date are left alone.
    #[tracing::instrument(
        skip(self, ctx, subscription_ids),
        fields(method = "cancel_base_subscriptions", account_id = %ctx.account_id, policy = policy.as_str())
    )]
    pub async fn cancel_base_subscriptions(
        &self,
        ctx: &CallContext,
        subscription_ids: &[Uuid],
        policy: BillingActionPolicy,
        account_bcd: Option<u32>,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        let start = Instant::now();
        let method = "cancel_base_subscriptions";

        let result: Result<_, SubscriptionError> = async {
            let catalog = self.catalog(ctx).await?;
            let now = ctx.created_date;
            let mut bcd_cache = HashMap::new();
            let mut cancelled = HashSet::new();
            let mut events = Vec::new();
            let mut bundles = HashSet::new();

            for &subscription_id in subscription_ids {
                let record = self.subscription_record(subscription_id).await?;
                let records = self.store.get_subscriptions_for_bundle(record.bundle_id).await?;
                let snapshot = BundleSnapshot::new(record.bundle_id, None, &records, now);
                let subscription = snapshot
                    .find(subscription_id)
                    .ok_or(SubscriptionError::InvalidSubscriptionId(subscription_id))?;

                if subscription.end_date.is_some() || !cancelled.insert(subscription_id) {
                    tracing::warn!(subscription_id = %subscription_id, "Subscription already cancelled");
                    continue;
                }

                let anchor = billing_anchor(
                    ctx,
                    catalog.as_ref(),
                    &mut bcd_cache,
                    subscription,
                    snapshot.base(),
                    account_bcd,
                )?;
                let effective_date = effective_date_for_policy(ctx, subscription, policy, anchor)?;
                events.push(cancel_event(subscription, effective_date, now));
                bundles.insert(record.bundle_id);

                if subscription.category != ProductCategory::Base {
                    continue;
                }
                for addon in snapshot.subscriptions() {
                    if addon.category != ProductCategory::AddOn
                        || addon.end_date.is_some()
                        || !cancelled.insert(addon.subscription_id)
                    {
                        continue;
                    }
                    events.push(cancel_event(addon, effective_date.max(addon.start_date), now));
                }
            }

            tracing::info!(
                cancellations = events.len(),
                bundles = bundles.len(),
                "Cancelling subscriptions"
            );
            for _ in &events {
                record_subscription_operation("cancel");
            }
            if !events.is_empty() {
                self.store.append_events(events).await?;
            }

            let mut subscriptions = Vec::with_capacity(subscription_ids.len());
            for &subscription_id in subscription_ids {
                let record = self.subscription_record(subscription_id).await?;
                subscriptions.push(Subscription::rebuild(&record, &[], now));
            }
            Ok(subscriptions)
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    /// Schedule a new billing cycle day. Returns the instant it takes effect.
    #[tracing::instrument(skip(self, ctx), fields(method = "update_bcd"))]
    pub async fn update_bcd(
        &self,
        ctx: &CallContext,
        subscription_id: Uuid,
        bill_cycle_day_local: u32,
        effective_from: Option<NaiveDate>,
    ) -> Result<DateTime<Utc>, SubscriptionError> {
        let start = Instant::now();
        let method = "update_bcd";

        let result: Result<_, SubscriptionError> = async {
            let record = self.subscription_record(subscription_id).await?;
            let subscription = Subscription::rebuild(&record, &[], ctx.created_date);

            let reference = effective_from.unwrap_or_else(|| ctx.today());
            let effective_date =
                match effective_date_for_new_bcd(bill_cycle_day_local, reference, effective_from.is_some())? {
                    BcdEffectiveDate::Immediate => ctx.created_date,
                    BcdEffectiveDate::On(date) => ctx.to_utc_date_time(date),
                };

            let event = bcd_change_event(&subscription, bill_cycle_day_local, effective_date, ctx.created_date);
            self.store.append_events(vec![event]).await?;

            tracing::info!(
                subscription_id = %subscription_id,
                bill_cycle_day_local,
                effective_date = %effective_date,
                "Billing cycle day change scheduled"
            );
            record_subscription_operation("update_bcd");
            Ok(effective_date)
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    #[tracing::instrument(
        skip(self, ctx),
        fields(method = "set_charged_through_date", account_id = %ctx.account_id)
    )]
    pub async fn set_charged_through_date(
        &self,
        ctx: &CallContext,
        subscription_id: Uuid,
        charged_through_date: DateTime<Utc>,
    ) -> Result<(), SubscriptionError> {
        let start = Instant::now();
        let method = "set_charged_through_date";

        let result: Result<_, SubscriptionError> = async {
            self.subscription_record(subscription_id).await?;
            self.store
                .update_charged_through_date(subscription_id, charged_through_date)
                .await?;
            tracing::info!(
                subscription_id = %subscription_id,
                charged_through_date = %charged_through_date,
                processed_date = %ctx.created_date,
                "Charged through date updated"
            );
            record_subscription_operation("set_charged_through_date");
            Ok(())
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    /// Local BCD of `subscription` under the catalog billing alignment.
    ///
    /// `cache` memoises results per subscription id across calls made for
    /// the same request.
    pub fn default_bill_cycle_day_local(
        &self,
        ctx: &CallContext,
        catalog: &dyn Catalog,
        cache: &mut HashMap<Uuid, u32>,
        subscription: &Subscription,
        base: Option<&Subscription>,
        account_bcd: Option<u32>,
    ) -> Result<u32, SubscriptionError> {
        let anchor = billing_anchor(ctx, catalog, cache, subscription, base, account_bcd)?;
        anchor
            .bill_cycle_day_local
            .ok_or(SubscriptionError::BillingAlignmentUnavailable)
    }
}
