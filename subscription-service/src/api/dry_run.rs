//! Dry-run operations. Nothing here writes to the store.

use super::changes::billing_anchor;
use super::service::SubscriptionInternalApi;
use crate::error::SubscriptionError;
use crate::lifecycle::dry_run::{change_effective_date, change_plan_status};
use crate::lifecycle::policy::dry_run_effective_date;
use crate::lifecycle::{check_addon_limit, project, simulate, BundleSnapshot};
use crate::models::{
    compare_for_bundle_listing, AddOnDryRunStatus, BillingActionPolicy, CallContext,
    DryRunArguments, DryRunBundle, PlanPhaseSpecifier, PriceOverride, SubscriptionRecord,
};
use crate::services::record_dry_run;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

impl SubscriptionInternalApi {
    async fn bundle_records_of(
        &self,
        subscription_id: Uuid,
    ) -> Result<(Uuid, Vec<SubscriptionRecord>), SubscriptionError> {
        let record = self.subscription_record(subscription_id).await?;
        let records = self.store.get_subscriptions_for_bundle(record.bundle_id).await?;
        Ok((record.bundle_id, records))
    }

    /// The bundle's subscriptions as they would look after `args`, with the
    /// events the simulation adds.
    #[tracing::instrument(
        skip(self, ctx, args),
        fields(method = "simulate_subscriptions_for_bundle", action = args.action.as_str())
    )]
    pub async fn simulate_subscriptions_for_bundle(
        &self,
        ctx: &CallContext,
        bundle_id: Uuid,
        args: &DryRunArguments,
    ) -> Result<DryRunBundle, SubscriptionError> {
        let start = Instant::now();
        let method = "simulate_subscriptions_for_bundle";

        let result: Result<_, SubscriptionError> = async {
            let bundle = self
                .store
                .get_bundle(bundle_id)
                .await?
                .ok_or(SubscriptionError::InvalidBundleId(bundle_id))?;
            let records = self.store.get_subscriptions_for_bundle(bundle_id).await?;
            let catalog = self.catalog(ctx).await?;

            let snapshot = BundleSnapshot::new(
                bundle_id,
                bundle.external_key.clone(),
                &records,
                ctx.created_date,
            );
            let simulation = simulate(ctx, catalog.as_ref(), &snapshot, args)?;

            let mut subscriptions = simulation.materialize(&snapshot, ctx.created_date);
            subscriptions.sort_by(|a, b| compare_for_bundle_listing(a.view(), b.view()));

            let simulated_events = subscriptions
                .iter()
                .flat_map(|s| {
                    let view = s.view();
                    project(
                        view,
                        view.transitions.iter().filter(|t| {
                            simulation.produced(t.subscription_id, t.effective_date, &t.event)
                        }),
                    )
                })
                .collect::<Vec<_>>();

            tracing::debug!(
                bundle_id = %bundle_id,
                simulated_events = simulated_events.len(),
                "Dry run simulated"
            );
            record_dry_run(args.action.as_str());
            Ok(DryRunBundle {
                bundle,
                subscriptions,
                simulated_events,
            })
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    /// Date a change of `subscription_id` to `target` would take effect.
    ///
    /// Unlike a simulated change this resolves the subscription's billing
    /// alignment and BCD, so start-of-term policies are supported. The
    /// bundle's add-on limit applies to the target plan.
    #[tracing::instrument(
        skip(self, ctx, target, overrides),
        fields(method = "get_dry_run_change_plan_effective_date")
    )]
    pub async fn get_dry_run_change_plan_effective_date(
        &self,
        ctx: &CallContext,
        subscription_id: Uuid,
        target: &PlanPhaseSpecifier,
        overrides: &[PriceOverride],
        requested: Option<NaiveDate>,
        policy: Option<BillingActionPolicy>,
        account_bcd: Option<u32>,
    ) -> Result<DateTime<Utc>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_dry_run_change_plan_effective_date";

        let result: Result<_, SubscriptionError> = async {
            let (bundle_id, records) = self.bundle_records_of(subscription_id).await?;
            let catalog = self.catalog(ctx).await?;
            let snapshot = BundleSnapshot::new(bundle_id, None, &records, ctx.created_date);
            let subscription = snapshot
                .find(subscription_id)
                .ok_or(SubscriptionError::InvalidSubscriptionId(subscription_id))?;

            let plan = catalog.resolve_plan(target, overrides, ctx.created_date)?;
            check_addon_limit(&plan, snapshot.subscriptions(), &[&plan])?;
            let anchor = billing_anchor(
                ctx,
                catalog.as_ref(),
                &mut HashMap::new(),
                subscription,
                snapshot.base(),
                account_bcd,
            )?;
            change_effective_date(
                ctx,
                catalog.as_ref(),
                subscription,
                &plan,
                requested,
                policy,
                anchor,
            )
        }
        .await;

        Self::observe(method, start, &result);
        result
    }

    /// How each live add-on of the bundle would fare if the base moved to
    /// `base_product_name`. `None` means the base goes away entirely.
    #[tracing::instrument(skip(self, ctx), fields(method = "get_dry_run_change_plan_status"))]
    pub async fn get_dry_run_change_plan_status(
        &self,
        ctx: &CallContext,
        subscription_id: Uuid,
        base_product_name: Option<&str>,
        requested: Option<NaiveDate>,
    ) -> Result<Vec<AddOnDryRunStatus>, SubscriptionError> {
        let start = Instant::now();
        let method = "get_dry_run_change_plan_status";

        let result: Result<_, SubscriptionError> = async {
            let (bundle_id, records) = self.bundle_records_of(subscription_id).await?;
            let catalog = self.catalog(ctx).await?;
            let snapshot = BundleSnapshot::new(bundle_id, None, &records, ctx.created_date);
            let base = snapshot
                .find(subscription_id)
                .ok_or(SubscriptionError::InvalidSubscriptionId(subscription_id))?;

            let date = dry_run_effective_date(ctx, requested, base).unwrap_or(ctx.created_date);
            change_plan_status(
                catalog.as_ref(),
                base,
                snapshot.subscriptions(),
                base_product_name,
                date,
            )
        }
        .await;

        Self::observe(method, start, &result);
        result
    }
}
