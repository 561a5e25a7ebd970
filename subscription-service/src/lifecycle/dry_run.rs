//! Dry-run simulation: the events an action would produce, never persisted.

use crate::error::SubscriptionError;
use crate::lifecycle::addon_limit::check_addon_limit;
use crate::lifecycle::events::{build_record, cancel_event, change_plan_events};
use crate::lifecycle::policy::{dry_run_effective_date, effective_date_for_policy, BillingAnchor};
use crate::lifecycle::start_date::resolve_bundle_start_date;
use crate::models::{
    AddOnDryRunStatus, BillingActionPolicy, CallContext, DryRunAction, DryRunArguments,
    DryRunChangeReason, DryRunSubscription, EntitlementState, EventKind, Plan,
    PlanPhaseSpecifier, PriceOverride, ProductCategory, Subscription, SubscriptionRecord,
    SubscriptionSpecifier, TransitionEvent,
};
use crate::services::Catalog;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Point-in-time view of one bundle.
pub struct BundleSnapshot<'a> {
    pub bundle_id: Uuid,
    pub bundle_external_key: Option<String>,
    records: &'a [SubscriptionRecord],
    subscriptions: Vec<Subscription>,
}

impl<'a> BundleSnapshot<'a> {
    pub fn new(
        bundle_id: Uuid,
        bundle_external_key: Option<String>,
        records: &'a [SubscriptionRecord],
        now: DateTime<Utc>,
    ) -> Self {
        let subscriptions = records
            .iter()
            .map(|r| Subscription::rebuild(r, &[], now))
            .collect();
        Self {
            bundle_id,
            bundle_external_key,
            records,
            subscriptions,
        }
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Most recently created base subscription.
    pub fn base(&self) -> Option<&Subscription> {
        self.records
            .iter()
            .zip(&self.subscriptions)
            .filter(|(r, _)| r.category == ProductCategory::Base)
            .max_by_key(|(r, _)| r.created_utc)
            .map(|(_, s)| s)
    }

    /// Subscription a new `category` subscription is checked against.
    ///
    /// Add-ons attach to the base. A new base or standalone collides with
    /// any live base or standalone, so those see the latest live one first.
    pub fn anchor_for(&self, category: ProductCategory) -> Option<&Subscription> {
        if category == ProductCategory::AddOn {
            return self.base();
        }
        self.records
            .iter()
            .zip(&self.subscriptions)
            .filter(|(r, s)| r.category != ProductCategory::AddOn && s.is_active_or_pending())
            .max_by_key(|(r, _)| r.created_utc)
            .map(|(_, s)| s)
            .or_else(|| self.base())
    }

    pub fn find(&self, subscription_id: Uuid) -> Option<&Subscription> {
        self.subscriptions
            .iter()
            .find(|s| s.subscription_id == subscription_id)
    }
}

/// Result of a simulated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulation {
    pub action: DryRunAction,
    pub events: Vec<TransitionEvent>,
    /// Subscription that only exists in the simulation.
    pub synthetic: Option<SubscriptionRecord>,
}

impl Simulation {
    /// The bundle's subscriptions as they would look with the simulated events.
    pub fn materialize(
        &self,
        snapshot: &BundleSnapshot<'_>,
        now: DateTime<Utc>,
    ) -> Vec<DryRunSubscription> {
        let existing = snapshot
            .records
            .iter()
            .map(|r| DryRunSubscription::new(Subscription::rebuild(r, &self.events, now), false));
        let synthetic = self
            .synthetic
            .iter()
            .map(|r| DryRunSubscription::new(Subscription::rebuild(r, &[], now), true));
        existing.chain(synthetic).collect()
    }

    /// Whether `event` of a rebuilt subscription came from this simulation.
    pub fn produced(
        &self,
        subscription_id: Uuid,
        effective_date: DateTime<Utc>,
        kind: &EventKind,
    ) -> bool {
        self.events.iter().any(|e| {
            e.subscription_id == subscription_id
                && e.effective_date == effective_date
                && &e.kind == kind
        })
    }
}

/// Simulate `args` against `snapshot`.
///
/// Change and stop-billing run without billing alignment or BCD, so a
/// start-of-term policy fails with
/// [`SubscriptionError::BillingAlignmentUnavailable`].
pub fn simulate(
    ctx: &CallContext,
    catalog: &dyn Catalog,
    snapshot: &BundleSnapshot<'_>,
    args: &DryRunArguments,
) -> Result<Simulation, SubscriptionError> {
    match args.action {
        DryRunAction::StartBilling => {
            let spec = required_plan(args)?;
            let requested = args
                .effective_date
                .map(|d| ctx.to_utc_date_time(d))
                .unwrap_or(ctx.created_date);
            let record = start_billing_record(ctx, catalog, snapshot, spec, &args.overrides, requested)?;
            Ok(Simulation {
                action: args.action,
                events: record.events.clone(),
                synthetic: Some(record),
            })
        }
        DryRunAction::Change => {
            let spec = required_plan(args)?;
            let subscription = required_subscription(snapshot, args)?;
            let plan = catalog.resolve_plan(spec, &args.overrides, ctx.created_date)?;
            check_addon_limit(&plan, snapshot.subscriptions(), &[&plan])?;

            let effective_date = change_effective_date(
                ctx,
                catalog,
                subscription,
                &plan,
                args.effective_date,
                args.policy,
                BillingAnchor::default(),
            )?;
            let events = change_plan_events(
                catalog,
                subscription,
                &plan,
                spec.phase_type,
                effective_date,
                ctx.created_date,
            )?;
            Ok(Simulation {
                action: args.action,
                events,
                synthetic: None,
            })
        }
        DryRunAction::StopBilling => {
            let subscription = required_subscription(snapshot, args)?;
            let effective_date = match dry_run_effective_date(ctx, args.effective_date, subscription) {
                Some(date) => date,
                None => {
                    let policy = match args.policy {
                        Some(policy) => policy,
                        None => {
                            let plan = current_plan(catalog, subscription, ctx.created_date)?;
                            catalog.plan_cancel_policy(
                                &plan,
                                subscription.current_phase,
                                ctx.created_date,
                            )?
                        }
                    };
                    effective_date_for_policy(ctx, subscription, policy, BillingAnchor::default())?
                }
            };
            Ok(Simulation {
                action: args.action,
                events: vec![cancel_event(subscription, effective_date, ctx.created_date)],
                synthetic: None,
            })
        }
    }
}

fn start_billing_record(
    ctx: &CallContext,
    catalog: &dyn Catalog,
    snapshot: &BundleSnapshot<'_>,
    spec: &PlanPhaseSpecifier,
    overrides: &[PriceOverride],
    requested: DateTime<Utc>,
) -> Result<SubscriptionRecord, SubscriptionError> {
    let plan = catalog.resolve_plan(spec, overrides, requested)?;
    let bundle_start_date = resolve_bundle_start_date(
        catalog,
        &plan,
        &snapshot.bundle_id.to_string(),
        snapshot.anchor_for(plan.category()),
        requested,
    )?;
    check_addon_limit(&plan, snapshot.subscriptions(), &[&plan])?;

    let spec = SubscriptionSpecifier {
        subscription_id: synthetic_subscription_id(snapshot.bundle_id, &plan, requested),
        bundle_id: snapshot.bundle_id,
        bundle_external_key: snapshot.bundle_external_key.clone(),
        initial_phase: spec.phase_type,
        plan,
        bundle_start_date,
        align_start_date: requested,
        effective_date: requested,
        processed_date: ctx.created_date,
        migrated: false,
    };
    build_record(catalog, &spec)
}

/// Stable identity for a simulated subscription.
pub fn synthetic_subscription_id(bundle_id: Uuid, plan: &Plan, effective_date: DateTime<Utc>) -> Uuid {
    let name = format!("{}:{}", plan.name, effective_date.to_rfc3339());
    Uuid::new_v5(&bundle_id, name.as_bytes())
}

fn required_plan(args: &DryRunArguments) -> Result<&PlanPhaseSpecifier, SubscriptionError> {
    args.plan.as_ref().ok_or_else(|| {
        SubscriptionError::InvalidDryRunArguments(format!("{} requires a plan", args.action))
    })
}

fn required_subscription<'s>(
    snapshot: &'s BundleSnapshot<'_>,
    args: &DryRunArguments,
) -> Result<&'s Subscription, SubscriptionError> {
    let id = args.subscription_id.ok_or_else(|| {
        SubscriptionError::InvalidDryRunArguments(format!("{} requires a subscription", args.action))
    })?;
    let subscription = snapshot
        .find(id)
        .ok_or(SubscriptionError::InvalidSubscriptionId(id))?;
    if subscription.state == EntitlementState::Cancelled {
        return Err(SubscriptionError::InvalidDryRunArguments(format!(
            "subscription {id} is cancelled"
        )));
    }
    Ok(subscription)
}

fn current_plan(
    catalog: &dyn Catalog,
    subscription: &Subscription,
    date: DateTime<Utc>,
) -> Result<Plan, SubscriptionError> {
    let name = subscription
        .plan_name()
        .ok_or(SubscriptionError::InvalidSubscriptionId(subscription.subscription_id))?;
    Ok(catalog.find_plan(name, date)?)
}

/// Effective date of a plan change: the caller's date if given, else the
/// date implied by the requested or catalog change policy.
pub fn change_effective_date(
    ctx: &CallContext,
    catalog: &dyn Catalog,
    subscription: &Subscription,
    target: &Plan,
    requested: Option<NaiveDate>,
    policy: Option<BillingActionPolicy>,
    anchor: BillingAnchor,
) -> Result<DateTime<Utc>, SubscriptionError> {
    if let Some(date) = dry_run_effective_date(ctx, requested, subscription) {
        return Ok(date);
    }
    let policy = match policy {
        Some(policy) => policy,
        None => {
            let from = current_plan(catalog, subscription, ctx.created_date)?;
            catalog.plan_change_policy(&from, subscription.current_phase, target, ctx.created_date)?
        }
    };
    effective_date_for_policy(ctx, subscription, policy, anchor)
}

/// What would happen to each live add-on if the base moved to
/// `base_product_name`.
pub fn change_plan_status(
    catalog: &dyn Catalog,
    base: &Subscription,
    bundle_subscriptions: &[Subscription],
    base_product_name: Option<&str>,
    date: DateTime<Utc>,
) -> Result<Vec<AddOnDryRunStatus>, SubscriptionError> {
    if base.category != ProductCategory::Base {
        return Err(SubscriptionError::ChangeDryRunNotOnBasePlan);
    }

    let mut statuses = Vec::new();
    for addon in bundle_subscriptions {
        if addon.subscription_id == base.subscription_id
            || addon.state == EntitlementState::Cancelled
        {
            continue;
        }
        let plan = current_plan(catalog, addon, date)?;
        let reason = match base_product_name {
            None => DryRunChangeReason::AddOnNotAvailable,
            Some(product) if catalog.is_addon_included(product, &plan) => {
                DryRunChangeReason::AddOnIncluded
            }
            Some(product) if catalog.is_addon_available(product, &plan) => {
                DryRunChangeReason::AddOnAvailable
            }
            Some(_) => DryRunChangeReason::AddOnNotAvailable,
        };
        statuses.push(AddOnDryRunStatus {
            subscription_id: addon.subscription_id,
            product_name: plan.product.name,
            plan_name: plan.name,
            reason,
        });
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::fixtures::{catalog, holster, knife, pistol, scope, subscription, ts};
    use crate::models::PhaseType;

    fn records_of(subs: &[Subscription]) -> Vec<SubscriptionRecord> {
        subs.iter()
            .map(|s| SubscriptionRecord {
                subscription_id: s.subscription_id,
                bundle_id: s.bundle_id,
                bundle_external_key: None,
                category: s.category,
                bundle_start_date: s.bundle_start_date,
                align_start_date: s.align_start_date,
                charged_through_date: s.charged_through_date,
                migrated: false,
                created_utc: s.start_date,
                events: s.events.clone(),
            })
            .collect()
    }

    fn bundle(now: DateTime<Utc>) -> (Uuid, Vec<SubscriptionRecord>) {
        let bundle_id = Uuid::new_v4();
        let subs = vec![
            subscription(&pistol(), bundle_id, ts(2026, 5, 1), now),
            subscription(&holster(), bundle_id, ts(2026, 5, 2), now),
        ];
        (bundle_id, records_of(&subs))
    }

    #[test]
    fn test_live_standalone_anchors_new_base_but_not_addons() {
        let now = ts(2026, 5, 10);
        let bundle_id = Uuid::new_v4();
        let records = records_of(&[subscription(&knife(), bundle_id, ts(2026, 5, 1), now)]);
        let snapshot = BundleSnapshot::new(bundle_id, None, &records, now);

        assert!(snapshot.base().is_none());
        assert!(snapshot.anchor_for(ProductCategory::AddOn).is_none());
        for category in [ProductCategory::Base, ProductCategory::Standalone] {
            assert_eq!(
                snapshot.anchor_for(category).map(|s| s.subscription_id),
                Some(records[0].subscription_id)
            );
        }
    }

    #[test]
    fn test_start_billing_base_next_to_standalone_is_rejected() {
        let now = ts(2026, 5, 10);
        let ctx = CallContext::new(Uuid::new_v4(), now);
        let bundle_id = Uuid::new_v4();
        let records = records_of(&[subscription(&knife(), bundle_id, ts(2026, 5, 1), now)]);
        let snapshot = BundleSnapshot::new(bundle_id, None, &records, now);
        let args = DryRunArguments::start_billing(PlanPhaseSpecifier::for_plan("pistol-monthly"));

        assert!(matches!(
            simulate(&ctx, &catalog(), &snapshot, &args),
            Err(SubscriptionError::BaseAlreadyExists(_))
        ));
    }

    #[test]
    fn test_start_billing_is_deterministic() {
        let now = ts(2026, 5, 10);
        let ctx = CallContext::new(Uuid::new_v4(), now);
        let (bundle_id, records) = bundle(now);
        let snapshot = BundleSnapshot::new(bundle_id, None, &records, now);
        let args = DryRunArguments::start_billing(PlanPhaseSpecifier::for_plan("telescopic-scope-monthly"));

        let first = simulate(&ctx, &catalog(), &snapshot, &args).unwrap();
        let second = simulate(&ctx, &catalog(), &snapshot, &args).unwrap();
        assert_eq!(first, second);

        let subs = first.materialize(&snapshot, now);
        assert_eq!(subs.len(), 3);
        assert!(subs[2].is_synthetic());
        assert_eq!(subs[2].view().bundle_start_date, ts(2026, 5, 1));
    }

    #[test]
    fn test_change_uses_catalog_policy() {
        let now = ts(2026, 5, 10);
        let ctx = CallContext::new(Uuid::new_v4(), now);
        let (bundle_id, records) = bundle(now);
        let snapshot = BundleSnapshot::new(bundle_id, None, &records, now);
        let base_id = records[0].subscription_id;

        let args = DryRunArguments::change(base_id, PlanPhaseSpecifier::for_plan("shotgun-monthly"));
        let sim = simulate(&ctx, &catalog(), &snapshot, &args).unwrap();
        assert_eq!(sim.events.len(), 1);
        assert_eq!(sim.events[0].effective_date, now);
        assert!(matches!(
            sim.events[0].kind,
            EventKind::Change { phase_type: PhaseType::Evergreen, .. }
        ));

        let subs = sim.materialize(&snapshot, now);
        assert_eq!(
            subs[0].view().current_plan_name.as_deref(),
            Some("shotgun-monthly")
        );
        assert!(!subs[0].is_synthetic());
    }

    #[test]
    fn test_start_of_term_is_unavailable_in_dry_run() {
        let now = ts(2026, 5, 10);
        let ctx = CallContext::new(Uuid::new_v4(), now);
        let (bundle_id, records) = bundle(now);
        let snapshot = BundleSnapshot::new(bundle_id, None, &records, now);
        let base_id = records[0].subscription_id;

        let args = DryRunArguments::change(base_id, PlanPhaseSpecifier::for_plan("shotgun-monthly"))
            .with_policy(BillingActionPolicy::StartOfTerm);
        assert_eq!(
            simulate(&ctx, &catalog(), &snapshot, &args),
            Err(SubscriptionError::BillingAlignmentUnavailable)
        );
    }

    #[test]
    fn test_stop_billing_on_explicit_date() {
        let now = ts(2026, 5, 10);
        let ctx = CallContext::new(Uuid::new_v4(), now);
        let (bundle_id, records) = bundle(now);
        let snapshot = BundleSnapshot::new(bundle_id, None, &records, now);
        let addon_id = records[1].subscription_id;

        let args = DryRunArguments::stop_billing(addon_id)
            .with_effective_date(NaiveDate::from_ymd_opt(2026, 5, 20).unwrap());
        let sim = simulate(&ctx, &catalog(), &snapshot, &args).unwrap();
        assert_eq!(sim.events[0].effective_date, ts(2026, 5, 20));
        assert_eq!(sim.events[0].kind, EventKind::Cancel);
    }

    #[test]
    fn test_missing_arguments_are_rejected() {
        let now = ts(2026, 5, 10);
        let ctx = CallContext::new(Uuid::new_v4(), now);
        let (bundle_id, records) = bundle(now);
        let snapshot = BundleSnapshot::new(bundle_id, None, &records, now);

        let mut args = DryRunArguments::stop_billing(Uuid::new_v4());
        assert!(matches!(
            simulate(&ctx, &catalog(), &snapshot, &args),
            Err(SubscriptionError::InvalidSubscriptionId(_))
        ));
        args.subscription_id = None;
        assert!(matches!(
            simulate(&ctx, &catalog(), &snapshot, &args),
            Err(SubscriptionError::InvalidDryRunArguments(_))
        ));
    }

    #[test]
    fn test_change_plan_status_classifies_addons() {
        let now = ts(2026, 5, 10);
        let bundle_id = Uuid::new_v4();
        let base = subscription(&pistol(), bundle_id, ts(2026, 5, 1), now);
        let subs = vec![
            base.clone(),
            subscription(&holster(), bundle_id, ts(2026, 5, 2), now),
            subscription(&scope(), bundle_id, ts(2026, 5, 2), now),
        ];

        let statuses = change_plan_status(&catalog(), &base, &subs, Some("Shotgun"), now).unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].reason, DryRunChangeReason::AddOnIncluded);
        assert_eq!(statuses[1].reason, DryRunChangeReason::AddOnNotAvailable);

        let none = change_plan_status(&catalog(), &base, &subs, None, now).unwrap();
        assert!(none.iter().all(|s| s.reason == DryRunChangeReason::AddOnNotAvailable));

        assert_eq!(
            change_plan_status(&catalog(), &subs[1], &subs, Some("Shotgun"), now),
            Err(SubscriptionError::ChangeDryRunNotOnBasePlan)
        );
    }
}
