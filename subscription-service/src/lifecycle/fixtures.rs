//! Catalog and subscription builders shared by the lifecycle tests.

use crate::lifecycle::events::build_record;
use crate::models::{
    BillingPeriod, BundleLimit, EventKind, PhaseDuration, PhaseType, Plan, PlanPhase, Product,
    ProductCategory, Subscription, SubscriptionRecord, SubscriptionSpecifier, TransitionEvent,
};
use crate::services::memory::InMemoryCatalog;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

pub fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
}

pub fn plan(
    name: &str,
    product: &str,
    category: ProductCategory,
    phases: Vec<PlanPhase>,
    limit: BundleLimit,
) -> Plan {
    Plan {
        name: name.to_string(),
        product: Product {
            name: product.to_string(),
            category,
        },
        price_list_name: "DEFAULT".to_string(),
        billing_period: BillingPeriod::Monthly,
        phases,
        plans_allowed_in_bundle: limit,
    }
}

pub fn evergreen() -> Vec<PlanPhase> {
    vec![PlanPhase {
        phase_type: PhaseType::Evergreen,
        duration: PhaseDuration::Unlimited,
    }]
}

pub fn trial_then_evergreen() -> Vec<PlanPhase> {
    vec![
        PlanPhase {
            phase_type: PhaseType::Trial,
            duration: PhaseDuration::Days(30),
        },
        PlanPhase {
            phase_type: PhaseType::Evergreen,
            duration: PhaseDuration::Unlimited,
        },
    ]
}

pub fn pistol() -> Plan {
    plan(
        "pistol-monthly",
        "Pistol",
        ProductCategory::Base,
        trial_then_evergreen(),
        BundleLimit::Unlimited,
    )
}

pub fn shotgun() -> Plan {
    plan(
        "shotgun-monthly",
        "Shotgun",
        ProductCategory::Base,
        evergreen(),
        BundleLimit::Unlimited,
    )
}

pub fn scope() -> Plan {
    plan(
        "telescopic-scope-monthly",
        "Telescopic-Scope",
        ProductCategory::AddOn,
        evergreen(),
        BundleLimit::AtMost(2),
    )
}

pub fn holster() -> Plan {
    plan(
        "holster-monthly",
        "Holster",
        ProductCategory::AddOn,
        evergreen(),
        BundleLimit::Unlimited,
    )
}

pub fn knife() -> Plan {
    plan(
        "knife-monthly",
        "Knife",
        ProductCategory::Standalone,
        evergreen(),
        BundleLimit::Unlimited,
    )
}

pub fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_plan(pistol())
        .with_plan(shotgun())
        .with_plan(scope())
        .with_plan(holster())
        .with_plan(knife())
        .with_available_addon("Pistol", "Telescopic-Scope")
        .with_available_addon("Pistol", "Holster")
        .with_included_addon("Shotgun", "Holster")
}

/// A subscription created on `start` for `plan`, folded as of `now`.
pub fn subscription(plan: &Plan, bundle_id: Uuid, start: DateTime<Utc>, now: DateTime<Utc>) -> Subscription {
    let subscription_id = Uuid::new_v4();
    let record = SubscriptionRecord {
        subscription_id,
        bundle_id,
        bundle_external_key: None,
        category: plan.category(),
        bundle_start_date: start,
        align_start_date: start,
        charged_through_date: None,
        migrated: false,
        created_utc: start,
        events: vec![TransitionEvent {
            subscription_id,
            sequence: 0,
            effective_date: start,
            processed_date: start,
            kind: EventKind::Create {
                plan_name: plan.name.clone(),
                phase_type: plan.phases[0].phase_type,
                price_list_name: plan.price_list_name.clone(),
            },
        }],
    };
    Subscription::rebuild(&record, &[], now)
}

/// A subscription created on `start` through the event factory, so every
/// later phase of `plan` is scheduled.
pub fn scheduled_subscription(
    plan: &Plan,
    bundle_id: Uuid,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Subscription {
    let spec = SubscriptionSpecifier {
        subscription_id: Uuid::new_v4(),
        bundle_id,
        bundle_external_key: None,
        plan: plan.clone(),
        initial_phase: None,
        bundle_start_date: start,
        align_start_date: start,
        effective_date: start,
        processed_date: start,
        migrated: false,
    };
    let record = build_record(&catalog(), &spec).unwrap();
    Subscription::rebuild(&record, &[], now)
}

/// Same as [`subscription`] with a cancellation on `cancelled`.
pub fn cancelled_subscription(
    plan: &Plan,
    bundle_id: Uuid,
    start: DateTime<Utc>,
    cancelled: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Subscription {
    let live = subscription(plan, bundle_id, start, start);
    let cancel = TransitionEvent {
        subscription_id: live.subscription_id,
        sequence: 1,
        effective_date: cancelled,
        processed_date: cancelled,
        kind: EventKind::Cancel,
    };
    let record = SubscriptionRecord {
        subscription_id: live.subscription_id,
        bundle_id,
        bundle_external_key: None,
        category: plan.category(),
        bundle_start_date: start,
        align_start_date: start,
        charged_through_date: None,
        migrated: false,
        created_utc: start,
        events: live.events.clone(),
    };
    Subscription::rebuild(&record, &[cancel], now)
}
