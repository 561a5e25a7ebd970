//! Test helper module for subscription-service integration tests.
//!
//! Wires the API to the in-memory store and a small fixed catalog.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use service_core::observability::init_tracing;
use std::sync::Arc;
use subscription_service::config::SubscriptionConfig;
use subscription_service::models::{
    BillingPeriod, BundleLimit, CallContext, EntitlementSpecifier, PhaseDuration, PhaseType, Plan,
    PlanPhase, Product, ProductCategory, SubscriptionBundle, SubscriptionWithAddOnsSpecifier,
};
use subscription_service::services::init_metrics;
use subscription_service::services::memory::{InMemoryCatalog, InMemoryStore, StaticCatalogProvider};
use subscription_service::SubscriptionInternalApi;
use uuid::Uuid;

pub const SPORTS: &str = "sports-monthly";
pub const STANDARD: &str = "standard-monthly";
pub const OIL_SLICK: &str = "oilslick-monthly";
pub const REMOTE_CONTROL: &str = "remotecontrol-monthly";
pub const REFILL: &str = "refill-monthly";

static TRACING: Lazy<()> = Lazy::new(|| {
    let level = std::env::var("TEST_LOG").unwrap_or_else(|_| "warn".to_string());
    // A subscriber may already be installed by another test binary helper.
    let _ = init_tracing("subscription-service-test", &level, None);
});

/// Instant at 08:00 UTC on the given day.
pub fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn plan(name: &str, product: &str, category: ProductCategory, phases: Vec<PlanPhase>, limit: BundleLimit) -> Plan {
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

fn evergreen() -> PlanPhase {
    PlanPhase {
        phase_type: PhaseType::Evergreen,
        duration: PhaseDuration::Unlimited,
    }
}

/// Two base products, two add-ons and one standalone product.
///
/// Sports offers both add-ons. Standard includes the remote control and
/// offers nothing else.
pub fn catalog() -> InMemoryCatalog {
    let trial = PlanPhase {
        phase_type: PhaseType::Trial,
        duration: PhaseDuration::Days(30),
    };
    InMemoryCatalog::new()
        .with_plan(plan(SPORTS, "Sports", ProductCategory::Base, vec![trial, evergreen()], BundleLimit::Unlimited))
        .with_plan(plan(STANDARD, "Standard", ProductCategory::Base, vec![evergreen()], BundleLimit::Unlimited))
        .with_plan(plan(OIL_SLICK, "OilSlick", ProductCategory::AddOn, vec![evergreen()], BundleLimit::AtMost(2)))
        .with_plan(plan(
            REMOTE_CONTROL,
            "RemoteControl",
            ProductCategory::AddOn,
            vec![evergreen()],
            BundleLimit::Unlimited,
        ))
        .with_plan(plan(REFILL, "Refill", ProductCategory::Standalone, vec![evergreen()], BundleLimit::Unlimited))
        .with_available_addon("Sports", "OilSlick")
        .with_available_addon("Sports", "RemoteControl")
        .with_included_addon("Standard", "RemoteControl")
}

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub api: SubscriptionInternalApi,
    pub store: Arc<InMemoryStore>,
    pub account_id: Uuid,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(catalog(), SubscriptionConfig::default()).await
    }

    pub async fn spawn_with_catalog(catalog: InMemoryCatalog) -> Self {
        Self::spawn_with(catalog, SubscriptionConfig::default()).await
    }

    pub async fn spawn_with(catalog: InMemoryCatalog, config: SubscriptionConfig) -> Self {
        Lazy::force(&TRACING);
        init_metrics();

        let store = Arc::new(InMemoryStore::new());
        let catalogs = Arc::new(StaticCatalogProvider::new(catalog));
        let api = SubscriptionInternalApi::new(store.clone(), catalogs, config);

        Self {
            api,
            store,
            account_id: Uuid::new_v4(),
        }
    }

    /// Request context for the test account at `now`.
    pub fn ctx(&self, now: DateTime<Utc>) -> CallContext {
        CallContext::new(self.account_id, now)
    }

    /// Create a bundle holding `plans`, the first being the base.
    pub async fn create_bundle(&self, now: DateTime<Utc>, key: &str, plans: &[&str]) -> SubscriptionBundle {
        let specifier = SubscriptionWithAddOnsSpecifier::new(
            plans.iter().map(|p| EntitlementSpecifier::for_plan(*p)).collect(),
        )
        .with_external_key(key);

        let mut created = self
            .api
            .create_base_subscriptions_with_addons(&self.ctx(now), &[specifier], false)
            .await
            .expect("Failed to create bundle");
        created.remove(0)
    }
}
