//! Caller input for creating subscriptions.

use crate::models::catalog::{PhaseType, Plan, PlanPhaseSpecifier, PriceOverride};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One requested entitlement. A missing plan means the subscription already
/// exists and the entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSpecifier {
    pub plan: Option<PlanPhaseSpecifier>,
    #[serde(default)]
    pub overrides: Vec<PriceOverride>,
}

impl EntitlementSpecifier {
    pub fn for_plan(plan_name: impl Into<String>) -> Self {
        Self {
            plan: Some(PlanPhaseSpecifier::for_plan(plan_name)),
            overrides: Vec::new(),
        }
    }

    pub fn existing() -> Self {
        Self {
            plan: None,
            overrides: Vec::new(),
        }
    }
}

/// A base (or standalone) plan with its add-ons, targeting one bundle.
///
/// Without a `bundle_id` the bundle is located by `bundle_external_key`, or
/// created when the batch carries a base or standalone plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionWithAddOnsSpecifier {
    pub bundle_id: Option<Uuid>,
    pub bundle_external_key: Option<String>,
    pub entitlements: Vec<EntitlementSpecifier>,
    pub billing_effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub migrated: bool,
}

impl SubscriptionWithAddOnsSpecifier {
    pub fn new(entitlements: Vec<EntitlementSpecifier>) -> Self {
        Self {
            bundle_id: None,
            bundle_external_key: None,
            entitlements,
            billing_effective_date: None,
            migrated: false,
        }
    }

    pub fn with_bundle_id(mut self, bundle_id: Uuid) -> Self {
        self.bundle_id = Some(bundle_id);
        self
    }

    pub fn with_external_key(mut self, key: impl Into<String>) -> Self {
        self.bundle_external_key = Some(key.into());
        self
    }

    pub fn with_billing_date(mut self, date: NaiveDate) -> Self {
        self.billing_effective_date = Some(date);
        self
    }
}

/// Build request for a subscription that does not exist yet.
#[derive(Debug, Clone)]
pub struct SubscriptionSpecifier {
    pub subscription_id: Uuid,
    pub bundle_id: Uuid,
    pub bundle_external_key: Option<String>,
    pub plan: Plan,
    pub initial_phase: Option<PhaseType>,
    pub bundle_start_date: DateTime<Utc>,
    pub align_start_date: DateTime<Utc>,
    pub effective_date: DateTime<Utc>,
    pub processed_date: DateTime<Utc>,
    pub migrated: bool,
}
