//! Catalog vocabulary: products, plans, phases and policies.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

/// Product category of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Base,
    AddOn,
    Standalone,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Base => "base",
            ProductCategory::AddOn => "add_on",
            ProductCategory::Standalone => "standalone",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "base" => Some(ProductCategory::Base),
            "add_on" | "addon" => Some(ProductCategory::AddOn),
            "standalone" => Some(ProductCategory::Standalone),
            _ => None,
        }
    }

    /// Base and standalone plans anchor a bundle.
    pub fn anchors_bundle(&self) -> bool {
        matches!(self, ProductCategory::Base | ProductCategory::Standalone)
    }
}

/// Phase type of a plan phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseType {
    Trial,
    Discount,
    FixedTerm,
    Evergreen,
}

impl PhaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseType::Trial => "trial",
            PhaseType::Discount => "discount",
            PhaseType::FixedTerm => "fixed_term",
            PhaseType::Evergreen => "evergreen",
        }
    }
}

/// Recurring billing period of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Quarterly,
    Annual,
    NoBillingPeriod,
}

/// Policy deciding when a plan change or cancellation takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingActionPolicy {
    StartOfTerm,
    EndOfTerm,
    Immediate,
    Illegal,
}

impl BillingActionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingActionPolicy::StartOfTerm => "start_of_term",
            BillingActionPolicy::EndOfTerm => "end_of_term",
            BillingActionPolicy::Immediate => "immediate",
            BillingActionPolicy::Illegal => "illegal",
        }
    }
}

/// Which billing cycle day a subscription follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingAlignment {
    Account,
    Bundle,
    Subscription,
}

/// Which date phase boundaries are computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAlignment {
    StartOfBundle,
    StartOfSubscription,
}

/// Per-bundle cap on subscriptions of the same add-on plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleLimit {
    Unlimited,
    AtMost(u32),
}

impl BundleLimit {
    /// Catalogs encode "unlimited" as -1; zero is treated the same way.
    pub fn from_catalog_value(value: i32) -> Self {
        if value > 0 {
            BundleLimit::AtMost(value as u32)
        } else {
            BundleLimit::Unlimited
        }
    }
}

/// Length of a plan phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseDuration {
    Days(u32),
    Months(u32),
    Years(u32),
    Unlimited,
}

impl PhaseDuration {
    /// Add this duration to `from`; `None` for an unlimited phase.
    pub fn add_to(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            PhaseDuration::Days(n) => from.checked_add_signed(chrono::Duration::days(n as i64)),
            PhaseDuration::Months(n) => from.checked_add_months(Months::new(n)),
            PhaseDuration::Years(n) => from.checked_add_months(Months::new(n.saturating_mul(12))),
            PhaseDuration::Unlimited => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub category: ProductCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPhase {
    pub phase_type: PhaseType,
    pub duration: PhaseDuration,
}

/// A concrete catalog plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub product: Product,
    pub price_list_name: String,
    pub billing_period: BillingPeriod,
    pub phases: Vec<PlanPhase>,
    pub plans_allowed_in_bundle: BundleLimit,
}

impl Plan {
    pub fn category(&self) -> ProductCategory {
        self.product.category
    }

    pub fn initial_phase(&self) -> Option<&PlanPhase> {
        self.phases.first()
    }

    /// Index of the phase of the given type, or of the first phase.
    pub fn phase_index(&self, phase_type: Option<PhaseType>) -> Option<usize> {
        match phase_type {
            Some(t) => self.phases.iter().position(|p| p.phase_type == t),
            None if self.phases.is_empty() => None,
            None => Some(0),
        }
    }
}

/// Caller description of the plan to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanPhaseSpecifier {
    pub plan_name: Option<String>,
    pub product_name: Option<String>,
    pub billing_period: Option<BillingPeriod>,
    pub price_list_name: Option<String>,
    pub phase_type: Option<PhaseType>,
}

impl PlanPhaseSpecifier {
    pub fn for_plan(plan_name: impl Into<String>) -> Self {
        Self {
            plan_name: Some(plan_name.into()),
            product_name: None,
            billing_period: None,
            price_list_name: None,
            phase_type: None,
        }
    }

    pub fn with_phase(mut self, phase_type: PhaseType) -> Self {
        self.phase_type = Some(phase_type);
        self
    }

    /// True when nothing identifies a plan.
    pub fn is_empty(&self) -> bool {
        self.plan_name.is_none() && self.product_name.is_none() && self.billing_period.is_none()
    }
}

/// Price override for one phase of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceOverride {
    pub phase_type: PhaseType,
    pub currency: String,
    pub fixed_price: Option<String>,
    pub recurring_price: Option<String>,
}
