//! Classification and ordering of a creation batch.

use crate::error::SubscriptionError;
use crate::models::{
    EntitlementSpecifier, Plan, PlanPhaseSpecifier, PriceOverride, ProductCategory,
};
use crate::services::Catalog;
use chrono::{DateTime, Utc};

/// An entitlement whose plan has been resolved.
#[derive(Debug, Clone)]
pub struct ClassifiedEntitlement {
    pub plan: Plan,
    pub spec: PlanPhaseSpecifier,
    pub overrides: Vec<PriceOverride>,
}

impl ClassifiedEntitlement {
    pub fn category(&self) -> ProductCategory {
        self.plan.category()
    }
}

/// Entitlements ordered base first, then add-ons, then standalones.
#[derive(Debug, Clone)]
pub struct ClassifiedBatch {
    pub entitlements: Vec<ClassifiedEntitlement>,
    /// The batch brings a base or standalone plan.
    pub establishes_bundle: bool,
}

impl ClassifiedBatch {
    pub fn base(&self) -> Option<&ClassifiedEntitlement> {
        self.entitlements
            .first()
            .filter(|e| e.category() == ProductCategory::Base)
    }

    pub fn first(&self) -> Option<&ClassifiedEntitlement> {
        self.entitlements.first()
    }

    pub fn is_empty(&self) -> bool {
        self.entitlements.is_empty()
    }

    /// Add-on plans of the batch, in order.
    pub fn addon_plans(&self) -> Vec<&Plan> {
        self.entitlements
            .iter()
            .filter(|e| e.category() == ProductCategory::AddOn)
            .map(|e| &e.plan)
            .collect()
    }
}

/// Resolve and order one bundle's entitlements.
///
/// Entitlements without a plan refer to existing subscriptions and are
/// skipped. At most one base is allowed, and standalones cannot be mixed with
/// base or add-on plans.
pub fn classify_and_order(
    entitlements: &[EntitlementSpecifier],
    catalog: &dyn Catalog,
    effective_date: DateTime<Utc>,
) -> Result<ClassifiedBatch, SubscriptionError> {
    let mut base: Option<ClassifiedEntitlement> = None;
    let mut addons = Vec::new();
    let mut standalones = Vec::new();

    for entitlement in entitlements {
        let Some(spec) = &entitlement.plan else {
            continue;
        };
        let plan = catalog.resolve_plan(spec, &entitlement.overrides, effective_date)?;
        let classified = ClassifiedEntitlement {
            plan,
            spec: spec.clone(),
            overrides: entitlement.overrides.clone(),
        };

        match classified.category() {
            ProductCategory::Base => {
                if base.is_some() {
                    return Err(SubscriptionError::InvalidSpecifierBatch(format!(
                        "more than one base plan: {}",
                        classified.plan.name
                    )));
                }
                base = Some(classified);
            }
            ProductCategory::AddOn => addons.push(classified),
            ProductCategory::Standalone => standalones.push(classified),
        }
    }

    if !standalones.is_empty() && (base.is_some() || !addons.is_empty()) {
        return Err(SubscriptionError::InvalidSpecifierBatch(
            "standalone plans cannot be combined with base or add-on plans".to_string(),
        ));
    }

    let establishes_bundle = base.is_some() || !standalones.is_empty();
    let entitlements = base
        .into_iter()
        .chain(addons)
        .chain(standalones)
        .collect();

    Ok(ClassifiedBatch {
        entitlements,
        establishes_bundle,
    })
}
