//! Bundle start date resolution.

use crate::error::SubscriptionError;
use crate::models::{EntitlementState, Plan, ProductCategory, Subscription};
use crate::services::Catalog;
use chrono::{DateTime, Utc};

/// Bundle start date for a new subscription of `plan`, given the bundle's
/// current base subscription.
///
/// Base and standalone plans start the bundle at `requested` unless a live
/// base is already there. Add-ons need a base that started no later than
/// `requested` and that allows them; they inherit the base start date.
pub fn resolve_bundle_start_date(
    catalog: &dyn Catalog,
    plan: &Plan,
    bundle_label: &str,
    base: Option<&Subscription>,
    requested: DateTime<Utc>,
) -> Result<DateTime<Utc>, SubscriptionError> {
    match plan.category() {
        ProductCategory::Base | ProductCategory::Standalone => {
            if base.is_some_and(|b| b.is_active_or_pending()) {
                return Err(SubscriptionError::BaseAlreadyExists(bundle_label.to_string()));
            }
            Ok(requested)
        }
        ProductCategory::AddOn => {
            let base = base.ok_or_else(|| {
                SubscriptionError::NoBaseSubscription(bundle_label.to_string())
            })?;
            if requested < base.start_date {
                return Err(SubscriptionError::InvalidRequestedDate {
                    requested,
                    base_start: base.start_date,
                });
            }
            check_addon_eligibility(catalog, base, plan, requested)?;
            Ok(base.start_date)
        }
    }
}

/// The base must still be live at `date`, and its product must offer the
/// add-on without already including it.
pub fn check_addon_eligibility(
    catalog: &dyn Catalog,
    base: &Subscription,
    addon: &Plan,
    date: DateTime<Utc>,
) -> Result<(), SubscriptionError> {
    let cancelled_by_then = base.end_date.is_some_and(|end| end <= date);
    if base.state == EntitlementState::Cancelled || cancelled_by_then {
        return Err(SubscriptionError::BaseNotActive(base.subscription_id));
    }
    let base_plan_name = base
        .plan_name()
        .ok_or(SubscriptionError::BaseNotActive(base.subscription_id))?;
    let base_plan = catalog.find_plan(base_plan_name, date)?;
    check_addon_for_product(catalog, &base_plan.product.name, addon)
}

/// The base product must offer `addon` without already including it.
pub fn check_addon_for_product(
    catalog: &dyn Catalog,
    base_product: &str,
    addon: &Plan,
) -> Result<(), SubscriptionError> {
    let base_product = base_product.to_string();
    if catalog.is_addon_included(&base_product, addon) {
        return Err(SubscriptionError::AddOnAlreadyIncluded {
            addon: addon.name.clone(),
            base: base_product,
        });
    }
    if !catalog.is_addon_available(&base_product, addon) {
        return Err(SubscriptionError::AddOnNotAvailable {
            addon: addon.name.clone(),
            base: base_product,
        });
    }
    Ok(())
}
