//! Per-bundle add-on cardinality.

use crate::error::SubscriptionError;
use crate::models::{BundleLimit, EntitlementState, Plan, ProductCategory, Subscription};

/// Reject `plan` when the bundle's live add-ons of that plan, plus the
/// in-flight plans of the same name, exceed the catalog limit.
///
/// `in_flight` holds every add-on plan being added by the current request,
/// `plan` included. A plan change passes just the target plan.
pub fn check_addon_limit(
    plan: &Plan,
    existing: &[Subscription],
    in_flight: &[&Plan],
) -> Result<(), SubscriptionError> {
    if plan.category() != ProductCategory::AddOn {
        return Ok(());
    }
    let BundleLimit::AtMost(limit) = plan.plans_allowed_in_bundle else {
        return Ok(());
    };

    let same_plan = |name: Option<&str>| name.is_some_and(|n| n.eq_ignore_ascii_case(&plan.name));

    let existing_count = existing
        .iter()
        .filter(|s| s.category == ProductCategory::AddOn)
        .filter(|s| s.state != EntitlementState::Cancelled)
        .filter(|s| same_plan(s.plan_name()))
        .count();
    let in_flight_count = in_flight
        .iter()
        .filter(|p| p.category() == ProductCategory::AddOn)
        .filter(|p| same_plan(Some(p.name.as_str())))
        .count();

    if existing_count + in_flight_count > limit as usize {
        tracing::debug!(
            plan = %plan.name,
            existing_count,
            in_flight_count,
            limit,
            "Add-on limit exceeded"
        );
        return Err(SubscriptionError::AddOnLimitExceeded(plan.name.clone()));
    }
    Ok(())
}

/// Run [`check_addon_limit`] for every add-on in `batch`.
pub fn check_batch(batch: &[&Plan], existing: &[Subscription]) -> Result<(), SubscriptionError> {
    for plan in batch {
        check_addon_limit(plan, existing, batch)?;
    }
    Ok(())
}
