//! Effective dates derived from billing action policies.

use crate::error::SubscriptionError;
use crate::lifecycle::bcd::last_day_of_month;
use crate::models::{BillingActionPolicy, BillingAlignment, CallContext, Subscription};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

/// Billing context a policy may need. Dry runs leave both unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct BillingAnchor {
    pub alignment: Option<BillingAlignment>,
    pub bill_cycle_day_local: Option<u32>,
}

/// Concrete date on which `policy` applies a change to `subscription`.
pub fn effective_date_for_policy(
    ctx: &CallContext,
    subscription: &Subscription,
    policy: BillingActionPolicy,
    anchor: BillingAnchor,
) -> Result<DateTime<Utc>, SubscriptionError> {
    let now = ctx.created_date.max(subscription.start_date);
    match policy {
        BillingActionPolicy::Immediate => Ok(now),
        BillingActionPolicy::EndOfTerm => Ok(subscription
            .charged_through_date
            .filter(|ctd| *ctd > now)
            .unwrap_or(now)),
        BillingActionPolicy::StartOfTerm => {
            let (Some(_), Some(bcd)) = (anchor.alignment, anchor.bill_cycle_day_local) else {
                return Err(SubscriptionError::BillingAlignmentUnavailable);
            };
            let period_start = current_period_start(ctx.to_local_date(now), bcd)
                .ok_or(SubscriptionError::InvalidBillCycleDay(bcd))?;
            Ok(ctx.to_utc_date_time(period_start).max(subscription.start_date))
        }
        BillingActionPolicy::Illegal => Err(SubscriptionError::IllegalPlanChange {
            from: subscription.plan_name().unwrap_or_default().to_string(),
        }),
    }
}

/// Latest date on or before `today` that falls on the (clamped) billing day.
fn current_period_start(today: NaiveDate, bcd: u32) -> Option<NaiveDate> {
    let this_month = today.with_day(bcd.min(last_day_of_month(today)))?;
    if this_month <= today {
        return Some(this_month);
    }
    let previous = today.with_day(1)?.checked_sub_months(Months::new(1))?;
    previous.with_day(bcd.min(last_day_of_month(previous)))
}

/// Instant for a caller-supplied dry-run date.
///
/// A date equal to the subscription's local start date never resolves to an
/// instant before the start itself.
pub fn dry_run_effective_date(
    ctx: &CallContext,
    requested: Option<NaiveDate>,
    subscription: &Subscription,
) -> Option<DateTime<Utc>> {
    let date = requested?;
    let candidate = ctx.to_utc_date_time(date);
    if date == ctx.to_local_date(subscription.start_date) && candidate < subscription.start_date {
        return Some(subscription.start_date);
    }
    Some(candidate)
}
