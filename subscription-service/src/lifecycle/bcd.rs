//! Billing cycle day arithmetic.

use crate::error::SubscriptionError;
use crate::models::{BillingAlignment, CallContext, Subscription};
use chrono::{Datelike, Months, NaiveDate};
use std::collections::HashMap;
use uuid::Uuid;

/// When a new billing cycle day takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcdEffectiveDate {
    /// Right now, at the request time rather than at a calendar date.
    Immediate,
    On(NaiveDate),
}

pub fn last_day_of_month(date: NaiveDate) -> u32 {
    (28..=31)
        .rev()
        .find(|&d| date.with_day(d).is_some())
        .unwrap_or(28)
}

fn clamp_to_month(date: NaiveDate, bcd: u32) -> Option<NaiveDate> {
    date.with_day(bcd.min(last_day_of_month(date)))
}

/// Next date on which `bcd` becomes effective, seen from `reference`.
///
/// A day past the end of the month clamps to the last day. `explicit_date`
/// tells whether `reference` was supplied by the caller; only an implicit
/// reference matching `bcd` yields [`BcdEffectiveDate::Immediate`].
pub fn effective_date_for_new_bcd(
    bcd: u32,
    reference: NaiveDate,
    explicit_date: bool,
) -> Result<BcdEffectiveDate, SubscriptionError> {
    if !(1..=31).contains(&bcd) {
        return Err(SubscriptionError::InvalidBillCycleDay(bcd));
    }

    let day = reference.day();
    let date = if bcd < day {
        reference
            .with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(1)))
            .and_then(|next_month| clamp_to_month(next_month, bcd))
    } else if bcd == day && !explicit_date {
        return Ok(BcdEffectiveDate::Immediate);
    } else {
        clamp_to_month(reference, bcd)
    };

    date.map(BcdEffectiveDate::On)
        .ok_or(SubscriptionError::InvalidBillCycleDay(bcd))
}

/// Local billing cycle day a subscription follows under `alignment`.
///
/// Results are memoised per subscription id in `cache`. Without an explicit
/// BCD a subscription bills on the local day of its alignment start date.
pub fn default_bill_cycle_day_local(
    cache: &mut HashMap<Uuid, u32>,
    ctx: &CallContext,
    subscription: &Subscription,
    base: Option<&Subscription>,
    alignment: BillingAlignment,
    account_bcd: Option<u32>,
) -> u32 {
    if let Some(bcd) = cache.get(&subscription.subscription_id) {
        return *bcd;
    }

    let own = |s: &Subscription| {
        s.bill_cycle_day_local
            .unwrap_or_else(|| ctx.to_local_date(s.align_start_date).day())
    };
    let bcd = match alignment {
        BillingAlignment::Account => account_bcd.unwrap_or_else(|| own(subscription)),
        BillingAlignment::Bundle => own(base.unwrap_or(subscription)),
        BillingAlignment::Subscription => own(subscription),
    };

    cache.insert(subscription.subscription_id, bcd);
    bcd
}
