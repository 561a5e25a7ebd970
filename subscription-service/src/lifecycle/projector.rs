//! Projection of subscription transitions into caller-facing events.

use crate::models::{EffectiveSubscriptionEvent, Subscription, SubscriptionTransition};

/// Project `transitions` of `subscription` in the order given.
pub fn project<'a>(
    subscription: &Subscription,
    transitions: impl IntoIterator<Item = &'a SubscriptionTransition>,
) -> Vec<EffectiveSubscriptionEvent> {
    transitions
        .into_iter()
        .map(|t| EffectiveSubscriptionEvent {
            subscription_id: t.subscription_id,
            bundle_id: t.bundle_id,
            event_type: t.event.as_str().to_string(),
            effective_date: t.effective_date,
            processed_date: t.processed_date,
            alignment_start_date: subscription.align_start_date,
            previous_state: t.previous_state,
            next_state: t.next_state,
            previous_plan_name: t.previous_plan_name.clone(),
            next_plan_name: t.next_plan_name.clone(),
            previous_phase: t.previous_phase,
            next_phase: t.next_phase,
            previous_price_list: t.previous_price_list.clone(),
            next_price_list: t.next_price_list.clone(),
            next_bill_cycle_day_local: t.next_bill_cycle_day_local,
        })
        .collect()
}

/// Every transition of `subscription`, past and future.
pub fn all_transitions(subscription: &Subscription) -> Vec<EffectiveSubscriptionEvent> {
    project(subscription, &subscription.transitions)
}
