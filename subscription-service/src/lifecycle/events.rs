//! Event generation shared by real commits and dry runs.

use crate::error::{CatalogError, SubscriptionError};
use crate::models::{
    EventKind, PhaseType, Plan, PlanAlignment, Subscription, SubscriptionRecord,
    SubscriptionSpecifier, TransitionEvent,
};
use crate::services::Catalog;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Start instant of each phase from `start_index` on, laid out from `from`.
fn phase_schedule(
    plan: &Plan,
    start_index: usize,
    from: DateTime<Utc>,
) -> Vec<(PhaseType, DateTime<Utc>)> {
    let mut schedule = Vec::new();
    let mut at = from;
    for phase in plan.phases.iter().skip(start_index) {
        schedule.push((phase.phase_type, at));
        match phase.duration.add_to(at) {
            Some(next) => at = next,
            None => break,
        }
    }
    schedule
}

/// Phase in force at `effective_date` plus the later phase starts.
fn split_schedule(
    plan: &Plan,
    phase_type: Option<PhaseType>,
    aligned_on: DateTime<Utc>,
    effective_date: DateTime<Utc>,
) -> Result<(PhaseType, Vec<(PhaseType, DateTime<Utc>)>), SubscriptionError> {
    let start_index = plan
        .phase_index(phase_type)
        .ok_or_else(|| CatalogError::NoInitialPhase(plan.name.clone()))?;
    let schedule = phase_schedule(plan, start_index, aligned_on);

    let current = schedule
        .iter()
        .take_while(|(_, starts)| *starts <= effective_date)
        .last()
        .or(schedule.first())
        .map(|(phase, _)| *phase)
        .ok_or_else(|| CatalogError::NoInitialPhase(plan.name.clone()))?;
    let upcoming = schedule
        .into_iter()
        .filter(|(_, starts)| *starts > effective_date)
        .collect();
    Ok((current, upcoming))
}

fn phase_events(
    subscription_id: Uuid,
    plan: &Plan,
    upcoming: Vec<(PhaseType, DateTime<Utc>)>,
    first_sequence: u32,
    processed_date: DateTime<Utc>,
) -> impl Iterator<Item = TransitionEvent> + '_ {
    upcoming
        .into_iter()
        .zip(first_sequence..)
        .map(move |((phase_type, starts), sequence)| TransitionEvent {
            subscription_id,
            sequence,
            effective_date: starts,
            processed_date,
            kind: EventKind::Phase {
                plan_name: plan.name.clone(),
                phase_type,
            },
        })
}

/// Events a new subscription starts with: a create event and its phases.
pub fn creation_events(
    catalog: &dyn Catalog,
    spec: &SubscriptionSpecifier,
) -> Result<Vec<TransitionEvent>, SubscriptionError> {
    let aligned_on = match catalog.plan_alignment(&spec.plan) {
        PlanAlignment::StartOfBundle => spec.bundle_start_date,
        PlanAlignment::StartOfSubscription => spec.align_start_date,
    };
    let (current, upcoming) =
        split_schedule(&spec.plan, spec.initial_phase, aligned_on, spec.effective_date)?;

    let create = TransitionEvent {
        subscription_id: spec.subscription_id,
        sequence: 0,
        effective_date: spec.effective_date,
        processed_date: spec.processed_date,
        kind: EventKind::Create {
            plan_name: spec.plan.name.clone(),
            phase_type: current,
            price_list_name: spec.plan.price_list_name.clone(),
        },
    };
    Ok(std::iter::once(create)
        .chain(phase_events(
            spec.subscription_id,
            &spec.plan,
            upcoming,
            1,
            spec.processed_date,
        ))
        .collect())
}

/// Record to persist for a new subscription.
pub fn build_record(
    catalog: &dyn Catalog,
    spec: &SubscriptionSpecifier,
) -> Result<SubscriptionRecord, SubscriptionError> {
    Ok(SubscriptionRecord {
        subscription_id: spec.subscription_id,
        bundle_id: spec.bundle_id,
        bundle_external_key: spec.bundle_external_key.clone(),
        category: spec.plan.category(),
        bundle_start_date: spec.bundle_start_date,
        align_start_date: spec.align_start_date,
        charged_through_date: None,
        migrated: spec.migrated,
        created_utc: spec.processed_date,
        events: creation_events(catalog, spec)?,
    })
}

/// Events for moving `subscription` to `plan` on `effective_date`.
pub fn change_plan_events(
    catalog: &dyn Catalog,
    subscription: &Subscription,
    plan: &Plan,
    phase_type: Option<PhaseType>,
    effective_date: DateTime<Utc>,
    processed_date: DateTime<Utc>,
) -> Result<Vec<TransitionEvent>, SubscriptionError> {
    let aligned_on = match catalog.plan_alignment(plan) {
        PlanAlignment::StartOfBundle => subscription.bundle_start_date,
        PlanAlignment::StartOfSubscription => subscription.align_start_date,
    };
    let (current, upcoming) = split_schedule(plan, phase_type, aligned_on, effective_date)?;
    let sequence = subscription.next_sequence();

    let change = TransitionEvent {
        subscription_id: subscription.subscription_id,
        sequence,
        effective_date,
        processed_date,
        kind: EventKind::Change {
            plan_name: plan.name.clone(),
            phase_type: current,
            price_list_name: plan.price_list_name.clone(),
        },
    };
    Ok(std::iter::once(change)
        .chain(phase_events(
            subscription.subscription_id,
            plan,
            upcoming,
            sequence + 1,
            processed_date,
        ))
        .collect())
}

pub fn cancel_event(
    subscription: &Subscription,
    effective_date: DateTime<Utc>,
    processed_date: DateTime<Utc>,
) -> TransitionEvent {
    TransitionEvent {
        subscription_id: subscription.subscription_id,
        sequence: subscription.next_sequence(),
        effective_date,
        processed_date,
        kind: EventKind::Cancel,
    }
}

pub fn bcd_change_event(
    subscription: &Subscription,
    bill_cycle_day_local: u32,
    effective_date: DateTime<Utc>,
    processed_date: DateTime<Utc>,
) -> TransitionEvent {
    TransitionEvent {
        subscription_id: subscription.subscription_id,
        sequence: subscription.next_sequence(),
        effective_date,
        processed_date,
        kind: EventKind::BillCycleDayChange {
            bill_cycle_day_local,
        },
    }
}
