//! Subscription model.
//!
//! Persisted subscriptions are stored as a [`SubscriptionRecord`]: identity,
//! alignment dates and the append-only event list. The [`Subscription`] read
//! model is always rebuilt from that list; no "current state" field is stored.

use crate::models::bundle::Bundle;
use crate::models::catalog::{PhaseType, ProductCategory};
use crate::models::event::{EventKind, TransitionEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Entitlement state derived from the event timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitlementState {
    Pending,
    Active,
    Cancelled,
}

impl EntitlementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementState::Pending => "pending",
            EntitlementState::Active => "active",
            EntitlementState::Cancelled => "cancelled",
        }
    }
}

/// Persisted shape of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub subscription_id: Uuid,
    pub bundle_id: Uuid,
    pub bundle_external_key: Option<String>,
    pub category: ProductCategory,
    pub bundle_start_date: DateTime<Utc>,
    pub align_start_date: DateTime<Utc>,
    pub charged_through_date: Option<DateTime<Utc>>,
    pub migrated: bool,
    pub created_utc: DateTime<Utc>,
    pub events: Vec<TransitionEvent>,
}

/// One step of a subscription timeline with its before/after values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionTransition {
    pub subscription_id: Uuid,
    pub bundle_id: Uuid,
    pub event: EventKind,
    pub effective_date: DateTime<Utc>,
    pub processed_date: DateTime<Utc>,
    pub previous_state: Option<EntitlementState>,
    pub next_state: EntitlementState,
    pub previous_plan_name: Option<String>,
    pub next_plan_name: Option<String>,
    pub previous_phase: Option<PhaseType>,
    pub next_phase: Option<PhaseType>,
    pub previous_price_list: Option<String>,
    pub next_price_list: Option<String>,
    pub next_bill_cycle_day_local: Option<u32>,
}

/// Subscription read model, folded from its events as of a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub bundle_id: Uuid,
    pub bundle_external_key: Option<String>,
    pub category: ProductCategory,
    pub bundle_start_date: DateTime<Utc>,
    pub align_start_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub charged_through_date: Option<DateTime<Utc>>,
    pub migrated: bool,
    pub state: EntitlementState,
    pub current_plan_name: Option<String>,
    pub current_phase: Option<PhaseType>,
    pub current_price_list: Option<String>,
    pub bill_cycle_day_local: Option<u32>,
    pub transitions: Vec<SubscriptionTransition>,
    pub events: Vec<TransitionEvent>,
}

#[derive(Default, Clone)]
struct TimelineValues {
    state: Option<EntitlementState>,
    plan_name: Option<String>,
    phase: Option<PhaseType>,
    price_list: Option<String>,
    bcd: Option<u32>,
}

impl TimelineValues {
    fn apply(&self, kind: &EventKind) -> Option<TimelineValues> {
        let mut next = self.clone();
        match kind {
            EventKind::Create {
                plan_name,
                phase_type,
                price_list_name,
            }
            | EventKind::Change {
                plan_name,
                phase_type,
                price_list_name,
            } => {
                next.state = Some(EntitlementState::Active);
                next.plan_name = Some(plan_name.clone());
                next.phase = Some(*phase_type);
                next.price_list = Some(price_list_name.clone());
            }
            EventKind::Phase {
                plan_name,
                phase_type,
            } => {
                // Phase events of a plan that has since been changed away from are stale.
                if self.plan_name.as_deref() != Some(plan_name.as_str()) {
                    return None;
                }
                next.phase = Some(*phase_type);
            }
            EventKind::Cancel => {
                next.state = Some(EntitlementState::Cancelled);
            }
            EventKind::BillCycleDayChange {
                bill_cycle_day_local,
            } => {
                next.bcd = Some(*bill_cycle_day_local);
            }
        }
        Some(next)
    }
}

impl Subscription {
    /// Rebuild a subscription from its record plus any extra (simulated)
    /// events, as of `now`.
    pub fn rebuild(
        record: &SubscriptionRecord,
        extra_events: &[TransitionEvent],
        now: DateTime<Utc>,
    ) -> Self {
        let mut events: Vec<TransitionEvent> = record
            .events
            .iter()
            .chain(
                extra_events
                    .iter()
                    .filter(|e| e.subscription_id == record.subscription_id),
            )
            .cloned()
            .collect();
        events.sort_by(TransitionEvent::timeline_order);

        let mut timeline = TimelineValues::default();
        let mut current = TimelineValues::default();
        let mut transitions = Vec::with_capacity(events.len());
        let mut start_date = None;
        let mut end_date = None;

        for event in &events {
            if end_date.is_some() {
                break;
            }
            let Some(next) = timeline.apply(&event.kind) else {
                continue;
            };
            match event.kind {
                EventKind::Create { .. } if start_date.is_none() => {
                    start_date = Some(event.effective_date)
                }
                EventKind::Cancel => end_date = Some(event.effective_date),
                _ => {}
            }

            transitions.push(SubscriptionTransition {
                subscription_id: record.subscription_id,
                bundle_id: record.bundle_id,
                event: event.kind.clone(),
                effective_date: event.effective_date,
                processed_date: event.processed_date,
                previous_state: timeline.state,
                next_state: next.state.unwrap_or(EntitlementState::Pending),
                previous_plan_name: timeline.plan_name.clone(),
                next_plan_name: next.plan_name.clone(),
                previous_phase: timeline.phase,
                next_phase: next.phase,
                previous_price_list: timeline.price_list.clone(),
                next_price_list: next.price_list.clone(),
                next_bill_cycle_day_local: next.bcd,
            });

            if event.effective_date <= now {
                current = next.clone();
            }
            timeline = next;
        }

        let start_date = start_date.unwrap_or(record.align_start_date);
        let state = current.state.unwrap_or(EntitlementState::Pending);

        Self {
            subscription_id: record.subscription_id,
            bundle_id: record.bundle_id,
            bundle_external_key: record.bundle_external_key.clone(),
            category: record.category,
            bundle_start_date: record.bundle_start_date,
            align_start_date: record.align_start_date,
            start_date,
            end_date,
            charged_through_date: record.charged_through_date,
            migrated: record.migrated,
            state,
            current_plan_name: current.plan_name,
            current_phase: current.phase,
            current_price_list: current.price_list,
            bill_cycle_day_local: current.bcd,
            transitions,
            events,
        }
    }

    pub fn is_active_or_pending(&self) -> bool {
        matches!(
            self.state,
            EntitlementState::Active | EntitlementState::Pending
        )
    }

    /// Still entitled after `now`: never cancelled, or cancelled in the future.
    pub fn is_live_after(&self, now: DateTime<Utc>) -> bool {
        self.end_date.map_or(true, |end| end > now)
    }

    /// Plan name in force now, falling back to the first planned one.
    pub fn plan_name(&self) -> Option<&str> {
        self.current_plan_name.as_deref().or_else(|| {
            self.transitions
                .iter()
                .find_map(|t| t.next_plan_name.as_deref())
        })
    }

    /// Next free event sequence number.
    pub fn next_sequence(&self) -> u32 {
        self.events
            .iter()
            .map(|e| e.sequence + 1)
            .max()
            .unwrap_or(0)
    }
}

/// A subscription as it would look under a hypothetical action.
///
/// Only ever produced by a dry run. It exposes a read-only view and offers no
/// way back to a [`SubscriptionRecord`], so it cannot be handed to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunSubscription {
    subscription: Subscription,
    synthetic: bool,
}

impl DryRunSubscription {
    pub(crate) fn new(subscription: Subscription, synthetic: bool) -> Self {
        Self {
            subscription,
            synthetic,
        }
    }

    pub fn view(&self) -> &Subscription {
        &self.subscription
    }

    /// True when the subscription exists only in the simulation.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}

/// A bundle with its subscriptions, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionBundle {
    pub bundle: Bundle,
    pub subscriptions: Vec<Subscription>,
}

/// Canonical order inside a bundle: the base plan first, then by
/// alignment start date.
pub fn compare_for_bundle_listing(a: &Subscription, b: &Subscription) -> Ordering {
    let rank = |s: &Subscription| u8::from(s.category != ProductCategory::Base);
    rank(a)
        .cmp(&rank(b))
        .then(a.align_start_date.cmp(&b.align_start_date))
}
