//! Subscription transition events.

use crate::models::catalog::PhaseType;
use crate::models::subscription::EntitlementState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// What a transition event changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Create {
        plan_name: String,
        phase_type: PhaseType,
        price_list_name: String,
    },
    Phase {
        plan_name: String,
        phase_type: PhaseType,
    },
    Change {
        plan_name: String,
        phase_type: PhaseType,
        price_list_name: String,
    },
    Cancel,
    BillCycleDayChange {
        bill_cycle_day_local: u32,
    },
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create { .. } => "create",
            EventKind::Phase { .. } => "phase",
            EventKind::Change { .. } => "change",
            EventKind::Cancel => "cancel",
            EventKind::BillCycleDayChange { .. } => "bcd_change",
        }
    }
}

/// Immutable, date-ordered record of one subscription state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub subscription_id: Uuid,
    pub sequence: u32,
    pub effective_date: DateTime<Utc>,
    pub processed_date: DateTime<Utc>,
    pub kind: EventKind,
}

impl TransitionEvent {
    /// Canonical timeline order: effective date, then append order.
    pub fn timeline_order(a: &TransitionEvent, b: &TransitionEvent) -> Ordering {
        a.effective_date
            .cmp(&b.effective_date)
            .then(a.sequence.cmp(&b.sequence))
    }

    pub fn is_bcd_change(&self) -> bool {
        matches!(self.kind, EventKind::BillCycleDayChange { .. })
    }
}

/// Transition as exposed to callers, carrying the subscription's alignment
/// start date for billing-period computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveSubscriptionEvent {
    pub subscription_id: Uuid,
    pub bundle_id: Uuid,
    pub event_type: String,
    pub effective_date: DateTime<Utc>,
    pub processed_date: DateTime<Utc>,
    pub alignment_start_date: DateTime<Utc>,
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
