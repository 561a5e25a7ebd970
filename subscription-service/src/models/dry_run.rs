//! Dry-run request and result types.

use crate::models::bundle::Bundle;
use crate::models::catalog::{BillingActionPolicy, PlanPhaseSpecifier, PriceOverride};
use crate::models::event::EffectiveSubscriptionEvent;
use crate::models::subscription::DryRunSubscription;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Hypothetical action to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DryRunAction {
    StartBilling,
    Change,
    StopBilling,
}

impl DryRunAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DryRunAction::StartBilling => "start_billing",
            DryRunAction::Change => "change",
            DryRunAction::StopBilling => "stop_billing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported dry-run action: {0}")]
pub struct UnsupportedDryRunAction(pub String);

impl FromStr for DryRunAction {
    type Err = UnsupportedDryRunAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "START_BILLING" => Ok(DryRunAction::StartBilling),
            "CHANGE" => Ok(DryRunAction::Change),
            "STOP_BILLING" => Ok(DryRunAction::StopBilling),
            _ => Err(UnsupportedDryRunAction(s.to_string())),
        }
    }
}

impl fmt::Display for DryRunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a simulated action.
///
/// `StartBilling` needs a plan. `Change` needs a plan and a subscription.
/// `StopBilling` needs a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DryRunArguments {
    pub action: DryRunAction,
    pub plan: Option<PlanPhaseSpecifier>,
    #[serde(default)]
    pub overrides: Vec<PriceOverride>,
    pub subscription_id: Option<Uuid>,
    pub effective_date: Option<NaiveDate>,
    pub policy: Option<BillingActionPolicy>,
}

impl DryRunArguments {
    pub fn start_billing(plan: PlanPhaseSpecifier) -> Self {
        Self {
            action: DryRunAction::StartBilling,
            plan: Some(plan),
            overrides: Vec::new(),
            subscription_id: None,
            effective_date: None,
            policy: None,
        }
    }

    pub fn change(subscription_id: Uuid, plan: PlanPhaseSpecifier) -> Self {
        Self {
            action: DryRunAction::Change,
            plan: Some(plan),
            overrides: Vec::new(),
            subscription_id: Some(subscription_id),
            effective_date: None,
            policy: None,
        }
    }

    pub fn stop_billing(subscription_id: Uuid) -> Self {
        Self {
            action: DryRunAction::StopBilling,
            plan: None,
            overrides: Vec::new(),
            subscription_id: Some(subscription_id),
            effective_date: None,
            policy: None,
        }
    }

    pub fn with_effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }

    pub fn with_policy(mut self, policy: BillingActionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// What a base plan change would do to an existing add-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DryRunChangeReason {
    AddOnIncluded,
    AddOnAvailable,
    AddOnNotAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnDryRunStatus {
    pub subscription_id: Uuid,
    pub product_name: String,
    pub plan_name: String,
    pub reason: DryRunChangeReason,
}

/// A bundle's subscriptions as they would look after a simulated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunBundle {
    pub bundle: Bundle,
    pub subscriptions: Vec<DryRunSubscription>,
    /// Only the events produced by the simulation.
    pub simulated_events: Vec<EffectiveSubscriptionEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing_rejects_unknown_values() {
        assert_eq!(
            "start_billing".parse::<DryRunAction>(),
            Ok(DryRunAction::StartBilling)
        );
        assert_eq!("CHANGE".parse::<DryRunAction>(), Ok(DryRunAction::Change));
        assert_eq!(
            "pause".parse::<DryRunAction>(),
            Err(UnsupportedDryRunAction("pause".to_string()))
        );
    }
}
