//! Domain models for subscription-service.

mod bundle;
mod catalog;
mod context;
mod dry_run;
mod event;
mod specifier;
mod subscription;

pub use bundle::{Bundle, CreateBundle, Page, MAX_EXTERNAL_KEY_LENGTH};
pub use catalog::{
    BillingActionPolicy, BillingAlignment, BillingPeriod, BundleLimit, PhaseDuration, PhaseType,
    Plan, PlanAlignment, PlanPhase, PlanPhaseSpecifier, PriceOverride, Product, ProductCategory,
};
pub use context::CallContext;
pub use dry_run::{
    AddOnDryRunStatus, DryRunAction, DryRunArguments, DryRunBundle, DryRunChangeReason,
    UnsupportedDryRunAction,
};
pub use event::{EffectiveSubscriptionEvent, EventKind, TransitionEvent};
pub use specifier::{EntitlementSpecifier, SubscriptionSpecifier, SubscriptionWithAddOnsSpecifier};
pub use subscription::{
    compare_for_bundle_listing, DryRunSubscription, EntitlementState, Subscription,
    SubscriptionBundle, SubscriptionRecord, SubscriptionTransition,
};
