//! Subscription lifecycle decisions.
//!
//! Everything here is synchronous and reads only what it is handed: a catalog
//! snapshot, folded subscriptions and the call context.

pub mod addon_limit;
pub mod bcd;
pub mod classifier;
pub mod dry_run;
pub mod events;
pub mod ordering;
pub mod policy;
pub mod projector;
pub mod start_date;

#[cfg(test)]
pub(crate) mod fixtures;

pub use addon_limit::{check_addon_limit, check_batch};
pub use bcd::{default_bill_cycle_day_local, effective_date_for_new_bcd, BcdEffectiveDate};
pub use classifier::{classify_and_order, ClassifiedBatch, ClassifiedEntitlement};
pub use dry_run::{simulate, BundleSnapshot, Simulation};
pub use events::build_record;
pub use ordering::sort_for_bundle_listing;
pub use policy::{effective_date_for_policy, BillingAnchor};
pub use projector::{all_transitions, project};
pub use start_date::{check_addon_eligibility, check_addon_for_product, resolve_bundle_start_date};
