//! Operations exposed to callers.

mod bundles;
mod changes;
mod creation;
mod dry_run;
mod service;

pub use service::SubscriptionInternalApi;
