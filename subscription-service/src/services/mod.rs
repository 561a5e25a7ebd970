//! Services module for subscription-service.

pub mod catalog;
pub mod identity_cache;
pub mod memory;
pub mod metrics;
pub mod store;

pub use catalog::{Catalog, CatalogProvider};
pub use identity_cache::{IdentityCache, IdentityLoader, LookupType, StoreLoader};
pub use metrics::{
    get_metrics, init_metrics, record_api_request, record_api_request_duration, record_dry_run,
    record_error, record_identity_lookup, record_subscription_operation,
};
pub use store::SubscriptionStore;
