//! Subscription Service Library
//!
//! Lifecycle core for subscription bundles: validating and ordering creation
//! batches, enforcing add-on limits, aligning start dates, simulating changes
//! without committing them and scheduling billing cycle day changes.

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod services;

pub use api::SubscriptionInternalApi;
