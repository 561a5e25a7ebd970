//! Canonical ordering of subscriptions inside a bundle.

use crate::models::{compare_for_bundle_listing, Subscription};

/// Sort base first, then by ascending alignment start date. Stable, so
/// subscriptions with equal keys keep their input order.
pub fn sort_for_bundle_listing(subscriptions: &mut [Subscription]) {
    subscriptions.sort_by(compare_for_bundle_listing);
}
