//! Subscription bundle model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on bundle external key length.
pub const MAX_EXTERNAL_KEY_LENGTH: usize = 255;

/// Group of subscriptions sharing one base or standalone plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub bundle_id: Uuid,
    pub account_id: Uuid,
    pub external_key: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a bundle.
#[derive(Debug, Clone)]
pub struct CreateBundle {
    pub bundle_id: Uuid,
    pub account_id: Uuid,
    pub external_key: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl CreateBundle {
    pub fn into_bundle(self) -> Bundle {
        Bundle {
            bundle_id: self.bundle_id,
            account_id: self.account_id,
            external_key: self.external_key,
            created_utc: self.created_utc,
            updated_utc: self.created_utc,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: u64,
    pub total_count: u64,
}

impl<T> Page<T> {
    /// Offset of the next page, if there is one.
    pub fn next_offset(&self) -> Option<u64> {
        let next = self.offset + self.items.len() as u64;
        (next < self.total_count).then_some(next)
    }
}
