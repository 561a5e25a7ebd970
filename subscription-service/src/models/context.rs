//! Per-request call context.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use uuid::Uuid;

/// Account-scoped request context.
///
/// `created_date` is the instant the request is processed at. Every decision in
/// the crate reads "now" from here.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub account_id: Uuid,
    pub created_date: DateTime<Utc>,
    pub reference_time: DateTime<Utc>,
    pub utc_offset: FixedOffset,
}

impl CallContext {
    /// Context for an account in UTC whose reference time is `now`.
    pub fn new(account_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            created_date: now,
            reference_time: now,
            utc_offset: Utc.fix(),
        }
    }

    pub fn with_reference_time(mut self, reference_time: DateTime<Utc>) -> Self {
        self.reference_time = reference_time;
        self
    }

    pub fn with_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Calendar date of `instant` as seen by the account.
    pub fn to_local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.utc_offset).date_naive()
    }

    /// Today as seen by the account.
    pub fn today(&self) -> NaiveDate {
        self.to_local_date(self.created_date)
    }

    /// Instant of `date` at the account's reference time of day.
    pub fn to_utc_date_time(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_time = self.reference_time.with_timezone(&self.utc_offset).time();
        let local = date.and_time(local_time);
        let offset = Duration::seconds(self.utc_offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&(local - offset))
    }
}
