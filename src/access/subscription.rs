use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::tier::Tier;

/// One user's plan assignment and daily usage counter.
///
/// The counter belongs to `last_query_date`; it is zeroed lazily the first time it
/// is read or written on a later date, never on a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub user_id: String,
    pub tier: Tier,
    pub is_active: bool,
    pub queries_today: u32,
    pub last_query_date: Option<NaiveDate>,
    pub started_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new<S: Into<String>>(user_id: S, tier: Tier, now: DateTime<Utc>) -> Self {
        Self { user_id: user_id.into(), tier, is_active: true, queries_today: 0, last_query_date: None, started_at: now }
    }

    /// Zero the counter if it belongs to another day. Returns whether anything changed.
    pub fn reset_if_new_day(&mut self, today: NaiveDate) -> bool {
        if self.last_query_date == Some(today) {
            return false;
        }
        self.queries_today = 0;
        self.last_query_date = Some(today);
        true
    }

    pub fn can_query(&mut self, limit: u32, today: NaiveDate) -> bool {
        self.reset_if_new_day(today);
        self.queries_today < limit
    }

    pub fn increment(&mut self, today: NaiveDate) {
        self.reset_if_new_day(today);
        self.queries_today = self.queries_today.saturating_add(1);
    }

    /// Queries left today, as if the lazy reset had already happened.
    pub fn remaining(&self, limit: u32, today: NaiveDate) -> u32 {
        if self.last_query_date == Some(today) { limit.saturating_sub(self.queries_today) } else { limit }
    }

    /// Bring an inactive row back at `tier` with a fresh counter.
    pub fn reactivate(&mut self, tier: Tier, now: DateTime<Utc>) {
        self.tier = tier;
        self.is_active = true;
        self.queries_today = 0;
        self.last_query_date = None;
        self.started_at = now;
    }
}
