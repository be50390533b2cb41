use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::RwLock;

/// Time source for quota bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    /// Calendar date the daily counter belongs to.
    fn today(&self) -> NaiveDate;
}

/// Wall clock; days roll over at local midnight.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
    fn today(&self) -> NaiveDate { Local::now().date_naive() }
}

/// Settable clock for tests and replays. Days roll over at UTC midnight.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self { Self { now: RwLock::new(now) } }

    pub fn set(&self, now: DateTime<Utc>) { *self.now.write() = now; }

    pub fn advance(&self, by: chrono::Duration) {
        let mut g = self.now.write();
        *g += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { *self.now.read() }
    fn today(&self) -> NaiveDate { self.now.read().date_naive() }
}
