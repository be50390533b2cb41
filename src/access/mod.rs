//!
//! Access policy
//! -------------
//! Per-request gate in front of the query endpoints: who may call what, and how often.
//! `AccessGate::admit` runs before the handler and either denies with a structured
//! `Denial` or attaches the caller's subscription and plan to a `RequestContext`.
//! `AccessGate::complete` runs after the handler and, for counted 2xx responses only,
//! increments the daily counter and appends a `QueryLogEntry`.

mod audit;
mod clock;
mod gate;
mod repo;
mod subscription;
mod tier;

pub use audit::{JsonLinesQueryLog, MemoryQueryLog, QueryLogEntry, QueryLogSink};
pub use clock::{Clock, FixedClock, SystemClock};
pub use gate::{
    check, require_feature, require_tier, require_years, AccessGate, AccessPolicy, Admission, Denial, Requirement,
    Usage, Verdict,
};
pub use repo::{MemorySubscriptionRepo, ParquetSubscriptionRepo, SubscriptionRepo};
pub use subscription::Subscription;
pub use tier::{Feature, Plan, PlanCatalog, Tier};

#[cfg(test)]
#[path = "access_tests.rs"]
mod tests;
