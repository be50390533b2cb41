use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use polars::prelude::DataFrame;
use tracing::debug;

use crate::store::QueryParam;

/// TTL cache of query results keyed by logical query text and parameters.
/// Only successful results are stored. A zero TTL disables caching.
pub struct QueryCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, DataFrame)>>,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    fn key(sql: &str, params: &[QueryParam]) -> String {
        let p = serde_json::to_string(params).unwrap_or_default();
        format!("{}\u{1f}{}", sql, p)
    }

    pub fn get(&self, sql: &str, params: &[QueryParam]) -> Option<DataFrame> {
        let key = Self::key(sql, params);
        let map = self.entries.read();
        match map.get(&key) {
            Some((at, df)) if at.elapsed() < self.ttl => Some(df.clone()),
            _ => None,
        }
    }

    pub fn get_or_try_insert<E, F>(&self, sql: &str, params: &[QueryParam], f: F) -> Result<DataFrame, E>
    where
        F: FnOnce() -> Result<DataFrame, E>,
    {
        if self.ttl.is_zero() {
            return f();
        }
        if let Some(df) = self.get(sql, params) {
            debug!(target: "icfes::query", "cache hit");
            return Ok(df);
        }
        let df = f()?;
        let mut map = self.entries.write();
        let ttl = self.ttl;
        map.retain(|_, (at, _)| at.elapsed() < ttl);
        map.insert(Self::key(sql, params), (Instant::now(), df.clone()));
        Ok(df)
    }

    pub fn clear(&self) { self.entries.write().clear(); }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }
}
