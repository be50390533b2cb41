//!
//! Query execution
//! ---------------
//! Runs logical query text against the store: resolve the schema binding, acquire one
//! read-only session, run, and on a catalog miss retry exactly once with the fallback
//! schema on that same session. If the retry fails too, the caller gets the first
//! error. Results come back as sanitized polars frames.

use std::sync::Arc;
use std::time::Instant;

use polars::prelude::DataFrame;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::schema::{LogicalQuery, SchemaResolver};
use crate::store::{Connector, QueryParam};

mod cache;
mod sanitize;

pub use cache::QueryCache;
pub use sanitize::sanitize_frame;

#[derive(Clone)]
pub struct QueryExecutor {
    resolver: Arc<SchemaResolver>,
    connector: Arc<dyn Connector>,
}

impl QueryExecutor {
    pub fn new(resolver: Arc<SchemaResolver>, connector: Arc<dyn Connector>) -> Self {
        Self { resolver, connector }
    }

    pub fn resolver(&self) -> &SchemaResolver { &self.resolver }

    pub fn execute(&self, sql: &str, params: &[QueryParam]) -> Result<DataFrame, StoreError> {
        let resolved = self.resolver.resolve_query(&LogicalQuery::parse(sql));
        let text = resolved.to_sql();
        let started = Instant::now();
        let mut session = self.connector.open(true)?;

        let first = match session.run(&text, params) {
            Ok(df) => return finish(df, started, false),
            Err(e) => e,
        };
        if !first.is_relation_not_found() {
            return Err(first);
        }
        let Some(fallback) = self.resolver.fallback_for(&resolved) else {
            debug!(target: "icfes::query", "catalog miss with no fallback candidate: {}", first);
            return Err(first);
        };
        warn!(target: "icfes::query", "catalog miss, retrying on fallback schema: {}", first);
        match session.run(&fallback.to_sql(), params) {
            Ok(df) => finish(df, started, true),
            Err(second) => {
                debug!(target: "icfes::query", "fallback attempt failed as well: {}", second);
                Err(first)
            }
        }
    }
}

fn finish(df: DataFrame, started: Instant, fell_back: bool) -> Result<DataFrame, StoreError> {
    let df = sanitize_frame(df)?;
    debug!(
        target: "icfes::query",
        "query ok rows={} cols={} fallback={} in {} ms",
        df.height(), df.width(), fell_back, started.elapsed().as_millis()
    );
    Ok(df)
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
