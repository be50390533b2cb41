//!
//! Analytical store access
//! -----------------------
//! Hands out short-lived DuckDB sessions. A local location is opened directly; a
//! remote location is first materialized as a local replica (see `replica`), then
//! opened. Every session is exclusively owned by its caller and closed when dropped,
//! so release happens on every exit path including `?` and panics.

use std::path::PathBuf;
use std::sync::Arc;

use polars::prelude::DataFrame;
use tracing::warn;

use crate::config::{Settings, StoreLocation};
use crate::error::StoreError;

mod fetch;
mod replica;
mod session;

pub use fetch::{AwsCliFetcher, FetchFailure, RemoteFetcher};
pub use replica::{inspect, ReplicaManager, ReplicaState};
pub use session::{DuckSession, QueryParam};

/// One open handle on the store.
pub trait StoreSession {
    fn run(&mut self, sql: &str, params: &[QueryParam]) -> Result<DataFrame, StoreError>;
}

/// Source of store sessions. The executor only sees this seam.
pub trait Connector: Send + Sync {
    fn open(&self, read_only: bool) -> Result<Box<dyn StoreSession>, StoreError>;
}

pub struct DataStoreConnector {
    location: StoreLocation,
    replica: Option<ReplicaManager>,
}

impl DataStoreConnector {
    pub fn new(settings: &Settings, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        let replica = match &settings.store_location {
            StoreLocation::Remote(uri) => Some(ReplicaManager::new(
                uri.clone(),
                settings.replica_path.clone(),
                settings.min_replica_bytes,
                fetcher,
            )),
            StoreLocation::Local(_) => None,
        };
        Self { location: settings.store_location.clone(), replica }
    }

    /// Connector using the AWS CLI for remote copies.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings, Arc::new(AwsCliFetcher::new(settings.credentials.clone())))
    }

    pub fn location(&self) -> &StoreLocation { &self.location }

    pub fn replica(&self) -> Option<&ReplicaManager> { self.replica.as_ref() }

    /// Path a session would open, materializing the replica if the store is remote.
    pub fn database_path(&self, read_only: bool) -> Result<PathBuf, StoreError> {
        match (&self.location, &self.replica) {
            (StoreLocation::Remote(_), Some(r)) => r.ensure_ready(),
            (StoreLocation::Remote(uri), None) => {
                Err(StoreError::unavailable("remote store without replica manager", uri.clone()))
            }
            (StoreLocation::Local(p), _) => {
                // read-only open of a missing file has nothing to fall back on
                if read_only && !p.exists() {
                    return Err(StoreError::unavailable(
                        format!("database file {} not found", p.display()),
                        "local store location does not exist and is not fetchable",
                    ));
                }
                Ok(p.clone())
            }
        }
    }

    pub fn open_session(&self, read_only: bool) -> Result<DuckSession, StoreError> {
        let path = self.database_path(read_only)?;
        DuckSession::open(&path, read_only)
    }

    /// Scoped acquisition: open, hand the session to `f`, close whatever `f` returns.
    pub fn with_connection<T, F>(&self, read_only: bool, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut DuckSession) -> Result<T, StoreError>,
    {
        let mut session = self.open_session(read_only)?;
        let out = f(&mut session)?;
        // the work already succeeded; a failed close only loses the handle
        if let Err(e) = session.close() {
            warn!(target: "icfes::store", "closing session after success failed: {}", e);
        }
        Ok(out)
    }
}

impl Connector for DataStoreConnector {
    fn open(&self, read_only: bool) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(self.open_session(read_only)?))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
