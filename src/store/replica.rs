//! Local materialization of a remote DuckDB snapshot.
//!
//! Validation and repair are single-flighted per replica path: one mutex per path is
//! held while inspecting, deleting and re-fetching, and callers that waited re-check
//! before doing anything themselves. Paths that passed validation are remembered for
//! the life of the process.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::fetch::RemoteFetcher;
use super::session::DuckSession;
use crate::error::StoreError;
use crate::schema::CANDIDATE_SCHEMAS;

static VALIDATED: Lazy<RwLock<HashSet<PathBuf>>> = Lazy::new(|| RwLock::new(HashSet::new()));
static REPAIR_GUARDS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn repair_guard(path: &Path) -> Arc<Mutex<()>> {
    REPAIR_GUARDS.lock().entry(path.to_path_buf()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaState {
    Missing,
    /// Smaller than the configured minimum; treated as a partial download.
    Truncated { bytes: u64 },
    /// Opens to zero catalog tables, or does not open at all.
    Corrupt,
    Ready { tables: usize },
}

impl ReplicaState {
    pub fn is_ready(&self) -> bool { matches!(self, ReplicaState::Ready { .. }) }
}

/// Inspect a replica file without changing it.
pub fn inspect(path: &Path, min_bytes: u64) -> ReplicaState {
    let bytes = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return ReplicaState::Missing,
    };
    if bytes < min_bytes {
        return ReplicaState::Truncated { bytes };
    }
    let tables = DuckSession::open(path, true).and_then(|s| s.catalog_tables(&CANDIDATE_SCHEMAS));
    match tables {
        Ok(t) if !t.is_empty() => ReplicaState::Ready { tables: t.len() },
        Ok(_) => ReplicaState::Corrupt,
        Err(e) => {
            debug!(target: "icfes::store", "replica '{}' failed inspection: {}", path.display(), e);
            ReplicaState::Corrupt
        }
    }
}

pub struct ReplicaManager {
    remote_uri: String,
    local_path: PathBuf,
    min_bytes: u64,
    fetcher: Arc<dyn RemoteFetcher>,
}

impl ReplicaManager {
    pub fn new(remote_uri: String, local_path: PathBuf, min_bytes: u64, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        Self { remote_uri, local_path, min_bytes, fetcher }
    }

    pub fn local_path(&self) -> &Path { &self.local_path }

    pub fn remote_uri(&self) -> &str { &self.remote_uri }

    pub fn status(&self) -> ReplicaState { inspect(&self.local_path, self.min_bytes) }

    fn validated(&self) -> bool {
        VALIDATED.read().contains(&self.local_path) && self.local_path.exists()
    }

    /// Make sure the local replica is present and sane, fetching it if needed.
    pub fn ensure_ready(&self) -> Result<PathBuf, StoreError> {
        if self.validated() {
            return Ok(self.local_path.clone());
        }
        let guard = repair_guard(&self.local_path);
        let _held = guard.lock();
        if self.validated() {
            debug!(target: "icfes::store", "replica '{}' validated by a concurrent caller", self.local_path.display());
            return Ok(self.local_path.clone());
        }

        let state = self.status();
        match &state {
            ReplicaState::Ready { tables } => {
                info!(target: "icfes::store", "replica '{}' ready ({} catalog tables)", self.local_path.display(), tables);
            }
            ReplicaState::Corrupt => {
                warn!(target: "icfes::store", "replica '{}' has no catalog tables; deleting and re-fetching", self.local_path.display());
                remove_if_present(&self.local_path)?;
                self.fetch()?;
            }
            ReplicaState::Missing | ReplicaState::Truncated { .. } => {
                info!(target: "icfes::store", "replica '{}' needs fetch ({:?})", self.local_path.display(), state);
                self.fetch()?;
            }
        }

        if !state.is_ready() {
            let after = self.status();
            if !after.is_ready() {
                return Err(StoreError::unavailable(
                    format!("replica {} unusable after fetch", self.local_path.display()),
                    format!("{:?}", after),
                ));
            }
        }
        VALIDATED.write().insert(self.local_path.clone());
        Ok(self.local_path.clone())
    }

    // Copy into a staging file and rename over the replica, so the replica is only ever
    // the old file or the complete new one.
    fn fetch(&self) -> Result<(), StoreError> {
        if let Some(dir) = self.local_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    StoreError::unavailable(format!("cannot create {}", dir.display()), e.to_string())
                })?;
            }
        }
        let staging = staging_path(&self.local_path);
        remove_if_present(&staging)?;
        let started = Instant::now();
        if let Err(f) = self.fetcher.fetch(&self.remote_uri, &staging) {
            let _ = std::fs::remove_file(&staging);
            return Err(StoreError::unavailable(format!("remote copy of {} failed", self.remote_uri), f.to_string()));
        }
        std::fs::rename(&staging, &self.local_path).map_err(|e| {
            StoreError::unavailable(format!("cannot move replica into {}", self.local_path.display()), e.to_string())
        })?;
        info!(
            target: "icfes::store",
            "fetched {} -> '{}' in {} ms",
            self.remote_uri, self.local_path.display(), started.elapsed().as_millis()
        );
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::unavailable(format!("cannot remove {}", path.display()), e.to_string())),
    }
}
