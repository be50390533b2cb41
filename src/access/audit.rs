//! Audit trail of counted requests. Entries are append-only.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub request_id: String,
    pub user_id: String,
    pub endpoint: String,
    pub query_params: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: u64,
    pub status_code: u16,
}

pub trait QueryLogSink: Send + Sync {
    fn record(&self, entry: &QueryLogEntry) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryQueryLog {
    entries: Mutex<Vec<QueryLogEntry>>,
}

impl MemoryQueryLog {
    pub fn new() -> Self { Self::default() }

    pub fn entries(&self) -> Vec<QueryLogEntry> { self.entries.lock().clone() }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }
}

impl QueryLogSink for MemoryQueryLog {
    fn record(&self, entry: &QueryLogEntry) -> Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// One JSON object per line, appended.
pub struct JsonLinesQueryLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesQueryLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self { Self { path: path.into(), lock: Mutex::new(()) } }

    pub fn path(&self) -> &Path { &self.path }

    pub fn read_all(&self) -> Result<Vec<QueryLogEntry>> {
        let _g = self.lock.lock();
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let f = std::fs::File::open(&self.path).with_context(|| format!("opening {}", self.path.display()))?;
        let mut out = Vec::new();
        for line in std::io::BufReader::new(f).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line).with_context(|| format!("bad log line in {}", self.path.display()))?);
        }
        Ok(out)
    }
}

impl QueryLogSink for JsonLinesQueryLog {
    fn record(&self, entry: &QueryLogEntry) -> Result<()> {
        let _g = self.lock.lock();
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        f.write_all(line.as_bytes())?;
        Ok(())
    }
}
