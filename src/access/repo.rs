//! Subscription persistence. One row per user; rows are deactivated, never deleted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use polars::prelude::*;

use super::subscription::Subscription;
use super::tier::Tier;

pub trait SubscriptionRepo: Send + Sync {
    fn load(&self, user_id: &str) -> Result<Option<Subscription>>;
    /// Insert or replace the row for `sub.user_id`.
    fn store(&self, sub: &Subscription) -> Result<()>;
    fn all(&self) -> Result<Vec<Subscription>>;
    /// Count one query for `seed.user_id` as a single read-modify-write, inserting
    /// `seed` first if the user has no row. Returns the row as stored.
    fn increment(&self, seed: &Subscription, today: NaiveDate) -> Result<Subscription>;
}

#[derive(Default)]
pub struct MemorySubscriptionRepo {
    rows: RwLock<HashMap<String, Subscription>>,
}

impl MemorySubscriptionRepo {
    pub fn new() -> Self { Self::default() }
}

impl SubscriptionRepo for MemorySubscriptionRepo {
    fn load(&self, user_id: &str) -> Result<Option<Subscription>> { Ok(self.rows.read().get(user_id).cloned()) }

    fn store(&self, sub: &Subscription) -> Result<()> {
        self.rows.write().insert(sub.user_id.clone(), sub.clone());
        Ok(())
    }

    fn all(&self) -> Result<Vec<Subscription>> {
        let mut v: Vec<Subscription> = self.rows.read().values().cloned().collect();
        v.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(v)
    }

    fn increment(&self, seed: &Subscription, today: NaiveDate) -> Result<Subscription> {
        let mut rows = self.rows.write();
        let row = rows.entry(seed.user_id.clone()).or_insert_with(|| seed.clone());
        row.increment(today);
        Ok(row.clone())
    }
}

/// Subscriptions in a single parquet file, rewritten in full on every store.
pub struct ParquetSubscriptionRepo {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ParquetSubscriptionRepo {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self { Self { path: path.into(), lock: Mutex::new(()) } }

    pub fn path(&self) -> &Path { &self.path }

    fn read_rows(&self) -> Result<Vec<Subscription>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path).with_context(|| format!("opening {}", self.path.display()))?;
        let df = ParquetReader::new(file).finish().with_context(|| format!("reading {}", self.path.display()))?;
        frame_to_rows(&df)
    }

    fn write_rows(&self, rows: &[Subscription]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        let mut df = rows_to_frame(rows)?;
        let tmp = self.path.with_extension("parquet.tmp");
        {
            let mut f = std::fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
            ParquetWriter::new(&mut f).finish(&mut df)?;
        }
        std::fs::rename(&tmp, &self.path).with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

impl SubscriptionRepo for ParquetSubscriptionRepo {
    fn load(&self, user_id: &str) -> Result<Option<Subscription>> {
        let _g = self.lock.lock();
        Ok(self.read_rows()?.into_iter().find(|s| s.user_id == user_id))
    }

    fn store(&self, sub: &Subscription) -> Result<()> {
        let _g = self.lock.lock();
        let mut rows = self.read_rows()?;
        match rows.iter_mut().find(|s| s.user_id == sub.user_id) {
            Some(existing) => *existing = sub.clone(),
            None => rows.push(sub.clone()),
        }
        self.write_rows(&rows)
    }

    fn all(&self) -> Result<Vec<Subscription>> {
        let _g = self.lock.lock();
        self.read_rows()
    }

    fn increment(&self, seed: &Subscription, today: NaiveDate) -> Result<Subscription> {
        let _g = self.lock.lock();
        let mut rows = self.read_rows()?;
        let idx = match rows.iter().position(|s| s.user_id == seed.user_id) {
            Some(i) => i,
            None => {
                rows.push(seed.clone());
                rows.len() - 1
            }
        };
        rows[idx].increment(today);
        let out = rows[idx].clone();
        self.write_rows(&rows)?;
        Ok(out)
    }
}

fn rows_to_frame(rows: &[Subscription]) -> Result<DataFrame> {
    let user_id: Vec<String> = rows.iter().map(|s| s.user_id.clone()).collect();
    let tier: Vec<String> = rows.iter().map(|s| s.tier.as_str().to_string()).collect();
    let is_active: Vec<bool> = rows.iter().map(|s| s.is_active).collect();
    let queries_today: Vec<i64> = rows.iter().map(|s| s.queries_today as i64).collect();
    let last_query_date: Vec<Option<String>> = rows.iter().map(|s| s.last_query_date.map(|d| d.to_string())).collect();
    let started_at: Vec<String> = rows.iter().map(|s| s.started_at.to_rfc3339()).collect();
    Ok(DataFrame::new(vec![
        Series::new("user_id".into(), user_id).into(),
        Series::new("tier".into(), tier).into(),
        Series::new("is_active".into(), is_active).into(),
        Series::new("queries_today".into(), queries_today).into(),
        Series::new("last_query_date".into(), last_query_date).into(),
        Series::new("started_at".into(), started_at).into(),
    ])?)
}

fn frame_to_rows(df: &DataFrame) -> Result<Vec<Subscription>> {
    let user_id = df.column("user_id")?.str()?;
    let tier = df.column("tier")?.str()?;
    let is_active = df.column("is_active")?.bool()?;
    let queries_today = df.column("queries_today")?.i64()?;
    let last_query_date = df.column("last_query_date")?.str()?;
    let started_at = df.column("started_at")?.str()?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let uid = user_id.get(i).ok_or_else(|| anyhow!("row {} has no user_id", i))?;
        let t = tier.get(i).unwrap_or("free").parse::<Tier>().map_err(|e| anyhow!(e))?;
        let last = match last_query_date.get(i) {
            Some(d) => Some(NaiveDate::parse_from_str(d, "%Y-%m-%d").with_context(|| format!("bad date '{}' for {}", d, uid))?),
            None => None,
        };
        let started = match started_at.get(i) {
            Some(ts) => DateTime::parse_from_rfc3339(ts).with_context(|| format!("bad timestamp '{}'", ts))?.with_timezone(&Utc),
            None => Utc::now(),
        };
        out.push(Subscription {
            user_id: uid.to_string(),
            tier: t,
            is_active: is_active.get(i).unwrap_or(true),
            queries_today: queries_today.get(i).unwrap_or(0).max(0) as u32,
            last_query_date: last,
            started_at: started,
        });
    }
    Ok(out)
}
