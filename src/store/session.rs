use std::path::{Path, PathBuf};

use duckdb::types::{TimeUnit, ToSql, ToSqlOutput, Value, ValueRef};
use duckdb::{AccessMode, Config, Connection};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Positional `?` parameter. Deserializes from plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for QueryParam { fn from(v: i64) -> Self { QueryParam::Int(v) } }
impl From<i32> for QueryParam { fn from(v: i32) -> Self { QueryParam::Int(v as i64) } }
impl From<f64> for QueryParam { fn from(v: f64) -> Self { QueryParam::Float(v) } }
impl From<bool> for QueryParam { fn from(v: bool) -> Self { QueryParam::Bool(v) } }
impl From<&str> for QueryParam { fn from(v: &str) -> Self { QueryParam::Text(v.to_string()) } }
impl From<String> for QueryParam { fn from(v: String) -> Self { QueryParam::Text(v) } }

impl ToSql for QueryParam {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            QueryParam::Null => ToSqlOutput::Owned(Value::Null),
            QueryParam::Bool(b) => ToSqlOutput::Owned(Value::Boolean(*b)),
            QueryParam::Int(i) => ToSqlOutput::Owned(Value::BigInt(*i)),
            QueryParam::Float(f) => ToSqlOutput::Owned(Value::Double(*f)),
            QueryParam::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// A live handle on one DuckDB file. Closed on drop; never shared between operations.
pub struct DuckSession {
    conn: Option<Connection>,
    path: PathBuf,
    read_only: bool,
}

impl DuckSession {
    pub fn open(path: &Path, read_only: bool) -> Result<Self, StoreError> {
        let mode = if read_only { AccessMode::ReadOnly } else { AccessMode::ReadWrite };
        let config = Config::default()
            .access_mode(mode)
            .map_err(|e| StoreError::unavailable("invalid duckdb config", e.to_string()))?;
        let conn = Connection::open_with_flags(path, config).map_err(|e| {
            StoreError::unavailable(format!("cannot open {}", path.display()), e.to_string())
        })?;
        debug!(target: "icfes::store", "opened '{}' read_only={}", path.display(), read_only);
        Ok(Self { conn: Some(conn), path: path.to_path_buf(), read_only })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn is_read_only(&self) -> bool { self.read_only }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or_else(|| StoreError::unavailable("session already closed", self.path.display().to_string()))
    }

    /// Run one statement and collect the result into a DataFrame.
    pub fn run(&mut self, sql: &str, params: &[QueryParam]) -> Result<DataFrame, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(duckdb::params_from_iter(params.iter()))?;
        let names = unique_names(rows.as_ref().map(|s| s.column_names()).unwrap_or_default());
        let mut columns: Vec<Vec<AnyValue<'static>>> = vec![Vec::new(); names.len()];
        while let Some(row) = rows.next()? {
            for (i, col) in columns.iter_mut().enumerate() {
                let v: Value = row.get(i)?;
                col.push(to_any_value(v));
            }
        }
        let cols = names
            .iter()
            .zip(columns)
            .map(|(name, vals)| Series::from_any_values(name.as_str().into(), &vals, false).map(|s| s.into()))
            .collect::<PolarsResult<Vec<Column>>>()?;
        Ok(DataFrame::new(cols)?)
    }

    /// Execute statements that return no rows (DDL, loads). Needs a writable session.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    /// `(schema, table)` pairs in the catalog for the given schemas.
    pub fn catalog_tables(&self, schemas: &[&str]) -> Result<Vec<(String, String)>, StoreError> {
        if schemas.is_empty() { return Ok(Vec::new()); }
        let placeholders = vec!["?"; schemas.len()].join(", ");
        let sql = format!(
            "SELECT table_schema, table_name FROM information_schema.tables \
             WHERE table_schema IN ({}) ORDER BY table_schema, table_name",
            placeholders
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(duckdb::params_from_iter(schemas.iter()), |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(found)
    }

    pub fn close(mut self) -> Result<(), StoreError> {
        if let Some(c) = self.conn.take() {
            c.close().map_err(|(_, e)| StoreError::unavailable("close failed", e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for DuckSession {
    fn drop(&mut self) {
        if let Some(c) = self.conn.take() {
            if let Err((_, e)) = c.close() {
                warn!(target: "icfes::store", "closing '{}' failed: {}", self.path.display(), e);
            }
        }
    }
}

impl super::StoreSession for DuckSession {
    fn run(&mut self, sql: &str, params: &[QueryParam]) -> Result<DataFrame, StoreError> {
        DuckSession::run(self, sql, params)
    }
}

// DataFrame::new rejects duplicate names, which plain SELECTs happily produce.
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for n in names {
        let mut candidate = n.clone();
        let mut k = 1;
        while out.contains(&candidate) {
            candidate = format!("{}_{}", n, k);
            k += 1;
        }
        out.push(candidate);
    }
    out
}

fn to_any_value(v: Value) -> AnyValue<'static> {
    match v {
        Value::Null => AnyValue::Null,
        Value::Boolean(b) => AnyValue::Boolean(b),
        Value::TinyInt(x) => AnyValue::Int64(x as i64),
        Value::SmallInt(x) => AnyValue::Int64(x as i64),
        Value::Int(x) => AnyValue::Int64(x as i64),
        Value::BigInt(x) => AnyValue::Int64(x),
        Value::UTinyInt(x) => AnyValue::Int64(x as i64),
        Value::USmallInt(x) => AnyValue::Int64(x as i64),
        Value::UInt(x) => AnyValue::Int64(x as i64),
        Value::UBigInt(x) => match i64::try_from(x) {
            Ok(i) => AnyValue::Int64(i),
            Err(_) => AnyValue::Float64(x as f64),
        },
        Value::HugeInt(x) => AnyValue::Float64(x as f64),
        Value::Float(x) => AnyValue::Float64(x as f64),
        Value::Double(x) => AnyValue::Float64(x),
        Value::Decimal(d) => d.to_string().parse::<f64>().map(AnyValue::Float64).unwrap_or(AnyValue::Null),
        Value::Text(s) => AnyValue::StringOwned(s.into()),
        Value::Enum(s) => AnyValue::StringOwned(s.into()),
        Value::Date32(days) => match days.checked_add(719_163).and_then(chrono::NaiveDate::from_num_days_from_ce_opt) {
            Some(d) => AnyValue::StringOwned(d.to_string().into()),
            None => AnyValue::Null,
        },
        Value::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.saturating_mul(1_000_000),
                TimeUnit::Millisecond => raw.saturating_mul(1_000),
                TimeUnit::Microsecond => raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            match chrono::DateTime::from_timestamp_micros(micros) {
                Some(ts) => AnyValue::StringOwned(ts.naive_utc().to_string().into()),
                None => AnyValue::Null,
            }
        }
        other => AnyValue::StringOwned(format!("{:?}", other).into()),
    }
}
