//! Process settings read once from the environment.
//!
//! Variable names follow the deployment: `DUCKDB_S3_PATH` wins over `DUCKDB_PATH`,
//! AWS credentials are the standard AWS variables, and everything the HTTP layer
//! needs is under `ICFES_*`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_STORE_PATH: &str = "data/dev.duckdb";
pub const DEFAULT_REPLICA_PATH: &str = "data/replica.duckdb";
pub const DEFAULT_MIN_REPLICA_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_AUTH_HEADER: &str = "x-remote-user";
pub const DEFAULT_STATE_DIR: &str = "data/state";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 15 * 60;

/// Where the analytical database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Local(PathBuf),
    /// Remote object URI (currently `s3://bucket/key`).
    Remote(String),
}

impl StoreLocation {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.to_ascii_lowercase().starts_with("s3://") {
            StoreLocation::Remote(raw.to_string())
        } else {
            StoreLocation::Local(PathBuf::from(raw))
        }
    }

    pub fn is_remote(&self) -> bool { matches!(self, StoreLocation::Remote(_)) }

    /// The location as configured, used for schema heuristics and logs.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            StoreLocation::Local(p) => p.to_string_lossy(),
            StoreLocation::Remote(uri) => std::borrow::Cow::Borrowed(uri.as_str()),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
}

// Never print secrets, even at debug level.
impl std::fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<set>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<set>"))
            .field("region", &self.region)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub store_location: StoreLocation,
    /// Explicit physical schema; beats every heuristic when set.
    pub schema_override: Option<String>,
    pub credentials: RemoteCredentials,
    pub replica_path: PathBuf,
    pub min_replica_bytes: u64,
    pub http_port: u16,
    pub auth_header: String,
    pub state_dir: PathBuf,
    pub cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_location: StoreLocation::Local(PathBuf::from(DEFAULT_STORE_PATH)),
            schema_override: None,
            credentials: RemoteCredentials { region: DEFAULT_REGION.to_string(), ..Default::default() },
            replica_path: PathBuf::from(DEFAULT_REPLICA_PATH),
            min_replica_bytes: DEFAULT_MIN_REPLICA_BYTES,
            http_port: DEFAULT_HTTP_PORT,
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build settings from an arbitrary key lookup. `from_env` uses the process environment.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Self {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let d = Settings::default();

        let location = non_empty("DUCKDB_S3_PATH")
            .or_else(|| non_empty("DUCKDB_PATH"))
            .map(|s| StoreLocation::parse(&s))
            .unwrap_or(d.store_location);

        let credentials = RemoteCredentials {
            access_key_id: non_empty("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty("AWS_SECRET_ACCESS_KEY"),
            region: non_empty("AWS_DEFAULT_REGION")
                .or_else(|| non_empty("AWS_REGION"))
                .unwrap_or(d.credentials.region),
        };

        Self {
            store_location: location,
            schema_override: non_empty("DUCKDB_SCHEMA"),
            credentials,
            replica_path: non_empty("DUCKDB_REPLICA_PATH").map(PathBuf::from).unwrap_or(d.replica_path),
            min_replica_bytes: parse_or("DUCKDB_MIN_REPLICA_BYTES", non_empty("DUCKDB_MIN_REPLICA_BYTES"), d.min_replica_bytes),
            http_port: parse_or("ICFES_HTTP_PORT", non_empty("ICFES_HTTP_PORT"), d.http_port),
            auth_header: non_empty("ICFES_AUTH_HEADER").map(|h| h.to_ascii_lowercase()).unwrap_or(d.auth_header),
            state_dir: non_empty("ICFES_STATE_DIR").map(PathBuf::from).unwrap_or(d.state_dir),
            cache_ttl: Duration::from_secs(parse_or(
                "ICFES_QUERY_CACHE_TTL_SECS",
                non_empty("ICFES_QUERY_CACHE_TTL_SECS"),
                d.cache_ttl.as_secs(),
            )),
        }
    }

    pub fn subscriptions_path(&self) -> PathBuf { self.state_dir.join("subscriptions.parquet") }

    pub fn query_log_path(&self) -> PathBuf { self.state_dir.join("query_log.jsonl") }

    pub fn replica_path(&self) -> &Path { &self.replica_path }
}

fn parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(v) => match v.parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(target: "icfes::config", "ignoring unparseable {}='{}', using {}", key, v, default);
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn remote_path_wins_over_local() {
        let s = Settings::from_lookup(lookup(&[
            ("DUCKDB_S3_PATH", "s3://icfes/prod.duckdb"),
            ("DUCKDB_PATH", "/app/data/dev.duckdb"),
        ]));
        assert_eq!(s.store_location, StoreLocation::Remote("s3://icfes/prod.duckdb".into()));
    }

    #[test]
    fn defaults_and_bad_numbers() {
        let s = Settings::from_lookup(lookup(&[
            ("DUCKDB_MIN_REPLICA_BYTES", "lots"),
            ("DUCKDB_SCHEMA", "   "),
            ("AWS_REGION", "sa-east-1"),
        ]));
        assert_eq!(s.min_replica_bytes, DEFAULT_MIN_REPLICA_BYTES);
        assert_eq!(s.schema_override, None);
        assert_eq!(s.credentials.region, "sa-east-1");
        assert_eq!(s.store_location, StoreLocation::Local(PathBuf::from(DEFAULT_STORE_PATH)));
        assert_eq!(s.subscriptions_path(), PathBuf::from("data/state/subscriptions.parquet"));
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let c = RemoteCredentials { access_key_id: Some("AKIA123".into()), secret_access_key: Some("shh".into()), region: "us-east-1".into() };
        let text = format!("{:?}", c);
        assert!(!text.contains("AKIA123"));
        assert!(!text.contains("shh"));
    }
}
