//!
//! ICFES HTTP server
//! -----------------
//! Thin axum surface over the query core. Every request passes the access gate
//! middleware first; handlers then run their logical queries through the shared
//! executor and result cache on the blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{middleware, routing::get, Router};
use tracing::info;

use crate::access::{AccessGate, AccessPolicy, JsonLinesQueryLog, ParquetSubscriptionRepo, PlanCatalog, SystemClock};
use crate::config::Settings;
use crate::query::{QueryCache, QueryExecutor};
use crate::schema::SchemaResolver;
use crate::store::DataStoreConnector;

mod gate_layer;
mod handlers;
mod response;

pub use gate_layer::access_gate;
pub use response::{dataframe_to_json, denial_response};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub executor: QueryExecutor,
    pub cache: Arc<QueryCache>,
    pub gate: Arc<AccessGate>,
}

impl AppState {
    pub fn new(settings: Settings, executor: QueryExecutor, gate: AccessGate) -> Self {
        let cache = Arc::new(QueryCache::new(settings.cache_ttl));
        Self { settings: Arc::new(settings), executor, cache, gate: Arc::new(gate) }
    }

    /// Production wiring: process-wide resolver, DuckDB connector, parquet subscriptions,
    /// JSON-lines audit log.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&settings.state_dir)
            .with_context(|| format!("Failed to create state dir: {}", settings.state_dir.display()))?;
        let resolver = SchemaResolver::global(&settings);
        let connector = Arc::new(DataStoreConnector::from_settings(&settings));
        let executor = QueryExecutor::new(resolver, connector);
        let gate = AccessGate::new(
            AccessPolicy::standard(),
            PlanCatalog::seeded(),
            Arc::new(ParquetSubscriptionRepo::new(settings.subscriptions_path())),
            Arc::new(JsonLinesQueryLog::new(settings.query_log_path())),
            Arc::new(SystemClock),
        );
        Ok(Self::new(settings, executor, gate))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/icfes/api/anos/", get(handlers::anos))
        .route("/icfes/api/estadisticas/", get(handlers::estadisticas))
        .route("/icfes/api/departamentos/", get(handlers::departamentos))
        .route("/icfes/api/municipios/", get(handlers::municipios))
        .route("/icfes/api/historico/{codigo}", get(handlers::historico))
        .route("/icfes/api/uso/", get(handlers::uso))
        .layer(middleware::from_fn_with_state(state.clone(), access_gate))
        .with_state(state)
}

/// Start the HTTP server on the configured port.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let port = settings.http_port;
    let state = AppState::from_settings(settings)?;
    // compute and log the binding before the first request
    let binding = state.executor.resolver().binding().clone();
    info!(
        target: "icfes::server",
        "store='{}' schema {} -> {} ({:?}), state_dir='{}'",
        state.settings.store_location.as_str(), binding.logical, binding.physical, binding.source,
        state.settings.state_dir.display()
    );

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!(target: "icfes::server", "Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
