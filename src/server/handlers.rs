use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::{json, Value};

use super::response::{dataframe_to_json, denial_response};
use super::AppState;
use crate::access::Denial;
use crate::error::{AppError, AppResult};
use crate::identity::RequestContext;
use crate::store::QueryParam;

const SQL_ANOS: &str = "SELECT DISTINCT ano FROM gold.fact_icfes_analytics ORDER BY ano DESC";

const SQL_ESTADISTICAS: &str = "SELECT \
    COUNT(DISTINCT estudiante_sk) AS total_estudiantes, \
    COUNT(DISTINCT colegio_sk) AS total_colegios, \
    COUNT(DISTINCT departamento) AS total_departamentos, \
    COUNT(DISTINCT municipio) AS total_municipios, \
    AVG(punt_global) AS promedio_nacional, \
    MIN(punt_global) AS puntaje_minimo, \
    MAX(punt_global) AS puntaje_maximo, \
    STDDEV(punt_global) AS desviacion_estandar \
    FROM gold.fact_icfes_analytics";

const SQL_ESTADISTICAS_ANO: &str = "SELECT \
    COUNT(DISTINCT estudiante_sk) AS total_estudiantes, \
    COUNT(DISTINCT colegio_sk) AS total_colegios, \
    COUNT(DISTINCT departamento) AS total_departamentos, \
    COUNT(DISTINCT municipio) AS total_municipios, \
    AVG(punt_global) AS promedio_nacional, \
    MIN(punt_global) AS puntaje_minimo, \
    MAX(punt_global) AS puntaje_maximo, \
    STDDEV(punt_global) AS desviacion_estandar \
    FROM gold.fact_icfes_analytics WHERE ano = ?";

const SQL_DEPARTAMENTOS: &str = "SELECT DISTINCT departamento FROM gold.dim_colegios ORDER BY departamento";

const SQL_MUNICIPIOS: &str = "SELECT DISTINCT municipio FROM gold.dim_colegios WHERE departamento = ? ORDER BY municipio";

const SQL_HISTORICO: &str = "SELECT * FROM gold.fct_colegio_historico WHERE codigo_dane = ? ORDER BY ano";

/// Run a logical query through the cache and executor on the blocking pool.
async fn results(state: &AppState, sql: &'static str, params: Vec<QueryParam>) -> AppResult<Json<Value>> {
    let executor = state.executor.clone();
    let cache = state.cache.clone();
    let df = tokio::task::spawn_blocking(move || cache.get_or_try_insert(sql, &params, || executor.execute(sql, &params)))
        .await
        .map_err(|e| AppError::internal("join_error".to_string(), e.to_string()))??;
    Ok(Json(json!({"status": "ok", "results": dataframe_to_json(&df)})))
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn anos(State(state): State<AppState>) -> AppResult<Json<Value>> {
    results(&state, SQL_ANOS, Vec::new()).await
}

pub async fn estadisticas(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    match q.get("ano").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => results(&state, SQL_ESTADISTICAS, Vec::new()).await,
        Some(raw) => {
            let ano: i64 = raw
                .parse()
                .map_err(|_| AppError::user("invalid_parameter".to_string(), format!("ano must be a year, got '{}'", raw)))?;
            results(&state, SQL_ESTADISTICAS_ANO, vec![QueryParam::Int(ano)]).await
        }
    }
}

pub async fn departamentos(State(state): State<AppState>) -> AppResult<Json<Value>> {
    results(&state, SQL_DEPARTAMENTOS, Vec::new()).await
}

pub async fn municipios(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    let Some(depto) = q.get("departamento").map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()) else {
        return Err(AppError::user("missing_parameter", "departamento is required"));
    };
    results(&state, SQL_MUNICIPIOS, vec![QueryParam::Text(depto)]).await
}

pub async fn historico(State(state): State<AppState>, Path(codigo): Path<String>) -> AppResult<Json<Value>> {
    results(&state, SQL_HISTORICO, vec![QueryParam::Text(codigo)]).await
}

pub async fn uso(State(state): State<AppState>, Extension(ctx): Extension<RequestContext>) -> Response {
    let Some(user_id) = ctx.user_id().map(str::to_string) else {
        return denial_response(&Denial::AuthenticationRequired);
    };
    let gate = state.gate.clone();
    match tokio::task::spawn_blocking(move || gate.usage(&user_id)).await {
        Ok(Ok(u)) => Json(json!({"status": "ok", "results": [u]})).into_response(),
        Ok(Err(e)) => AppError::from(e).into_response(),
        Err(e) => AppError::internal("join_error".to_string(), e.to_string()).into_response(),
    }
}
