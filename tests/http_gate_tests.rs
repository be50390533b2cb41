use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use icfes_gold::access::{
    AccessGate, AccessPolicy, Clock, FixedClock, MemoryQueryLog, MemorySubscriptionRepo, PlanCatalog, Subscription,
    SubscriptionRepo, Tier,
};
use icfes_gold::config::{Settings, StoreLocation};
use icfes_gold::query::QueryExecutor;
use icfes_gold::schema::SchemaResolver;
use icfes_gold::server::{router, AppState};
use icfes_gold::store::{DataStoreConnector, DuckSession};

const FIXTURE: &str = "CREATE SCHEMA gold;
CREATE TABLE gold.fact_icfes_analytics (ano INTEGER, estudiante_sk VARCHAR, colegio_sk VARCHAR, departamento VARCHAR, municipio VARCHAR, punt_global DOUBLE);
INSERT INTO gold.fact_icfes_analytics VALUES
  (2022, 'e1', 'c1', 'ANTIOQUIA', 'MEDELLIN', 260.0),
  (2022, 'e2', 'c2', 'BOYACA', 'TUNJA', 300.0),
  (2023, 'e3', 'c1', 'ANTIOQUIA', 'MEDELLIN', 280.0);
CREATE TABLE gold.dim_colegios (codigo_dane VARCHAR, nombre_colegio VARCHAR, departamento VARCHAR, municipio VARCHAR);
INSERT INTO gold.dim_colegios VALUES
  ('105001000001', 'INSTITUCION EDUCATIVA SAN JOSE', 'ANTIOQUIA', 'MEDELLIN'),
  ('105088000002', 'COLEGIO BELLO HORIZONTE', 'ANTIOQUIA', 'BELLO'),
  ('115001000003', 'COLEGIO BOYACA', 'BOYACA', 'TUNJA');
CREATE TABLE gold.fct_colegio_historico (codigo_dane VARCHAR, ano INTEGER, avg_punt_global DOUBLE);
INSERT INTO gold.fct_colegio_historico VALUES ('105001000001', 2022, 260.0), ('105001000001', 2023, 280.0);";

struct App {
    _tmp: tempfile::TempDir,
    router: axum::Router,
    subs: Arc<MemorySubscriptionRepo>,
    log: Arc<MemoryQueryLog>,
    clock: Arc<FixedClock>,
}

fn make_db(path: &Path) {
    let s = DuckSession::open(path, false).unwrap();
    s.execute_batch(FIXTURE).unwrap();
    s.close().unwrap();
}

fn app() -> App {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("dev.duckdb");
    make_db(&db);
    let settings = Settings {
        store_location: StoreLocation::Local(db.clone()),
        state_dir: tmp.path().join("state"),
        ..Settings::default()
    };
    let resolver = Arc::new(SchemaResolver::new(StoreLocation::Local(db), Some("gold".into())));
    let executor = QueryExecutor::new(resolver, Arc::new(DataStoreConnector::from_settings(&settings)));
    let subs = Arc::new(MemorySubscriptionRepo::new());
    let log = Arc::new(MemoryQueryLog::new());
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap()));
    let gate = AccessGate::new(AccessPolicy::standard(), PlanCatalog::seeded(), subs.clone(), log.clone(), clock.clone());
    let state = AppState::new(settings, executor, gate);
    App { _tmp: tmp, router: router(state), subs, log, clock }
}

async fn get(app: &App, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
    let mut b = Request::builder().uri(uri);
    if let Some(u) = user {
        b = b.header("x-remote-user", u);
    }
    let resp = app.router.clone().oneshot(b.body(Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn health_is_open() {
    let app = app();
    let (status, body) = get(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn anonymous_counted_request_is_refused() {
    let app = app();
    let (status, body) = get(&app, "/icfes/api/departamentos/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "AuthenticationRequired");
    assert!(app.log.is_empty());
}

#[tokio::test]
async fn anonymous_exempt_request_runs_without_counting() {
    let app = app();
    let (status, body) = get(&app, "/icfes/api/anos/", None).await;
    assert_eq!(status, StatusCode::OK);
    let anos: Vec<i64> = body["results"].as_array().unwrap().iter().map(|r| r["ano"].as_i64().unwrap()).collect();
    assert_eq!(anos, vec![2023, 2022]);
    assert!(app.subs.all().unwrap().is_empty());
    assert!(app.log.is_empty());
}

#[tokio::test]
async fn counted_request_increments_and_logs() {
    let app = app();
    let (status, body) = get(&app, "/icfes/api/departamentos/", Some("ana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);

    let sub = app.subs.load("ana").unwrap().unwrap();
    assert_eq!(sub.tier, Tier::Free);
    assert_eq!(sub.queries_today, 1);
    let entries = app.log.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].endpoint, "/icfes/api/departamentos/");
    assert_eq!(entries[0].status_code, 200);
}

#[tokio::test]
async fn exhausted_quota_is_refused_without_logging() {
    let app = app();
    let mut s = Subscription::new("ana", Tier::Free, app.clock.now());
    s.queries_today = 20;
    s.last_query_date = Some(app.clock.today());
    app.subs.store(&s).unwrap();

    let (status, body) = get(&app, "/icfes/api/departamentos/", Some("ana")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["reason"], "QuotaExceeded");
    assert_eq!(body["used"], 20);
    assert_eq!(body["limit"], 20);
    assert_eq!(body["tier"], "free");
    assert!(app.log.is_empty());
}

#[tokio::test]
async fn new_user_on_gated_route_gets_tier_denial() {
    let app = app();
    let (status, body) = get(&app, "/icfes/api/historico/105001000001", Some("nuevo")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "TierInsufficient");
    assert_eq!(body["current"], "free");
    assert_eq!(body["required"], "basic");
    assert_eq!(app.subs.load("nuevo").unwrap().unwrap().tier, Tier::Free);
}

#[tokio::test]
async fn premium_user_reads_history() {
    let app = app();
    app.subs.store(&Subscription::new("vip", Tier::Premium, app.clock.now())).unwrap();
    let (status, body) = get(&app, "/icfes/api/historico/105001000001", Some("vip")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["results"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["avg_punt_global"], 280.0);

    let (status, body) = get(&app, "/icfes/api/municipios/?departamento=antioquia", Some("vip")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["results"].as_array().unwrap().iter().map(|r| r["municipio"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["BELLO", "MEDELLIN"]);
    assert_eq!(app.log.len(), 2);
}

#[tokio::test]
async fn client_errors_are_not_counted() {
    let app = app();
    app.subs.store(&Subscription::new("vip", Tier::Premium, app.clock.now())).unwrap();
    let (status, body) = get(&app, "/icfes/api/municipios/", Some("vip")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_parameter");
    assert_eq!(app.subs.load("vip").unwrap().unwrap().queries_today, 0);
    assert!(app.log.is_empty());
}

#[tokio::test]
async fn statistics_by_year() {
    let app = app();
    let (status, body) = get(&app, "/icfes/api/estadisticas/?ano=2022", None).await;
    assert_eq!(status, StatusCode::OK);
    let row = &body["results"][0];
    assert_eq!(row["total_estudiantes"], 2);
    assert_eq!(row["promedio_nacional"], 280.0);

    let (status, _) = get(&app, "/icfes/api/estadisticas/?ano=dos-mil", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn usage_endpoint_reports_remaining() {
    let app = app();
    get(&app, "/icfes/api/departamentos/", Some("ana")).await;
    let (status, body) = get(&app, "/icfes/api/uso/", Some("ana")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["remaining"], 19);
    assert_eq!(body["results"][0]["used"], 1);

    let (status, _) = get(&app, "/icfes/api/uso/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
