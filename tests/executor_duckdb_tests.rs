use std::path::Path;
use std::sync::Arc;

use icfes_gold::config::{Settings, StoreLocation};
use icfes_gold::error::StoreError;
use icfes_gold::query::QueryExecutor;
use icfes_gold::schema::{BindingSource, SchemaResolver};
use icfes_gold::store::{DataStoreConnector, DuckSession, QueryParam};

fn make_db(path: &Path, ddl: &str) {
    let s = DuckSession::open(path, false).unwrap();
    s.execute_batch(ddl).unwrap();
    s.close().unwrap();
}

fn executor_for(path: &Path, schema_override: Option<&str>) -> QueryExecutor {
    let settings = Settings { store_location: StoreLocation::Local(path.to_path_buf()), ..Settings::default() };
    let resolver = Arc::new(SchemaResolver::new(settings.store_location.clone(), schema_override.map(str::to_string)));
    QueryExecutor::new(resolver, Arc::new(DataStoreConnector::from_settings(&settings)))
}

#[test]
fn production_snapshot_resolves_to_main() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("icfes_prod.duckdb");
    make_db(&db, "CREATE TABLE main.schools (codigo VARCHAR); INSERT INTO main.schools VALUES ('111001'), ('222002');");

    let ex = executor_for(&db, None);
    assert_eq!(ex.resolver().binding().source, BindingSource::ProductionMarker);
    assert_eq!(ex.resolver().resolve("SELECT * FROM gold.schools"), "SELECT * FROM main.schools");
    let df = ex.execute("SELECT * FROM gold.schools ORDER BY codigo", &[]).unwrap();
    assert_eq!(df.height(), 2);
}

#[test]
fn misconfigured_binding_recovers_through_fallback() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("dev.duckdb");
    make_db(&db, "CREATE SCHEMA gold; CREATE TABLE gold.dim_colegios (codigo VARCHAR, departamento VARCHAR); \
                  INSERT INTO gold.dim_colegios VALUES ('1', 'ANTIOQUIA'), ('2', 'BOYACA');");

    // bound to main, but the tables only exist under gold
    let ex = executor_for(&db, Some("main"));
    let df = ex
        .execute("SELECT codigo FROM gold.dim_colegios WHERE departamento = ?", &[QueryParam::from("BOYACA")])
        .unwrap();
    assert_eq!(df.column("codigo").unwrap().str().unwrap().get(0), Some("2"));
}

#[test]
fn relation_missing_everywhere_surfaces_catalog_error() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("dev.duckdb");
    make_db(&db, "CREATE SCHEMA gold; CREATE TABLE gold.t (x INTEGER);");

    let ex = executor_for(&db, None);
    let err = ex.execute("SELECT * FROM gold.missing_table", &[]).unwrap_err();
    match err {
        StoreError::RelationNotFound(msg) => assert!(msg.contains("missing_table"), "message was {}", msg),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn syntax_errors_are_query_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("dev.duckdb");
    make_db(&db, "CREATE SCHEMA gold; CREATE TABLE gold.t (x INTEGER);");
    let ex = executor_for(&db, None);
    let err = ex.execute("SELEC x FROM gold.t", &[]).unwrap_err();
    assert!(matches!(err, StoreError::Query(_)), "got {:?}", err);
}

#[test]
fn unknown_function_is_not_retried_as_a_missing_relation() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("dev.duckdb");
    make_db(&db, "CREATE SCHEMA gold; CREATE TABLE gold.t (x INTEGER); INSERT INTO gold.t VALUES (1);");
    let ex = executor_for(&db, None);
    let err = ex.execute("SELECT no_such_fn(x) FROM gold.t", &[]).unwrap_err();
    match err {
        StoreError::Query(msg) => assert!(msg.contains("no_such_fn"), "message was {}", msg),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn non_finite_values_come_back_null() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("dev.duckdb");
    make_db(&db, "CREATE SCHEMA gold; CREATE TABLE gold.t (x INTEGER);");
    let ex = executor_for(&db, None);
    let df = ex
        .execute("SELECT 'nan'::DOUBLE AS a, 'inf'::DOUBLE AS b, 1.5::DOUBLE AS c, DATE '2024-05-01' AS d", &[])
        .unwrap();
    assert_eq!(df.column("a").unwrap().null_count(), 1);
    assert_eq!(df.column("b").unwrap().null_count(), 1);
    assert_eq!(df.column("c").unwrap().f64().unwrap().get(0), Some(1.5));
    assert_eq!(df.column("d").unwrap().str().unwrap().get(0), Some("2024-05-01"));
}
