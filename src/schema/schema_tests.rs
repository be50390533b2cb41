use super::*;
use crate::config::StoreLocation;
use std::path::PathBuf;

fn local(p: &str) -> StoreLocation { StoreLocation::Local(PathBuf::from(p)) }

#[test]
fn production_path_binds_to_main() {
    let r = SchemaResolver::new(local("/app/data/production_v2.duckdb"), None);
    assert_eq!(r.resolve("SELECT * FROM gold.schools"), "SELECT * FROM main.schools");
    assert_eq!(r.binding().source, BindingSource::ProductionMarker);
}

#[test]
fn remote_location_binds_to_main() {
    let r = SchemaResolver::new(StoreLocation::parse("s3://icfes-bucket/snapshot.duckdb"), None);
    assert_eq!(r.binding().physical, "main");
    assert_eq!(r.binding().source, BindingSource::RemoteLocation);
}

#[test]
fn dev_path_is_a_noop() {
    let r = SchemaResolver::new(local("/app/data/dev.duckdb"), None);
    let q = "SELECT ano FROM gold.fct_agg_colegios_ano WHERE ano = ?";
    assert_eq!(r.resolve(q), q);
    assert!(r.binding().is_identity());
}

#[test]
fn explicit_override_beats_heuristics() {
    let r = SchemaResolver::new(StoreLocation::parse("s3://bucket/prod.duckdb"), Some(" Prod ".into()));
    assert_eq!(r.binding().physical, "prod");
    assert_eq!(r.binding().source, BindingSource::Override);
    assert_eq!(r.resolve("select 1 from gold.t"), "select 1 from prod.t");
}

#[test]
fn resolution_is_idempotent() {
    let queries = [
        "SELECT * FROM gold.schools",
        "SELECT a.x, b.y FROM gold.a a JOIN main.b b ON a.k = b.k",
        "SELECT 'gold.not_a_table' AS s FROM gold.t",
        "select * from dim",
    ];
    for path in ["/data/dev.duckdb", "/data/prod.duckdb"] {
        let r = SchemaResolver::new(local(path), None);
        for q in queries {
            let once = r.resolve(q);
            assert_eq!(r.resolve(&once), once, "path={} q={}", path, q);
        }
    }
}

#[test]
fn literals_comments_and_columns_are_not_rewritten() {
    let r = SchemaResolver::new(local("/data/prod.duckdb"), None);
    let q = "SELECT t.gold, 'gold.x', \"gold\".y -- gold.z\nFROM gold.t /* gold.w */ WHERE note = 'it''s gold.q'";
    let out = r.resolve(q);
    assert_eq!(
        out,
        "SELECT t.gold, 'gold.x', \"gold\".y -- gold.z\nFROM main.t /* gold.w */ WHERE note = 'it''s gold.q'"
    );
}

#[test]
fn identifier_boundaries_are_respected() {
    let q = LogicalQuery::parse("SELECT * FROM oldgold.t, gold_x.t, x.gold.t, GOLD.t");
    assert_eq!(q.schema_refs(), vec!["gold"]);
    // untouched qualifiers keep their original spelling
    assert_eq!(q.to_sql(), "SELECT * FROM oldgold.t, gold_x.t, x.gold.t, GOLD.t");
    assert_eq!(q.rebind("gold", "main").to_sql(), "SELECT * FROM oldgold.t, gold_x.t, x.gold.t, main.t");
}

#[test]
fn fallback_swaps_bound_and_alternate() {
    let dev = SchemaResolver::new(local("/data/dev.duckdb"), None);
    let q = dev.resolve_query(&LogicalQuery::parse("SELECT * FROM gold.missing_table"));
    let fb = dev.fallback_for(&q).map(|f| f.to_sql());
    assert_eq!(fb.as_deref(), Some("SELECT * FROM main.missing_table"));

    // query hard-codes the alternate schema: try the bound one instead
    let q = LogicalQuery::parse("SELECT * FROM main.dim_colegios_slugs");
    let fb = dev.fallback_for(&q).map(|f| f.to_sql());
    assert_eq!(fb.as_deref(), Some("SELECT * FROM gold.dim_colegios_slugs"));

    let prod = SchemaResolver::new(local("/data/prod.duckdb"), None);
    let q = prod.resolve_query(&LogicalQuery::parse("SELECT * FROM gold.t"));
    assert_eq!(prod.fallback_for(&q).map(|f| f.to_sql()).as_deref(), Some("SELECT * FROM gold.t"));
}

#[test]
fn no_schema_means_no_fallback() {
    let r = SchemaResolver::new(local("/data/dev.duckdb"), None);
    assert!(r.fallback_for(&LogicalQuery::parse("SELECT 1")).is_none());
    assert!(r.fallback_for(&LogicalQuery::parse("SELECT * FROM prod.t")).is_none());
}
