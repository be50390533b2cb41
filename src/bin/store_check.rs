//!
//! store_check
//! -----------
//! Operator tool: shows how this deployment resolves the gold schema, the state of
//! the local replica when the store is remote, and which catalog tables each
//! candidate schema holds. `--fetch` repairs or downloads the replica first.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use icfes_gold::config::Settings;
use icfes_gold::schema::{SchemaResolver, CANDIDATE_SCHEMAS};
use icfes_gold::store::DataStoreConnector;

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let fetch = args.iter().any(|a| a == "--fetch");
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("usage: store_check [--fetch]");
        return Ok(());
    }

    let settings = Settings::from_env();
    let resolver = SchemaResolver::from_settings(&settings);
    let b = resolver.binding();
    println!("location : {}", settings.store_location.as_str());
    println!("binding  : {} -> {} ({:?})", b.logical, b.physical, b.source);
    println!("fallback : {}", b.alternate());

    let connector = DataStoreConnector::from_settings(&settings);
    if let Some(r) = connector.replica() {
        println!("replica  : {} ({:?})", r.local_path().display(), r.status());
        if !fetch && !r.status().is_ready() {
            println!("replica not ready; rerun with --fetch to download it");
            return Ok(());
        }
    }

    let session = match connector.open_session(true) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot open store: {}", e);
            if let icfes_gold::error::StoreError::DataUnavailable { diagnostics, .. } = &e {
                eprintln!("{}", diagnostics);
            }
            std::process::exit(2);
        }
    };
    let tables = session.catalog_tables(&CANDIDATE_SCHEMAS)?;
    for schema in CANDIDATE_SCHEMAS {
        let names: Vec<&str> = tables.iter().filter(|(s, _)| s == schema).map(|(_, t)| t.as_str()).collect();
        println!("{:<8} : {} tables{}", schema, names.len(), if names.is_empty() { String::new() } else { format!(" ({})", names.join(", ")) });
    }
    session.close()?;
    Ok(())
}
