use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use icfes_gold::config::Settings;

fn parse_port_arg(args: &[String], flag: &str) -> Option<u16> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return args[i + 1].parse::<u16>().ok();
        }
        i += 1;
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    let mut settings = Settings::from_env();
    if let Some(p) = parse_port_arg(&args, "--port") {
        settings.http_port = p;
    }

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "icfes",
        "icfes-gold starting: RUST_LOG='{}', http_port={}, store='{}', replica='{}', schema_override={:?}, credentials={:?}",
        rust_log,
        settings.http_port,
        settings.store_location.as_str(),
        settings.replica_path.display(),
        settings.schema_override,
        settings.credentials
    );

    icfes_gold::server::run(settings).await
}
