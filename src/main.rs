use std::sync::Arc;

use terracost::config::store::CACHE_SCHEMA_VERSION;
use terracost::config::{HttpConfig, StoreConfig};
use terracost::engine::{catalog_hash, Engine};
use terracost::mapper::registry::builtin_registry;
use terracost::pricing::cache::RateCache;
use terracost::pricing::resolver::ResolverConfig;
use terracost::pricing::store::{MemorySnapshotStore, SnapshotStore, StorePool};
use terracost::pricing::SnapshotDocument;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting terracost...");

    let args: Vec<String> = std::env::args().collect();
    let cli = parse_args(&args)?;

    let mut http_config = HttpConfig::from_env()?;
    let mut store_config = StoreConfig::from_env()?;
    if let Some(addr) = cli.addr {
        http_config.addr = addr.parse()?;
    }
    if let Some(data_dir) = cli.data_dir {
        store_config.data_dir = Some(data_dir.into());
    }

    #[cfg(feature = "disk_store")]
    if let Some(data_dir) = &store_config.data_dir {
        tracing::info!(dir = %data_dir.display(), "using RocksDB snapshot store");
        let store = Arc::new(terracost::pricing::disk::DiskSnapshotStore::new(data_dir)?);
        return run(store, http_config, store_config, &cli.snapshots).await;
    }

    #[cfg(not(feature = "disk_store"))]
    if store_config.data_dir.is_some() {
        tracing::warn!("TERRACOST_DATA_DIR set but this build has no disk_store feature");
    }

    tracing::info!("using in-memory snapshot store");
    let store = Arc::new(MemorySnapshotStore::new());
    run(store, http_config, store_config, &cli.snapshots).await
}

struct CliArgs {
    addr: Option<String>,
    data_dir: Option<String>,
    snapshots: Vec<String>,
}

/// Parse command-line arguments
fn parse_args(args: &[String]) -> Result<CliArgs, Box<dyn std::error::Error>> {
    let mut cli = CliArgs {
        addr: None,
        data_dir: None,
        snapshots: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" => {
                if i + 1 < args.len() {
                    cli.addr = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--data-dir" => {
                if i + 1 < args.len() {
                    cli.data_dir = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--snapshot" => {
                if i + 1 < args.len() {
                    cli.snapshots.push(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Ok(cli)
}

/// Print usage information
fn print_usage() {
    println!("terracost - pre-deploy cost estimation for IaC configurations");
    println!();
    println!("USAGE:");
    println!("    terracost [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --addr <HOST:PORT>    Bind address (default: 127.0.0.1:8080)");
    println!("    --data-dir <PATH>     RocksDB snapshot store directory");
    println!("    --snapshot <FILE>     Ingest a snapshot JSON file at startup (repeatable)");
    println!("    --help, -h            Print this help message");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("    TERRACOST_HOST                 Bind host (default: 127.0.0.1)");
    println!("    TERRACOST_PORT                 Bind port (default: 8080)");
    println!("    TERRACOST_UI_DIR               Static UI directory (optional)");
    println!("    TERRACOST_DATA_DIR             RocksDB snapshot store directory");
    println!("    TERRACOST_CACHE_TTL_SECS       Rate cache TTL (default: 3600)");
    println!("    TERRACOST_POOL_SIZE            Concurrent store lookups (default: 8)");
    println!("    TERRACOST_POOL_ACQUIRE_MS      Pool acquire timeout (default: 1000)");
    println!("    TERRACOST_PRICING_DEADLINE_MS  Pricing deadline (default: 10000)");
    println!("    RUST_LOG                       Logging level (default: info)");
    println!();
    println!("EXAMPLES:");
    println!("    # In-memory store with a seeded snapshot");
    println!("    terracost --snapshot ./snapshots/aws-us-east-1.json");
    println!();
    println!("    # Persistent store on a custom port");
    println!("    terracost --addr 0.0.0.0:9090 --data-dir ./data/pricing");
}

async fn run<S: SnapshotStore + 'static>(
    store: Arc<S>,
    http_config: HttpConfig,
    store_config: StoreConfig,
    snapshot_files: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    // a rejected mapper aborts startup; no request is served over a
    // bad catalog
    let registry = Arc::new(builtin_registry()?);
    tracing::info!(mappers = registry.len(), "mapper catalog loaded");

    for path in snapshot_files {
        let raw = std::fs::read_to_string(path)?;
        let doc: SnapshotDocument = serde_json::from_str(&raw)?;
        let id = doc.info.snapshot_id.clone();
        let rates = doc.rates.len();
        store.put_snapshot(doc.info, doc.rates).await?;
        tracing::info!(snapshot_id = %id, rates, "snapshot ingested");
    }

    let cache = Arc::new(RateCache::new(
        store_config.cache_ttl_secs,
        CACHE_SCHEMA_VERSION,
        &catalog_hash(&registry),
    ));
    let pool = Arc::new(StorePool::new(
        store_config.pool_size,
        store_config.pool_acquire_timeout,
    ));
    let resolver_config = ResolverConfig {
        deadline: store_config.pricing_deadline,
        ..Default::default()
    };

    let engine = Arc::new(Engine::new(registry, store, cache, pool, resolver_config));

    #[cfg(feature = "http_transport")]
    {
        terracost::transport::http::start_http_server(http_config, engine).await
    }

    #[cfg(not(feature = "http_transport"))]
    {
        let _ = (engine, http_config);
        eprintln!("HTTP transport not available. Build with --features http_transport");
        std::process::exit(1);
    }
}
