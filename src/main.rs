use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use opsync::application::ports::{KeyValueStore, Reachability};
use opsync::application::services::LocalMirrorStore;
use opsync::domain::CollectionName;
use opsync::infrastructure::backend::load_seed_file;
use opsync::infrastructure::network::{ManualReachability, ProbeReachability};
use opsync::infrastructure::storage::SqliteKeyValueStore;
use opsync::shared::{AppConfig, logging};
use opsync::{SyncManager, SyncOptions};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "opsync")]
#[command(about = "Offline-first collection mirror", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database holding the local mirror
    #[arg(long, env = "OPSYNC_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "OPSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "OPSYNC_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror the configured collections from a seeded in-memory backend
    Run {
        /// JSON file with the backend's initial documents
        #[arg(long)]
        seed: PathBuf,
        /// Start with the network marked unreachable
        #[arg(long)]
        offline: bool,
        /// Mark the network reachable after this many seconds (with --offline)
        #[arg(long, requires = "offline")]
        reconnect_after: Option<u64>,
        /// Decide reachability by probing host:port instead
        #[arg(long, conflicts_with = "offline")]
        probe: Option<String>,
    },
    /// Print a collection's local mirror entry as JSON
    Show { collection: String },
    /// Remove a collection's local mirror entry
    Clear { collection: String },
    /// List collections present in the local mirror
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json_logs;
    config.validate().map_err(|e| anyhow!(e))?;

    logging::init(&config.logging.level, config.logging.json)?;
    info!("Starting opsync v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run {
            seed,
            offline,
            reconnect_after,
            probe,
        } => run(&config, &seed, offline, reconnect_after, probe).await?,
        Commands::Show { collection } => show(&config, &collection).await?,
        Commands::Clear { collection } => clear(&config, &collection).await?,
        Commands::List => list(&config).await?,
    }

    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<SqliteKeyValueStore> {
    ensure_parent_dir(&config.database.url)?;
    SqliteKeyValueStore::connect(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("Failed to open {}", config.database.url))
}

fn ensure_parent_dir(database_url: &str) -> Result<()> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn collection_name(name: &str) -> Result<CollectionName> {
    CollectionName::new(name).map_err(|e| anyhow!(e))
}

/// Address to probe for reachability. `--offline` wins over a configured
/// probe address; an explicit `--probe` wins over the configured one.
fn probe_target(offline: bool, probe: Option<String>, configured: Option<String>) -> Option<String> {
    if offline {
        if configured.is_some() {
            warn!("--offline given, ignoring configured probe address");
        }
        return None;
    }
    probe.or(configured)
}

async fn run(
    config: &AppConfig,
    seed: &Path,
    offline: bool,
    reconnect_after: Option<u64>,
    probe: Option<String>,
) -> Result<()> {
    let store = Arc::new(open_store(config).await?);
    let backend = Arc::new(load_seed_file(seed)?);

    let target = probe_target(offline, probe, config.network.probe_addr.clone());
    let reachability: Arc<dyn Reachability> = match target {
        Some(addr) => Arc::new(ProbeReachability::spawn(
            addr,
            Duration::from_secs(config.network.probe_interval_secs),
            Duration::from_millis(config.network.probe_timeout_ms),
        )),
        None => {
            let manual = ManualReachability::new(!offline);
            if let Some(secs) = reconnect_after {
                let manual = manual.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    info!("Simulated reconnect");
                    manual.set_reachable(true);
                });
            }
            Arc::new(manual)
        }
    };

    let manager = SyncManager::new(
        SyncOptions::from_config(&config.sync)?,
        store,
        backend,
        reachability,
    );
    let mut changes = manager.subscribe_changes();
    manager.initialize().await?;
    info!("Mirror is running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            change = changes.recv() => match change {
                Ok(change) => info!(
                    collection = %change.collection,
                    status = %change.status,
                    records = change.record_count,
                    "Collection changed"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Change notifications lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("Shutting down mirror...");
    manager.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&manager.views().await)?);
    Ok(())
}

async fn show(config: &AppConfig, collection: &str) -> Result<()> {
    let collection = collection_name(collection)?;
    let mirror = LocalMirrorStore::new(Arc::new(open_store(config).await?));
    let entry = mirror.load(&collection).await;

    let output = json!({
        "collection": collection,
        "records": entry.records,
        "lastSyncTime": entry.last_sync_time,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn clear(config: &AppConfig, collection: &str) -> Result<()> {
    let collection = collection_name(collection)?;
    let mirror = LocalMirrorStore::new(Arc::new(open_store(config).await?));
    mirror.clear(&collection).await?;
    info!(collection = %collection, "Local mirror cleared");
    Ok(())
}

async fn list(config: &AppConfig) -> Result<()> {
    let store = open_store(config).await?;
    for key in store.keys().await? {
        if let Some(name) = key.strip_prefix('@')
            && !name.ends_with("_lastSync")
        {
            println!("{name}");
        }
    }
    Ok(())
}
