use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use location_cache::{
    cache::{CacheStore, InMemoryCacheStore, SeaOrmCacheStore},
    config::{Config, StoreBackend},
    database::Database,
    ingestor::{spawn_load, LoadStateManager, LocationCacheLoader, LocationScheduler},
    models::{LoadOutcome, LoadTrigger},
    observability::LoaderMetrics,
    sources::OpenApiDivisionSource,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "location-cache")]
#[command(version = "0.1.0")]
#[command(about = "Builds and serves a cache of provinces, districts and wards")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file and selects the database backend)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Run a single load and exit
    #[arg(long)]
    load_only: bool,

    /// Clear the guard before loading (with --load-only)
    #[arg(long)]
    refresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("location_cache={},tower_http=trace", cli.log_level)
    } else {
        format!("location_cache={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load_from_file(&cli.config)?;
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.store.database_url = database_url;
        config.store.backend = StoreBackend::Database;
    }

    info!(
        "Starting location-cache: upstream {} (depth {}), store {:?}",
        config.upstream.base_url, config.upstream.depth, config.store.backend
    );

    let store: Arc<dyn CacheStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(InMemoryCacheStore::new()),
        StoreBackend::Database => {
            let database = Database::new(&config.store).await?;
            database.migrate().await?;
            Arc::new(SeaOrmCacheStore::from_database(&database))
        }
    };

    let source = Arc::new(OpenApiDivisionSource::new(&config.upstream)?);
    let loader = Arc::new(LocationCacheLoader::new(
        source,
        store,
        config.loader.clone(),
        LoadStateManager::new(),
        LoaderMetrics::new(),
    ));

    if cli.load_only {
        let outcome = if cli.refresh {
            loader.refresh_by(LoadTrigger::Manual).await?
        } else {
            loader.ensure_loaded_by(LoadTrigger::Manual).await?
        };
        match outcome {
            LoadOutcome::Loaded(report) => info!(
                "Loaded {} records ({} skipped)",
                report.cached_records(),
                report.skipped
            ),
            other => info!("Load finished: {:?}", other),
        }
        return Ok(());
    }

    let cancellation_token = CancellationToken::new();
    let mut tasks = Vec::new();

    if config.scheduler.enabled {
        let scheduler = LocationScheduler::new(loader.clone(), config.scheduler.clone())?;
        scheduler.spawn_startup_load();
        let token = cancellation_token.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = scheduler.run(token).await {
                error!("Location scheduler failed: {}", e);
            }
        }));
    } else if config.scheduler.load_on_startup {
        spawn_load(loader.clone(), LoadTrigger::Startup, false);
    } else {
        warn!("Scheduler and startup load are both disabled; loads only run on request");
    }

    if config.web.enabled {
        let server = WebServer::new(&config.web, AppState::new(loader.clone()))?;
        info!("Serving location API on {}:{}", server.host(), server.port());
        let token = cancellation_token.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.serve_with_cancellation(token).await {
                error!("Web server failed: {}", e);
            }
        }));
    }

    shutdown_signal().await;
    cancellation_token.cancel();

    for task in tasks {
        let _ = task.await;
    }

    info!("location-cache stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
                }
                return;
            }
            _ => warn!("Failed to install unix signal handlers, falling back to Ctrl+C"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Received Ctrl+C, shutting down gracefully");
}
