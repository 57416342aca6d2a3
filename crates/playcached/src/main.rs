//! playcached - The playcache background service
//!
//! This is the main entry point for the playcache service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization (degrading to an unavailable store)
//! - Remote gateway
//! - Network monitor, HTTP probe and netlink watcher
//! - Sync engine and scheduler
//! - Widget notification
//! - IPC server taking cache commands from client processes

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use playcache_api::RecordKind;
use playcache_config::{Settings, load_config};
use playcache_core::{
    CacheService, FileWidgetNotifier, SyncEngine, SyncOutcome, SyncScheduler, handle_command,
};
use playcache_ipc::{IpcServer, ServerMessage};
use playcache_net::{ConnectivityProbe, NetworkMonitor, ProbeConfig};
use playcache_remote::HttpGateway;
use playcache_store::{LocalStore, SqliteStore, UnavailableStore};
use playcache_util::{OwnerId, default_config_path, format_datetime_full};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Grace period for background tasks after shutdown is signalled
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// playcached - Offline-first record cache and sync service
#[derive(Parser, Debug)]
#[command(name = "playcached")]
#[command(about = "Offline-first record cache and sync service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/playcache/config.toml)
    #[arg(short, long, env = "PLAYCACHE_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set PLAYCACHE_DATA_DIR env var)
    #[arg(short, long, env = "PLAYCACHE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Run the service until SIGINT/SIGTERM/SIGHUP (default)
    Run,
    /// Print cached record counts per kind
    Stats,
    /// Evict cached records
    Clear {
        /// Only evict this owner's records
        #[arg(long)]
        owner: Option<String>,
    },
    /// Run one sync pass and exit
    Sync,
}

/// Main service state
struct Service {
    settings: Settings,
    monitor: Arc<NetworkMonitor>,
    engine: Arc<SyncEngine>,
    cache: Arc<CacheService>,
}

impl Service {
    fn new(settings: Settings) -> Result<Self> {
        let store = open_store(&settings);

        let gateway = HttpGateway::new(
            &settings.remote.base_url,
            settings.remote.timeout,
            settings.remote.auth_token(),
        )
        .context("Failed to create remote gateway")?;

        if settings.remote.auth_token().is_none() {
            warn!(
                env = %settings.remote.auth_token_env,
                "No auth token set, pushes are sent unauthenticated"
            );
        }

        let monitor = Arc::new(NetworkMonitor::new());
        let engine = Arc::new(SyncEngine::new(store.clone(), Arc::new(gateway)));

        let mut cache = CacheService::new(store, engine.clone(), monitor.handle())
            .with_fast_path(settings.sync.fast_path)
            .with_score_window(settings.scoring.window)
            .with_widget_kinds(settings.widget.kinds);

        if settings.widget.enabled {
            info!(dir = %settings.widget.dir.display(), "Widget snapshots enabled");
            cache = cache.with_notifier(Arc::new(FileWidgetNotifier::new(&settings.widget.dir)));
        }

        Ok(Self {
            settings,
            monitor,
            engine,
            cache: Arc::new(cache),
        })
    }

    async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        // Connectivity probe feeds the monitor
        let probe = ConnectivityProbe::new(
            ProbeConfig {
                check_url: self.settings.connectivity.check_url.clone(),
                check_interval: self.settings.connectivity.check_interval,
                check_timeout: self.settings.connectivity.check_timeout,
            },
            self.monitor.clone(),
        )
        .context("Failed to create connectivity probe")?;

        #[cfg(target_os = "linux")]
        {
            let recheck = probe.recheck_handle();
            let shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = playcache_net::run_netlink_watcher(recheck, shutdown).await {
                    warn!(error = %e, "Netlink watcher failed, network change detection unavailable");
                }
            }));
        }

        tasks.push(tokio::spawn(probe.run(shutdown_rx.clone())));

        let scheduler = SyncScheduler::new(
            self.engine.clone(),
            self.monitor.handle(),
            self.settings.sync.interval,
        );
        tasks.push(tokio::spawn(scheduler.run(shutdown_rx.clone())));

        // Client processes write into the cache over the socket
        let socket_path = self.settings.service.socket_path();
        let mut ipc = IpcServer::new(&socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to start IPC server at {:?}", socket_path))?;
        let ipc = Arc::new(ipc);
        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = ipc.clone();
        let accept_task = tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        info!(
            healthy = self.cache.is_healthy(),
            pending = self.cache.pending_count(),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&self.cache, &ipc, msg).await;
                }
            }
        }

        let _ = shutdown_tx.send(true);
        accept_task.abort();
        ipc.shutdown();

        for task in tasks {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Background task did not stop in time");
            }
        }

        if self.engine.is_syncing() {
            info!("Sync pass still in flight at shutdown, pending records stay queued");
        }

        info!(pending = self.cache.pending_count(), "Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(cache: &Arc<CacheService>, ipc: &Arc<IpcServer>, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                if !ipc.check_version(&client_id, &request).await {
                    return;
                }

                // A sync command waits for a whole pass; keep the loop free
                let cache = cache.clone();
                let ipc = ipc.clone();
                tokio::spawn(async move {
                    let response = handle_command(&cache, request.request_id, request.command).await;
                    if let Err(e) = ipc.send_response(&client_id, response).await {
                        debug!(client_id = %client_id, error = %e, "Response not delivered");
                    }
                });
            }

            ServerMessage::ClientConnected { client_id } => {
                info!(client_id = %client_id, "Client connected");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
            }
        }
    }

    fn stats(&self) -> Result<()> {
        let size = self
            .cache
            .cache_size()
            .context("Cache is unavailable")?;

        println!("{:<14} {:>8} {:>8}", "kind", "total", "pending");
        for kind in RecordKind::ALL {
            let count = size.get(kind);
            println!("{:<14} {:>8} {:>8}", kind.as_str(), count.total, count.pending);
        }
        println!("{:<14} {:>8} {:>8}", "all", size.total(), size.pending());
        Ok(())
    }

    fn clear(&self, owner: Option<String>) -> Result<()> {
        let owner = owner.map(OwnerId::new);
        if !self.cache.clear_cache(owner.as_ref()) {
            anyhow::bail!("Failed to clear cache");
        }

        match owner {
            Some(owner) => println!("Cleared cached records for {}", owner),
            None => println!("Cleared all cached records"),
        }
        Ok(())
    }

    async fn sync_once(&self) -> Result<()> {
        match self.cache.sync_now().await {
            SyncOutcome::Completed(report) => {
                for (kind, result) in &report.kinds {
                    if result.attempted > 0 || result.skipped {
                        println!(
                            "{:<14} synced {:>4}  failed {:>4}{}",
                            kind.as_str(),
                            result.synced,
                            result.failed,
                            if result.skipped { "  (skipped)" } else { "" }
                        );
                    }
                }
                println!(
                    "synced {} / failed {} at {}",
                    report.synced(),
                    report.failed(),
                    format_datetime_full(&report.finished_at)
                );

                if report.is_clean() {
                    Ok(())
                } else {
                    anyhow::bail!("Sync pass left records pending")
                }
            }
            SyncOutcome::AlreadyRunning => anyhow::bail!("A sync pass is already running"),
        }
    }
}

/// Open the SQLite store, falling back to a store that rejects every call
fn open_store(settings: &Settings) -> Arc<dyn LocalStore> {
    let db_path = settings.service.database_path();

    let opened = std::fs::create_dir_all(&settings.service.data_dir)
        .map_err(playcache_store::StoreError::from)
        .and_then(|_| SqliteStore::open(&db_path));

    match opened {
        Ok(store) => {
            info!(db_path = %db_path.display(), "Store initialized");
            Arc::new(store)
        }
        Err(e) => {
            warn!(
                db_path = %db_path.display(),
                error = %e,
                "Failed to open store, running without a cache"
            );
            Arc::new(UnavailableStore::new(e.to_string()))
        }
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = if args.config.exists() {
        let settings = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;
        info!(config_path = %args.config.display(), "Configuration loaded");
        settings
    } else {
        warn!(
            config_path = %args.config.display(),
            "Config file not found, using defaults"
        );
        Settings::default()
    };

    if let Some(data_dir) = &args.data_dir {
        settings.override_data_dir(data_dir.clone());
    }

    Ok(settings)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "playcached starting");

    let settings = load_settings(&args)?;
    let service = Service::new(settings)?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => service.run().await,
        Command::Stats => service.stats(),
        Command::Clear { owner } => service.clear(owner),
        Command::Sync => service.sync_once().await,
    }
}
