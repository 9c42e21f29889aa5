//! labkeeper daemon
//!
//! Runs the per-user timer actors that expire lab sessions and tear down
//! their backend resources, and serves the operator IPC interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lk_core::config::{self, DaemonConfig};
use lk_core::time::{Clock, SystemClock};
use lk_core::traits::{SessionStore, StateStore};
use lk_daemon::actor::ActorDeps;
use lk_daemon::ipc::IpcServer;
use lk_daemon::store::{FileSessionStore, FileStateStore, MemorySessionStore, MemoryStateStore};
use lk_daemon::{ActorRegistry, CleanupOrchestrator, DaemonState, LabSessions};
use lk_gateway::HttpBackendGateway;

#[derive(Parser)]
#[command(name = "lk-daemon")]
#[command(about = "labkeeper session expiry daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, env = "LK_BACKEND_URL")]
    backend_url: Option<String>,

    /// Backend bearer token (overrides config)
    #[arg(long, env = "LK_BACKEND_TOKEN", hide_env_values = true)]
    backend_token: Option<String>,

    /// Directory for session records and timer state (overrides config)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Keep all state in memory; alarms are lost on restart
    #[arg(long, conflicts_with = "state_dir")]
    ephemeral: bool,

    /// IPC port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("labkeeper daemon starting...");

    let config = load_config(&args)?;

    // Missing backend URL or token is fatal before anything is scheduled
    let gateway = HttpBackendGateway::from_config(&config.backend)
        .context("Invalid backend configuration")?;
    tracing::info!("Using backend at {}", gateway.base_url());

    let (sessions, states) = open_stores(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let registry = ActorRegistry::new(ActorDeps {
        orchestrator: CleanupOrchestrator::new(Arc::new(gateway)),
        sessions: Arc::clone(&sessions),
        states,
        clock: Arc::clone(&clock),
        retry: config.retry.clone(),
    });

    let restored = registry
        .rehydrate()
        .await
        .context("Failed to restore timer state")?;
    tracing::debug!("{} pending cleanups restored", restored);

    let lab_sessions = LabSessions::new(sessions, registry.clone(), clock);
    let state = Arc::new(DaemonState::new(config.clone(), lab_sessions));

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let server = IpcServer::new(config.ipc_address(), Arc::clone(&state))
        .with_shutdown_token(cancel.clone());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                tracing::error!("IPC server stopped: {:#}", e);
                cancel.cancel();
            }
        }
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Stopping timer actors...");
    registry.shutdown().await;

    tracing::info!("labkeeper daemon shutdown complete");
    Ok(())
}

/// Load the config file and apply command line overrides
fn load_config(args: &Args) -> Result<DaemonConfig> {
    let mut config: DaemonConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                DaemonConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            DaemonConfig::default()
        }
    };

    if let Some(url) = &args.backend_url {
        config.backend.url = Some(url.clone());
    }
    if let Some(token) = &args.backend_token {
        config.backend.token = Some(token.clone());
    }
    if let Some(port) = args.port {
        config.ipc_port = port;
    }
    if args.ephemeral {
        config.state_dir = None;
    } else if let Some(dir) = &args.state_dir {
        config.state_dir = Some(dir.clone());
    }

    Ok(config)
}

async fn open_stores(
    config: &DaemonConfig,
) -> Result<(Arc<dyn SessionStore>, Arc<dyn StateStore>)> {
    match &config.state_dir {
        Some(dir) => {
            let sessions = FileSessionStore::open(dir)
                .await
                .with_context(|| format!("Failed to open session store in {:?}", dir))?;
            let states = FileStateStore::open(dir)
                .await
                .with_context(|| format!("Failed to open timer state in {:?}", dir))?;
            tracing::info!("Persisting state in {:?}", dir);
            Ok((Arc::new(sessions), Arc::new(states)))
        }
        None => {
            tracing::warn!("No state directory configured; pending cleanups will not survive a restart");
            Ok((
                Arc::new(MemorySessionStore::new()),
                Arc::new(MemoryStateStore::new()),
            ))
        }
    }
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel.cancel();
    });
}
