//! sipdraind — the sipdrain daemon.
//!
//! Single binary that assembles the scale-in coordinator:
//! - Drain-record store (redb)
//! - Admission controller
//! - Signaling clients (call routing, media servers)
//! - Drain initiator + completion handler
//! - REST API + Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! sipdraind serve --config /etc/sipdrain/sipdrain.toml
//! sipdraind reconcile --config /etc/sipdrain/sipdrain.toml --grace-seconds 600
//! ```

mod wiring;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use sipdrain_core::{Clock, DaemonConfig, SystemClock};

#[derive(Parser)]
#[command(name = "sipdraind", about = "Scale-in safety coordinator for telephony fleets")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the scale-in and drain-completion endpoints.
    Serve {
        /// Path to sipdrain.toml.
        #[arg(long, default_value = "/etc/sipdrain/sipdrain.toml")]
        config: PathBuf,

        /// Override `server.listen`.
        #[arg(long)]
        listen: Option<String>,

        /// Override `store.path`.
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Report drains that outlived their ceiling. Never modifies state.
    Reconcile {
        /// Path to sipdrain.toml.
        #[arg(long, default_value = "/etc/sipdrain/sipdrain.toml")]
        config: PathBuf,

        /// Override `store.path`.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Extra seconds past `max_drain_seconds` before a drain counts as stuck.
        #[arg(long, default_value = "600")]
        grace_seconds: u64,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,sipdraind=debug,sipdrain=debug")
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(
    path: &std::path::Path,
    listen: Option<String>,
    store: Option<PathBuf>,
) -> anyhow::Result<DaemonConfig> {
    let mut config = DaemonConfig::from_file(path)?;
    if let Some(listen) = listen {
        config.server.listen = listen;
    }
    if let Some(store) = store {
        config.store.path = store;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve {
            config,
            listen,
            store,
        } => {
            let config = load_config(&config, listen, store)?;
            run_serve(config).await
        }
        Command::Reconcile {
            config,
            store,
            grace_seconds,
        } => {
            let config = load_config(&config, None, store)?;
            run_reconcile(&config, grace_seconds)
        }
    }
}

async fn run_serve(config: DaemonConfig) -> anyhow::Result<()> {
    info!("sipdrain daemon starting");

    if let Some(parent) = config.store.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = sipdrain_state::StateStore::open(&config.store.path)?;
    info!(path = ?config.store.path, "state store opened");

    let router = sipdrain_api::build_router(wiring::api_state(&config, store));

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    info!(addr = %config.server.listen, "API server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("sipdrain daemon stopped");
    Ok(())
}

fn run_reconcile(config: &DaemonConfig, grace_seconds: u64) -> anyhow::Result<()> {
    let store = sipdrain_state::StateStore::open(&config.store.path)?;
    let registry = sipdrain_metrics::MetricsRegistry::new();
    let now = SystemClock.now();

    let stuck = sipdrain_coordinator::find_stuck_drains(
        &store,
        now,
        config.drain.max_drain_seconds,
        grace_seconds,
    )?;
    for drain in &stuck {
        println!("{}", serde_json::to_string(drain)?);
    }
    sipdrain_coordinator::report_stuck_drains(&registry, &stuck);

    info!(
        stuck = stuck.len(),
        grace_seconds,
        max_drain_seconds = config.drain.max_drain_seconds,
        "reconcile scan complete"
    );
    print!("{}", sipdrain_metrics::render_prometheus(&registry.series()));
    Ok(())
}
