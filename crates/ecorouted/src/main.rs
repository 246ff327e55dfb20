//! ecorouted — the ecoroute daemon.
//!
//! Single binary that assembles the router:
//! - Carbon sensor (simulated grid intensity)
//! - Infrastructure controller (Docker Engine, in-memory, or degraded)
//! - Service router over HTTP
//! - Status poller
//! - REST API + Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! ecorouted serve --config /etc/ecoroute/ecoroute.toml --port 8090
//! ecorouted forecast DE --mode LOW
//! ecorouted status --mode HIGH
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use ecoroute_core::config::Settings;
use ecoroute_core::{CarbonStatus, EcorouteConfig, TargetState};
use ecoroute_infra::{ControlPlane, DockerControlPlane, InMemoryControlPlane};
use ecoroute_orchestrator::Orchestrator;
use ecoroute_router::HttpServiceClient;
use ecoroute_sensor::CarbonSimulator;

#[derive(Parser)]
#[command(name = "ecorouted", about = "Carbon-aware forecast router")]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Manage an in-memory target instead of a Docker container.
    #[arg(long, global = true)]
    simulate_infra: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server and the status poller.
    Serve {
        /// Port to listen on (overrides the config file).
        #[arg(long)]
        port: Option<u16>,
    },

    /// Read the carbon sensor once and reconcile.
    Status {
        /// Force the sensor to LOW or HIGH.
        #[arg(long)]
        mode: Option<CarbonStatus>,
    },

    /// Fetch one routed forecast and print it as JSON.
    Forecast {
        /// Country code passed to the prediction service.
        country: String,

        /// Force the sensor to LOW or HIGH.
        #[arg(long)]
        mode: Option<CarbonStatus>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,ecorouted=debug,ecoroute=debug")),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    let orchestrator = Arc::new(build_orchestrator(&settings, cli.simulate_infra).await);

    match cli.command {
        Command::Serve { port } => {
            let port = port.unwrap_or(settings.server.port);
            run_server(orchestrator, &settings, port).await
        }
        Command::Status { mode } => {
            let reading = orchestrator.get_status(mode).await;
            println!("{}", serde_json::to_string_pretty(&reading)?);
            Ok(())
        }
        Command::Forecast { country, mode } => {
            let outcome = orchestrator.get_forecast(&country, mode).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if let Some(error) = outcome.error() {
                anyhow::bail!("forecast failed: {error}");
            }
            Ok(())
        }
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut config = match path {
        Some(path) => EcorouteConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EcorouteConfig::default(),
    };
    config.apply_process_env();
    let settings = config.resolve().context("invalid configuration")?;
    info!(
        performance = %settings.performance.url,
        eco = %settings.eco.url,
        target = %settings.infrastructure.target_name,
        threshold = settings.sensor_threshold,
        "configuration loaded"
    );
    Ok(settings)
}

async fn build_orchestrator(settings: &Settings, simulate_infra: bool) -> Orchestrator {
    let sensor = Arc::new(CarbonSimulator::new(settings.sensor_threshold));
    let control_plane = connect_control_plane(settings, simulate_infra).await;
    Orchestrator::from_settings(settings, sensor, control_plane, Arc::new(HttpServiceClient::new()))
}

/// Pick the control plane. `None` runs the controller degraded.
async fn connect_control_plane(settings: &Settings, simulate_infra: bool) -> Option<Arc<dyn ControlPlane>> {
    let infra = &settings.infrastructure;

    if simulate_infra {
        info!(target_name = %infra.target_name, "using in-memory control plane");
        let plane = InMemoryControlPlane::new().with_target(&infra.target_name, TargetState::Stopped);
        return Some(Arc::new(plane));
    }

    if !infra.enabled {
        info!("infrastructure control disabled");
        return None;
    }

    match DockerControlPlane::connect(infra.docker_socket.clone()).await {
        Ok(docker) => {
            info!(socket = %infra.docker_socket.display(), "connected to Docker engine");
            Some(Arc::new(docker))
        }
        Err(e) => {
            warn!(
                socket = %infra.docker_socket.display(),
                error = %e,
                "could not connect to Docker, running without infrastructure control"
            );
            None
        }
    }
}

async fn run_server(orchestrator: Arc<Orchestrator>, settings: &Settings, port: u16) -> anyhow::Result<()> {
    info!("ecoroute daemon starting");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let poll_interval = settings.server.status_poll_interval;
    let poller_handle = tokio::spawn(ecoroute_orchestrator::run_status_poller(
        orchestrator.clone(),
        poll_interval,
        shutdown_rx,
    ));

    // ── Start API server ───────────────────────────────────────

    let router = ecoroute_api::build_router(orchestrator);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = poller_handle.await;

    info!("ecoroute daemon stopped");
    Ok(())
}
