//! rtwiz-sync - field-to-group synchronization for radiotherapy plans
//!
//! `sync` runs (or previews) one patient, `check` probes the database
//! bridge, `serve` exposes the same operations over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rtwiz_common::config::{FailurePolicy, TomlConfig, BRIDGE_URL_ENV_VAR};
use rtwiz_common::PatientId;
use rtwiz_sync::orchestrator::SyncRequest;
use rtwiz_sync::{build_router, state_from_config};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for rtwiz-sync
#[derive(Parser, Debug)]
#[command(name = "rtwiz-sync")]
#[command(about = "Field-to-group synchronization for radiotherapy plans")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database bridge endpoint, overrides the configuration file
    #[arg(long, global = true, env = BRIDGE_URL_ENV_VAR)]
    bridge_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize one patient (preview unless --run is given)
    Sync {
        /// Patient identifier
        patient_id: PatientId,

        /// Write changes; without it both tables are only read
        #[arg(long)]
        run: bool,

        /// Failure policy: best_effort, skip_groups_on_error, fail_fast
        #[arg(long)]
        policy: Option<FailurePolicy>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the database bridge answers
    Check,

    /// Serve the HTTP API
    Serve {
        /// Port to listen on, overrides the configuration file
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::resolve(args.config.as_deref(), args.bridge_url.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting rtwiz-sync v{}", env!("CARGO_PKG_VERSION"));
    info!("Database bridge: {}", config.bridge.url);

    match args.command {
        Command::Sync {
            patient_id,
            run,
            policy,
            json,
        } => run_sync(&config, patient_id, run, policy, json).await,
        Command::Check => run_check(&config).await,
        Command::Serve { port } => run_serve(&config, port).await,
    }
}

async fn run_sync(
    config: &TomlConfig,
    patient_id: PatientId,
    run: bool,
    policy: Option<FailurePolicy>,
    json: bool,
) -> Result<()> {
    let state = state_from_config(config).context("Failed to set up database bridge")?;

    let request = SyncRequest {
        patient_id,
        run,
        policy,
    };
    let report = state.orchestrator.execute(request).await;

    if json {
        let body = serde_json::to_string_pretty(&report).context("Failed to encode report")?;
        println!("{}", body);
    } else {
        print!("{}", report.render_text());
    }

    report
        .into_result()
        .with_context(|| format!("Synchronization failed for patient {}", patient_id))?;
    Ok(())
}

async fn run_check(config: &TomlConfig) -> Result<()> {
    let state = state_from_config(config).context("Failed to set up database bridge")?;

    let message = match state.store.test().await {
        Ok(message) => message,
        Err(e) => {
            error!("Bridge check failed: {}", e);
            return Err(e).context(format!("Bridge at {} did not answer", config.bridge.url));
        }
    };
    println!("Bridge OK: {}", message);

    let tables = state
        .store
        .tables()
        .await
        .context("Failed to list bridge tables")?;
    println!("Tables ({}):", tables.len());
    for table in tables {
        println!("  {}", table);
    }
    Ok(())
}

async fn run_serve(config: &TomlConfig, port: Option<u16>) -> Result<()> {
    let state = state_from_config(config).context("Failed to set up database bridge")?;
    let app = build_router(state);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid server host: {}", config.server.host))?;
    let addr = SocketAddr::new(host, port.unwrap_or(config.server.port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("rtwiz-sync listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
