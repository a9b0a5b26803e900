// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SYNTHEX Devnet Node
//!
//! Entry point for the `synthex-node` binary. Parses CLI arguments,
//! initializes logging and metrics, assembles the vault engine over the
//! in-memory devnet collaborators and serves the HTTP/WS API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     — start the node
//! - `init`    — write a default settings file into the data directory
//! - `version` — print build version information

mod api;
mod cli;
mod devnet;
mod logging;
mod metrics;
mod settings;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, Mutex};

use synthex_protocol::config::EVENT_CHANNEL_CAPACITY;

use cli::{Commands, SynthexNodeCli, SETTINGS_FILE};
use devnet::Devnet;
use logging::LogFormat;
use metrics::{MetricsSink, NodeMetrics};
use settings::NodeSettings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = SynthexNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_DIRECTIVES, args.log_format);

    let settings_path = args.settings_path();
    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        settings = %settings_path.display(),
        "starting synthex-node"
    );

    let settings = NodeSettings::load_or_default(&settings_path)?;
    let devnet = Devnet::from_settings(&settings)?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics
        .vault_count
        .set(devnet.engine.vault_count() as i64);

    // --- Event fan-out ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    devnet
        .engine
        .add_sink(Arc::new(MetricsSink::new(Arc::clone(&node_metrics))));
    devnet
        .engine
        .add_sink(Arc::new(api::BroadcastSink::new(event_tx.clone())));

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            synthex_protocol::config::PROTOCOL_VERSION,
        ),
        network: settings.network.clone(),
        devnet,
        submissions: Arc::new(Mutex::new(())),
        event_tx,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    tracing::info!("synthex-node stopped");
    Ok(())
}

/// Creates the data directory and writes a default settings file.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging(logging::INIT_DIRECTIVES, LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), network = %args.network, "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let settings_path = data_dir.join(SETTINGS_FILE);
    if settings_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            settings_path.display()
        );
    }

    let settings = NodeSettings {
        network: args.network.clone(),
        ..NodeSettings::default()
    };
    settings.save(&settings_path)?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Network        : {}", args.network);
    println!("  Settings       : {}", settings_path.display());
    let admins: Vec<&str> = settings.admins.iter().map(|a| a.as_str()).collect();
    println!("  Admins         : {}", admins.join(", "));

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("synthex-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", synthex_protocol::config::PROTOCOL_VERSION);
    println!("rustc        {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed the node keeps running until the other signal arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
