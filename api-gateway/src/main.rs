// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This embeds a full `chain::Node` (consensus engine, chain store,
//! mempool, message layer) and runs its loops exactly as the `chain`
//! binary does, then layers a read-only HTTP admin surface over it:
//!
//! - `GET /health`
//! - `GET /height`, `/head`, `/mempool`, `/block/{height}`,
//!   `/leader/{height}`, `/validators`, `/view`, `/connections`
//!
//! Per spec.md §1/§6, the HTTP surface is a non-core collaborator: this
//! binary performs no consensus logic of its own and only reads the
//! node's administrative accessors.

mod config;
mod routes;
mod state;

use clap::Parser;

use axum::{Router, routing::get};

use chain::{Cli, Node, NodeConfigBuilder};
use config::ApiConfig;
use routes::{admin, health};
use state::SharedState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cli = Cli::parse();

    let mut builder = NodeConfigBuilder::new();
    if let Some(path) = &cli.config {
        builder = builder
            .with_file(path)
            .map_err(|e| format!("failed to load config file {}: {e}", path.display()))?;
    }
    let node_config = builder.with_cli(&cli).build().map_err(|e| format!("invalid configuration: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("api_gateway=info,{}", node_config.log_level)),
        )
        .init();

    let api_cfg = match node_config.http_api_port {
        Some(port) => ApiConfig::on_port(port),
        None => ApiConfig::default(),
    };

    let node: SharedState = Node::new(node_config).map_err(|e| format!("failed to construct node: {e}"))?;
    let node_for_loops = node.clone();
    tokio::spawn(async move {
        if let Err(e) = node_for_loops.run().await {
            tracing::error!(error = %e, "node loops exited");
        }
    });

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/height", get(admin::height))
        .route("/head", get(admin::head))
        .route("/mempool", get(admin::mempool))
        .route("/block/{height}", get(admin::block))
        .route("/leader/{height}", get(admin::leader))
        .route("/validators", get(admin::validators))
        .route("/view", get(admin::view))
        .route("/connections", get(admin::connections))
        .with_state(node.clone());

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(node))
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C, then stops the embedded node's loops before this
/// server's graceful shutdown completes.
async fn shutdown_signal(node: SharedState) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    node.stop();
}
