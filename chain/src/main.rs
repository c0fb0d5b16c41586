// chain/src/main.rs
//
// Node Orchestrator binary: resolves configuration (file + CLI, per
// spec.md §6), wires up the consensus engine, chain store, mempool, and
// message layer through `chain::node::Node`, and runs every long-running
// loop until Ctrl-C.

use clap::Parser;

use chain::{Cli, Node, NodeConfigBuilder};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("fatal error: {err}");
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
    let config = builder.with_cli(&cli).build().map_err(|e| format!("invalid configuration: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        )
        .init();

    tracing::info!(
        node_id = %config.node_id,
        validators = ?config.validators.all().iter().map(|v| v.as_str()).collect::<Vec<_>>(),
        data_dir = %config.data_dir.display(),
        "starting node"
    );

    let node = Node::new(config).map_err(|e| format!("failed to construct node: {e}"))?;
    let node_for_shutdown = node.clone();

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        node_for_shutdown.stop();
    });

    node.run().await.map_err(|e| format!("node loop failed: {e}"))
}
