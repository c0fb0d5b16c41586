// Shared harness for the multi-node integration tests in this directory.
//
// Each test spins up a handful of real `chain::Node`s, each bound to its
// own loopback port with a real `TcpListener`, wires them to each other
// over real sockets, and polls their administrative read API until the
// scenario's expected end state is reached or a timeout elapses.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use chain::{ConsensusTiming, NodeConfig, ValidatorSet};

/// A running node plus the tempdir backing its chain store, kept alive for
/// the duration of the test.
pub struct TestNode {
    pub node: Arc<chain::Node>,
    #[allow(dead_code)]
    data_dir: TempDir,
}

/// Timing tuned for fast, deterministic tests rather than production use:
/// everything that would otherwise be measured in seconds is measured in
/// tens of milliseconds.
pub fn fast_timing() -> ConsensusTiming {
    ConsensusTiming {
        block_interval: Duration::from_millis(100),
        proposal_timeout: Duration::from_millis(200),
        heartbeat_interval: Duration::from_millis(80),
        heartbeat_timeout: Duration::from_millis(400),
        reconnect_interval: Duration::from_millis(80),
        recovery_grace_period: Duration::from_millis(250),
        view_change_cooldown: Duration::from_millis(150),
        max_block_size: 100,
        max_frame_bytes: chain::net::MAX_FRAME_BYTES,
        signatures_enabled: false,
    }
}

/// Spawns one node bound to `127.0.0.1:{port}`, dialing `peers` (each a
/// `"127.0.0.1:{port}"` string), and starts its loops in the background.
pub async fn spawn_node(
    id: &str,
    port: u16,
    peers: Vec<String>,
    validators: Arc<ValidatorSet>,
    timing: ConsensusTiming,
) -> TestNode {
    let data_dir = TempDir::new().expect("tempdir");
    let config = NodeConfig {
        node_id: validators.normalize(id),
        bind_addr: format!("127.0.0.1:{port}").parse().expect("valid loopback addr"),
        data_dir: data_dir.path().to_path_buf(),
        validators,
        peers,
        log_level: "info".to_string(),
        interactive: true,
        http_api_port: None,
        signing_key: None,
        timing,
    };
    let node = chain::Node::new(config).expect("node construction");
    let running = node.clone();
    tokio::spawn(async move {
        let _ = running.run().await;
    });
    TestNode { node, data_dir }
}

/// Polls `cond` every 20ms until it returns true or `budget` elapses,
/// returning whether it converged. Every scenario below asserts on the
/// return value so a timeout fails with a clear message instead of a
/// confusing downstream assertion.
pub async fn wait_until<F, Fut>(budget: Duration, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        if cond().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
