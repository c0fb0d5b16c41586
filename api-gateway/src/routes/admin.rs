//! Read-only admin routes over spec.md §6's "Administrative read API".
//!
//! Every handler here only reads accessors already exposed by
//! [`chain::Node`]; none of them mutate consensus state, matching the
//! spec's framing of this HTTP surface as a non-core collaborator
//! interface layered on top of the core.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use chain::{Block, Transaction};

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HeightResponse {
    pub height: u64,
}

/// `GET /height`
pub async fn height(State(node): State<SharedState>) -> Json<HeightResponse> {
    Json(HeightResponse { height: node.height().await })
}

#[derive(Serialize)]
pub struct HeadResponse {
    pub head_hash: String,
}

/// `GET /head`
pub async fn head(State(node): State<SharedState>) -> Json<HeadResponse> {
    Json(HeadResponse { head_hash: node.head_hash().await.to_hex() })
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<Transaction>,
}

/// `GET /mempool`
pub async fn mempool(State(node): State<SharedState>) -> Json<MempoolResponse> {
    let transactions = node.mempool_all().await;
    Json(MempoolResponse { size: transactions.len(), transactions })
}

/// `GET /block/{height}`
pub async fn block(
    State(node): State<SharedState>,
    Path(height): Path<u64>,
) -> Result<Json<Block>, StatusCode> {
    node.block_at(height).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[derive(Serialize)]
pub struct LeaderResponse {
    pub height: u64,
    pub leader: String,
}

/// `GET /leader/{height}`
pub async fn leader(
    State(node): State<SharedState>,
    Path(height): Path<u64>,
) -> Json<LeaderResponse> {
    let leader = node.leader_at(height).await;
    Json(LeaderResponse { height, leader: leader.0 })
}

#[derive(Serialize)]
pub struct ValidatorsResponse {
    pub active: Vec<String>,
    pub failed: Vec<String>,
}

/// `GET /validators`
pub async fn validators(State(node): State<SharedState>) -> Json<ValidatorsResponse> {
    let active = node.active_validators().await.into_iter().map(|v| v.0).collect();
    let failed = node.failed_validators().await.into_iter().map(|v| v.0).collect();
    Json(ValidatorsResponse { active, failed })
}

#[derive(Serialize)]
pub struct ViewResponse {
    pub current_view: u64,
}

/// `GET /view`
pub async fn view(State(node): State<SharedState>) -> Json<ViewResponse> {
    Json(ViewResponse { current_view: node.current_view().await })
}

#[derive(Serialize)]
pub struct ConnectionsResponse {
    pub count: usize,
}

/// `GET /connections`
pub async fn connections(State(node): State<SharedState>) -> Json<ConnectionsResponse> {
    Json(ConnectionsResponse { count: node.connection_count().await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain::{ConsensusTiming, NodeConfig, ValidatorSet};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn test_node() -> (Arc<chain::Node>, TempDir) {
        let tmp = TempDir::new().expect("tempdir");
        let validators = Arc::new(ValidatorSet::new(["node-a"]));
        let config = NodeConfig {
            node_id: validators.normalize("node-a"),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            data_dir: tmp.path().to_path_buf(),
            validators,
            peers: Vec::new(),
            log_level: "info".to_string(),
            interactive: true,
            http_api_port: None,
            signing_key: None,
            timing: ConsensusTiming::default(),
        };
        let node = chain::Node::new(config).expect("node");
        (node, tmp)
    }

    #[tokio::test]
    async fn height_reports_genesis_on_a_fresh_node() {
        let (node, _tmp) = test_node().await;
        let resp = height(State(node)).await;
        assert_eq!(resp.0.height, 0);
    }

    #[tokio::test]
    async fn validators_reports_the_single_configured_node_as_active() {
        let (node, _tmp) = test_node().await;
        let resp = validators(State(node)).await;
        assert_eq!(resp.0.active, vec!["node-a".to_string()]);
        assert!(resp.0.failed.is_empty());
    }

    #[tokio::test]
    async fn block_at_unknown_height_is_not_found() {
        let (node, _tmp) = test_node().await;
        let result = block(State(node), Path(99)).await;
        assert_eq!(result.unwrap_err(), StatusCode::NOT_FOUND);
    }
}
