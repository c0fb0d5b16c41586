// Multi-node, real-socket integration tests mirroring spec.md §8's
// testable-property scenarios. The unit tests inside
// `chain::consensus::engine` already exercise the same properties at the
// state-machine level with an in-process engine and no network; these
// tests instead drive whole `chain::Node`s over real loopback TCP
// connections, so they also cover framing, dispatch, and the
// accept/reconnector loops.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chain::{Block, ValidatorSet};

use common::{fast_timing, spawn_node, wait_until};

fn validators(names: &[&str]) -> Arc<ValidatorSet> {
    Arc::new(ValidatorSet::new(names.iter().map(|s| s.to_string())))
}

/// S1 — happy-path commit: a transaction submitted to any one of three
/// validators is proposed by the effective leader, ACKed by the other two,
/// and committed everywhere with an identical block hash and an emptied
/// mempool.
#[tokio::test(flavor = "multi_thread")]
async fn happy_path_commit_reaches_all_three_validators() {
    let vs = validators(&["node-a", "node-b", "node-c"]);
    let timing = fast_timing();

    let a = spawn_node(
        "node-a",
        18101,
        vec!["127.0.0.1:18102".into(), "127.0.0.1:18103".into()],
        vs.clone(),
        timing.clone(),
    )
    .await;
    let b = spawn_node(
        "node-b",
        18102,
        vec!["127.0.0.1:18101".into(), "127.0.0.1:18103".into()],
        vs.clone(),
        timing.clone(),
    )
    .await;
    let c = spawn_node(
        "node-c",
        18103,
        vec!["127.0.0.1:18101".into(), "127.0.0.1:18102".into()],
        vs.clone(),
        timing.clone(),
    )
    .await;

    // Give the reconnector loops time to mesh the three nodes together
    // before submitting anything.
    let meshed = wait_until(Duration::from_secs(3), || async {
        a.node.connection_count().await >= 2
            && b.node.connection_count().await >= 2
            && c.node.connection_count().await >= 2
    })
    .await;
    assert!(meshed, "nodes did not establish a full mesh in time");

    let tx = chain::Transaction::new("alice".into(), "bob".into(), 5, 1_000.0);
    let accepted = a.node.submit_transaction(tx.clone()).await;
    assert!(accepted, "a fresh transaction must be accepted into the mempool");

    let committed = wait_until(Duration::from_secs(5), || async {
        a.node.height().await >= 1 && b.node.height().await >= 1 && c.node.height().await >= 1
    })
    .await;
    assert!(committed, "all three validators should reach height 1");

    let (ha, hb, hc) = (a.node.head_hash().await, b.node.head_hash().await, c.node.head_hash().await);
    assert_eq!(ha, hb);
    assert_eq!(hb, hc);

    let block: Block = a.node.block_at(1).await.expect("block 1 must exist");
    assert_eq!(block.tx_ids(), vec![tx.tx_id.clone()]);

    assert_eq!(a.node.mempool_size().await, 0);
    assert_eq!(b.node.mempool_size().await, 0);
    assert_eq!(c.node.mempool_size().await, 0);
}

/// S3 — rejoin with a stale chain: a node that starts from genesis after
/// its peers have already committed several blocks catches up entirely
/// through the sync path driven by its own RECOVERING-state heartbeat
/// loop, without ever being the leader itself.
#[tokio::test(flavor = "multi_thread")]
async fn late_joiner_syncs_up_to_the_current_chain_height() {
    let vs = validators(&["node-a", "node-b", "node-c"]);
    let timing = fast_timing();

    let a = spawn_node(
        "node-a",
        18111,
        vec!["127.0.0.1:18112".into()],
        vs.clone(),
        timing.clone(),
    )
    .await;
    let b = spawn_node(
        "node-b",
        18112,
        vec!["127.0.0.1:18111".into()],
        vs.clone(),
        timing.clone(),
    )
    .await;

    let meshed = wait_until(Duration::from_secs(2), || async {
        a.node.connection_count().await >= 1 && b.node.connection_count().await >= 1
    })
    .await;
    assert!(meshed, "node-a and node-b did not connect in time");

    for i in 0..3u64 {
        let tx = chain::Transaction::new("alice".into(), "bob".into(), i + 1, 2_000.0 + i as f64);
        a.node.submit_transaction(tx).await;
        let reached = wait_until(Duration::from_secs(3), || async {
            a.node.height().await >= i + 1 && b.node.height().await >= i + 1
        })
        .await;
        assert!(reached, "node-a/node-b should commit block {}", i + 1);
    }

    // node-c joins late, already knowing about the full validator set, and
    // must catch up from genesis purely through the sync path.
    let c = spawn_node(
        "node-c",
        18113,
        vec!["127.0.0.1:18111".into(), "127.0.0.1:18112".into()],
        vs.clone(),
        timing.clone(),
    )
    .await;

    let target_height = a.node.height().await;
    let caught_up = wait_until(Duration::from_secs(5), || async {
        c.node.height().await >= target_height
    })
    .await;
    assert!(caught_up, "node-c should sync up to the live chain height");
    assert_eq!(c.node.head_hash().await, a.node.head_hash().await);
}

/// S4 — duplicate PROPOSE over the network: broadcasting the identical
/// transaction twice from the client side must still only ever commit it
/// once (content-addressed mempool dedup), and a directly-submitted
/// duplicate after commit must stay rejected.
#[tokio::test(flavor = "multi_thread")]
async fn resubmitting_a_committed_transaction_is_rejected() {
    let vs = validators(&["node-a", "node-b"]);
    let timing = fast_timing();

    let a = spawn_node("node-a", 18121, vec!["127.0.0.1:18122".into()], vs.clone(), timing.clone()).await;
    let b = spawn_node("node-b", 18122, vec!["127.0.0.1:18121".into()], vs.clone(), timing.clone()).await;

    let meshed = wait_until(Duration::from_secs(2), || async {
        a.node.connection_count().await >= 1 && b.node.connection_count().await >= 1
    })
    .await;
    assert!(meshed, "node-a and node-b did not connect in time");

    let tx = chain::Transaction::new("alice".into(), "bob".into(), 7, 3_000.0);
    assert!(a.node.submit_transaction(tx.clone()).await);
    // Resubmitting the identical, still-pending transaction before it
    // commits must not double-count it in the mempool.
    assert!(!a.node.submit_transaction(tx.clone()).await);

    let committed = wait_until(Duration::from_secs(3), || async {
        a.node.height().await >= 1 && b.node.height().await >= 1
    })
    .await;
    assert!(committed, "node-a/node-b should commit height 1");

    // Once committed, the same tx_id must never be re-admitted, e.g. from
    // a late-arriving duplicate broadcast.
    assert!(!a.node.submit_transaction(tx.clone()).await);
    assert!(!b.node.submit_transaction(tx).await);
}

/// S6 — bad prev_hash: a PROPOSE whose `prev_hash` does not match the
/// receiver's tip is validated and dropped; no state mutation follows.
#[tokio::test(flavor = "multi_thread")]
async fn propose_with_mismatched_prev_hash_is_rejected_without_mutation() {
    let vs = validators(&["node-a", "node-b"]);
    let timing = fast_timing();

    let a = spawn_node("node-a", 18131, vec!["127.0.0.1:18132".into()], vs.clone(), timing.clone()).await;
    let b = spawn_node("node-b", 18132, vec!["127.0.0.1:18131".into()], vs.clone(), timing.clone()).await;

    let meshed = wait_until(Duration::from_secs(2), || async {
        a.node.connection_count().await >= 1 && b.node.connection_count().await >= 1
    })
    .await;
    assert!(meshed, "node-a and node-b did not connect in time");

    // node-b is the effective leader for height 1 in this two-validator
    // set ((1 + view 0) mod 2 == 1 == sorted index of "node-b"), so a
    // forged PROPOSE "from" node-b isolates the prev_hash check rather
    // than also tripping the leader-match check.
    assert_eq!(a.node.leader_at(1).await, chain::ValidatorId::from("node-b"));

    let bad_block = Block::new(
        1,
        chain::Hash256::from_hex(&"ab".repeat(32)).expect("valid hex"),
        4_000.0,
        "node-b".to_string(),
        Vec::new(),
    );

    let mut stream = tokio::net::TcpStream::connect("127.0.0.1:18131").await.expect("connect to node-a");
    let env = chain::Envelope::new(
        chain::ValidatorId::from("node-b"),
        4_000.0,
        chain::Message::Propose { block: bad_block },
    );
    chain::net::write_frame(&mut stream, &env).await.expect("write malicious frame");

    // A bad PROPOSE produces no observable effect, so there is nothing to
    // poll for; give the (correctly silent) rejection time to happen and
    // assert the chain never advanced.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(a.node.height().await, 0);
    assert_eq!(b.node.height().await, 0);
}
