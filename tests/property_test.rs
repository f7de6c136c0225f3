// tests/property_test.rs

//! Randomized property tests, using the `proptest` dev-dependency.
//! Complements the fixed-example unit tests embedded next to the code they
//! cover; these exist for the properties that only mean something over a
//! generated input space.

use fleetd::core::backup::model::{BackupJob, BackupTarget, ReplicationMode, RetentionPolicy};
use fleetd::core::cluster::commands::{ClusterCommand, ClusterCommandKind, ClusterNote};
use fleetd::core::cluster::fsm::ClusterFsm;
use fleetd::core::cluster::node::{Node, NodeStatus};
use fleetd::core::guest::reservations::ReservationTable;
use fleetd::core::replication::match_engine::{compute_match, snapshots_after};
use fleetd::core::adapters::zfs::SnapshotInfo;

use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

fn arb_node_status() -> impl Strategy<Value = NodeStatus> {
    prop_oneof![
        Just(NodeStatus::Online),
        Just(NodeStatus::Offline),
        Just(NodeStatus::Joining),
        Just(NodeStatus::Leaving),
    ]
}

fn arb_replication_mode() -> impl Strategy<Value = ReplicationMode> {
    prop_oneof![
        Just(ReplicationMode::Sync),
        Just(ReplicationMode::Clone),
        Just(ReplicationMode::Revert),
        Just(ReplicationMode::Rotate),
    ]
}

/// Generates one of the command kinds that can actually land via the API
/// surface (membership, notes, backup targets/jobs) — the event-lifecycle
/// variants need a live job/event id to mean anything, so they're exercised
/// by the fixed unit tests in `fsm.rs` instead.
fn arb_command_kind() -> impl Strategy<Value = ClusterCommandKind> {
    prop_oneof![
        (any::<u128>(), "[a-z0-9.-]{1,16}", arb_node_status()).prop_map(|(seed, hostname, status)| {
            ClusterCommandKind::NodeJoin(Node {
                node_uuid: Uuid::from_u128(seed),
                hostname,
                api_endpoint: "http://127.0.0.1:9000".to_string(),
                status,
                raft_address: "127.0.0.1:9001".to_string(),
                last_heartbeat_ms: 0,
            })
        }),
        any::<u128>().prop_map(|seed| ClusterCommandKind::NodeLeave { node_uuid: Uuid::from_u128(seed) }),
        (any::<u128>(), arb_node_status())
            .prop_map(|(seed, status)| ClusterCommandKind::NodeStatus { node_uuid: Uuid::from_u128(seed), status }),
        (any::<u128>(), "[a-zA-Z0-9 ]{0,32}", "[a-zA-Z0-9 ]{0,32}").prop_map(|(seed, title, body)| {
            ClusterCommandKind::NoteCreate(ClusterNote {
                id: Uuid::from_u128(seed),
                title,
                body,
                created_at: 0,
                updated_at: 0,
            })
        }),
        (any::<u128>(), "[a-zA-Z0-9/:@.-]{1,32}").prop_map(|(seed, endpoint)| {
            ClusterCommandKind::BackupTargetCreate(BackupTarget {
                id: Uuid::from_u128(seed),
                name: "target".to_string(),
                endpoint,
                enabled: true,
                validated_at: None,
                last_error: None,
            })
        }),
        (any::<u128>(), any::<u128>(), arb_replication_mode()).prop_map(|(seed, target_seed, mode)| {
            ClusterCommandKind::BackupJobCreate(BackupJob {
                id: Uuid::from_u128(seed),
                name: "job".to_string(),
                target_id: Uuid::from_u128(target_seed),
                source_dataset: "tank/guests".to_string(),
                schedule: "every 60s".to_string(),
                mode,
                bandwidth_limit_bytes_per_sec: None,
                retention_policy: RetentionPolicy { retain: 7, prefix: "auto".to_string() },
                enabled: true,
                runner_node: None,
            })
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    /// Replaying the exact same committed command against the same FSM
    /// state must be a no-op the second time: `monotonic_seq` dedupe by
    /// issuer is what lets a node safely re-apply a log entry after crash
    /// recovery without double-counting its effect.
    #[test]
    fn fsm_apply_is_idempotent_on_replay(issuer in any::<u128>(), seq in 1u64..1000, kind in arb_command_kind()) {
        let command = ClusterCommand::new(Uuid::from_u128(issuer), seq, kind);

        let mut once = ClusterFsm::new(64);
        let changed_first = once.apply(&command);
        prop_assert!(changed_first, "first apply of a fresh command should always observe a change");

        let mut twice = ClusterFsm::new(64);
        twice.apply(&command);
        let changed_second = twice.apply(&command);

        prop_assert!(!changed_second, "re-applying the same (issuer, seq) must be a no-op");

        let snapshot_once = serde_json::to_value(&once).unwrap();
        let snapshot_twice = serde_json::to_value(&twice).unwrap();
        prop_assert_eq!(snapshot_once, snapshot_twice, "replay must not change the FSM's visible state");
    }

    /// A strictly higher `monotonic_seq` from the same issuer must always
    /// apply, regardless of how many times earlier sequence numbers from
    /// that issuer are replayed first.
    #[test]
    fn fsm_higher_seq_always_applies_after_replay(issuer in any::<u128>(), seq in 1u64..500, kind in arb_command_kind(), next_kind in arb_command_kind()) {
        let issuer = Uuid::from_u128(issuer);
        let first = ClusterCommand::new(issuer, seq, kind);
        let second = ClusterCommand::new(issuer, seq + 1, next_kind);

        let mut fsm = ClusterFsm::new(64);
        fsm.apply(&first);
        fsm.apply(&first); // stale replay, should be dropped
        let changed = fsm.apply(&second);

        prop_assert!(changed, "a strictly newer sequence number must always be accepted");
    }
}

fn snap(name: &str, guid: &str, txg: u64) -> SnapshotInfo {
    SnapshotInfo { name: name.to_string(), guid: guid.to_string(), createtxg: txg }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, ..ProptestConfig::default() })]

    /// The match-then-sync law: whatever `compute_match` picks as the
    /// common base, every snapshot `snapshots_after` returns must be
    /// strictly newer than it, and the base itself (when present) must
    /// never appear in that set — otherwise an incremental send would
    /// either replay work already on the destination or skip a step.
    #[test]
    fn match_then_sync_law(
        shared_count in 0usize..5,
        source_only_count in 0usize..5,
        dest_diverged in any::<bool>(),
    ) {
        let mut txg = 1u64;
        let mut source = Vec::new();
        let mut destination = Vec::new();

        for i in 0..shared_count {
            let s = snap(&format!("shared-{i}"), &format!("guid-shared-{i}"), txg);
            txg += 1;
            source.push(s.clone());
            destination.push(s);
        }

        if dest_diverged && !destination.is_empty() {
            // destination has a snapshot not reachable from the source at all
            destination.push(snap("dest-only", "guid-dest-only", txg));
            txg += 1;
        }

        for i in 0..source_only_count {
            source.push(snap(&format!("src-only-{i}"), &format!("guid-src-only-{i}"), txg));
            txg += 1;
        }

        let result = compute_match(!destination.is_empty(), &source, &destination);

        if let Some(base) = &result.common_base {
            prop_assert!(source.iter().any(|s| s.guid == base.guid), "common base must come from the source list");
            prop_assert!(destination.iter().any(|d| d.guid == base.guid), "common base must also exist on the destination");

            let after = snapshots_after(&source, Some(base));
            prop_assert!(!after.iter().any(|s| s.guid == base.guid), "common base must never reappear in the to-send set");
            prop_assert!(after.iter().all(|s| s.createtxg > base.createtxg), "every snapshot to send must be strictly newer than the common base");
        } else if !destination.is_empty() {
            // no shared snapshot at all and destination is non-empty: divergence must be flagged
            prop_assert!(result.diverged, "a non-empty destination with no common base is by definition diverged");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

    /// Concurrent reservation attempts for the same VNC port must never
    /// both succeed — exactly one thread should win the race, regardless
    /// of how many threads contend for it.
    #[test]
    fn vnc_port_reservation_is_exclusive_under_concurrency(contender_count in 2usize..8) {
        let table = Arc::new(ReservationTable::new());
        let port = 5950u16;

        let handles: Vec<_> = (0..contender_count)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    let reservation = table.reserve(&[], &[], Some(port));
                    let won = reservation.is_ok();
                    // hold the reservation alive past every other thread's attempt
                    thread::sleep(std::time::Duration::from_millis(5));
                    drop(reservation);
                    won
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();

        prop_assert_eq!(wins, 1, "exactly one contender may hold the port at a time");
        prop_assert!(table.reserve(&[], &[], Some(port)).is_ok(), "the port must be free again once every reservation has been dropped");
    }
}
