//! End-to-end cycles against the in-memory chain and store.

use std::sync::Arc;
use std::time::Duration;

use parity_scale_codec::Encode;
use tokio_util::sync::CancellationToken;

use govmirror_codec::{
    decode_referendum_info, DecidingStatus, DispatchTime, OngoingStatus, ProposalBounded,
    RawDeposit, RawOrigin, RawTally, ReferendumInfo,
};
use govmirror_indexer::{CycleReport, NetworkTarget, Reconciler};
use govmirror_nullables::{NullChain, NullClock, NullReferendumStore};
use govmirror_types::{NetworkId, ReferendumRecord, ReferendumStatus, Tally, Timestamp};

const NET: NetworkId = NetworkId::new(0);

fn target() -> NetworkTarget {
    NetworkTarget {
        id: NET,
        name: "polkadot".into(),
        ss58_prefix: 0,
        endpoints: vec!["null://primary".into(), "null://backup".into()],
    }
}

fn ongoing(ayes: u128) -> Vec<u8> {
    ReferendumInfo::Ongoing(OngoingStatus {
        track: 0,
        origin: RawOrigin::Root,
        proposal: ProposalBounded::Inline(vec![0, 1]),
        enactment: DispatchTime::After(100),
        submitted: 500,
        submission_deposit: RawDeposit { who: [7; 32], amount: 1_000 },
        decision_deposit: None,
        deciding: Some(DecidingStatus { since: 600, confirming: None }),
        tally: RawTally { ayes, nays: 10, support: 50 },
        in_queue: false,
        alarm: None,
    })
    .encode()
}

fn approved(block: u32) -> Vec<u8> {
    ReferendumInfo::Approved(block, Some(RawDeposit { who: [7; 32], amount: 1_000 }), None).encode()
}

fn row(ref_id: u32, payload: &[u8], at: u64) -> ReferendumRecord {
    decode_referendum_info(ref_id, payload)
        .unwrap()
        .into_record(NET, 0, Timestamp::new(at))
}

struct Harness {
    chain: NullChain,
    store: Arc<NullReferendumStore>,
    clock: Arc<NullClock>,
    reconciler: Arc<Reconciler<NullChain, NullReferendumStore, NullClock>>,
}

impl Harness {
    fn new(workers: usize) -> Self {
        let chain = NullChain::new();
        let store = Arc::new(NullReferendumStore::new());
        let clock = Arc::new(NullClock::new(1_000));
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(chain.clone()),
            Arc::clone(&store),
            Arc::clone(&clock),
            workers,
        ));
        Self { chain, store, clock, reconciler }
    }

    async fn cycle(&self) -> CycleReport {
        self.reconciler
            .run_cycle(&target(), &CancellationToken::new())
            .await
            .unwrap()
    }

    fn record(&self, ref_id: u32) -> Option<ReferendumRecord> {
        self.store.record(NET, ref_id)
    }
}

#[tokio::test]
async fn missing_id_is_cleared_and_new_id_is_created() {
    let h = Harness::new(4);
    for id in 0..=4 {
        h.chain.set_referendum(id, approved(900 + id));
        h.store.seed(row(id, &approved(900 + id), 1));
    }
    h.chain.set_referendum(6, ongoing(100));
    h.chain.set_referendum_count(7);

    let report = h.cycle().await;

    assert_eq!(report.planned, 2);
    assert_eq!(report.cleared, 1);
    assert_eq!(report.created, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(h.store.writes(), 2);

    let five = h.record(5).unwrap();
    assert_eq!(five.status, ReferendumStatus::Cleared);
    assert!(five.finalized);

    let six = h.record(6).unwrap();
    assert_eq!(six.status, ReferendumStatus::Ongoing);
    assert!(!six.finalized);
    assert_eq!(six.track, Some(0));

    for id in 0..=4 {
        assert_eq!(h.record(id).unwrap(), row(id, &approved(900 + id), 1));
    }
}

#[tokio::test]
async fn tally_change_updates_only_tally_and_timestamp() {
    let h = Harness::new(4);
    let before = row(8, &ongoing(100), 1);
    h.store.seed(before.clone());
    h.chain.set_referendum(8, ongoing(150));
    h.chain.set_referendum_count(9);
    h.clock.set(2_000);

    let report = h.cycle().await;
    assert_eq!(report.updated, 1);

    let mut expected = before;
    expected.tally = Some(Tally { ayes: 150, nays: 10, support: 50 });
    expected.updated_at = Timestamp::new(2_000);
    assert_eq!(h.record(8).unwrap(), expected);
}

#[tokio::test]
async fn unchanged_chain_produces_no_writes() {
    let h = Harness::new(4);
    for id in 0..5 {
        h.chain.set_referendum(id, ongoing(u128::from(id) * 10));
    }
    h.chain.set_referendum(5, approved(1_200));
    h.chain.set_referendum_count(6);

    let first = h.cycle().await;
    assert_eq!(first.created, 6);

    h.store.reset_writes();
    h.clock.advance(60);
    let second = h.cycle().await;

    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged, 5);
    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.record(0).unwrap().updated_at, Timestamp::new(1_000));
}

#[tokio::test]
async fn finalized_rows_never_change() {
    let h = Harness::new(2);
    h.chain.set_referendum(0, approved(900));
    h.chain.set_referendum(1, ongoing(1));
    h.cycle().await;
    let frozen = h.record(0).unwrap();
    assert!(frozen.finalized);

    // The chain contradicts the local row, then forgets it.
    h.chain.set_referendum(0, ongoing(5));
    h.clock.advance(60);
    h.cycle().await;
    assert_eq!(h.record(0).unwrap(), frozen);

    h.chain.remove_referendum(0);
    h.clock.advance(60);
    h.cycle().await;
    assert_eq!(h.record(0).unwrap(), frozen);
}

#[tokio::test]
async fn gaps_below_high_water_mark_are_filled() {
    let h = Harness::new(4);
    for id in 0..=15 {
        h.chain.set_referendum(id, approved(1_000 + id));
        if ![3, 7, 12].contains(&id) {
            h.store.seed(row(id, &approved(1_000 + id), 1));
        }
    }
    h.chain.set_referendum_count(16);

    let report = h.cycle().await;

    assert_eq!(report.planned, 3);
    assert_eq!(report.created, 3);
    for id in [3, 7, 12] {
        assert_eq!(h.record(id).unwrap().status, ReferendumStatus::Approved);
    }
    assert_eq!(h.store.len(), 16);
}

#[tokio::test]
async fn sparse_enumeration_fills_gap_and_new_ids_only() {
    let h = Harness::new(4);
    for id in (0..=10).filter(|id| *id != 7) {
        h.store.seed(row(id, &approved(800 + id), 1));
    }
    for id in [3, 7, 12] {
        h.chain.set_referendum(id, approved(900 + id));
    }

    let report = h.cycle().await;

    assert_eq!(report.created, 2);
    // 11 lies in the out-of-range span but is gone from chain.
    assert_eq!(report.cleared, 1);
    assert_eq!(h.record(7).unwrap().decision_end_block, 907);
    assert_eq!(h.record(12).unwrap().decision_end_block, 912);
    assert_eq!(h.record(11).unwrap().status, ReferendumStatus::Cleared);
    for id in (0..=10).filter(|id| *id != 7) {
        assert_eq!(h.record(id).unwrap(), row(id, &approved(800 + id), 1));
    }
}

#[tokio::test]
async fn fresh_store_backfills_the_whole_span() {
    let h = Harness::new(4);
    h.chain.set_referendum(2, ongoing(1));
    h.chain.set_referendum(5, approved(700));
    h.chain.set_referendum_count(7);

    let report = h.cycle().await;

    assert_eq!(report.planned, 7);
    assert_eq!(report.created, 2);
    assert_eq!(report.cleared, 5);
    for id in [0, 1, 3, 4, 6] {
        assert_eq!(h.record(id).unwrap().status, ReferendumStatus::Cleared);
    }
}

#[tokio::test]
async fn vanished_ongoing_referendum_is_cleared_keeping_metadata() {
    let h = Harness::new(2);
    for id in 0..=4 {
        h.chain.set_referendum(id, ongoing(1));
    }
    h.cycle().await;
    let before = h.record(4).unwrap();

    h.chain.remove_referendum(4);
    h.clock.advance(60);
    let report = h.cycle().await;

    assert_eq!(report.cleared, 1);
    let after = h.record(4).unwrap();
    assert_eq!(after.status, ReferendumStatus::Cleared);
    assert!(after.finalized);
    assert_eq!(after.track, before.track);
    assert_eq!(after.submitter, before.submitter);
    assert_eq!(after.submitted_block, 500);
}

#[tokio::test]
async fn undecodable_payload_leaves_existing_row_untouched() {
    let h = Harness::new(2);
    h.chain.set_referendum(3, ongoing(100));
    h.chain.set_referendum(4, ongoing(100));
    h.cycle().await;
    let before = h.record(3).unwrap();

    h.chain.set_referendum(3, vec![9, 1, 2, 3]);
    h.chain.set_referendum(4, ongoing(200));
    h.clock.advance(60);
    let report = h.cycle().await;

    assert_eq!(report.errors, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(h.record(3).unwrap(), before);
}

#[tokio::test]
async fn truncated_payload_never_erases_stored_fields() {
    let h = Harness::new(1);
    h.chain.set_referendum(3, ongoing(100));
    h.cycle().await;
    let before = h.record(3).unwrap();

    // Tag, track and origin survive; the proposal is cut short.
    h.chain.set_referendum(3, ongoing(100)[..6].to_vec());
    h.clock.advance(60);
    let report = h.cycle().await;

    assert_eq!(report.errors, 0);
    assert_eq!(report.unchanged, 1);
    assert_eq!(h.record(3).unwrap(), before);
}

#[tokio::test]
async fn per_id_timeout_is_skipped_and_retried_next_cycle() {
    let h = Harness::new(2);
    for id in 0..=4 {
        h.chain.set_referendum(id, ongoing(1));
    }
    h.chain.timeout_on(2);

    let report = h.cycle().await;
    assert!(report.aborted.is_none());
    assert_eq!(report.errors, 1);
    assert_eq!(report.created, 4);
    assert!(h.record(2).is_none());

    let retry = h.cycle().await;
    assert_eq!(retry.planned, 5);
    assert_eq!(retry.errors, 1);
    assert_eq!(retry.unchanged, 4);
}

#[tokio::test]
async fn store_write_failure_is_isolated_to_its_id() {
    let h = Harness::new(2);
    for id in 0..=3 {
        h.chain.set_referendum(id, ongoing(1));
    }
    h.store.fail_writes_for(1);

    let report = h.cycle().await;
    assert_eq!(report.errors, 1);
    assert_eq!(report.created, 3);
    assert!(h.record(1).is_none());

    h.store.clear_write_failures();
    let retry = h.cycle().await;
    assert_eq!(retry.created, 1);
}

#[tokio::test]
async fn lost_connection_aborts_cycle_and_keeps_committed_rows() {
    let h = Harness::new(1);
    for id in 0..=5 {
        h.chain.set_referendum(id, ongoing(1));
    }
    h.chain.set_referendum_count(6);
    // ReferendumCount, then ids 0 and 1.
    h.chain.drop_connection_after(3);

    let report = h.cycle().await;
    assert!(report.aborted.is_some());
    assert!(!report.cancelled);
    assert_eq!(report.created, 2);
    assert_eq!(report.processed, 3);
    assert_eq!(h.store.len(), 2);
    assert_eq!(h.chain.closes(), 1);

    let next = h.cycle().await;
    assert!(next.aborted.is_none());
    assert_eq!(next.created, 4);
    assert_eq!(h.store.len(), 6);
}

#[tokio::test]
async fn unreachable_endpoints_fail_the_cycle_without_writes() {
    let h = Harness::new(2);
    h.chain.set_referendum(0, ongoing(1));
    h.chain.set_unreachable(true);

    let result = h
        .reconciler
        .run_cycle(&target(), &CancellationToken::new())
        .await;

    assert!(result.is_err());
    assert!(h.store.is_empty());
    assert_eq!(h.chain.queries(), 0);
}

#[tokio::test(start_paused = true)]
async fn workers_run_concurrently_up_to_pool_width() {
    let wide = Harness::new(4);
    let narrow = Harness::new(1);
    for h in [&wide, &narrow] {
        for id in 0..8 {
            h.chain.set_referendum(id, ongoing(1));
        }
        h.chain.set_query_delay(Duration::from_millis(50));
    }

    // One delayed ReferendumCount read, then the ids.
    let wide_report = wide.cycle().await;
    let narrow_report = narrow.cycle().await;

    assert_eq!(wide_report.created, 8);
    assert_eq!(narrow_report.created, 8);
    // 50ms + 2 rounds of 50ms, against 50ms + 8 rounds.
    assert!(wide_report.duration < Duration::from_millis(200));
    assert!(narrow_report.duration >= Duration::from_millis(450));
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_the_cycle_after_committed_work() {
    let h = Harness::new(2);
    for id in 0..10 {
        h.chain.set_referendum(id, ongoing(1));
    }
    h.chain.set_query_delay(Duration::from_secs(1));

    let cancel = CancellationToken::new();
    let handle = {
        let reconciler = Arc::clone(&h.reconciler);
        let cancel = cancel.clone();
        tokio::spawn(async move { reconciler.run_cycle(&target(), &cancel).await })
    };

    // Count read finishes at 1s, ids 0 and 1 at 2s, ids 2 and 3 would at 3s.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    cancel.cancel();
    let report = handle.await.unwrap().unwrap();

    assert!(report.cancelled);
    assert!(report.aborted.is_none());
    assert_eq!(report.created, 2);
    assert_eq!(h.store.len(), 2);
    assert_eq!(h.chain.closes(), 1);
}

#[tokio::test]
async fn networks_are_reconciled_independently() {
    let h = Harness::new(2);
    h.chain.set_referendum(0, ongoing(1));
    h.store.seed(ReferendumRecord::cleared(NetworkId::new(1), 40, Timestamp::new(1)));

    let report = h.cycle().await;

    // Network 1's high-water mark does not hide id 0 on network 0.
    assert_eq!(report.created, 1);
    assert!(h.record(0).is_some());
    assert!(h.store.record(NetworkId::new(1), 0).is_none());
}
