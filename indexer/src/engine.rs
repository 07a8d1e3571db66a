//! One reconciliation cycle of one network.
//!
//! connect → plan → drain the work set through a fixed pool of workers →
//! close. Workers share the connection read-only and talk to each other only
//! through the store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use govmirror_codec::{
    decode_referendum_count, decode_referendum_info, referendum_count_address,
    referendum_id_from_address, referendum_info_address, referendum_info_prefix,
};
use govmirror_rpc::{ChainConnector, ChainReader};
use govmirror_store::{ReferendumStore, StoreError};
use govmirror_types::{Clock, NetworkId};

use crate::config::NetworkConfig;
use crate::planner::{plan_work, PlanInput, WorkItem, WorkPlan, WorkReason};
use crate::reconcile::{reconcile, Fetched, Outcome};
use crate::tracing_spans::{cycle_span, reconcile_span};
use crate::IndexerError;

/// The identity and endpoints of the chain a cycle runs against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkTarget {
    pub id: NetworkId,
    pub name: String,
    pub ss58_prefix: u16,
    pub endpoints: Vec<String>,
}

impl From<&NetworkConfig> for NetworkTarget {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            ss58_prefix: config.ss58_prefix,
            endpoints: config.endpoints.clone(),
        }
    }
}

/// Summary of one cycle, broadcast to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub network_id: NetworkId,
    pub network_name: String,
    /// Size of the work set.
    pub planned: usize,
    /// Ids a worker took off the queue.
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub cleared: usize,
    pub unchanged: usize,
    /// Per-id failures; they do not fail the cycle.
    pub errors: usize,
    /// Set when a lost connection stopped the cycle early.
    pub aborted: Option<String>,
    /// Set when shutdown interrupted the cycle.
    pub cancelled: bool,
    pub duration: Duration,
}

impl CycleReport {
    fn new(target: &NetworkTarget) -> Self {
        Self {
            network_id: target.id,
            network_name: target.name.clone(),
            planned: 0,
            processed: 0,
            created: 0,
            updated: 0,
            cleared: 0,
            unchanged: 0,
            errors: 0,
            aborted: None,
            cancelled: false,
            duration: Duration::ZERO,
        }
    }

    /// Ids that ended in a write.
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.cleared
    }

    fn absorb(&mut self, tally: &WorkerTally) {
        self.processed += tally.processed;
        self.created += tally.created;
        self.updated += tally.updated;
        self.cleared += tally.cleared;
        self.unchanged += tally.unchanged;
        self.errors += tally.errors;
    }
}

#[derive(Debug, Default)]
struct WorkerTally {
    processed: usize,
    created: usize,
    updated: usize,
    cleared: usize,
    unchanged: usize,
    errors: usize,
}

impl WorkerTally {
    fn count(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created(_) => self.created += 1,
            Outcome::Updated { .. } => self.updated += 1,
            Outcome::Cleared(_) => self.cleared += 1,
            Outcome::Unchanged | Outcome::Frozen => self.unchanged += 1,
        }
    }
}

/// Runs reconciliation cycles against a chain connector and a store.
pub struct Reconciler<C, S, K> {
    connector: Arc<C>,
    store: Arc<S>,
    clock: Arc<K>,
    workers: usize,
}

struct WorkerContext<R, S, K> {
    reader: Arc<R>,
    store: Arc<S>,
    clock: Arc<K>,
    network: NetworkId,
    ss58_prefix: u16,
    token: CancellationToken,
    abort_reason: Mutex<Option<String>>,
}

impl<C, S, K> Reconciler<C, S, K>
where
    C: ChainConnector,
    S: ReferendumStore + 'static,
    K: Clock + 'static,
{
    pub fn new(connector: Arc<C>, store: Arc<S>, clock: Arc<K>, workers: usize) -> Self {
        Self {
            connector,
            store,
            clock,
            workers: workers.max(1),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one cycle for `target`.
    ///
    /// Fails only when the cycle cannot start: no endpoint answers, the
    /// store cannot be read, or the key enumeration fails. Per-id errors and
    /// a connection lost mid-cycle are reported in the [`CycleReport`].
    pub async fn run_cycle(
        &self,
        target: &NetworkTarget,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, IndexerError> {
        let span = cycle_span(&target.name, target.id);
        self.cycle(target, cancel).instrument(span).await
    }

    async fn cycle(
        &self,
        target: &NetworkTarget,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, IndexerError> {
        let started = Instant::now();
        let mut report = CycleReport::new(target);

        let reader = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return Ok(report);
            }
            reader = self.connector.connect(&target.endpoints) => Arc::new(reader?),
        };

        let result = self.drive(target, &reader, cancel, &mut report).await;
        reader.close().await;
        report.duration = started.elapsed();
        result.map(|()| report)
    }

    async fn drive(
        &self,
        target: &NetworkTarget,
        reader: &Arc<C::Reader>,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Result<(), IndexerError> {
        let plan = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return Ok(());
            }
            plan = self.plan(target, reader.as_ref()) => plan?,
        };
        report.planned = plan.len();
        info!(
            planned = plan.len(),
            new = plan.count(WorkReason::New),
            gap = plan.count(WorkReason::Gap),
            recheck = plan.count(WorkReason::Recheck),
            missing = plan.count(WorkReason::Missing),
            out_of_range = plan.count(WorkReason::OutOfRange),
            "work set planned"
        );
        if plan.is_empty() {
            return Ok(());
        }

        // Cancelled by shutdown through the parent, or by a worker that
        // lost the connection.
        let token = cancel.child_token();
        let ctx = Arc::new(WorkerContext {
            reader: Arc::clone(reader),
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            network: target.id,
            ss58_prefix: target.ss58_prefix,
            token: token.clone(),
            abort_reason: Mutex::new(None),
        });
        let width = self.workers.min(plan.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(plan.into_items())));

        let mut workers = JoinSet::new();
        for _ in 0..width {
            workers.spawn(run_worker(Arc::clone(&ctx), Arc::clone(&queue)).in_current_span());
        }
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(tally) => report.absorb(&tally),
                Err(e) => error!(error = %e, "worker task failed"),
            }
        }

        report.aborted = ctx
            .abort_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        report.cancelled = cancel.is_cancelled();
        Ok(())
    }

    async fn plan(
        &self,
        target: &NetworkTarget,
        reader: &C::Reader,
    ) -> Result<WorkPlan, IndexerError> {
        let high_water_mark = self.store.max_ref_id(target.id)?;
        let unfinalized = self.store.unfinalized_ref_ids(target.id)?;

        let keys = reader.enumerate_keys(&referendum_info_prefix()).await?;
        let mut on_chain = Vec::with_capacity(keys.len());
        for key in &keys {
            match referendum_id_from_address(key) {
                Some(id) => on_chain.push(id),
                None => warn!(key = %key, "unrecognised key under ReferendumInfoFor"),
            }
        }

        let referendum_count = match reader.query_storage(&referendum_count_address()).await {
            Ok(Some(raw)) => match decode_referendum_count(&raw) {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!(error = %e, "undecodable ReferendumCount");
                    None
                }
            },
            Ok(None) => None,
            Err(e) if e.is_connection_lost() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "ReferendumCount unavailable");
                None
            }
        };

        debug!(
            high_water_mark = ?high_water_mark,
            unfinalized = unfinalized.len(),
            on_chain = on_chain.len(),
            referendum_count = ?referendum_count,
            "planning inputs"
        );

        let input = PlanInput {
            high_water_mark,
            unfinalized: &unfinalized,
            on_chain: &on_chain,
            referendum_count,
        };
        let plan = plan_work(&input, |id| self.store.exists_record(target.id, id))?;
        if plan.truncated() {
            warn!(planned = plan.len(), "out-of-range span truncated, remainder next cycle");
        }
        Ok(plan)
    }
}

fn next_item(queue: &Mutex<VecDeque<WorkItem>>) -> Option<WorkItem> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

async fn run_worker<R, S, K>(
    ctx: Arc<WorkerContext<R, S, K>>,
    queue: Arc<Mutex<VecDeque<WorkItem>>>,
) -> WorkerTally
where
    R: ChainReader,
    S: ReferendumStore + 'static,
    K: Clock + 'static,
{
    let mut tally = WorkerTally::default();
    loop {
        if ctx.token.is_cancelled() {
            break;
        }
        let Some(item) = next_item(&queue) else {
            break;
        };

        let result = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => break,
            result = process(&ctx, item).instrument(reconcile_span(item.ref_id)) => result,
        };
        tally.processed += 1;

        match result {
            Ok(outcome) => tally.count(&outcome),
            Err(e) if e.is_connection_lost() => {
                tally.errors += 1;
                warn!(ref_id = item.ref_id, error = %e, "connection lost, aborting cycle");
                ctx.abort_reason
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_or_insert_with(|| e.to_string());
                ctx.token.cancel();
                break;
            }
            Err(e) => {
                tally.errors += 1;
                warn!(
                    ref_id = item.ref_id,
                    reason = ?item.reason,
                    error = %e,
                    "referendum skipped"
                );
            }
        }
    }
    tally
}

async fn process<R, S, K>(
    ctx: &WorkerContext<R, S, K>,
    item: WorkItem,
) -> Result<Outcome, IndexerError>
where
    R: ChainReader,
    S: ReferendumStore,
    K: Clock,
{
    let existing = ctx.store.get_record(ctx.network, item.ref_id)?;
    if existing.as_ref().is_some_and(|r| r.finalized) {
        return Ok(Outcome::Frozen);
    }

    let raw = ctx
        .reader
        .query_storage(&referendum_info_address(item.ref_id))
        .await?;
    let fetched = match raw {
        None => Fetched::Absent,
        Some(bytes) => {
            let decoded = decode_referendum_info(item.ref_id, &bytes)?;
            if !decoded.complete {
                debug!(len = bytes.len(), "payload decoded partially");
            }
            Fetched::Decoded(decoded)
        }
    };

    let outcome = reconcile(
        ctx.network,
        ctx.ss58_prefix,
        item.ref_id,
        existing.as_ref(),
        fetched,
        ctx.clock.now(),
    );

    if let Some(record) = outcome.record() {
        match ctx.store.upsert_record(record) {
            Ok(()) => {}
            // Finalized by someone else since we read it.
            Err(StoreError::Finalized { .. }) => return Ok(Outcome::Frozen),
            Err(e) => return Err(e.into()),
        }
    }

    match &outcome {
        Outcome::Created(r) => debug!(status = %r.status, "created"),
        Outcome::Cleared(_) => debug!("cleared"),
        Outcome::Updated { record, changed } => {
            debug!(status = %record.status, changed = ?changed, "updated")
        }
        Outcome::Unchanged | Outcome::Frozen => {}
    }
    Ok(outcome)
}
