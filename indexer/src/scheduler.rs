//! Per-network cycle loops.
//!
//! Each enabled network runs its own loop on its own interval. Cycles of one
//! network never overlap; a slow cycle delays the next tick instead of
//! queueing a burst.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use govmirror_rpc::ChainConnector;
use govmirror_store::ReferendumStore;
use govmirror_types::Clock;

use crate::config::IndexerConfig;
use crate::engine::{CycleReport, NetworkTarget, Reconciler};
use crate::metrics::IndexerMetrics;
use crate::IndexerError;

const REPORT_CHANNEL_CAPACITY: usize = 64;

/// A network and how often it is reconciled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkSchedule {
    pub target: NetworkTarget,
    pub interval: Duration,
}

/// Schedules for every enabled network in `config`.
pub fn schedules(config: &IndexerConfig) -> Vec<NetworkSchedule> {
    config
        .enabled_networks()
        .map(|network| NetworkSchedule {
            target: NetworkTarget::from(network),
            interval: config.poll_interval(network),
        })
        .collect()
}

pub struct Indexer<C, S, K> {
    reconciler: Arc<Reconciler<C, S, K>>,
    metrics: Option<Arc<IndexerMetrics>>,
    reports: broadcast::Sender<CycleReport>,
}

impl<C, S, K> Indexer<C, S, K>
where
    C: ChainConnector,
    S: ReferendumStore + 'static,
    K: Clock + 'static,
{
    pub fn new(reconciler: Reconciler<C, S, K>, metrics: Option<Arc<IndexerMetrics>>) -> Self {
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            reconciler: Arc::new(reconciler),
            metrics,
            reports,
        }
    }

    /// Receive a [`CycleReport`] after every cycle that produced one.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleReport> {
        self.reports.subscribe()
    }

    pub fn reconciler(&self) -> &Reconciler<C, S, K> {
        &self.reconciler
    }

    /// Run one cycle, record it and publish the report.
    pub async fn cycle(
        &self,
        target: &NetworkTarget,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, IndexerError> {
        match self.reconciler.run_cycle(target, cancel).await {
            Ok(report) => {
                if let Some(reason) = &report.aborted {
                    warn!(
                        network = %target.name,
                        processed = report.processed,
                        reason = %reason,
                        "cycle aborted"
                    );
                } else {
                    info!(
                        network = %target.name,
                        planned = report.planned,
                        created = report.created,
                        updated = report.updated,
                        cleared = report.cleared,
                        unchanged = report.unchanged,
                        errors = report.errors,
                        cancelled = report.cancelled,
                        elapsed_ms = report.duration.as_millis() as u64,
                        "cycle finished"
                    );
                }
                if let Some(metrics) = &self.metrics {
                    metrics.observe_cycle(&report);
                }
                // No subscribers is fine.
                let _ = self.reports.send(report.clone());
                Ok(report)
            }
            Err(e) => {
                error!(network = %target.name, error = %e, "cycle failed");
                if let Some(metrics) = &self.metrics {
                    metrics.observe_failed_cycle(&target.name);
                }
                Err(e)
            }
        }
    }

    /// Loop cycles for one network until `cancel` fires.
    ///
    /// The first cycle starts immediately. A failed cycle is logged and the
    /// loop waits for the next tick.
    pub async fn run_network(&self, schedule: NetworkSchedule, cancel: CancellationToken) {
        let NetworkSchedule { target, interval } = schedule;
        info!(network = %target.name, interval_secs = interval.as_secs(), "network loop started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let _ = self.cycle(&target, &cancel.child_token()).await;
            if cancel.is_cancelled() {
                break;
            }
        }
        info!(network = %target.name, "network loop stopped");
    }

    /// Run every network loop concurrently until `cancel` fires and all
    /// loops have returned.
    pub async fn run(self: Arc<Self>, schedules: Vec<NetworkSchedule>, cancel: CancellationToken) {
        let mut loops = JoinSet::new();
        for schedule in schedules {
            let indexer = Arc::clone(&self);
            let token = cancel.child_token();
            loops.spawn(async move { indexer.run_network(schedule, token).await });
        }
        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "network loop task failed");
            }
        }
    }

    /// One cycle per network, run concurrently, results in input order.
    pub async fn run_once(
        self: Arc<Self>,
        targets: Vec<NetworkTarget>,
        cancel: CancellationToken,
    ) -> Vec<(String, Result<CycleReport, IndexerError>)> {
        let mut set = JoinSet::new();
        for (index, target) in targets.into_iter().enumerate() {
            let indexer = Arc::clone(&self);
            let token = cancel.child_token();
            set.spawn(async move {
                let result = indexer.cycle(&target, &token).await;
                (index, target.name, result)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => results.push(entry),
                Err(e) => error!(error = %e, "cycle task failed"),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, name, result)| (name, result))
            .collect()
    }
}
