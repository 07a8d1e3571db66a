//! Subcommand implementations.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use govmirror_indexer::{
    schedules, CycleReport, IndexerConfig, IndexerMetrics, Indexer, NetworkTarget, Reconciler,
    ShutdownController,
};
use govmirror_rpc::{connect, WsConnector};
use govmirror_store::ReferendumStore;
use govmirror_store_lmdb::{LmdbEnvironment, LmdbReferendumStore};
use govmirror_types::SystemClock;

use crate::metrics_server;

type LiveIndexer = Indexer<WsConnector, LmdbReferendumStore, SystemClock>;

fn build_indexer(
    config: &IndexerConfig,
    env: &LmdbEnvironment,
    metrics: Option<Arc<IndexerMetrics>>,
) -> LiveIndexer {
    let reconciler = Reconciler::new(
        Arc::new(WsConnector::new(config.client_options())),
        Arc::new(env.referendum_store()),
        Arc::new(SystemClock),
        config.workers,
    );
    Indexer::new(reconciler, metrics)
}

fn open_store(config: &IndexerConfig) -> anyhow::Result<LmdbEnvironment> {
    LmdbEnvironment::open_verified(&config.data_dir)
        .with_context(|| format!("opening store at {}", config.data_dir.display()))
}

/// Poll every enabled network until SIGINT/SIGTERM.
pub async fn run(config: IndexerConfig) -> anyhow::Result<()> {
    let env = open_store(&config)?;
    let shutdown = ShutdownController::new();

    let metrics = match config.metrics_port {
        Some(_) => Some(Arc::new(IndexerMetrics::new()?)),
        None => None,
    };
    let server = match (config.metrics_port, &metrics) {
        (Some(port), Some(metrics)) => Some(tokio::spawn(metrics_server::serve(
            port,
            Arc::clone(metrics),
            shutdown.child_token(),
        ))),
        _ => None,
    };

    let schedules = schedules(&config);
    if schedules.is_empty() {
        warn!("no enabled networks, nothing to do");
        return Ok(());
    }
    for schedule in &schedules {
        info!(
            network = %schedule.target.name,
            endpoints = schedule.target.endpoints.len(),
            interval_secs = schedule.interval.as_secs(),
            "scheduling network"
        );
    }

    let indexer = Arc::new(build_indexer(&config, &env, metrics));
    let loops = tokio::spawn(Arc::clone(&indexer).run(schedules, shutdown.child_token()));

    shutdown.wait_for_signal().await;
    shutdown.shutdown();

    loops.await.context("network loops panicked")?;
    if let Some(server) = server {
        server.await.context("metrics server panicked")??;
    }
    info!("govmirror exited cleanly");
    Ok(())
}

fn summary(name: &str, report: &CycleReport) -> String {
    format!(
        "{name}: planned={} created={} updated={} cleared={} unchanged={} errors={} in {:.1}s",
        report.planned,
        report.created,
        report.updated,
        report.cleared,
        report.unchanged,
        report.errors,
        report.duration.as_secs_f64(),
    )
}

/// Run a single cycle for the named networks (all enabled ones when empty).
///
/// Fails if any network's cycle failed or aborted.
pub async fn once(config: IndexerConfig, networks: &[String]) -> anyhow::Result<()> {
    let targets: Vec<NetworkTarget> = if networks.is_empty() {
        config.enabled_networks().map(NetworkTarget::from).collect()
    } else {
        networks
            .iter()
            .map(|key| config.network(key).map(NetworkTarget::from))
            .collect::<Result<_, _>>()?
    };

    let env = open_store(&config)?;
    let shutdown = ShutdownController::new();
    let indexer = Arc::new(build_indexer(&config, &env, None));

    let token = shutdown.child_token();
    let results = tokio::select! {
        results = indexer.run_once(targets, token) => results,
        _ = shutdown.wait_for_signal() => {
            anyhow::bail!("interrupted");
        }
    };

    let mut failed = Vec::new();
    for (name, result) in results {
        match result {
            Ok(report) => {
                println!("{}", summary(&name, &report));
                if let Some(reason) = report.aborted {
                    println!("{name}: aborted: {reason}");
                    failed.push(name);
                }
            }
            Err(e) => {
                println!("{name}: failed: {e}");
                failed.push(name);
            }
        }
    }
    if !failed.is_empty() {
        anyhow::bail!("cycle failed for {}", failed.join(", "));
    }
    Ok(())
}

/// Print stored records of a network as JSON.
pub fn show(config: &IndexerConfig, network: &str, ref_id: Option<u32>) -> anyhow::Result<()> {
    let network = config.network(network)?;
    let env = open_store(config)?;
    let store = env.referendum_store();

    match ref_id {
        Some(ref_id) => {
            let record = store
                .get_record(network.id, ref_id)?
                .with_context(|| format!("{} #{ref_id} is not stored", network.name))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        None => {
            for record in store.list_records(network.id)? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
    }
    Ok(())
}

/// Follow new block headers of a network.
pub async fn heads(
    config: &IndexerConfig,
    network: &str,
    count: Option<usize>,
) -> anyhow::Result<()> {
    let network = config.network(network)?;
    let client = connect(&network.endpoints, &config.client_options()).await?;
    info!(network = %network.name, endpoint = %client.endpoint(), "following new heads");

    let shutdown = ShutdownController::new();
    let mut subscription = client.subscribe_new_heads().await?;
    let mut seen = 0usize;

    loop {
        let next = tokio::select! {
            next = subscription.next() => next,
            _ = shutdown.wait_for_signal() => break,
        };
        match next {
            Some(Ok(header)) => {
                println!("#{} parent {}", header.number, header.parent_hash);
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            Some(Err(e)) => warn!(error = %e, "undecodable header"),
            None => {
                warn!("subscription ended");
                break;
            }
        }
    }

    if let Err(e) = subscription.unsubscribe().await {
        warn!(error = %e, "unsubscribe failed");
    }
    client.close().await;
    Ok(())
}

/// Print the effective configuration as TOML.
pub fn print_config(config: &IndexerConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
