//! govmirror daemon: mirrors OpenGov referenda of configured networks into
//! a local LMDB store.

mod commands;
mod metrics_server;

use std::path::PathBuf;

use clap::Parser;

use govmirror_indexer::{init_logging, IndexerConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "govmirror", about = "OpenGov referendum indexer", version)]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; CLI
    /// flags and env vars override them.
    #[arg(long, env = "GOVMIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the LMDB store.
    #[arg(long, env = "GOVMIRROR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter, e.g. "info" or "debug,govmirror_rpc=trace".
    #[arg(long, env = "GOVMIRROR_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output: "human" or "json".
    #[arg(long, env = "GOVMIRROR_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Worker pool width per cycle.
    #[arg(long, env = "GOVMIRROR_WORKERS")]
    workers: Option<usize>,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "GOVMIRROR_METRICS_PORT")]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Poll every enabled network until interrupted.
    Run,
    /// Run one cycle per network and exit.
    Once {
        /// Networks by name or id; all enabled networks when omitted.
        networks: Vec<String>,
    },
    /// Print stored referenda of a network as JSON.
    Show {
        network: String,
        /// A single referendum; every stored one when omitted.
        ref_id: Option<u32>,
    },
    /// Follow new block headers of a network.
    Heads {
        network: String,
        /// Stop after this many headers.
        #[arg(long)]
        count: Option<usize>,
    },
    /// Print the effective configuration.
    Config,
}

/// File (or defaults) first, then CLI/env overrides, then validation.
fn load_config(cli: &Cli) -> anyhow::Result<IndexerConfig> {
    let mut config = match &cli.config {
        Some(path) => IndexerConfig::from_toml_file(path)?,
        None => IndexerConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics_port = Some(port);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format, &config.log_level)?;

    match cli.command {
        Command::Run => commands::run(config).await,
        Command::Once { networks } => commands::once(config, &networks).await,
        Command::Show { network, ref_id } => commands::show(&config, &network, ref_id),
        Command::Heads { network, count } => commands::heads(&config, &network, count).await,
        Command::Config => commands::print_config(&config),
    }
}
