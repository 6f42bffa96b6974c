//! SONiC nhgorchd entry point.
//!
//! Runs the next-hop group synchronization engine against the in-memory
//! switch, either replaying a recorded intent file or idling until
//! interrupted.

use anyhow::Context;
use clap::Parser;
use log::{error, info};
use nhgorchd::audit::{init_logging, init_logging_pretty};
use nhgorchd::config::{LogFormat, NhgOrchConfig};
use nhgorchd::replay::Replayer;
use nhgorchd::{NhgDaemon, NhgSyncOrch};
use sonic_sai::VirtualSwitch;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// SONiC Next-Hop Group Synchronization Daemon
#[derive(Parser, Debug)]
#[command(name = "nhgorchd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = "/etc/sonic/nhgorchd.conf")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Maximum hardware next-hop groups; overrides the config file
    #[arg(long)]
    max_nhg_count: Option<u32>,

    /// Batch size for consumer table operations; overrides the config file
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,

    /// Replay a JSON-lines intent file and exit
    #[arg(short = 'r', long)]
    replay: Option<PathBuf>,

    /// Group capacity the in-memory switch reports
    #[arg(long, default_value = "512")]
    switch_capacity: u32,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match NhgOrchConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("nhgorchd: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(max) = args.max_nhg_count {
        config.capacity.max_nhg_count = max;
    }
    if let Some(batch_size) = args.batch_size {
        config.daemon.batch_size = batch_size;
    }
    if let Err(e) = config.validate() {
        eprintln!("nhgorchd: {}", e);
        return ExitCode::FAILURE;
    }

    match config.logging.format {
        LogFormat::Plain => env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(&config.logging.level),
        )
        .init(),
        LogFormat::Json => init_logging(&config.logging.level),
        LogFormat::Pretty => init_logging_pretty(&config.logging.level),
    }

    info!("====================================================================");
    info!("Starting SONiC nhgorchd");
    info!("====================================================================");
    info!("Config: {}", args.config.display());
    info!("Batch size: {}", config.daemon.batch_size);
    info!("Heartbeat interval: {}ms", config.daemon.heartbeat_interval_ms);
    info!("Switch capacity: {}", args.switch_capacity);

    match run(args, config).await {
        Ok(()) => {
            info!("nhgorchd exited cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("nhgorchd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: NhgOrchConfig) -> anyhow::Result<()> {
    let switch = Arc::new(VirtualSwitch::new(args.switch_capacity));
    let orch = NhgSyncOrch::new(switch.clone(), &config);
    let (daemon, sender) = NhgDaemon::new(&config, orch);
    let daemon = tokio::spawn(daemon.run());

    match &args.replay {
        Some(path) => {
            let intents = Replayer::new(switch.clone())
                .load(path)
                .with_context(|| format!("failed to load replay file {}", path.display()))?;
            info!("Replaying {} intents from {}", intents.len(), path.display());
            for intent in intents {
                sender
                    .send(intent)
                    .await
                    .context("daemon stopped before the replay finished")?;
            }
        }
        None => {
            info!("No replay file, waiting for Ctrl-C");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            info!("Received Ctrl-C, shutting down");
        }
    }
    drop(sender);

    let stats = daemon.await.context("daemon task panicked")?;
    info!(
        "Summary: {}",
        serde_json::to_string(&stats).context("failed to encode statistics")?
    );
    info!(
        "Switch: {} groups, {} members, {} routes, {} next hops",
        switch.group_count(),
        switch.member_count(),
        switch.route_count(),
        switch.next_hop_count()
    );
    Ok(())
}
