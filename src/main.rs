//! SDV Orchestrator - State-Aware Vehicle Application Orchestrator
//!
//! Decides, once per cycle, which vehicle applications run and at which
//! fidelity mode, subject to a shared network bandwidth budget, with
//! UX-aware admission control and graceful mode degradation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sdv_orchestrator::{config::Config, orchestrator::Orchestrator};

/// State-Aware Vehicle Application Orchestrator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Named UX profile to apply (overrides the configured one)
    #[arg(short, long)]
    profile: Option<String>,

    /// Run duration in seconds (overrides the configured one)
    #[arg(short, long)]
    duration: Option<u64>,

    /// Seconds between control cycles (overrides the configured value)
    #[arg(long)]
    cycle_period: Option<u64>,

    /// Restrict applications to their preferred mode (no degradation)
    #[arg(long)]
    baseline: bool,

    /// Random seed for reproducibility
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Path to output results file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Dry run mode (validate configuration without execution)
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    info!("SDV Orchestrator v{}", env!("CARGO_PKG_VERSION"));
    info!("-----------------------------------");

    // Load configuration; a missing default file falls back to defaults.
    let mut config = if args.config.exists() {
        info!("Loading configuration from {:?}", args.config);
        Config::from_file(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?
    } else {
        info!("Config file {:?} not found, using defaults", args.config);
        Config::default()
    };

    // Apply command-line overrides
    if let Some(profile) = args.profile {
        info!(profile = %profile, "Overriding UX profile");
        config.profiles.profile = Some(profile);
    }
    if let Some(duration) = args.duration {
        config.orchestrator.duration_secs = duration;
    }
    if let Some(period) = args.cycle_period {
        config.orchestrator.cycle_period_secs = period;
    }
    if args.baseline {
        info!("Baseline mode - degradation disabled");
        config.orchestrator.baseline = true;
    }

    config.validate().context("Configuration validation failed")?;
    info!("Configuration validated successfully");

    if args.dry_run {
        info!("Dry run mode - exiting after validation");
        return Ok(());
    }

    let duration = Duration::from_secs(config.orchestrator.duration_secs);

    info!("Initializing orchestrator...");
    let mut orchestrator =
        Orchestrator::new(config, args.seed).context("Failed to initialize orchestrator")?;

    // Set up graceful shutdown handler
    let handle = orchestrator.handle();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received shutdown signal");
                handle.shutdown();
            }
            Err(err) => {
                warn!("Error listening for shutdown signal: {}", err);
            }
        }
    });

    info!("Starting control loop ({} seconds)...", duration.as_secs());
    orchestrator.run(duration).await?;

    let results = orchestrator.collect_results();
    info!("-----------------------------------");
    info!("Results Summary:");
    info!("  Cycles: {}", results.cycles);
    info!(
        "  Decisions: {} ({} selected, {} downgraded, {} rejected)",
        results.decisions_total, results.selected, results.downgraded, results.rejected
    );
    info!("  Deploy failures: {}", results.deploy_failures);
    info!("  State changes: {}", results.state_changes);
    info!(
        "  Global UX: mean {:.2}, min {:.2}, max {:.2}",
        results.ux_mean, results.ux_min, results.ux_max
    );
    info!(
        "  Bandwidth: mean {:.2} Mbps, peak {:.2} Mbps",
        results.bandwidth_mean_mbps, results.bandwidth_peak_mbps
    );
    info!("  Plan time: {:.1} μs mean", results.plan_time_mean_us);

    if let Some(output_path) = args.output {
        info!("Writing results to {:?}", output_path);
        results
            .write_json(&output_path)
            .with_context(|| format!("Failed to write results to {:?}", output_path))?;
    }

    info!("SDV Orchestrator shutdown complete");
    Ok(())
}

/// Initialize the logging subsystem
fn init_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(filter)
        .init();

    Ok(())
}
