//! Task driver agent.
//!
//! Runs tasks through a registered driver and recovers them after a restart.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use taskdriver_agent::{
    builtin_registry, Config, HandleStore, HealthMonitor, TaskOutcome, TaskReport, TaskRunner,
};
use taskdriver_core::{Resources, TaskConfig};
use taskdriver_plugin::CancellationToken;
use taskdriver_sim::SimTaskConfig;

/// Task driver agent.
#[derive(Parser, Debug)]
#[command(name = "taskdriver-agent", about = "Run and supervise tasks through a task driver")]
struct Args {
    /// Directory holding persisted task handles
    #[arg(long, global = true, default_value = "taskdriver-state")]
    state_dir: PathBuf,

    /// Driver to use
    #[arg(long, global = true, default_value = "sim")]
    driver: String,

    /// Driver configuration as JSON
    #[arg(long, global = true)]
    driver_config: Option<String>,

    /// Grace period before a stopped task is killed
    #[arg(long, global = true, default_value = "5")]
    stop_timeout_secs: u64,

    /// Signal sent on stop (driver default when empty)
    #[arg(long, global = true, default_value = "")]
    stop_signal: String,

    /// Stats sampling interval
    #[arg(long, global = true, default_value = "1000")]
    stats_interval_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a task and supervise it until it exits
    #[command(name = "run")]
    Run {
        /// Task name
        name: String,

        /// How long the simulated workload runs; runs until stopped if unset
        #[arg(long)]
        run_for_ms: Option<u64>,

        /// Exit code of the simulated workload
        #[arg(long, default_value = "0")]
        exit_code: i32,

        /// Memory reservation in MB
        #[arg(long, default_value = "256")]
        memory_mb: i64,

        /// CPU shares
        #[arg(long, default_value = "100")]
        cpu_shares: i64,

        /// Full driver task configuration as JSON; overrides the workload flags
        #[arg(long)]
        task_config: Option<String>,

        /// Start the task and exit without supervising it
        #[arg(long)]
        detach: bool,
    },

    /// Recover persisted tasks and supervise them until they exit
    #[command(name = "recover")]
    Recover,

    /// Stop a persisted task
    #[command(name = "stop")]
    Stop {
        /// Task ID
        id: String,
    },

    /// List available drivers
    #[command(name = "drivers")]
    Drivers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("taskdriver=info".parse()?))
        .init();

    let driver_config = match &args.driver_config {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::Value::Null,
    };
    let config = Config {
        state_dir: args.state_dir,
        driver: args.driver,
        driver_config,
        stop_timeout: Duration::from_secs(args.stop_timeout_secs),
        stop_signal: args.stop_signal,
        stats_interval: Duration::from_millis(args.stats_interval_ms),
        ..Default::default()
    };

    let registry = builtin_registry()?;
    if let Commands::Drivers = args.command {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let client = registry.dispense(&config.driver, &config.driver_config).await?;
    info!(
        driver = %client.name(),
        version = %client.info().plugin_version,
        api_version = %client.api_version(),
        state_dir = %config.state_dir.display(),
        "Starting taskdriver agent"
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping tasks");
                shutdown.cancel();
            }
        });
    }

    let health = Arc::new(HealthMonitor::spawn(&client, &shutdown).await?);
    let store = HandleStore::open(&config.state_dir).await?;
    let runner = TaskRunner::new(client, store, config).with_health(health);

    match args.command {
        Commands::Run {
            name,
            run_for_ms,
            exit_code,
            memory_mb,
            cpu_shares,
            task_config,
            detach,
        } => {
            let task = match task_config {
                Some(raw) => {
                    let value: serde_json::Value = serde_json::from_str(&raw)?;
                    TaskConfig::new(name).with_driver_config(&value)?
                }
                None => TaskConfig::new(name).with_driver_config(&SimTaskConfig {
                    run_for_ms,
                    exit_code,
                    ..Default::default()
                })?,
            }
            .with_resources(Resources::new(cpu_shares, memory_mb));

            if detach {
                let (handle, network) = runner.start(task).await?;
                println!("{}", handle.task_id());
                if let Some(network) = network {
                    info!(
                        task_id = %handle.task_id(),
                        ip = %network.ip,
                        ports = ?network.port_map,
                        "Task network"
                    );
                }
                return Ok(());
            }

            let report = runner.run(task, &shutdown).await?;
            print_report(&report);
            if !report.outcome.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Recover => {
            let recovered = runner.recover_all().await?;
            let supervisors: Vec<_> = recovered
                .into_iter()
                .map(|task_id| {
                    let runner = runner.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move { runner.supervise(&task_id, &shutdown).await })
                })
                .collect();

            for supervisor in supervisors {
                match supervisor.await {
                    Ok(Ok(report)) => print_report(&report),
                    Ok(Err(e)) => error!(error = %e, "Supervision failed"),
                    Err(e) => error!(error = %e, "Supervisor panicked"),
                }
            }
        }
        Commands::Stop { id } => {
            let handle = runner.store().load(&id.as_str().into()).await?;
            runner.recover(&handle).await?;
            runner.stop(handle.task_id()).await?;
            let report = runner.supervise(handle.task_id(), &shutdown).await?;
            print_report(&report);
        }
        Commands::Drivers => {}
    }

    Ok(())
}

fn print_report(report: &TaskReport) {
    match &report.outcome {
        TaskOutcome::Exited(result) => println!(
            "{}: exited code={} signal={}{}",
            report.task_id,
            result.exit_code,
            result.signal,
            if result.oom_killed { " (oom killed)" } else { "" }
        ),
        TaskOutcome::Unknown { error, .. } => {
            warn!(task_id = %report.task_id, "Outcome unknown, handle kept for recovery");
            println!("{}: unknown ({error})", report.task_id);
        }
    }
    if let Some(bytes) = report.peak_memory_bytes {
        println!("{}: peak memory {} bytes", report.task_id, bytes);
    }
}
