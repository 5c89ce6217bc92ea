mod announce;
mod commands;
mod logging;
mod progress;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use announce::{narrated, Announcer};
use clap::Parser;
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use jarvis_core::config::load_configuration;
use jarvis_core::scheduler::run_once_now;
use jarvis_core::service::ScanService;
use jarvis_core::status_store::read_status_document;
use jarvis_core::{
    AppConfig, FileScanTask, JobStatusStore, ProcessScanTask, ScanKind, ScanScheduler,
    ScanThreshold,
};
use progress::CliReporter;
use tokio::signal;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let log_path = logging::log_file_path();
    let _guard = logging::init_logger(&log_path);

    let config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return Err(err.into());
        }
    };

    let args = Cli::parse();
    let command = args.command.unwrap_or(Commands::All);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(command, config, log_path));
    // A scan abandoned after the shutdown grace period is not waited for.
    runtime.shutdown_timeout(Duration::from_secs(1));

    if let Err(err) = &result {
        error!("Error: {:#}", err);
    }
    result
}

async fn run(command: Commands, config: AppConfig, log_path: PathBuf) -> anyhow::Result<()> {
    let announcer = Announcer;

    match command {
        Commands::Processes { limit_mb } => run_process_scan(&config, limit_mb, announcer).await,
        Commands::Files { limit_mb } => run_file_scan(&config, limit_mb, announcer).await,
        Commands::All => {
            if let Err(err) = run_process_scan(&config, None, announcer).await {
                error!("Process scan failed: {:#}", err);
            }
            run_file_scan(&config, None, announcer).await
        }
        Commands::Schedule => run_scheduler(&config, announcer).await,
        Commands::Serve => {
            let service = ScanService::new(&config, log_path);
            server::serve(service, &config.server.listen).await
        }
        Commands::Jobs => print_jobs(&config),
        Commands::PrintConfig => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
    }
}

async fn run_process_scan(
    config: &AppConfig,
    limit_mb: Option<u64>,
    announcer: Announcer,
) -> anyhow::Result<()> {
    let threshold =
        ScanThreshold::for_processes(limit_mb.unwrap_or(config.scan.process_limit_mb))?;
    let task = narrated(ScanKind::Processes, ProcessScanTask::new(threshold), announcer);

    let started = Instant::now();
    let outcome = run_once_now(Arc::new(task)).await?;
    info!(
        "Process scan: {} over {}MB in {}",
        format!("{}", outcome.count()).red(),
        threshold.limit_mb(),
        format!("{:.2}s", started.elapsed().as_secs_f64()).green(),
    );
    Ok(())
}

async fn run_file_scan(
    config: &AppConfig,
    limit_mb: Option<u64>,
    announcer: Announcer,
) -> anyhow::Result<()> {
    let threshold = ScanThreshold::for_files(limit_mb.unwrap_or(config.scan.file_limit_mb))?;
    let task = FileScanTask::from_settings(&config.scan, threshold)
        .with_reporter(Arc::new(CliReporter::new()));
    let task = narrated(ScanKind::Files, task, announcer);

    let started = Instant::now();
    let outcome = run_once_now(Arc::new(task)).await?;
    info!(
        "File scan: {} over {}MB in {}",
        format!("{}", outcome.count()).red(),
        threshold.limit_mb(),
        format!("{:.2}s", started.elapsed().as_secs_f64()).green(),
    );
    Ok(())
}

async fn run_scheduler(config: &AppConfig, announcer: Announcer) -> anyhow::Result<()> {
    let process_threshold = ScanThreshold::for_processes(config.scan.process_limit_mb)?;
    let file_threshold = ScanThreshold::for_files(config.scan.file_limit_mb)?;

    let store = Arc::new(JobStatusStore::open(config.schedule.status_path.clone()));
    let mut scheduler = ScanScheduler::new(store);
    scheduler.schedule(
        "scan_processes",
        config.schedule.process_interval(),
        narrated(ScanKind::Processes, ProcessScanTask::new(process_threshold), announcer),
    )?;
    scheduler.schedule(
        "scan_files",
        config.schedule.file_interval(),
        narrated(
            ScanKind::Files,
            FileScanTask::from_settings(&config.scan, file_threshold),
            announcer,
        ),
    )?;

    let handle = scheduler.handle();
    let grace = config.schedule.shutdown_grace();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Shutdown signal received, stopping the scheduler...");
                announcer.say("Shutting down the scheduler.");
                handle.shutdown(grace).await;
            }
            Err(err) => error!("Unable to listen for the shutdown signal: {}", err),
        }
    });

    announcer.say("Jarvis is in scheduling mode. Press Ctrl+C to exit.");
    scheduler.start().await;
    info!("Scheduler shut down");
    Ok(())
}

fn print_jobs(config: &AppConfig) -> anyhow::Result<()> {
    let path = &config.schedule.status_path;
    let Some(snapshot) = read_status_document(path)? else {
        println!(
            "No status document at {}. Is the scheduler running?",
            path.display()
        );
        return Ok(());
    };

    for status in snapshot.values() {
        let last_run = status
            .last_run_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{} [{}] last run: {}, next run: {}",
            status.job_id.cyan().bold(),
            status.last_outcome,
            last_run,
            status.next_run_at.to_rfc3339(),
        );
        if !status.last_result_summary.is_empty() {
            println!("    {}", status.last_result_summary);
        }
    }
    Ok(())
}
