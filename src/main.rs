use bulkpost::api::{LateClient, MockPostingApi, PostingApi, PostingOperations, VerificationOptions};
use bulkpost::coordinator::SeriesCoordinator;
use bulkpost::id::generate_series_id;
use bulkpost::media::LocalMediaStore;
use bulkpost::optimizer::{RateLimitTier, RetryOptions};
use bulkpost::runner::{PostSchedule, SeriesJob, SeriesReport, SeriesRunner};
use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, RunArgs};
use config::Config;

/// `<data_local_dir>/bulkpost/logs/bulkpost.log`, or under `.` when the
/// platform has no data directory.
fn log_file_path(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
        .join("logs")
        .join(format!("{}.log", env!("CARGO_PKG_NAME")))
}

fn setup_logging() -> Result<()> {
    let log_file = log_file_path(dirs::data_local_dir());
    if let Some(log_dir) = log_file.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    let target = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .context("Failed to open log file")?;

    // tracing events from the library reach this logger through its `log` feature
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(target)))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run(args) => handle_run_command(args, config, cli.is_verbose()).await,
        Commands::Tiers => handle_tiers_command(config),
    }
}

fn build_api(args: &RunArgs, config: &Config) -> Result<Arc<dyn PostingApi>> {
    if args.dry_run {
        info!("Dry run: using in-memory posting service");
        return Ok(Arc::new(MockPostingApi::new()));
    }
    let client = LateClient::from_env(&config.api.api_key_env, config.api.late_config())
        .context("Failed to create posting client")?;
    Ok(Arc::new(client))
}

fn build_job(args: &RunArgs) -> Result<SeriesJob> {
    let mut job = SeriesJob::new(generate_series_id(), args.series_name(), args.text.clone());
    for target in &args.platforms {
        job = job.with_platform(target.clone());
    }
    if let Some(start) = args.start {
        let interval = chrono::TimeDelta::try_minutes(args.interval_minutes)
            .ok_or_else(|| eyre!("--interval-minutes {} is out of range", args.interval_minutes))?;
        job = job.with_schedule(PostSchedule::new(start, interval));
    }
    if let Some(tz) = &args.timezone {
        job = job.with_timezone(tz.clone());
    }
    Ok(job)
}

async fn handle_run_command(args: &RunArgs, config: &Config, verbose: bool) -> Result<()> {
    let limiter = Arc::new(config.api.limiter(args.tier));
    let operations = PostingOperations::new(build_api(args, config)?, limiter.clone())
        .with_retry(RetryOptions::from(&config.retry))
        .with_verification(VerificationOptions::from(&config.verification));

    let coordinator = Arc::new(SeriesCoordinator::with_max_concurrent(
        config.coordinator.max_concurrent_series,
    ));
    let runner = SeriesRunner::with_config(
        coordinator.clone(),
        operations,
        Arc::new(config.cache.build()),
        config.runner_config(!args.no_verify),
    );

    let job = build_job(args)?;
    let store = LocalMediaStore::new(&args.folder);

    info!("Running series {} ({}) from {}", job.series_id, job.name, args.folder.display());
    println!(
        "{} {} {}",
        "Posting:".green(),
        job.name.bold(),
        format!("[{} req/min]", limiter.limit()).dimmed()
    );

    let report = runner
        .run(&job, &store)
        .await
        .context(format!("Series {} failed", job.series_id))?;

    print_report(&report, verbose);
    if verbose && let Some(status) = coordinator.series_status(&job.series_id) {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }
    Ok(())
}

fn print_report(report: &SeriesReport, verbose: bool) {
    let state = report.state.as_str();
    let state = if report.failed == 0 {
        state.green()
    } else if report.successful == 0 {
        state.red()
    } else {
        state.yellow()
    };

    println!("{} {} ({})", "Series:".cyan(), report.series_id, state);
    println!(
        "  {} posted, {} failed",
        report.successful.to_string().green(),
        report.failed.to_string().red()
    );

    if verbose {
        for id in &report.post_ids {
            println!("  {} {}", "+".green(), id);
        }
    }
    for failure in &report.errors {
        println!("  {} #{} {}: {}", "x".red(), failure.index, failure.file, failure.message);
    }
}

fn handle_tiers_command(config: &Config) -> Result<()> {
    println!("{}", "Rate-limit tiers (requests per minute):".cyan());
    for tier in RateLimitTier::ALL {
        let line = format!("  {:<12} {:>5}", tier.as_str(), tier.per_minute());
        if tier == config.api.tier {
            println!("{} {}", line.bold(), "(configured)".green());
        } else {
            println!("{}", line);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["bulkpost", "run", "./media", "-t", "hi", "-p", "instagram:acc1"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_log_file_path() {
        let path = log_file_path(Some(PathBuf::from("/var/data")));
        assert_eq!(path, PathBuf::from("/var/data/bulkpost/logs/bulkpost.log"));
        assert_eq!(log_file_path(None), PathBuf::from("./bulkpost/logs/bulkpost.log"));
    }

    #[test]
    fn test_build_job_schedule() {
        let job = build_job(&run_args(&["--start", "2026-03-01T09:00:00Z", "--interval-minutes", "90"])).unwrap();
        let schedule = job.schedule.unwrap();
        assert_eq!(schedule.interval, chrono::TimeDelta::minutes(90));
        assert_eq!(job.name, "media");
        assert!(job.series_id.starts_with("series-"));
    }

    #[test]
    fn test_build_job_without_start_publishes_now() {
        let job = build_job(&run_args(&["--interval-minutes", "9223372036854775807"])).unwrap();
        assert!(job.schedule.is_none());
    }

    #[test]
    fn test_build_job_rejects_huge_interval() {
        let args = run_args(&["--start", "2026-03-01T09:00:00Z", "--interval-minutes", "9223372036854775807"]);
        let err = build_job(&args).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
