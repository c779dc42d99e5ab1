//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: post every media file of a folder as one series
//! - tiers: list the rate-limit tiers

use bulkpost::api::PlatformTarget;
use bulkpost::optimizer::RateLimitTier;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bulkpost - bulk-schedule a folder of media as a social post series
#[derive(Parser, Debug)]
#[command(name = "bulkpost")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Post every media file in a folder as one series
    Run(RunArgs),

    /// List the rate-limit tiers
    Tiers,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Folder holding the media files
    pub folder: PathBuf,

    /// Caption used for every post
    #[arg(short, long)]
    pub text: String,

    /// Target as platform:account_id (repeatable)
    #[arg(short, long = "platform", required = true)]
    pub platforms: Vec<PlatformTarget>,

    /// Series name (defaults to the folder name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Publish time of the first post (RFC 3339); omit to publish now
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// Minutes between scheduled posts
    #[arg(long, default_value_t = 60)]
    pub interval_minutes: i64,

    /// Timezone sent with scheduled posts
    #[arg(long)]
    pub timezone: Option<String>,

    /// Rate-limit tier (overrides config)
    #[arg(long)]
    pub tier: Option<RateLimitTier>,

    /// Skip post verification
    #[arg(long)]
    pub no_verify: bool,

    /// Use an in-memory posting service instead of the real API
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Series name, falling back to the folder name.
    pub fn series_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.folder.display().to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse_run(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run(run) => run,
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["bulkpost"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["bulkpost", "-v", "tiers"]).unwrap();
        assert!(cli.is_verbose());
        assert!(matches!(cli.command, Commands::Tiers));
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["bulkpost", "tiers", "-c", "/path/to/bulkpost.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/bulkpost.yml")));
    }

    #[test]
    fn test_run_minimal() {
        let run = parse_run(&["bulkpost", "run", "./media", "-t", "hello", "-p", "instagram:acc1"]);
        assert_eq!(run.folder, PathBuf::from("./media"));
        assert_eq!(run.text, "hello");
        assert_eq!(run.platforms, vec![PlatformTarget::new("instagram", "acc1")]);
        assert_eq!(run.interval_minutes, 60);
        assert!(run.start.is_none());
        assert!(run.tier.is_none());
        assert!(!run.no_verify);
        assert!(!run.dry_run);
        assert_eq!(run.series_name(), "media");
    }

    #[test]
    fn test_run_full() {
        let run = parse_run(&[
            "bulkpost",
            "run",
            "/srv/drop",
            "--text",
            "caption",
            "--platform",
            "instagram:a",
            "--platform",
            "tiktok:b",
            "--name",
            "Spring",
            "--start",
            "2026-03-01T09:00:00Z",
            "--interval-minutes",
            "1440",
            "--timezone",
            "Europe/Berlin",
            "--tier",
            "free",
            "--no-verify",
            "--dry-run",
        ]);
        assert_eq!(run.platforms.len(), 2);
        assert_eq!(run.series_name(), "Spring");
        assert_eq!(run.start.unwrap().to_rfc3339(), "2026-03-01T09:00:00+00:00");
        assert_eq!(run.interval_minutes, 1440);
        assert_eq!(run.timezone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(run.tier, Some(RateLimitTier::Free));
        assert!(run.no_verify);
        assert!(run.dry_run);
    }

    #[test]
    fn test_run_requires_platform() {
        assert!(Cli::try_parse_from(["bulkpost", "run", "./media", "-t", "hello"]).is_err());
    }

    #[test]
    fn test_run_rejects_bad_platform() {
        assert!(Cli::try_parse_from(["bulkpost", "run", "./m", "-t", "x", "-p", "instagram"]).is_err());
    }

    #[test]
    fn test_run_rejects_bad_tier() {
        assert!(Cli::try_parse_from(["bulkpost", "run", "./m", "-t", "x", "-p", "a:b", "--tier", "gold"]).is_err());
    }

    #[test]
    fn test_help_works() {
        Cli::command().debug_assert();
    }
}
