use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use issue_archiver::config::expand_dir;
use issue_archiver::state::{EventType, StateStore};
use issue_archiver::{
    discover, ArchiveError, ArchiveWriter, Config, FileFormat, GitHubClient, RepoSelection,
    SyncEngine, SyncOptions, SyncSummary,
};

#[derive(Parser)]
#[command(name = "issue-archiver")]
#[command(about = "Archive issues and their comments to Markdown and JSON files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync issues from GitHub to local files
    Github(GithubArgs),

    /// Show sync records and recent events of a save directory
    Status {
        /// Directory the issues were saved to
        #[arg(long)]
        save_dir: Option<String>,

        /// Number of recent events to show
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Args)]
struct GithubArgs {
    /// GitHub token, can be obtained with 'gh auth token'
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: String,

    /// Download issues for every repository of this organization
    #[arg(long)]
    org: Option<String>,

    /// Download issues for this repository, as owner/name (repeatable)
    #[arg(long = "repo", value_name = "OWNER/NAME")]
    repos: Vec<String>,

    /// Download issues updated on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Resume from each repository's last successful sync
    #[arg(long, overrides_with = "no_resume")]
    resume: bool,

    /// Ignore previous syncs
    #[arg(long, overrides_with = "resume")]
    no_resume: bool,

    /// Include archived repositories
    #[arg(long, overrides_with = "no_archived")]
    archived: bool,

    /// Exclude archived repositories
    #[arg(long, overrides_with = "archived")]
    no_archived: bool,

    /// Include closed issues
    #[arg(long, overrides_with = "no_closed")]
    closed: bool,

    /// Only download open issues
    #[arg(long, overrides_with = "closed")]
    no_closed: bool,

    /// Directory to save the issues to
    #[arg(long)]
    save_dir: Option<String>,

    /// Formats to save (defaults to MD and JSON)
    #[arg(long, value_enum, value_delimiter = ',', num_args = 1..)]
    formats: Vec<FileFormat>,

    /// URL of the GitHub API
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    init_logging(cli.verbose, &config.logging.level);
    info!("Starting issue-archiver v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Github(args) => cmd_github(args, &config).await,
        Commands::Status { save_dir, limit } => cmd_status(save_dir, limit, &config),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

fn parse_date(value: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected a date as YYYY-MM-DD: {}", e))
}

/// Resolve a `--flag` / `--no-flag` pair against its configured default
fn resolve_flag(yes: bool, no: bool, default: bool) -> bool {
    if yes {
        true
    } else if no {
        false
    } else {
        default
    }
}

fn resolve_save_dir(flag: Option<&str>, config: &Config) -> Result<PathBuf> {
    match flag {
        Some(dir) => expand_dir(dir),
        None => Ok(PathBuf::from(&config.output.save_dir)),
    }
}

/// Sync issues of the selected repositories
async fn cmd_github(args: GithubArgs, config: &Config) -> Result<()> {
    // Everything that can be wrong with the flags is reported before any request
    let selection = RepoSelection::from_args(args.org.as_deref(), &args.repos)?;

    let include_archived = resolve_flag(
        args.archived,
        args.no_archived,
        config.filters.include_archived,
    );
    let include_closed = resolve_flag(args.closed, args.no_closed, config.filters.include_closed);
    let resume = resolve_flag(args.resume, args.no_resume, false);

    let formats = if args.formats.is_empty() {
        config.output.formats.clone()
    } else {
        args.formats.clone()
    };
    if formats.is_empty() {
        return Err(ArchiveError::Configuration("No output formats selected".to_string()).into());
    }

    let save_dir = resolve_save_dir(args.save_dir.as_deref(), config)?;
    let api_url = args
        .url
        .clone()
        .unwrap_or_else(|| config.github.api_url.clone());

    if let (Some(date), true) = (args.date, resume) {
        info!(
            "--date {} takes precedence over --resume; stored sync records are ignored",
            date
        );
    }

    println!("🔍 Discovering repositories...");
    let client = Arc::new(GitHubClient::new(&args.token, &api_url).await?);
    let repos = discover(client.as_ref(), &selection, include_archived).await?;
    println!("   Found {} repositories", repos.len());

    if repos.is_empty() {
        println!("\n✅ Nothing to archive");
        return Ok(());
    }

    std::fs::create_dir_all(&save_dir)
        .with_context(|| format!("Failed to create save directory: {:?}", save_dir))?;

    let state = StateStore::open_for_save_dir(&save_dir)?;
    let writer = ArchiveWriter::new(&save_dir, &formats, config.output.preserve_timestamps);
    let options = SyncOptions {
        since_date: args.date,
        resume,
        include_closed,
    };
    let engine = SyncEngine::new(client, state, writer, options);

    println!("\n📥 Archiving issues to {}", save_dir.display());
    let summary = engine.run(&repos).await?;
    print_summary(&summary);

    Ok(())
}

fn print_summary(summary: &SyncSummary) {
    println!("\n🎉 Archival Complete!");
    println!("   📊 Total repositories: {}", summary.total_repositories);
    println!("   ✅ Succeeded: {}", summary.succeeded);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⏭️  Skipped (no matching issues): {}", summary.skipped);
    println!("   📝 Issues archived: {}", summary.issues_archived);
    println!(
        "   💾 Files written: {} ({} unchanged)",
        summary.files_written, summary.files_unchanged
    );
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.has_failures() {
        println!("\n🔍 Failed Repositories:");
        for (repo, error) in summary.failures() {
            println!("   ❌ {}: {}", repo, error);
        }
    }
}

/// Show sync records and recent events
fn cmd_status(save_dir: Option<String>, limit: u32, config: &Config) -> Result<()> {
    let save_dir = resolve_save_dir(save_dir.as_deref(), config)?;

    if !StateStore::state_dir(&save_dir).exists() {
        println!("No archive state found in {}", save_dir.display());
        return Ok(());
    }

    let state = StateStore::open_for_save_dir(&save_dir)?;
    let records = state.list_sync_records()?;

    println!("📊 Sync records ({}):", records.len());
    for record in &records {
        println!(
            "   📁 {}: last synced {} ({} issues{}) via {}",
            record.full_name,
            record.last_synced_at.format("%Y-%m-%d %H:%M:%S UTC"),
            record.issues_archived,
            if record.include_closed { "" } else { ", open only" },
            record.api_url
        );
    }

    let events = state.recent_events(limit)?;
    if !events.is_empty() {
        println!("\n🕒 Recent events:");
        for event in events {
            let icon = match event.event_type {
                EventType::Failed => "❌",
                EventType::Empty => "⏭️ ",
                EventType::Synced => "✅",
            };
            println!(
                "   {} {} {}: {}",
                icon,
                event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                event.repo_full_name.as_deref().unwrap_or("-"),
                event.summary
            );
            if let Some(details) = &event.details {
                println!("      {}", details);
            }
        }
    }

    Ok(())
}
