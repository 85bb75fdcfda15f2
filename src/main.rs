use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize as _;
use jiff::Zoned;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gh_actionable::config::DEFAULT_CONFIG_FILE;
use gh_actionable::output::{print_diff, print_metadata, print_snapshot};
use gh_actionable::{
    CacheStore, Config, GhCli, PrState, RefreshError, Refresher, RepoId, Scheduler, classify,
};

/// Track actionable review comments across GitHub pull requests
#[derive(Parser)]
#[command(name = "gh-actionable")]
#[command(about = "Track actionable review comments across GitHub pull requests")]
#[command(long_about = r#"gh-actionable - Track actionable review comments across GitHub pull requests

Polls a fixed list of repositories, classifies every PR comment and caches the
actionable ones as JSON for a dashboard to serve.

REQUIREMENTS:
    GitHub CLI (gh) must be installed and authenticated
    Run 'gh auth login' if not already authenticated"#)]
struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Directory holding snapshot.json and metadata.json (overrides the config file)
    #[arg(long, value_name = "DIR", global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh the cache once and print the result
    Refresh {
        /// Which pull requests to scan (overrides the config file)
        #[arg(short, long, value_enum)]
        state: Option<PrState>,
    },

    /// Keep the cache fresh on the configured schedule
    Watch {
        /// Which pull requests to scan (overrides the config file)
        #[arg(short, long, value_enum)]
        state: Option<PrState>,
    },

    /// Show when the cache was last updated
    Status,

    /// Show the cached actionable comments
    Show {
        /// List every actionable comment with a link
        #[arg(short, long)]
        verbose: bool,
    },

    /// Classify a piece of text the way comments are classified
    Classify {
        /// Comment text
        text: String,
    },

    /// Print the diff of a pull request
    Diff {
        /// Repository as owner/name
        repo: RepoId,
        /// Pull request number
        number: u64,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    if let Err(err) = run(args).await {
        eprintln!("{} {err:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(cache_dir) = args.cache_dir {
        config.cache_dir = cache_dir;
    }
    if let Command::Refresh { state: Some(state) } | Command::Watch { state: Some(state) } =
        args.command
    {
        config.pr_state = state;
    }

    let refresher = Refresher::new(
        GhCli::new(config.gh_limits()),
        config.refresh_settings(),
        CacheStore::new(&config.cache_dir),
    );

    match args.command {
        Command::Refresh { .. } => {
            warn_if_no_repositories(&config);
            let snapshot = refresher.refresh_all().await?;
            print_snapshot(&snapshot, false);
        }
        Command::Watch { .. } => {
            warn_if_no_repositories(&config);
            watch(&refresher, config.scheduler()?).await;
        }
        Command::Status => match refresher.get_metadata().await {
            Some(metadata) => print_metadata(&metadata),
            None => println!("No cache yet. Run 'gh-actionable refresh' first."),
        },
        Command::Show { verbose } => match refresher.load_cached().await {
            Some(snapshot) => print_snapshot(&snapshot, verbose),
            None => println!("No cache yet. Run 'gh-actionable refresh' first."),
        },
        Command::Classify { text } => {
            let classification = classify(Some(text.as_str()));
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Command::Diff { repo, number } => {
            let diff = refresher.source().pull_request_diff(&repo, number).await?;
            print_diff(&diff);
        }
    }

    Ok(())
}

fn warn_if_no_repositories(config: &Config) {
    if config.repositories.is_empty() {
        warn!("no repositories configured; the snapshot will be empty");
    }
}

/// Refresh on start (inside the active window) and then whenever the
/// scheduler says so, until Ctrl-C.
async fn watch(refresher: &Refresher<GhCli>, mut scheduler: Scheduler) {
    let window = scheduler.window();
    info!(
        weekdays = ?window.weekdays,
        start_hour = window.start_hour,
        end_hour = window.end_hour,
        "watching"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if scheduler.should_fire_on_start(&Zoned::now()) {
        tokio::select! {
            _ = refresh_logged(refresher) => {}
            _ = &mut shutdown => {
                info!("shutting down");
                return;
            }
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if scheduler.should_fire_now(&Zoned::now()) {
                    refresh_logged(refresher).await;
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                return;
            }
        }
    }
}

async fn refresh_logged(refresher: &Refresher<GhCli>) {
    match refresher.refresh_all().await {
        Ok(_) => {}
        Err(RefreshError::InProgress) => info!("refresh already running, skipping"),
        Err(err) => warn!(error = %err, "refresh failed"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
