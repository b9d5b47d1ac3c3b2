use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use leadlens_client::{HttpSource, MatchFallback, RequestProfile};
use leadlens_core::enrich::EnrichConfig;
use leadlens_core::job::{JobRunner, LeadJob, ListKind, Target};
use leadlens_core::models::{AuthMaterial, FilterCriteria, Identity};
use leadlens_core::paginate::PageWalkConfig;
use leadlens_core::pool::CredentialPool;
use leadlens_core::progress::TracingReporter;
use leadlens_core::rotation::RotatingSource;

mod export;

use export::CsvExporter;

#[derive(Parser)]
#[command(name = "leadlens", version, about = "Audience scraper with rotating credentials")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect and enrich the followers of one or more accounts
    Followers {
        /// Account handles (without @)
        #[arg(required = true)]
        handles: Vec<String>,

        #[command(flatten)]
        scrape: ScrapeArgs,
    },

    /// Collect and enrich the accounts someone follows
    Following {
        /// Account handles (without @)
        #[arg(required = true)]
        handles: Vec<String>,

        #[command(flatten)]
        scrape: ScrapeArgs,
    },

    /// Collect and enrich recent posters under one or more hashtags
    Hashtag {
        /// Hashtags (leading # optional)
        #[arg(required = true)]
        tags: Vec<String>,

        #[command(flatten)]
        scrape: ScrapeArgs,
    },

    /// Show the credential pool: labels, fingerprints, counters
    Accounts {
        #[command(flatten)]
        pool: PoolArgs,
    },
}

#[derive(Args)]
struct PoolArgs {
    /// JSON accounts file: [{"label": "...", "cookie": "..."}]
    #[arg(long, env = "LEADLENS_ACCOUNTS_FILE")]
    accounts_file: Option<PathBuf>,

    /// Single cookie header, used when no accounts file is given
    #[arg(long, env = "LEADLENS_COOKIE", hide_env_values = true)]
    cookie: Option<String>,
}

#[derive(Args)]
struct ScrapeArgs {
    #[command(flatten)]
    pool: PoolArgs,

    /// Minimum follower count (inclusive)
    #[arg(long, default_value_t = 0)]
    min: u64,

    /// Maximum follower count (exclusive; 0 means unbounded)
    #[arg(long, default_value_t = 0)]
    max: u64,

    /// Candidates collected per target
    #[arg(long, default_value_t = 100)]
    limit: usize,

    /// Concurrent enrichment requests
    #[arg(long, default_value_t = 5)]
    concurrency: usize,

    /// Accept the top search hit when no exact handle match exists
    #[arg(long, default_value_t = false)]
    first_match: bool,

    /// Output CSV path
    #[arg(short, long, default_value = "leads.csv")]
    out: PathBuf,
}

#[derive(Deserialize)]
struct AccountEntry {
    label: String,
    cookie: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leadlens=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Followers { handles, scrape } => {
            let targets = handles
                .into_iter()
                .map(|h| Target::Handle(strip_handle(&h)))
                .collect();
            run_job(targets, ListKind::Followers, scrape).await?;
        }
        Commands::Following { handles, scrape } => {
            let targets = handles
                .into_iter()
                .map(|h| Target::Handle(strip_handle(&h)))
                .collect();
            run_job(targets, ListKind::Following, scrape).await?;
        }
        Commands::Hashtag { tags, scrape } => {
            let targets = tags
                .into_iter()
                .map(|t| Target::Hashtag(t.trim_start_matches('#').to_string()))
                .collect();
            run_job(targets, ListKind::Followers, scrape).await?;
        }
        Commands::Accounts { pool } => {
            cmd_accounts(&pool)?;
        }
    }

    Ok(())
}

fn strip_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').to_string()
}

/// Build the pool from the accounts file, falling back to the single
/// cookie. At least one identity is required.
fn build_pool(args: &PoolArgs) -> Result<CredentialPool> {
    if let Some(path) = &args.accounts_file {
        let identities = load_accounts(path)?;
        return CredentialPool::new(identities).map_err(|e| anyhow::anyhow!(e));
    }
    if let Some(cookie) = &args.cookie {
        let identity = Identity::new("default", AuthMaterial::from_cookie(cookie.clone()));
        return Ok(CredentialPool::single(identity));
    }
    bail!("No credentials: pass --accounts-file or set LEADLENS_COOKIE");
}

fn load_accounts(path: &Path) -> Result<Vec<Identity>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read accounts file {}", path.display()))?;
    let entries: Vec<AccountEntry> =
        serde_json::from_str(&raw).context("Accounts file is not a JSON array of accounts")?;
    Ok(entries
        .into_iter()
        .map(|e| Identity::new(e.label, AuthMaterial::from_cookie(e.cookie)))
        .collect())
}

async fn run_job(targets: Vec<Target>, list_kind: ListKind, args: ScrapeArgs) -> Result<()> {
    let pool = build_pool(&args.pool)?;
    tracing::info!(identities = pool.len(), targets = targets.len(), "Starting job");

    let fallback = if args.first_match {
        MatchFallback::FirstResult
    } else {
        MatchFallback::Strict
    };
    let profile = RequestProfile::default().with_match_fallback(fallback);
    let http = HttpSource::new(profile).map_err(|e| anyhow::anyhow!(e))?;
    let source = RotatingSource::new(http, pool);

    let enrich = EnrichConfig {
        concurrency: args.concurrency.max(1),
        ..EnrichConfig::default()
    };
    let runner = JobRunner::new(source, PageWalkConfig::default(), enrich);

    let job = LeadJob {
        targets,
        list_kind,
        filter: FilterCriteria::new(args.min, args.max, args.limit),
    };

    // Ctrl-C stops between targets; in-flight work settles first.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current target");
            signal_token.cancel();
        }
    });

    let reports = runner
        .run(&job, &cancel, Arc::new(TracingReporter))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    for report in &reports {
        if let Some(warning) = &report.warning {
            tracing::warn!(target = %report.target, %warning, "Target degraded");
        }
    }

    let records: Vec<_> = reports
        .into_iter()
        .flat_map(|r| r.records)
        .collect();
    if records.is_empty() {
        tracing::warn!("No records matched the filter; nothing exported");
        return Ok(());
    }

    let written = CsvExporter::write(&args.out, &records)?;
    tracing::info!(records = written, path = %args.out.display(), "Export complete");
    println!("{written} records written to {}", args.out.display());
    Ok(())
}

fn cmd_accounts(args: &PoolArgs) -> Result<()> {
    let pool = build_pool(args)?;
    println!(
        "{:<16} {:<14} {:<10} {:>9} {:>7}",
        "LABEL", "FINGERPRINT", "STATUS", "REQUESTS", "ERRORS"
    );
    for identity in pool.identities() {
        println!(
            "{:<16} {:<14} {:<10} {:>9} {:>7}",
            identity.label,
            identity.fingerprint(),
            identity.status,
            identity.request_count,
            identity.error_count
        );
    }
    Ok(())
}
