mod actuals;
mod auth;
mod config;
mod dashboard;
mod documents;
mod error;
mod loader;
mod models;
mod reconcile;
mod render;
mod storage;
mod utils;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::auth::{Session, StaticCredentials};
use crate::config::{AppConfig, CollectionConfig};
use crate::dashboard::{interactive, Dashboard, Section};
use crate::loader::{discover_document_files, load_documents};
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "results-viewer", about = "Quarterly results vs predictions viewer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Sign-in name for one-shot commands
    #[arg(long, env = "RV_USERNAME", global = true)]
    username: Option<String>,

    /// Sign-in password for one-shot commands
    #[arg(long, env = "RV_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CollectionKind {
    Announcements,
    Previews,
    Actuals,
}

#[derive(Subcommand)]
enum Command {
    /// Apply schema migrations without loading data
    Migrate,

    /// Bulk-load JSON / NDJSON document dumps into a collection
    Load {
        kind: CollectionKind,
        /// A dump file or a directory of them
        path: PathBuf,
    },

    /// Show document counts per collection
    Stats,

    /// List the company selection options
    Companies,

    /// Latest announcements for a company
    News {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print each stored announcement document under its card
        #[arg(long)]
        raw: bool,
    },

    /// Predicted vs actual table and broker estimates for a company
    Results { query: String },

    /// Full page: announcements, results and broker estimates
    Show {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print each stored announcement document under its card
        #[arg(long)]
        raw: bool,
    },

    /// Write a company's broker estimates to CSV
    Export {
        query: String,
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Sign in and browse companies from a prompt
    Interactive,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "results_viewer=info,warn",
        1 => "results_viewer=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load().context("Loading configuration")?;
    let repo = Repository::open(&config.store.path)
        .with_context(|| format!("Opening store {:?}", config.store.path))?;
    if config.store.run_migrations {
        repo.run_migrations(&config.collections())?;
    }

    let (username, password) = (cli.username.as_deref(), cli.password.as_deref());
    match cli.command {
        Command::Migrate => {
            repo.run_migrations(&config.collections())?;
            println!("Migrations applied.");
        }

        Command::Load { kind, path } => {
            let _t = utils::Timer::start(format!("Load {:?}", kind));
            let coll = collection_for(&config, kind)?;
            let files = discover_document_files(&path)?;
            if files.is_empty() {
                bail!("No .json/.ndjson/.jsonl files at {:?}", path);
            }
            info!("Found {} dump files at {:?}", files.len(), path);

            let mut total = 0usize;
            let mut errors = 0usize;
            for file in &files {
                let loaded = load_documents(file)
                    .and_then(|docs| Ok(repo.insert_documents(&coll, &docs)?));
                match loaded {
                    Ok(n) => total += n,
                    Err(e) => {
                        warn!("Error loading {:?}: {:#}", file, e);
                        errors += 1;
                    }
                }
            }
            info!("Done: {} documents inserted, {} errors", total, errors);
        }

        Command::Stats => {
            println!("─────────────────────────────────");
            println!("  Results Viewer — Store Stats");
            println!("─────────────────────────────────");
            println!("  Store : {}", config.store.path.display());
            for coll in config.collections() {
                let count = repo
                    .document_count(&coll)
                    .map(|n| utils::fmt_grouped(n as f64, 0))
                    .unwrap_or_else(|e| format!("unavailable ({})", e));
                println!("  {}.{} : {}", coll.database, coll.collection, count);
            }
            println!("─────────────────────────────────");
        }

        Command::Interactive => {
            let auth = StaticCredentials::from(&config.auth);
            let mut dashboard = Dashboard::new(config, &repo);
            let stdin = std::io::stdin();
            interactive::run(&mut dashboard, &auth, stdin.lock(), std::io::stdout())?;
        }

        Command::Companies => {
            let (mut dashboard, _session) = viewer(config, &repo, username, password)?;
            print!("{}", render::options(dashboard.company_options()?));
        }

        Command::News { query, limit, raw } => {
            let (mut dashboard, session) = viewer(config, &repo, username, password)?;
            let page = dashboard.evaluate(&session, &query, limit)?;
            print!("{}", render::news(&page.news, page.news_limit, raw));
        }

        Command::Results { query } => {
            let (mut dashboard, session) = viewer(config, &repo, username, password)?;
            let page = dashboard.evaluate(&session, &query, None)?;
            print!("{}", render::results(&page.results));
        }

        Command::Show { query, limit, raw } => {
            let (mut dashboard, session) = viewer(config, &repo, username, password)?;
            let page = dashboard.evaluate(&session, &query, limit)?;
            print!("{}", render::page(&page, raw));
            if matches!(page.news, Section::Degraded(_)) || matches!(page.results, Section::Degraded(_)) {
                warn!("Some sections could not be loaded");
            }
        }

        Command::Export { query, out } => {
            let (mut dashboard, session) = viewer(config, &repo, username, password)?;
            match dashboard.export(&session, &query, &out)? {
                Some(path) => println!("Exported {}", path.display()),
                None => println!("ℹ {}", crate::dashboard::NO_BROKERS),
            }
        }
    }

    Ok(())
}

fn collection_for(config: &AppConfig, kind: CollectionKind) -> Result<CollectionConfig> {
    Ok(match kind {
        CollectionKind::Announcements => config.announcements.clone(),
        CollectionKind::Previews => config.previews.clone(),
        CollectionKind::Actuals => config
            .actuals_collection()
            .context("Actuals are disabled (actuals.source = \"none\")")?,
    })
}

/// A dashboard plus a session signed in with the command-line credentials.
fn viewer<'r>(
    config: AppConfig,
    repo: &'r Repository,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<(Dashboard<'r>, Session)> {
    let (Some(username), Some(password)) = (username, password) else {
        bail!("Sign-in required: pass --username/--password or set RV_USERNAME/RV_PASSWORD");
    };
    let mut session = Session::default();
    if !session.sign_in(&StaticCredentials::from(&config.auth), username, password, false) {
        bail!("Invalid credentials");
    }
    Ok((Dashboard::new(config, repo), session))
}
