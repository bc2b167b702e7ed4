//! # Universe MCP CLI (`umcp`)
//!
//! Scrapes the MCP directory, enriches server records from GitHub, builds
//! static JSON indexes, and searches or serves them.
//!
//! ## Usage
//!
//! ```bash
//! umcp --config ./config/umcp.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `umcp scrape <kind>` | Scrape servers, clients, use-cases, or all |
//! | `umcp enrich` | Enrich server records from their detail pages and GitHub |
//! | `umcp index` | Rebuild `indexes/*.json` from the record files |
//! | `umcp search [keyword]` | Search servers in the generated index |
//! | `umcp validate` | Check every record file; non-zero exit on errors |
//! | `umcp stats` | Enrichment coverage report |
//! | `umcp serve` | Serve the web UI and indexes |
//! | `umcp update` | Scrape all kinds, then rebuild indexes |
//!
//! ## Examples
//!
//! ```bash
//! # Resume an interrupted server scrape
//! umcp scrape servers --resume
//!
//! # Enrich 50 official servers, even recently enriched ones
//! umcp enrich --classification official --limit 50 --force
//!
//! # Machine-readable search
//! umcp search database --category database --json
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use universe_mcp::config::{self, Config};
use universe_mcp::enrich::{run_enrich, EnrichOptions};
use universe_mcp::index::run_index;
use universe_mcp::models::{Classification, RecordKind};
use universe_mcp::progress::ProgressMode;
use universe_mcp::scrape::{run_scrape, ScrapeOptions};
use universe_mcp::search::{run_search, SearchQuery};
use universe_mcp::server::run_server;
use universe_mcp::stats::run_stats;
use universe_mcp::update::{run_update, UpdateOptions};
use universe_mcp::validate::run_validate;

const DEFAULT_CONFIG: &str = "./config/umcp.toml";

/// Universe MCP — a local catalog of MCP servers, clients and use cases.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/umcp.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "umcp",
    about = "Universe MCP — scrape, enrich, index and search the MCP ecosystem",
    version,
    long_about = "Universe MCP scrapes a public directory of MCP servers, clients and use cases, \
    enriches server records with README and repository metadata from GitHub, and publishes \
    grouped JSON indexes that can be searched from the CLI or served to a static web UI."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/umcp.toml`. When the default file does not
    /// exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Scrape directory list pages into record files.
    ///
    /// Saves one JSON file per card. Existing files are merged, so fields
    /// added by enrichment survive a re-scrape. Progress is checkpointed
    /// after every page.
    Scrape {
        /// What to scrape: `servers`, `clients`, `use-cases`, or `all`.
        kind: String,

        /// First page to fetch.
        #[arg(long)]
        start: Option<u32>,

        /// Last page to fetch (defaults to the detected page count).
        #[arg(long)]
        end: Option<u32>,

        /// Continue after the last checkpointed page.
        #[arg(long)]
        resume: bool,

        /// Scrape only the first two pages.
        #[arg(long)]
        test: bool,

        /// Progress output on stderr: `off`, `human`, or `json`.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// Enrich server records from detail pages and GitHub.
    ///
    /// Adds source URL, README-derived capabilities and install commands,
    /// repository metadata, categories, and a quality score. Records
    /// enriched within `[enrich].skip_recent_days` are skipped unless
    /// `--force` is given.
    Enrich {
        /// Maximum number of records to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Only enrich servers of this classification.
        #[arg(long)]
        classification: Option<Classification>,

        /// Process only a small batch.
        #[arg(long)]
        test: bool,

        /// Re-enrich records even if they were enriched recently.
        #[arg(long)]
        force: bool,

        /// Progress output on stderr: `off`, `human`, or `json`.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },

    /// Rebuild the JSON indexes from all record files.
    Index,

    /// Search servers in the generated index.
    ///
    /// Filters combine with AND. At least a keyword or one filter is
    /// required.
    Search {
        /// Matches name, description, provider and tags.
        keyword: Option<String>,

        /// `official`, `reference`, or `community`.
        #[arg(long)]
        classification: Option<Classification>,

        /// Provider substring.
        #[arg(long)]
        provider: Option<String>,

        /// Category substring.
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of results to print.
        #[arg(long)]
        limit: Option<usize>,

        /// Print matching records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate every record file.
    ///
    /// Exits non-zero when any file has structural errors.
    Validate {
        /// Also list per-file warnings.
        #[arg(long)]
        warnings: bool,
    },

    /// Show enrichment coverage for server records.
    Stats {
        /// Only count servers of this classification.
        #[arg(long)]
        classification: Option<Classification>,
    },

    /// Serve the web UI and the generated indexes.
    ///
    /// Binds to `[server].bind`.
    Serve,

    /// Scrape every record kind, then rebuild the indexes.
    ///
    /// Resumes from checkpoints unless `--fresh` or `--test` is given.
    Update {
        /// Only these kinds (repeatable): `servers`, `clients`, `use-cases`.
        #[arg(long = "kind")]
        kinds: Vec<RecordKind>,

        /// Ignore checkpoints and start from page 1.
        #[arg(long)]
        fresh: bool,

        /// Scrape only the first two pages of each kind.
        #[arg(long)]
        test: bool,

        /// Skip index generation.
        #[arg(long)]
        no_index: bool,

        /// Progress output on stderr: `off`, `human`, or `json`.
        #[arg(long)]
        progress: Option<ProgressMode>,
    },
}

fn parse_kinds(arg: &str) -> Result<Vec<RecordKind>> {
    if arg.trim().eq_ignore_ascii_case("all") {
        return Ok(RecordKind::ALL.to_vec());
    }
    match arg.parse::<RecordKind>() {
        Ok(kind) => Ok(vec![kind]),
        Err(e) => bail!("{} (or 'all')", e),
    }
}

/// Load the config file. A missing file at the default path means "use
/// defaults"; a missing file given explicitly is an error.
fn resolve_config(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        return Ok(Config::minimal());
    }
    config::load_config(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = resolve_config(&cli.config)?;

    match cli.command {
        Commands::Scrape {
            kind,
            start,
            end,
            resume,
            test,
            progress,
        } => {
            let kinds = parse_kinds(&kind)?;
            let options = ScrapeOptions {
                start_page: start,
                end_page: end,
                resume,
                test,
            };
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            run_scrape(&cfg, &kinds, &options, reporter.as_ref()).await?;
        }
        Commands::Enrich {
            limit,
            classification,
            test,
            force,
            progress,
        } => {
            let options = EnrichOptions {
                limit,
                classification,
                test,
                force,
            };
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            run_enrich(&cfg, &options, reporter.as_ref()).await?;
        }
        Commands::Index => {
            run_index(&cfg)?;
        }
        Commands::Search {
            keyword,
            classification,
            provider,
            category,
            limit,
            json,
        } => {
            let query = SearchQuery {
                keyword,
                classification,
                provider,
                category,
            };
            run_search(&cfg, &query, limit, json)?;
        }
        Commands::Validate { warnings } => {
            let report = run_validate(&cfg, warnings)?;
            if !report.is_valid() {
                bail!("{} file(s) failed validation", report.invalid());
            }
        }
        Commands::Stats { classification } => {
            run_stats(&cfg, classification)?;
        }
        Commands::Serve => {
            run_server(&cfg).await?;
        }
        Commands::Update {
            kinds,
            fresh,
            test,
            no_index,
            progress,
        } => {
            let options = UpdateOptions {
                kinds: if kinds.is_empty() {
                    RecordKind::ALL.to_vec()
                } else {
                    kinds
                },
                scrape: ScrapeOptions {
                    resume: !fresh && !test,
                    test,
                    ..Default::default()
                },
                skip_index: no_index,
            };
            let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
            let report = run_update(&cfg, &options, reporter.as_ref()).await?;
            if report.failures() > 0 {
                bail!("{} update step(s) failed", report.failures());
            }
        }
    }

    Ok(())
}
