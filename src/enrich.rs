//! Enrichment orchestrator.
//!
//! Each server record moves through a fixed sequence of stages:
//!
//! ```text
//! LOADED → PAGE_FETCHED → SOURCE_URL_RESOLVED → README_FETCHED
//!        → API_FETCHED → CATEGORIZED → SCORED → PERSISTED
//! ```
//!
//! Only the directory page fetch can abandon a record. Every later step is
//! best effort: a missing README or a refused API call just leaves its
//! fields out, and the record is still categorized, scored and written.
//! Records enriched within `enrich.skip_recent_days` are skipped unless
//! forced.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::classify::classify_parts;
use crate::config::{Config, EnrichConfig};
use crate::directory::parse_detail_page;
use crate::fetch::{with_retry, FetchError, HttpClient};
use crate::github::{GithubClient, RepoInfo, RepoRef};
use crate::models::{parse_timestamp, Classification, Record, RecordKind};
use crate::progress::{ProgressEvent, ProgressReporter, RecordStatus};
use crate::rate_limit::{ApiBudget, RateLimiter};
use crate::readme;
use crate::score::{quality_score, ScoreInputs};
use crate::store::{load_record, RecordStore};
use crate::traits::EnrichSource;

/// Number of records processed by `--test`.
pub const TEST_BATCH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    PageFetched,
    SourceUrlResolved,
    ReadmeFetched,
    ApiFetched,
    Categorized,
    Scored,
    Persisted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Loaded => "loaded",
            Stage::PageFetched => "page_fetched",
            Stage::SourceUrlResolved => "source_url_resolved",
            Stage::ReadmeFetched => "readme_fetched",
            Stage::ApiFetched => "api_fetched",
            Stage::Categorized => "categorized",
            Stage::Scored => "scored",
            Stage::Persisted => "persisted",
        }
    }
}

/// What a completed enrichment found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub readme: bool,
    pub api: bool,
    pub categories: usize,
    pub quality_score: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    Enriched(EnrichSummary),
    Skipped { days_since: i64 },
    /// `stage` is the step that could not complete.
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub skip_recent_days: i64,
    pub readme_excerpt_chars: usize,
    pub max_capabilities: usize,
}

impl From<&EnrichConfig> for EnrichSettings {
    fn from(config: &EnrichConfig) -> Self {
        Self {
            skip_recent_days: config.skip_recent_days,
            readme_excerpt_chars: config.readme_excerpt_chars,
            max_capabilities: config.max_capabilities,
        }
    }
}

/// Mutable state owned by one enrichment run.
#[derive(Debug)]
pub struct EnrichContext {
    pub settings: EnrichSettings,
    pub budget: ApiBudget,
    page_limiter: RateLimiter,
    api_limiter: RateLimiter,
}

impl EnrichContext {
    pub fn new(
        settings: EnrichSettings,
        budget: ApiBudget,
        page_interval: Duration,
        api_interval: Duration,
    ) -> Self {
        Self {
            settings,
            budget,
            page_limiter: RateLimiter::every(page_interval),
            api_limiter: RateLimiter::every(api_interval),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            EnrichSettings::from(&config.enrich),
            ApiBudget::new(config.github.api_limit),
            Duration::from_millis(config.enrich.record_delay_ms),
            Duration::from_millis(config.github.api_delay_ms),
        )
    }
}

/// Run every in-memory stage for one record. Persistence is the caller's
/// job; see [`enrich_file`].
pub async fn enrich_record(
    ctx: &mut EnrichContext,
    source: &dyn EnrichSource,
    record: &mut Record,
    force: bool,
    now: DateTime<Utc>,
) -> EnrichOutcome {
    if !force {
        if let Some(at) = record.enriched_at() {
            let days_since = (now - at).num_days();
            if days_since < ctx.settings.skip_recent_days {
                debug!(record = %record.id, days_since, "recently enriched, skipping");
                return EnrichOutcome::Skipped { days_since };
            }
        }
    }

    let Some(url) = record.url.clone() else {
        return EnrichOutcome::Failed {
            stage: Stage::PageFetched,
            reason: "record has no directory URL".to_string(),
        };
    };

    ctx.page_limiter.acquire().await;
    let html = match source.fetch_detail_page(&url).await {
        Ok(html) => html,
        Err(e) => {
            return EnrichOutcome::Failed {
                stage: Stage::PageFetched,
                reason: e.to_string(),
            }
        }
    };
    apply_detail_page(record, &html);
    debug!(record = %record.id, stage = Stage::PageFetched.as_str());

    let repo = record.source_url.as_deref().and_then(RepoRef::from_url);
    let mut summary = EnrichSummary::default();

    if let Some(repo) = &repo {
        debug!(record = %record.id, stage = Stage::SourceUrlResolved.as_str(), repo = %repo);

        if let Some(text) = source.fetch_readme(repo).await {
            apply_readme(record, &text, &ctx.settings);
            summary.readme = true;
            debug!(record = %record.id, stage = Stage::ReadmeFetched.as_str());
        }

        if ctx.budget.remaining_calls() > 0 {
            ctx.api_limiter.acquire().await;
            ctx.budget.record_call();
            match source.fetch_repo_info(repo).await {
                Ok(Some(info)) => {
                    apply_repo_info(record, info);
                    summary.api = true;
                    debug!(record = %record.id, stage = Stage::ApiFetched.as_str());
                }
                Ok(None) => debug!(record = %record.id, "repository not found"),
                Err(e) if e.is_rate_limited() => {
                    warn!("metadata API limit reached ({}); skipping API for the rest of the run", e);
                    ctx.budget.exhaust();
                }
                Err(e) => warn!("metadata fetch for {} failed: {}", repo, e),
            }
        } else {
            debug!(record = %record.id, "API budget spent, partial enrichment");
        }
    }

    categorize(record);
    summary.categories = record.categories.len();
    debug!(record = %record.id, stage = Stage::Categorized.as_str(), categories = summary.categories);

    let score = quality_score(&score_inputs(record), now);
    record.quality_score = Some(score);
    summary.quality_score = score;
    debug!(record = %record.id, stage = Stage::Scored.as_str(), score);

    record.metadata.complete_enriched_at = Some(now.to_rfc3339());
    EnrichOutcome::Enriched(summary)
}

/// Load, enrich and persist the record stored at `path`.
///
/// Returns `Err` only when the file cannot be read or written.
pub async fn enrich_file(
    ctx: &mut EnrichContext,
    source: &dyn EnrichSource,
    store: &RecordStore,
    path: &Path,
    force: bool,
    now: DateTime<Utc>,
) -> Result<EnrichOutcome> {
    let mut record = load_record(path)?;
    let outcome = enrich_record(ctx, source, &mut record, force, now).await;
    if let EnrichOutcome::Enriched(_) = &outcome {
        store.save_at(path, &record)?;
        debug!(record = %record.id, stage = Stage::Persisted.as_str());
    }
    Ok(outcome)
}

fn apply_detail_page(record: &mut Record, html: &str) {
    let detail = parse_detail_page(html);
    if detail.source_url.is_some() {
        record.source_url = detail.source_url;
    }
    if detail.github_stars.is_some() {
        record.metadata.github_stars = detail.github_stars;
    }
    if detail.npm_package.is_some() {
        record.metadata.npm_package = detail.npm_package;
    }
    if detail.pypi_package.is_some() {
        record.metadata.pypi_package = detail.pypi_package;
    }
    if !detail.tags.is_empty() {
        record.tags = detail.tags;
    }
}

fn apply_readme(record: &mut Record, text: &str, settings: &EnrichSettings) {
    let info = readme::analyze(text, settings.max_capabilities);
    if !info.capabilities.is_empty() {
        record.capabilities = info.capabilities;
    }
    if !info.install_commands.is_empty() {
        record.metadata.installation_commands = info.install_commands;
    }
    if let Some(hint) = info.runtime {
        record.runtime = Some(hint.runtime);
        if hint.package_manager.is_some() {
            record.package_manager = hint.package_manager;
        }
    }
    if !info.requirements.is_empty() {
        record.metadata.requirements = info.requirements;
    }
    record.metadata.readme_excerpt = Some(readme::excerpt(text, settings.readme_excerpt_chars));
}

fn apply_repo_info(record: &mut Record, info: RepoInfo) {
    let license = info.license_name().map(str::to_string);
    let meta = &mut record.metadata;
    if license.is_some() {
        meta.license = license;
    }
    if let Some(language) = info.language {
        record.language = Some(language.clone());
        meta.language = Some(language);
    }
    if info.stargazers_count.is_some() {
        meta.github_stars = info.stargazers_count;
    }
    if info.forks_count.is_some() {
        meta.forks = info.forks_count;
    }
    if info.open_issues_count.is_some() {
        meta.open_issues = info.open_issues_count;
    }
    if info.watchers_count.is_some() {
        meta.watchers = info.watchers_count;
    }
    if info.pushed_at.is_some() {
        meta.last_pushed = info.pushed_at;
    }
    if info.created_at.is_some() {
        meta.created_at = info.created_at;
    }
    if !info.topics.is_empty() {
        meta.topics = info.topics;
    }
}

/// Recompute categories from the record's own text. An empty result keeps
/// whatever categories the record already had.
fn categorize(record: &mut Record) {
    let topics = record.metadata.topics.join(" ");
    let tags = record.tags.join(" ");
    let categories = classify_parts([
        record.display_name(),
        record.description.as_deref().unwrap_or(""),
        record.provider.as_deref().unwrap_or(""),
        record.metadata.readme_excerpt.as_deref().unwrap_or(""),
        topics.as_str(),
        tags.as_str(),
    ]);
    if !categories.is_empty() {
        record.set_categories(categories);
    }
}

fn score_inputs(record: &Record) -> ScoreInputs {
    let meta = &record.metadata;
    ScoreInputs {
        stars: meta.github_stars,
        classification: record.classification,
        has_readme: meta.readme_excerpt.is_some(),
        has_capabilities: !record.capabilities.is_empty(),
        pushed_at: meta.last_pushed.as_deref().and_then(parse_timestamp),
        open_issues: meta.open_issues,
        license: meta.license.clone(),
    }
}

/// Live source: the directory website plus GitHub.
pub struct HttpSource {
    pages: HttpClient,
    github: GithubClient,
    retry_delays: Vec<Duration>,
}

impl HttpSource {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            pages: HttpClient::new(
                &config.scrape.user_agent,
                Duration::from_secs(config.scrape.timeout_secs),
            )?,
            github: GithubClient::new(&config.github, &config.scrape.user_agent)?,
            retry_delays: config.scrape.retry_delays(),
        })
    }
}

#[async_trait]
impl EnrichSource for HttpSource {
    async fn fetch_detail_page(&self, url: &str) -> Result<String, FetchError> {
        with_retry(url, &self.retry_delays, || self.pages.get_text(url)).await
    }

    async fn fetch_readme(&self, repo: &RepoRef) -> Option<String> {
        self.github.fetch_readme(repo).await
    }

    async fn fetch_repo_info(&self, repo: &RepoRef) -> Result<Option<RepoInfo>, FetchError> {
        self.github.fetch_repo(repo).await
    }
}

/// Which records an enrichment run covers.
#[derive(Debug, Clone, Default)]
pub struct EnrichOptions {
    pub limit: Option<usize>,
    pub classification: Option<Classification>,
    pub test: bool,
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub processed: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub errors: usize,
    pub api_calls: u32,
    pub api_limit: u32,
}

/// Enrich a batch of stored server records. One record's failure never
/// stops the batch.
pub async fn enrich_batch(
    ctx: &mut EnrichContext,
    source: &dyn EnrichSource,
    store: &RecordStore,
    options: &EnrichOptions,
    progress: &dyn ProgressReporter,
) -> EnrichReport {
    let mut files = store.list_files(RecordKind::Server, options.classification);
    let cap = if options.test {
        Some(TEST_BATCH)
    } else {
        options.limit
    };
    if let Some(cap) = cap {
        files.truncate(cap);
    }

    let total = files.len();
    let mut report = EnrichReport {
        api_limit: ctx.budget.limit(),
        ..Default::default()
    };

    for (i, path) in files.iter().enumerate() {
        report.processed += 1;

        let status = match enrich_file(ctx, source, store, path, options.force, Utc::now()).await {
            Ok(EnrichOutcome::Enriched(summary)) => {
                report.enriched += 1;
                info!(
                    "enriched {} (score {}, readme: {}, api: {})",
                    path.display(),
                    summary.quality_score,
                    summary.readme,
                    summary.api
                );
                RecordStatus::Enriched {
                    score: summary.quality_score,
                }
            }
            Ok(EnrichOutcome::Skipped { .. }) => {
                report.skipped += 1;
                RecordStatus::Skipped
            }
            Ok(EnrichOutcome::Failed { stage, reason }) => {
                report.errors += 1;
                warn!("abandoned {} at {}: {}", path.display(), stage.as_str(), reason);
                RecordStatus::Failed
            }
            Err(e) => {
                report.errors += 1;
                warn!("{:#}", e);
                RecordStatus::Failed
            }
        };

        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        progress.report(ProgressEvent::RecordDone {
            id,
            n: i + 1,
            total,
            status,
            api_remaining: ctx.budget.remaining_calls(),
        });
    }

    report.api_calls = ctx.budget.used();
    report
}

pub async fn run_enrich(
    config: &Config,
    options: &EnrichOptions,
    progress: &dyn ProgressReporter,
) -> Result<EnrichReport> {
    let store = RecordStore::from_config(config);
    let source = HttpSource::from_config(config)?;
    let mut ctx = EnrichContext::from_config(config);

    let report = enrich_batch(&mut ctx, &source, &store, options, progress).await;

    println!("Enrichment complete.");
    println!("  processed: {}", report.processed);
    println!("  enriched:  {}", report.enriched);
    println!(
        "  skipped:   {} (enriched within {} days)",
        report.skipped, config.enrich.skip_recent_days
    );
    println!("  errors:    {}", report.errors);
    println!("  API calls: {} / {}", report.api_calls, report.api_limit);

    Ok(report)
}
