//! Directory scraping: walk the paginated list pages of one record kind and
//! save a minimal record per card.
//!
//! The first page is fetched up front to learn the page count. Each later
//! page is paced by a rate limiter, retried on transient failures, and
//! followed by a checkpoint write so an interrupted run can resume.

use anyhow::{bail, Result};
use chrono::Utc;
use std::ops::RangeInclusive;
use tracing::{info, warn};

use crate::checkpoint::Checkpoint;
use crate::config::Config;
use crate::directory::{detect_total_pages, list_url, parse_list_page};
use crate::fetch::{with_retry, HttpClient};
use crate::models::RecordKind;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::rate_limit::RateLimiter;
use crate::store::RecordStore;

/// Pages scraped by `--test`.
pub const TEST_PAGES: u32 = 2;

#[derive(Debug, Clone, Default)]
pub struct ScrapeOptions {
    pub start_page: Option<u32>,
    pub end_page: Option<u32>,
    /// Continue after the last checkpointed page.
    pub resume: bool,
    pub test: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub pages: u32,
    pub failed_pages: u32,
    pub items: u64,
    pub total_items: u64,
}

/// Pages to fetch, given the options, the checkpoint and the detected
/// total. An empty range means there is nothing left to do.
pub fn plan_pages(options: &ScrapeOptions, checkpoint: &Checkpoint, total_pages: u32) -> RangeInclusive<u32> {
    let mut start = options.start_page.unwrap_or(1).max(1);
    if options.resume {
        if let Some(page) = checkpoint.resume_page() {
            start = page;
        }
    }
    let mut end = options.end_page.unwrap_or(total_pages);
    if options.test {
        end = end.min(start.saturating_add(TEST_PAGES - 1));
    }
    start..=end
}

pub async fn scrape_kind(
    config: &Config,
    kind: RecordKind,
    options: &ScrapeOptions,
    progress: &dyn ProgressReporter,
) -> Result<ScrapeReport> {
    let client = HttpClient::new(
        &config.scrape.user_agent,
        std::time::Duration::from_secs(config.scrape.timeout_secs),
    )?;
    let delays = config.scrape.retry_delays();
    let store = RecordStore::from_config(config);
    let mut checkpoint = Checkpoint::for_kind(config, kind);
    let mut limiter = RateLimiter::every(config.scrape.page_delay());
    let base = &config.scrape.base_url;

    let first_url = list_url(base, kind, 1);
    limiter.acquire().await;
    let first_page = match with_retry(&first_url, &delays, || client.get_text(&first_url)).await {
        Ok(html) => html,
        Err(e) => bail!("could not fetch the first {} page: {}", kind, e),
    };
    let total_pages = match detect_total_pages(&first_page, kind, config.scrape.per_page) {
        Some(n) => n,
        None => {
            warn!(
                "could not determine {} page count, assuming {}",
                kind, config.scrape.fallback_pages
            );
            config.scrape.fallback_pages
        }
    };

    let pages = plan_pages(options, &checkpoint, total_pages);
    let mut report = ScrapeReport::default();
    let mut items = if options.resume && checkpoint.resume_page().is_some() {
        info!(
            "resuming {} after page {} ({} items so far)",
            kind,
            checkpoint.state().last_page,
            checkpoint.state().items_scraped
        );
        checkpoint.state().items_scraped
    } else {
        0
    };

    if pages.is_empty() {
        info!("no {} pages left to scrape", kind);
        return Ok(report);
    }
    info!("scraping {} pages {} to {}", kind, pages.start(), pages.end());
    let last = *pages.end();
    progress.report(ProgressEvent::PagesPlanned {
        kind,
        first: *pages.start(),
        last,
    });

    let mut first_page = Some(first_page);

    for page in pages {
        let html = match first_page.take().filter(|_| page == 1) {
            Some(html) => Some(html),
            None => {
                let url = list_url(base, kind, page);
                limiter.acquire().await;
                match with_retry(&url, &delays, || client.get_text(&url)).await {
                    Ok(html) => Some(html),
                    Err(e) => {
                        warn!("giving up on {} page {}: {}", kind, page, e);
                        None
                    }
                }
            }
        };

        let saved = match html {
            Some(html) => {
                let records = parse_list_page(&html, kind, base, Utc::now());
                let mut saved = 0;
                for record in &records {
                    match store.save(kind, record) {
                        Ok(_) => saved += 1,
                        Err(e) => warn!("could not save {} '{}': {:#}", kind.label(), record.id, e),
                    }
                }
                info!("{} page {}: {} records", kind, page, records.len());
                Some(saved)
            }
            None => {
                report.failed_pages += 1;
                None
            }
        };
        let saved_now = saved.unwrap_or(0) as u64;
        items += saved_now;
        report.items += saved_now;

        report.pages += 1;
        checkpoint.advance(page, items)?;
        progress.report(ProgressEvent::PageDone {
            kind,
            page,
            last,
            saved,
        });
    }

    report.total_items = items;
    Ok(report)
}

/// Scrape each kind in turn and print a summary per kind.
pub async fn run_scrape(
    config: &Config,
    kinds: &[RecordKind],
    options: &ScrapeOptions,
    progress: &dyn ProgressReporter,
) -> Result<Vec<(RecordKind, ScrapeReport)>> {
    let mut reports = Vec::new();
    for kind in kinds {
        let report = scrape_kind(config, *kind, options, progress).await?;
        println!(
            "{}: {} pages ({} failed), {} records saved, {} total",
            kind, report.pages, report.failed_pages, report.items, report.total_items
        );
        reports.push((*kind, report));
    }
    println!("Data saved to: {}", config.data.dir.display());
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resume_starts_after_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let mut cp = Checkpoint::load(tmp.path().join("servers.json"));
        cp.advance(5, 210).unwrap();

        let options = ScrapeOptions {
            resume: true,
            ..Default::default()
        };
        assert_eq!(plan_pages(&options, &cp, 155), 6..=155);

        let fresh = ScrapeOptions::default();
        assert_eq!(plan_pages(&fresh, &cp, 155), 1..=155);
    }

    #[test]
    fn resume_without_checkpoint_uses_start() {
        let tmp = TempDir::new().unwrap();
        let cp = Checkpoint::load(tmp.path().join("servers.json"));
        let options = ScrapeOptions {
            resume: true,
            start_page: Some(3),
            end_page: Some(4),
            ..Default::default()
        };
        assert_eq!(plan_pages(&options, &cp, 155), 3..=4);
    }

    #[test]
    fn test_mode_limits_pages() {
        let tmp = TempDir::new().unwrap();
        let cp = Checkpoint::load(tmp.path().join("clients.json"));
        let options = ScrapeOptions {
            test: true,
            ..Default::default()
        };
        assert_eq!(plan_pages(&options, &cp, 10), 1..=2);
        assert_eq!(plan_pages(&options, &cp, 1), 1..=1);
    }

    #[test]
    fn finished_checkpoint_plans_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut cp = Checkpoint::load(tmp.path().join("servers.json"));
        cp.advance(7, 300).unwrap();
        let options = ScrapeOptions {
            resume: true,
            ..Default::default()
        };
        assert!(plan_pages(&options, &cp, 7).is_empty());
    }

    #[test]
    fn extreme_page_numbers_do_not_overflow() {
        let tmp = TempDir::new().unwrap();
        let mut cp = Checkpoint::load(tmp.path().join("servers.json"));
        let test_from_max = ScrapeOptions {
            start_page: Some(u32::MAX),
            test: true,
            ..Default::default()
        };
        assert!(plan_pages(&test_from_max, &cp, 10).is_empty());

        cp.advance(u32::MAX, 0).unwrap();
        assert_eq!(cp.resume_page(), Some(u32::MAX));
        let resume = ScrapeOptions {
            resume: true,
            end_page: Some(u32::MAX),
            test: true,
            ..Default::default()
        };
        assert_eq!(plan_pages(&resume, &cp, 10), u32::MAX..=u32::MAX);
    }
}
