//! Full refresh: scrape the selected record kinds, then rebuild the indexes.
//!
//! Enrichment is not part of this pipeline. Run `umcp enrich` and then
//! `umcp index` to fold enriched fields into the indexes.

use anyhow::{bail, Result};
use std::time::Instant;
use tracing::error;

use crate::config::Config;
use crate::index::{run_index, IndexSummary};
use crate::models::RecordKind;
use crate::progress::ProgressReporter;
use crate::scrape::{scrape_kind, ScrapeOptions, ScrapeReport};

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub kinds: Vec<RecordKind>,
    pub scrape: ScrapeOptions,
    pub skip_index: bool,
}

#[derive(Debug)]
pub enum StepOutcome<T> {
    Done { value: T, secs: f64 },
    Failed { error: String, secs: f64 },
}

impl<T> StepOutcome<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done { .. })
    }
}

#[derive(Debug)]
pub struct UpdateReport {
    pub scraped: Vec<(RecordKind, StepOutcome<ScrapeReport>)>,
    pub index: Option<StepOutcome<IndexSummary>>,
}

impl UpdateReport {
    pub fn failures(&self) -> usize {
        let scrape = self.scraped.iter().filter(|(_, o)| !o.is_done()).count();
        let index = self.index.as_ref().map_or(0, |o| usize::from(!o.is_done()));
        scrape + index
    }
}

fn header(text: &str) {
    println!();
    println!("{}", "=".repeat(60));
    println!("  {}", text);
    println!("{}", "=".repeat(60));
}

/// Run each scraper, then the index builder. A failing step is reported and
/// the remaining steps still run.
pub async fn run_update(
    config: &Config,
    options: &UpdateOptions,
    progress: &dyn ProgressReporter,
) -> Result<UpdateReport> {
    if options.kinds.is_empty() {
        bail!("no record kinds selected");
    }

    let started = Instant::now();
    let mut report = UpdateReport {
        scraped: Vec::new(),
        index: None,
    };

    for kind in &options.kinds {
        header(&format!("Scraping {}", kind));
        let step = Instant::now();
        let outcome = match scrape_kind(config, *kind, &options.scrape, progress).await {
            Ok(value) => {
                println!(
                    "{}: {} pages ({} failed), {} records saved",
                    kind, value.pages, value.failed_pages, value.items
                );
                StepOutcome::Done {
                    value,
                    secs: step.elapsed().as_secs_f64(),
                }
            }
            Err(e) => {
                error!("{} scraper failed: {:#}", kind, e);
                StepOutcome::Failed {
                    error: format!("{:#}", e),
                    secs: step.elapsed().as_secs_f64(),
                }
            }
        };
        report.scraped.push((*kind, outcome));
    }

    if !options.skip_index {
        header("Building indexes");
        let step = Instant::now();
        report.index = Some(match run_index(config) {
            Ok(value) => StepOutcome::Done {
                value,
                secs: step.elapsed().as_secs_f64(),
            },
            Err(e) => {
                error!("index generation failed: {:#}", e);
                StepOutcome::Failed {
                    error: format!("{:#}", e),
                    secs: step.elapsed().as_secs_f64(),
                }
            }
        });
    }

    header("Summary");
    for (kind, outcome) in &report.scraped {
        match outcome {
            StepOutcome::Done { value, secs } => {
                println!("  {:<12} ok      {:>6} records  {:>7.1}s", kind.to_string(), value.items, secs)
            }
            StepOutcome::Failed { error, secs } => {
                println!("  {:<12} FAILED  {:>7.1}s  {}", kind.to_string(), secs, error)
            }
        }
    }
    match &report.index {
        Some(StepOutcome::Done { value, secs }) => println!(
            "  {:<12} ok      {} files  {:>7.1}s",
            "indexes",
            value.files.len(),
            secs
        ),
        Some(StepOutcome::Failed { error, secs }) => {
            println!("  {:<12} FAILED  {:>7.1}s  {}", "indexes", secs, error)
        }
        None => println!("  {:<12} skipped", "indexes"),
    }
    println!("  Total time: {:.1}s", started.elapsed().as_secs_f64());

    Ok(report)
}
