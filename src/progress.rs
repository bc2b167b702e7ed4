//! Scrape and enrichment progress reporting.
//!
//! `umcp scrape` reports each list page as it lands and `umcp enrich`
//! reports each record as it leaves the pipeline, together with the
//! metadata API calls still available. Progress goes to **stderr** so
//! stdout stays parseable for scripts.

use serde_json::{json, Value};
use std::io::Write;
use std::str::FromStr;

use crate::models::RecordKind;

/// How a record left the enrichment pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordStatus {
    Enriched { score: u8 },
    Skipped,
    Failed,
}

impl RecordStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Enriched { .. } => "enriched",
            RecordStatus::Skipped => "skipped",
            RecordStatus::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProgressEvent {
    /// The page range a scrape will walk, known once the first page is in.
    PagesPlanned {
        kind: RecordKind,
        first: u32,
        last: u32,
    },
    /// One list page handled. `saved` is `None` when the page was given up.
    PageDone {
        kind: RecordKind,
        page: u32,
        last: u32,
        saved: Option<usize>,
    },
    /// One server record handled by the enrichment batch.
    RecordDone {
        id: String,
        n: usize,
        total: usize,
        status: RecordStatus,
        api_remaining: u32,
    },
}

impl ProgressEvent {
    /// One line for a terminal, e.g. `scrape servers  page 7/155  +42 records`.
    pub fn human_line(&self) -> String {
        match self {
            ProgressEvent::PagesPlanned { kind, first, last } => {
                format!("scrape {}  pages {}-{}", kind, first, last)
            }
            ProgressEvent::PageDone {
                kind,
                page,
                last,
                saved: Some(saved),
            } => format!("scrape {}  page {}/{}  +{} records", kind, page, last, saved),
            ProgressEvent::PageDone {
                kind,
                page,
                last,
                saved: None,
            } => format!("scrape {}  page {}/{}  failed", kind, page, last),
            ProgressEvent::RecordDone {
                id,
                n,
                total,
                status,
                api_remaining,
            } => {
                let outcome = match status {
                    RecordStatus::Enriched { score } => format!("score {}", score),
                    other => other.as_str().to_string(),
                };
                format!(
                    "enrich  {}/{}  {}  {}  ({} API calls left)",
                    n, total, id, outcome, api_remaining
                )
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ProgressEvent::PagesPlanned { kind, first, last } => json!({
                "event": "pages_planned",
                "kind": kind.segment(),
                "first": first,
                "last": last
            }),
            ProgressEvent::PageDone {
                kind,
                page,
                last,
                saved,
            } => json!({
                "event": "page_done",
                "kind": kind.segment(),
                "page": page,
                "last": last,
                "saved": saved,
                "failed": saved.is_none()
            }),
            ProgressEvent::RecordDone {
                id,
                n,
                total,
                status,
                api_remaining,
            } => {
                let score = match status {
                    RecordStatus::Enriched { score } => Some(*score),
                    _ => None,
                };
                json!({
                    "event": "record_done",
                    "id": id,
                    "n": n,
                    "total": total,
                    "status": status.as_str(),
                    "quality_score": score,
                    "api_remaining": api_remaining
                })
            }
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", event.human_line());
        let _ = stderr.flush();
    }
}

/// One JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", event.to_json());
        let _ = stderr.flush();
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Value of `--progress`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" | "none" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}'. Use off, human, or json.",
                other
            )),
        }
    }
}
