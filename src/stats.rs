//! Enrichment coverage overview.
//!
//! Summarizes how much of the server corpus has been enriched: field
//! coverage, quality-score distribution, language/runtime/category counts
//! and the most recent enrichment. Used by `umcp stats` to check that an
//! enrichment run did what was expected.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::models::{Classification, Record, RecordKind};
use crate::store::RecordStore;

const BAR_WIDTH: usize = 30;
const TOP_ROWS: usize = 10;

/// One coverage line: how many records carry a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualitySummary {
    pub scored: usize,
    pub average: f64,
    pub min: u8,
    pub max: u8,
    /// Counts per bucket: 0-19, 20-39, 40-59, 60-79, 80-100.
    pub buckets: [usize; 5],
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentStats {
    pub total: usize,
    pub coverage: Vec<Coverage>,
    pub quality: QualitySummary,
    pub languages: Vec<(String, usize)>,
    pub runtimes: Vec<(String, usize)>,
    pub categories: Vec<(String, usize)>,
    pub top_quality: Vec<(String, u8)>,
    pub last_enriched: Option<DateTime<Utc>>,
}

fn language(record: &Record) -> Option<&str> {
    record
        .language
        .as_deref()
        .or(record.metadata.language.as_deref())
}

fn ranked(counts: BTreeMap<String, usize>) -> Vec<(String, usize)> {
    let mut rows: Vec<(String, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows
}

fn count(records: &[Record], has: impl Fn(&Record) -> bool) -> usize {
    records.iter().filter(|r| has(r)).count()
}

fn bucket(score: u8) -> usize {
    (usize::from(score.min(100)) / 20).min(4)
}

pub fn compute(records: &[Record]) -> EnrichmentStats {
    let coverage = vec![
        Coverage {
            label: "GitHub URL",
            count: count(records, |r| r.source_url.as_deref().is_some_and(|u| u.contains("github.com"))),
        },
        Coverage {
            label: "Quality score",
            count: count(records, |r| r.quality_score.is_some()),
        },
        Coverage {
            label: "Capabilities",
            count: count(records, |r| !r.capabilities.is_empty()),
        },
        Coverage {
            label: "Categories",
            count: count(records, |r| !r.categories.is_empty()),
        },
        Coverage {
            label: "Runtime",
            count: count(records, |r| r.runtime.is_some()),
        },
        Coverage {
            label: "Language",
            count: count(records, |r| language(r).is_some()),
        },
        Coverage {
            label: "README excerpt",
            count: count(records, |r| r.metadata.readme_excerpt.is_some()),
        },
        Coverage {
            label: "GitHub stars",
            count: count(records, |r| r.metadata.github_stars.is_some()),
        },
    ];

    let scores: Vec<u8> = records.iter().filter_map(|r| r.quality_score).collect();
    let mut quality = QualitySummary {
        scored: scores.len(),
        ..Default::default()
    };
    if !scores.is_empty() {
        let sum: u64 = scores.iter().map(|s| u64::from(*s)).sum();
        quality.average = sum as f64 / scores.len() as f64;
        quality.min = scores.iter().copied().min().unwrap_or(0);
        quality.max = scores.iter().copied().max().unwrap_or(0);
        for score in &scores {
            quality.buckets[bucket(*score)] += 1;
        }
    }

    let mut languages = BTreeMap::new();
    let mut runtimes = BTreeMap::new();
    let mut categories = BTreeMap::new();
    for record in records {
        if let Some(lang) = language(record) {
            *languages.entry(lang.to_string()).or_insert(0) += 1;
        }
        if let Some(runtime) = &record.runtime {
            *runtimes.entry(runtime.clone()).or_insert(0) += 1;
        }
        for category in &record.categories {
            *categories.entry(category.clone()).or_insert(0) += 1;
        }
    }

    let mut top_quality: Vec<(String, u8)> = records
        .iter()
        .filter_map(|r| r.quality_score.map(|s| (r.display_name().to_string(), s)))
        .collect();
    top_quality.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_quality.truncate(TOP_ROWS);

    EnrichmentStats {
        total: records.len(),
        coverage,
        quality,
        languages: ranked(languages),
        runtimes: ranked(runtimes),
        categories: ranked(categories),
        top_quality,
        last_enriched: records.iter().filter_map(Record::enriched_at).max(),
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn bar(part: usize, total: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (part * BAR_WIDTH).div_ceil(total).min(BAR_WIDTH)
    };
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

/// Format a timestamp relative to `now` (e.g. "3 hours ago").
fn format_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - ts).num_seconds();

    if delta < 0 {
        return format_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_iso(ts)
    }
}

fn format_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

fn print_distribution(title: &str, rows: &[(String, usize)], total: usize) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("  {}:", title);
    for (name, count) in rows.iter().take(TOP_ROWS) {
        println!("  {:<24} {:>6}  {:>5.1}%", name, count, percent(*count, total));
    }
    if rows.len() > TOP_ROWS {
        println!("  ({} more)", rows.len() - TOP_ROWS);
    }
}

pub fn render(stats: &EnrichmentStats, now: DateTime<Utc>) {
    let total = stats.total;
    println!("  Servers:     {}", total);
    println!(
        "  Last enrichment: {}",
        stats
            .last_enriched
            .map(|ts| format_relative(ts, now))
            .unwrap_or_else(|| "never".to_string())
    );

    println!();
    println!("  Coverage:");
    for row in &stats.coverage {
        println!(
            "  {:<16} {} {:>6} / {} ({:.1}%)",
            row.label,
            bar(row.count, total),
            row.count,
            total,
            percent(row.count, total)
        );
    }

    let q = &stats.quality;
    if q.scored > 0 {
        println!();
        println!(
            "  Quality scores: avg {:.1}, min {}, max {}",
            q.average, q.min, q.max
        );
        for (i, count) in q.buckets.iter().enumerate() {
            let label = if i == 4 {
                "80-100".to_string()
            } else {
                format!("{}-{}", i * 20, i * 20 + 19)
            };
            println!("  {:<16} {} {:>6}", label, bar(*count, q.scored), count);
        }
    }

    print_distribution("Languages", &stats.languages, total);
    print_distribution("Runtimes", &stats.runtimes, total);
    print_distribution("Categories", &stats.categories, total);

    if !stats.top_quality.is_empty() {
        println!();
        println!("  Highest quality:");
        for (name, score) in &stats.top_quality {
            println!("  {:<40} {:>3}", name, score);
        }
    }
    println!();
}

/// Run the stats command over the server records on disk.
pub fn run_stats(config: &Config, classification: Option<Classification>) -> Result<EnrichmentStats> {
    let store = RecordStore::from_config(config);
    let report = store.load(RecordKind::Server);
    let skipped = report.failures.len();
    let records: Vec<Record> = report
        .into_records()
        .into_iter()
        .filter(|r| classification.map_or(true, |c| r.classification() == c))
        .collect();

    let stats = compute(&records);

    println!("Universe MCP — Enrichment Stats");
    println!("===============================");
    println!();
    println!("  Data:        {}", store.root().display());
    if let Some(c) = classification {
        println!("  Filter:      {}", c);
    }
    if skipped > 0 {
        println!("  Unreadable:  {}", skipped);
    }
    render(&stats, Utc::now());
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scored(id: &str, score: u8, lang: &str, cats: &[&str]) -> Record {
        let mut r = Record::new(id);
        r.name = Some(id.to_string());
        r.quality_score = Some(score);
        r.language = Some(lang.to_string());
        r.set_categories(cats.iter().copied());
        r
    }

    #[test]
    fn coverage_and_distribution() {
        let mut a = scored("a", 92, "TypeScript", &["git", "api"]);
        a.source_url = Some("https://github.com/o/a".into());
        a.metadata.complete_enriched_at = Some("2026-10-01T12:00:00".into());
        let b = scored("b", 40, "Python", &["git"]);
        let mut c = Record::new("c");
        c.metadata.language = Some("Python".into());

        let stats = compute(&[a, b, c]);
        assert_eq!(stats.total, 3);
        let find = |label: &str| stats.coverage.iter().find(|c| c.label == label).unwrap().count;
        assert_eq!(find("GitHub URL"), 1);
        assert_eq!(find("Quality score"), 2);
        assert_eq!(find("Language"), 3);
        assert_eq!(find("Categories"), 2);

        assert_eq!(stats.quality.min, 40);
        assert_eq!(stats.quality.max, 92);
        assert!((stats.quality.average - 66.0).abs() < f64::EPSILON);
        assert_eq!(stats.quality.buckets, [0, 0, 1, 0, 1]);

        assert_eq!(stats.languages[0], ("Python".to_string(), 2));
        assert_eq!(stats.categories[0], ("git".to_string(), 2));
        assert_eq!(stats.top_quality[0], ("a".to_string(), 92));
        assert_eq!(
            stats.last_enriched,
            Some(Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn empty_corpus() {
        let stats = compute(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.quality, QualitySummary::default());
        assert_eq!(bar(0, 0), ".".repeat(BAR_WIDTH));
    }

    #[test]
    fn relative_times() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        assert_eq!(format_relative(now, now), "just now");
        assert_eq!(format_relative(now - chrono::Duration::hours(3), now), "3 hours ago");
        assert_eq!(format_relative(now - chrono::Duration::days(1), now), "1 day ago");
        assert_eq!(
            format_relative(now - chrono::Duration::days(60), now),
            "2026-08-20 12:00"
        );
    }
}
