//! HTML parsing for the MCP directory website.
//!
//! List pages are grids of cards, each an `<a href="/<kind>/<id>">` whose
//! text nodes carry the name (in an `<h3>`), provider, description, badge,
//! popularity metric and release date. Detail pages link out to the source
//! repository and package registries. The markup is not a stable API, so
//! every field is optional and parsing never fails outright.

use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::github::RepoRef;
use crate::models::{Classification, Record, RecordKind, WeeklyMetric};

/// Lines shorter than this are never taken as a description.
const DESCRIPTION_MIN_CHARS: usize = 30;
const CLIENT_PROVIDER_MAX_CHARS: usize = 100;
const TAG_MAX_CHARS: usize = 30;
const MAX_TAGS: usize = 20;
const NOT_TAGS: &[&str] = &["Home", "Servers", "Back", "Share", "Copy"];
const UNKNOWN_NAME: &str = "Unknown";

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static HEADING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3").unwrap());
static TAG_LIKE: LazyLock<Selector> = LazyLock::new(|| {
    let mut parts = Vec::new();
    for element in ["span", "a", "div"] {
        for class in ["tag", "badge", "label", "category"] {
            parts.push(format!("{}[class*=\"{}\"]", element, class));
        }
    }
    Selector::parse(&parts.join(", ")).unwrap()
});

static WEEKLY_METRIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d,]+)\s*est\.?\s+(downloads|visitors)").unwrap());
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());
static LEADING_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}").unwrap());
static PAGE_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]page=(\d+)").unwrap());
static STAR_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([km])?\s*(?:⭐|stars?\b)").unwrap()
});
static STAR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)⭐\s*(\d+(?:\.\d+)?)\s*([km])?").unwrap());
static NPM_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"npmjs\.com/package/((?:@[^/?#]+/)?[^/?#]+)").unwrap()
});
static PYPI_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pypi\.org/project/([^/?#]+)").unwrap());

/// URL of list page `page` (1-based) for `kind`.
pub fn list_url(base_url: &str, kind: RecordKind, page: u32) -> String {
    let base = base_url.trim_end_matches('/');
    if page <= 1 {
        format!("{}/{}", base, kind.segment())
    } else {
        format!("{}/{}?page={}", base, kind.segment(), page)
    }
}

fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The record id if `href` is exactly `/<segment>/<id>`.
fn card_id(href: &str, kind: RecordKind) -> Option<&str> {
    let rest = href.strip_prefix('/')?.strip_prefix(kind.segment())?.strip_prefix('/')?;
    if rest.is_empty() || rest.contains(['/', '?', '#']) {
        return None;
    }
    Some(rest)
}

/// Parse every card on a list page. Cards repeated on the page (for
/// example a featured strip) are kept once.
pub fn parse_list_page(html: &str, kind: RecordKind, base_url: &str, now: DateTime<Utc>) -> Vec<Record> {
    let document = Html::parse_document(html);
    let base = url::Url::parse(base_url).ok();
    let scraped_at = now.to_rfc3339();

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for card in document.select(&ANCHOR) {
        let Some(href) = card.value().attr("href") else {
            continue;
        };
        let Some(id) = card_id(href, kind) else {
            continue;
        };
        if !seen.insert(id.to_string()) {
            continue;
        }

        let mut record = parse_card(card, kind, id);
        record.url = Some(match base.as_ref().and_then(|b| b.join(href).ok()) {
            Some(u) => u.to_string(),
            None => format!("{}{}", base_url.trim_end_matches('/'), href),
        });
        record.scraped_at = Some(scraped_at.clone());
        records.push(record);
    }

    records
}

fn parse_card(card: ElementRef<'_>, kind: RecordKind, id: &str) -> Record {
    let lines = text_lines(card);
    let heading = card
        .select(&HEADING)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let mut record = Record::new(id);
    match kind {
        RecordKind::Server => {
            let provider = line_after(&lines, &heading).filter(|line| {
                let lower = line.to_lowercase();
                !["official", "reference", "community", "est ", "downloads", "visitors"]
                    .iter()
                    .any(|k| lower.contains(k))
            });
            record.description = lines
                .iter()
                .find(|line| {
                    line.chars().count() > DESCRIPTION_MIN_CHARS
                        && **line != heading
                        && Some(*line) != provider.as_ref()
                        && !line.to_lowercase().contains("est ")
                        && !LEADING_YEAR.is_match(line)
                })
                .cloned();
            record.classification =
                Some(lines.iter().find_map(|l| Classification::detect(l)).unwrap_or_default());
            record.weekly_metric = lines.iter().find_map(|l| parse_weekly_metric(l));
            record.release_date = lines
                .iter()
                .find_map(|l| ISO_DATE.find(l).map(|m| m.as_str().to_string()));
            record.provider = provider;
            record.name = Some(heading);
        }
        RecordKind::Client => {
            let provider = line_after(&lines, &heading)
                .filter(|line| line.chars().count() < CLIENT_PROVIDER_MAX_CHARS);
            record.description = lines
                .iter()
                .find(|line| {
                    line.chars().count() > DESCRIPTION_MIN_CHARS
                        && **line != heading
                        && Some(*line) != provider.as_ref()
                })
                .cloned();
            record.provider = provider;
            record.name = Some(heading);
        }
        RecordKind::UseCase => {
            record.description = lines
                .iter()
                .find(|line| line.chars().count() > DESCRIPTION_MIN_CHARS && **line != heading)
                .cloned();
            record.title = Some(heading);
        }
    }
    record
}

/// The line following the first line that contains `name`.
fn line_after(lines: &[String], name: &str) -> Option<String> {
    let index = lines.iter().position(|l| l.contains(name))?;
    lines.get(index + 1).cloned()
}

fn parse_weekly_metric(line: &str) -> Option<WeeklyMetric> {
    let caps = WEEKLY_METRIC.captures(line)?;
    let value = caps[1].replace(',', "").parse().ok()?;
    Some(WeeklyMetric {
        kind: caps[2].to_lowercase(),
        value,
    })
}

/// Total number of list pages, from the "of N <kind>" summary or, failing
/// that, the highest `?page=` link.
pub fn detect_total_pages(html: &str, kind: RecordKind, per_page: u32) -> Option<u32> {
    let document = Html::parse_document(html);
    let text = document.root_element().text().collect::<Vec<_>>().join(" ");

    let noun = match kind {
        RecordKind::Server => "servers",
        RecordKind::Client => "clients",
        RecordKind::UseCase => "use[- ]cases",
    };
    let summary = Regex::new(&format!(r"(?i)of\s+([\d,]+)\s+(?:mcp\s+)?{}", noun)).ok()?;
    if let Some(caps) = summary.captures(&text) {
        if let Ok(total) = caps[1].replace(',', "").parse::<u32>() {
            let per_page = per_page.max(1);
            return Some(total.div_ceil(per_page).max(1));
        }
    }

    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| PAGE_PARAM.captures(href))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()
}

/// Fields taken from a record's detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    pub source_url: Option<String>,
    pub github_stars: Option<u64>,
    pub npm_package: Option<String>,
    pub pypi_package: Option<String>,
    pub tags: Vec<String>,
}

pub fn parse_detail_page(html: &str) -> DetailPage {
    let document = Html::parse_document(html);
    let mut detail = DetailPage::default();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        if detail.source_url.is_none() && href.contains("github.com") && RepoRef::from_url(href).is_some() {
            let href = if href.starts_with("//") {
                format!("https:{}", href)
            } else {
                href.to_string()
            };
            detail.source_url = Some(href);
            detail.github_stars = parse_star_count(&element_text(anchor));
        }
        if detail.npm_package.is_none() {
            detail.npm_package = NPM_PACKAGE.captures(href).map(|c| c[1].to_string());
        }
        if detail.pypi_package.is_none() {
            detail.pypi_package = PYPI_PACKAGE.captures(href).map(|c| c[1].to_string());
        }
    }

    if detail.github_stars.is_none() {
        detail.github_stars = document
            .root_element()
            .text()
            .find_map(parse_star_count);
    }

    let mut seen = HashSet::new();
    for element in document.select(&TAG_LIKE) {
        let text = element_text(element);
        if text.is_empty() || text.chars().count() >= TAG_MAX_CHARS || NOT_TAGS.contains(&text.as_str()) {
            continue;
        }
        if seen.insert(text.to_lowercase()) {
            detail.tags.push(text);
            if detail.tags.len() >= MAX_TAGS {
                break;
            }
        }
    }

    detail
}

/// Parse a star count such as `72.7k stars`, `⭐ 1.2M` or `845 stars`.
pub fn parse_star_count(text: &str) -> Option<u64> {
    let caps = STAR_SUFFIX
        .captures(text)
        .or_else(|| STAR_PREFIX.captures(text))?;
    let number: f64 = caps[1].parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some((number * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    const SERVER_LIST: &str = r#"
<html><body>
<p>Showing 1 - 42 of 6,488 servers</p>
<a href="/servers/github"><h3>GitHub</h3><span>GitHub</span>
  <span>Official</span>
  <p>Repository management, file operations, and GitHub API integration.</p>
  <span>1,234 est downloads</span><span>2024-11-25</span></a>
<a href="/servers/github"><h3>GitHub</h3></a>
<a href="/servers/tiny"><h3>Tiny</h3><span>Jane Doe</span><span>community</span></a>
<a href="/servers/github/reviews">Reviews</a>
<a href="/clients/cursor">Cursor</a>
<a href="/servers?page=2">2</a>
</body></html>"#;

    #[test]
    fn parses_server_cards() {
        let records = parse_list_page(SERVER_LIST, RecordKind::Server, "https://www.pulsemcp.com", now());
        assert_eq!(records.len(), 2);

        let gh = &records[0];
        assert_eq!(gh.id, "github");
        assert_eq!(gh.name.as_deref(), Some("GitHub"));
        assert_eq!(gh.provider.as_deref(), Some("GitHub"));
        assert_eq!(gh.classification, Some(Classification::Official));
        assert_eq!(
            gh.description.as_deref(),
            Some("Repository management, file operations, and GitHub API integration.")
        );
        assert_eq!(
            gh.weekly_metric,
            Some(WeeklyMetric {
                kind: "downloads".into(),
                value: 1234
            })
        );
        assert_eq!(gh.release_date.as_deref(), Some("2024-11-25"));
        assert_eq!(gh.url.as_deref(), Some("https://www.pulsemcp.com/servers/github"));
        assert!(gh.scraped_at.is_some());

        let tiny = &records[1];
        assert_eq!(tiny.provider.as_deref(), Some("Jane Doe"));
        assert_eq!(tiny.description, None);
        assert_eq!(tiny.classification, Some(Classification::Community));
    }

    #[test]
    fn unbadged_server_defaults_to_community() {
        let html = r#"<a href="/servers/x"><h3>X</h3></a>"#;
        let records = parse_list_page(html, RecordKind::Server, "https://d.example", now());
        assert_eq!(records[0].classification, Some(Classification::Community));
    }

    #[test]
    fn parses_client_and_use_case_cards() {
        let html = r#"
<a href="/clients/cursor"><h3>Cursor</h3><span>Anysphere</span>
<p>The AI code editor with first-class MCP tool support built in.</p></a>"#;
        let records = parse_list_page(html, RecordKind::Client, "https://d.example", now());
        assert_eq!(records[0].name.as_deref(), Some("Cursor"));
        assert_eq!(records[0].provider.as_deref(), Some("Anysphere"));
        assert!(records[0].description.as_deref().unwrap().starts_with("The AI code editor"));
        assert_eq!(records[0].classification, None);

        let html = r#"
<a href="/use-cases/triage"><h3>Bug triage</h3>
<p>Let an assistant label and route incoming issues automatically.</p></a>"#;
        let records = parse_list_page(html, RecordKind::UseCase, "https://d.example", now());
        assert_eq!(records[0].title.as_deref(), Some("Bug triage"));
        assert_eq!(records[0].name, None);
        assert!(records[0].description.is_some());
    }

    #[test]
    fn total_pages_from_summary_or_links() {
        assert_eq!(detect_total_pages(SERVER_LIST, RecordKind::Server, 42), Some(155));

        let html = r#"<a href="/clients?page=2">2</a><a href="/clients?page=7">7</a>"#;
        assert_eq!(detect_total_pages(html, RecordKind::Client, 42), Some(7));

        assert_eq!(detect_total_pages("<p>nothing</p>", RecordKind::UseCase, 42), None);
    }

    #[test]
    fn list_urls() {
        assert_eq!(list_url("https://d.example/", RecordKind::UseCase, 1), "https://d.example/use-cases");
        assert_eq!(list_url("https://d.example", RecordKind::Server, 6), "https://d.example/servers?page=6");
    }

    #[test]
    fn star_counts() {
        assert_eq!(parse_star_count("72.7k stars"), Some(72_700));
        assert_eq!(parse_star_count("845 Stars"), Some(845));
        assert_eq!(parse_star_count("⭐ 1.2M"), Some(1_200_000));
        assert_eq!(parse_star_count("Get started"), None);
        assert_eq!(parse_star_count("no numbers"), None);
    }

    #[test]
    fn parses_detail_page() {
        let html = r#"
<html><body>
<a href="https://github.com/pulsemcp">PulseMCP</a>
<a href="//github.com/acme/widget-mcp">acme/widget-mcp 72.7k stars</a>
<a href="https://www.npmjs.com/package/@acme/widget-mcp?activeTab=readme">npm</a>
<a href="https://pypi.org/project/widget-mcp/">PyPI</a>
<span class="tag">Database</span><span class="badge-x">database</span>
<div class="category">Developer Tools</div><a class="label" href="/">Home</a>
</body></html>"#;
        let detail = parse_detail_page(html);
        assert_eq!(detail.source_url.as_deref(), Some("https://github.com/acme/widget-mcp"));
        assert_eq!(detail.github_stars, Some(72_700));
        assert_eq!(detail.npm_package.as_deref(), Some("@acme/widget-mcp"));
        assert_eq!(detail.pypi_package.as_deref(), Some("widget-mcp"));
        assert_eq!(detail.tags, vec!["Database", "Developer Tools"]);
    }

    #[test]
    fn detail_page_without_links() {
        let detail = parse_detail_page("<html><body><p>Coming soon</p></body></html>");
        assert_eq!(detail, DetailPage::default());
    }
}
