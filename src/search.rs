//! Server search over the generated `all-servers.json` index.
//!
//! All filters are case-insensitive and combine with AND. The keyword
//! matches name, description, provider and tags; provider and category
//! filters match substrings. Results keep index order (by id).

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::config::Config;
use crate::models::{Classification, Record};

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub classification: Option<Classification>,
    pub provider: Option<String>,
    pub category: Option<String>,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        self.keyword.is_none()
            && self.classification.is_none()
            && self.provider.is_none()
            && self.category.is_none()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let haystacks = [
                record.display_name().to_lowercase(),
                record.description.as_deref().unwrap_or("").to_lowercase(),
                record.provider.as_deref().unwrap_or("").to_lowercase(),
                record.tags.join(" ").to_lowercase(),
            ];
            if !haystacks.iter().any(|h| h.contains(&needle)) {
                return false;
            }
        }
        if let Some(classification) = self.classification {
            if record.classification() != classification {
                return false;
            }
        }
        if let Some(provider) = &self.provider {
            let needle = provider.to_lowercase();
            if !record
                .provider
                .as_deref()
                .is_some_and(|p| p.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        if let Some(category) = &self.category {
            let needle = category.to_lowercase();
            if !record
                .categories
                .iter()
                .any(|c| c.to_lowercase().contains(&needle))
            {
                return false;
            }
        }
        true
    }
}

pub fn filter_records<'a>(records: &'a [Record], query: &SearchQuery) -> Vec<&'a Record> {
    records.iter().filter(|r| query.matches(r)).collect()
}

#[derive(Deserialize)]
struct ServerIndex {
    #[serde(default)]
    servers: Vec<Record>,
}

/// Read the server list from `<index_dir>/all-servers.json`.
pub fn load_server_index(config: &Config) -> Result<Vec<Record>> {
    let path = config.data.index_dir.join("all-servers.json");
    if !path.exists() {
        bail!(
            "Index file not found: {}. Run `umcp index` first.",
            path.display()
        );
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let index: ServerIndex = serde_json::from_str(&content)
        .with_context(|| format!("Malformed index file {}", path.display()))?;
    Ok(index.servers)
}

fn badge(classification: Classification) -> &'static str {
    match classification {
        Classification::Official => "[official] ",
        Classification::Reference => "[reference]",
        Classification::Community => "[community]",
    }
}

/// Render results for the terminal.
pub fn render(results: &[&Record], total: usize) -> String {
    let mut out = String::new();
    if results.is_empty() {
        out.push_str("No results.\n");
        return out;
    }

    out.push_str(&format!("Found {} result(s)", total));
    if total > results.len() {
        out.push_str(&format!(", showing first {}", results.len()));
    }
    out.push_str("\n\n");

    for (i, record) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} {}\n",
            i + 1,
            badge(record.classification()),
            record.display_name()
        ));
        if let Some(provider) = &record.provider {
            out.push_str(&format!("    provider: {}\n", provider));
        }
        if let Some(description) = &record.description {
            let short: String = description.chars().take(150).collect();
            let ellipsis = if description.chars().count() > 150 { "..." } else { "" };
            out.push_str(&format!("    {}{}\n", short, ellipsis));
        }
        if !record.categories.is_empty() {
            out.push_str(&format!("    categories: {}\n", record.categories.join(", ")));
        }
        if let Some(score) = record.quality_score {
            out.push_str(&format!("    quality: {}/100\n", score));
        }
        if let Some(metric) = &record.weekly_metric {
            out.push_str(&format!("    weekly {}: {}\n", metric.kind, metric.value));
        }
        if let Some(url) = &record.url {
            out.push_str(&format!("    url: {}\n", url));
        }
        out.push('\n');
    }
    out
}

pub fn run_search(config: &Config, query: &SearchQuery, limit: Option<usize>, json: bool) -> Result<()> {
    if query.is_empty() {
        bail!("Give a keyword or at least one of --classification, --provider, --category.");
    }
    let limit = limit.unwrap_or(config.search.default_limit);
    if limit == 0 {
        bail!("--limit must be at least 1");
    }

    let servers = load_server_index(config)?;
    let matches = filter_records(&servers, query);
    let total = matches.len();
    let shown = &matches[..total.min(limit)];

    if json {
        println!("{}", serde_json::to_string_pretty(shown)?);
    } else {
        print!("{}", render(shown, total));
    }
    Ok(())
}
