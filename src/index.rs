//! Index builder: a full rebuild of the lookup files from on-disk records.
//!
//! Groups are `BTreeMap`s and records are ordered by id, so two builds over
//! the same data differ only in `generated_at`.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::{Record, RecordKind};
use crate::store::{write_json_atomic, RecordStore};

/// Length of the provider and category leaderboards.
pub const TOP_N: usize = 20;

const CATEGORY_INDEX: &str = "servers-by-category.json";

#[derive(Debug, Serialize, PartialEq)]
pub struct ServerList<'a> {
    pub total: usize,
    pub generated_at: String,
    pub servers: Vec<&'a Record>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ClassificationGroups<'a> {
    pub generated_at: String,
    pub classifications: BTreeMap<String, Vec<&'a Record>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProviderGroups<'a> {
    pub generated_at: String,
    pub providers: BTreeMap<String, Vec<&'a Record>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CategoryGroups<'a> {
    pub generated_at: String,
    pub categories: BTreeMap<String, Vec<&'a Record>>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ClientList<'a> {
    pub total: usize,
    pub generated_at: String,
    pub clients: Vec<&'a Record>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UseCaseList<'a> {
    pub total: usize,
    pub generated_at: String,
    pub use_cases: Vec<&'a Record>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranked {
    pub name: String,
    pub count: usize,
}

/// Ranked counts, serialized as a `{name: count}` object in rank order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leaderboard(pub Vec<Ranked>);

impl Serialize for Leaderboard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.name, &entry.count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Totals {
    pub servers: usize,
    pub clients: usize,
    pub use_cases: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ServerStatistics {
    pub by_classification: BTreeMap<String, usize>,
    pub top_providers: Leaderboard,
    pub top_categories: Leaderboard,
    pub with_description: usize,
    pub with_metrics: usize,
    pub with_source_url: usize,
    pub with_quality_score: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KindTotal {
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Statistics {
    pub generated_at: String,
    pub totals: Totals,
    pub servers: ServerStatistics,
    pub clients: KindTotal,
    pub use_cases: KindTotal,
}

/// Every index file, ready to be written.
#[derive(Debug, PartialEq)]
pub struct Indexes<'a> {
    pub all_servers: ServerList<'a>,
    pub by_classification: ClassificationGroups<'a>,
    pub by_provider: ProviderGroups<'a>,
    /// `None` when no server has a category.
    pub by_category: Option<CategoryGroups<'a>>,
    pub all_clients: ClientList<'a>,
    pub all_use_cases: UseCaseList<'a>,
    pub statistics: Statistics,
}

fn sorted_by_id(records: &[Record]) -> Vec<&Record> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted
}

fn provider_key(record: &Record) -> Option<&str> {
    record
        .provider
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
}

pub fn build_indexes<'a>(
    servers: &'a [Record],
    clients: &'a [Record],
    use_cases: &'a [Record],
    generated_at: &str,
) -> Indexes<'a> {
    let servers = sorted_by_id(servers);
    let clients = sorted_by_id(clients);
    let use_cases = sorted_by_id(use_cases);

    let mut by_classification: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    let mut by_provider: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    let mut by_category: BTreeMap<String, Vec<&Record>> = BTreeMap::new();

    for &server in &servers {
        by_classification
            .entry(server.classification().as_str().to_string())
            .or_default()
            .push(server);
        if let Some(provider) = provider_key(server) {
            by_provider.entry(provider.to_string()).or_default().push(server);
        }
        for category in &server.categories {
            by_category.entry(category.clone()).or_default().push(server);
        }
    }

    let statistics = compute_statistics(&servers, clients.len(), use_cases.len(), generated_at);

    Indexes {
        all_servers: ServerList {
            total: servers.len(),
            generated_at: generated_at.to_string(),
            servers,
        },
        by_classification: ClassificationGroups {
            generated_at: generated_at.to_string(),
            classifications: by_classification,
        },
        by_provider: ProviderGroups {
            generated_at: generated_at.to_string(),
            providers: by_provider,
        },
        by_category: (!by_category.is_empty()).then(|| CategoryGroups {
            generated_at: generated_at.to_string(),
            categories: by_category,
        }),
        all_clients: ClientList {
            total: clients.len(),
            generated_at: generated_at.to_string(),
            clients,
        },
        all_use_cases: UseCaseList {
            total: use_cases.len(),
            generated_at: generated_at.to_string(),
            use_cases,
        },
        statistics,
    }
}

/// The `n` largest counts, ties broken by name.
fn top_n(counts: BTreeMap<String, usize>, n: usize) -> Leaderboard {
    let mut ranked: Vec<Ranked> = counts
        .into_iter()
        .map(|(name, count)| Ranked { name, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(n);
    Leaderboard(ranked)
}

pub fn compute_statistics(
    servers: &[&Record],
    clients: usize,
    use_cases: usize,
    generated_at: &str,
) -> Statistics {
    let mut by_classification = BTreeMap::new();
    let mut providers = BTreeMap::new();
    let mut categories = BTreeMap::new();

    for server in servers {
        *by_classification
            .entry(server.classification().as_str().to_string())
            .or_insert(0) += 1;
        if let Some(provider) = provider_key(server) {
            *providers.entry(provider.to_string()).or_insert(0) += 1;
        }
        for category in &server.categories {
            *categories.entry(category.clone()).or_insert(0) += 1;
        }
    }

    let count = |pred: fn(&Record) -> bool| servers.iter().filter(|s| pred(s)).count();

    Statistics {
        generated_at: generated_at.to_string(),
        totals: Totals {
            servers: servers.len(),
            clients,
            use_cases,
        },
        servers: ServerStatistics {
            by_classification,
            top_providers: top_n(providers, TOP_N),
            top_categories: top_n(categories, TOP_N),
            with_description: count(|s| s.description.as_deref().is_some_and(|d| !d.is_empty())),
            with_metrics: count(|s| s.weekly_metric.is_some()),
            with_source_url: count(|s| s.source_url.is_some()),
            with_quality_score: count(|s| s.quality_score.is_some()),
        },
        clients: KindTotal { total: clients },
        use_cases: KindTotal { total: use_cases },
    }
}

fn write_index<T: Serialize>(dir: &Path, name: &str, value: &T, written: &mut Vec<PathBuf>) -> Result<()> {
    let path = dir.join(name);
    write_json_atomic(&path, value)?;
    written.push(path);
    Ok(())
}

/// Write every index file into `dir`; returns the paths written.
/// Without categories, a category index left by an earlier build is removed.
pub fn write_indexes(dir: &Path, indexes: &Indexes<'_>) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    write_index(dir, "all-servers.json", &indexes.all_servers, &mut written)?;
    write_index(dir, "servers-by-classification.json", &indexes.by_classification, &mut written)?;
    write_index(dir, "servers-by-provider.json", &indexes.by_provider, &mut written)?;
    match &indexes.by_category {
        Some(by_category) => {
            write_index(dir, CATEGORY_INDEX, by_category, &mut written)?;
        }
        None => {
            let stale = dir.join(CATEGORY_INDEX);
            if stale.exists() {
                fs::remove_file(&stale)
                    .with_context(|| format!("Failed to remove {}", stale.display()))?;
            }
        }
    }
    write_index(dir, "all-clients.json", &indexes.all_clients, &mut written)?;
    write_index(dir, "all-usecases.json", &indexes.all_use_cases, &mut written)?;
    write_index(dir, "statistics.json", &indexes.statistics, &mut written)?;
    Ok(written)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub servers: usize,
    pub clients: usize,
    pub use_cases: usize,
    pub skipped_files: usize,
    pub files: Vec<PathBuf>,
}

/// Load all records, rebuild every index and write it to `data.index_dir`.
pub fn run_index(config: &Config) -> Result<IndexSummary> {
    let store = RecordStore::from_config(config);

    let mut skipped_files = 0;
    let mut load = |kind: RecordKind| {
        let report = store.load(kind);
        skipped_files += report.failures.len();
        report.into_records()
    };
    let servers = load(RecordKind::Server);
    let clients = load(RecordKind::Client);
    let use_cases = load(RecordKind::UseCase);

    let generated_at = Utc::now().to_rfc3339();
    let indexes = build_indexes(&servers, &clients, &use_cases, &generated_at);
    let files = write_indexes(&config.data.index_dir, &indexes)?;

    println!("Loaded {} servers, {} clients, {} use cases", servers.len(), clients.len(), use_cases.len());
    if skipped_files > 0 {
        println!("Skipped {} unreadable file(s)", skipped_files);
    }
    for file in &files {
        println!("  wrote {}", file.display());
    }

    Ok(IndexSummary {
        servers: servers.len(),
        clients: clients.len(),
        use_cases: use_cases.len(),
        skipped_files,
        files,
    })
}
