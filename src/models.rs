//! Core data models used throughout Universe MCP.
//!
//! A [`Record`] is one directory entry (server, client or use case) as it is
//! stored on disk: one pretty-printed JSON object per file. Only the fields
//! the pipeline reads or writes are modelled; everything else found in a
//! file is carried through `extra` so a load/save cycle never loses data.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Provenance trust tier of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Official,
    Reference,
    #[default]
    Community,
}

impl Classification {
    pub const ALL: [Classification; 3] = [
        Classification::Official,
        Classification::Reference,
        Classification::Community,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Official => "official",
            Classification::Reference => "reference",
            Classification::Community => "community",
        }
    }

    /// Parse a classification, falling back to `Community` for anything
    /// unrecognized.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// Detect a classification badge inside a line of card text.
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| lower.contains(c.as_str()))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "official" => Ok(Classification::Official),
            "reference" => Ok(Classification::Reference),
            "community" => Ok(Classification::Community),
            other => Err(format!(
                "unknown classification '{}'. Must be official, reference, or community.",
                other
            )),
        }
    }
}

impl<'de> Deserialize<'de> for Classification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Classification::parse_lenient(&raw))
    }
}

/// The three record types published by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Server,
    Client,
    UseCase,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Server, RecordKind::Client, RecordKind::UseCase];

    /// Path segment used both on the directory website and under the data dir.
    pub fn segment(&self) -> &'static str {
        match self {
            RecordKind::Server => "servers",
            RecordKind::Client => "clients",
            RecordKind::UseCase => "use-cases",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Server => "server",
            RecordKind::Client => "client",
            RecordKind::UseCase => "use case",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "servers" | "server" => Ok(RecordKind::Server),
            "clients" | "client" => Ok(RecordKind::Client),
            "use-cases" | "usecases" | "use-case" | "usecase" => Ok(RecordKind::UseCase),
            other => Err(format!(
                "unknown record kind '{}'. Available: servers, clients, use-cases",
                other
            )),
        }
    }
}

/// Weekly popularity figure shown on a directory card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyMetric {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: u64,
}

/// Nested `metadata` object of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_stars: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_issues: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchers: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_pushed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub installation_commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm_package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pypi_package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_enriched_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One directory entry as persisted on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Use cases carry a title instead of a name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_metric: Option<WeeklyMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Name, title, or id, whichever is present first.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.id)
    }

    /// Effective classification: absent reads as `Community`.
    pub fn classification(&self) -> Classification {
        self.classification.unwrap_or_default()
    }

    /// Replace categories, deduplicated and sorted.
    pub fn set_categories<I, S>(&mut self, categories: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cats: Vec<String> = categories.into_iter().map(Into::into).collect();
        cats.sort();
        cats.dedup();
        self.categories = cats;
    }

    /// When this record last went through a complete enrichment pass.
    pub fn enriched_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .complete_enriched_at
            .as_deref()
            .and_then(parse_timestamp)
    }
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
