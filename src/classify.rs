//! Keyword-based topic classification.
//!
//! A record's categories are every entry of [`CATEGORY_KEYWORDS`] with at
//! least one trigger substring present in the (lowercased) input text. There
//! is no weighting or stemming, so the same text always yields the same set.

use std::collections::BTreeSet;

/// Category name → trigger substrings (all lowercase).
pub const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "database",
        &["database", "sql", "postgresql", "mysql", "mongodb", "redis", "sqlite", "supabase", "prisma"],
    ),
    (
        "browser",
        &["browser", "puppeteer", "playwright", "selenium", "chrome", "firefox", "web automation"],
    ),
    (
        "filesystem",
        &["filesystem", "file system", "files", "directory", "folders", "storage"],
    ),
    (
        "api",
        &["api", "rest", "graphql", "http", "endpoint", "web service", "webhook"],
    ),
    (
        "search",
        &["search", "elasticsearch", "algolia", "indexing", "query", "find"],
    ),
    (
        "ai",
        &["ai", "llm", "machine learning", "neural", "gpt", "claude", "openai", "anthropic"],
    ),
    (
        "cloud",
        &["aws", "azure", "gcp", "cloud", "s3", "lambda", "cloudflare"],
    ),
    (
        "git",
        &["git", "github", "gitlab", "version control", "repository", "commit"],
    ),
    (
        "messaging",
        &["slack", "discord", "telegram", "email", "notification", "messaging", "chat"],
    ),
    (
        "documentation",
        &["documentation", "docs", "wiki", "markdown", "readme"],
    ),
    (
        "testing",
        &["test", "testing", "qa", "validation", "assertion", "spec"],
    ),
    (
        "monitoring",
        &["monitoring", "logging", "metrics", "observability", "analytics", "tracking"],
    ),
    (
        "security",
        &["security", "auth", "authentication", "authorization", "encryption", "oauth"],
    ),
    (
        "development",
        &["development", "dev tools", "debugging", "code", "programming", "ide"],
    ),
    (
        "data",
        &["data", "analytics", "visualization", "chart", "graph", "report"],
    ),
];

/// Categories whose triggers appear anywhere in `text`.
pub fn classify(text: &str) -> BTreeSet<&'static str> {
    let text = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, triggers)| triggers.iter().any(|t| text.contains(t)))
        .map(|(category, _)| *category)
        .collect()
}

/// Classify several text fragments as one document.
pub fn classify_parts<'a, I>(parts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let joined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    classify(&joined).into_iter().map(str::to_string).collect()
}
