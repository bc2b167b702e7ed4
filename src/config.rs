use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            index_dir: default_index_dir(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_index_dir() -> PathBuf {
    PathBuf::from("./indexes")
}
fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("./data/.checkpoints")
}

/// Directory-website scraping settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Minimum spacing between page requests, in milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Fixed delays (seconds) between retries of a failed page fetch.
    #[serde(default = "default_retry_delays")]
    pub retry_delays_secs: Vec<u64>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Cards per list page, used to derive the page count from the total.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Page count assumed when the directory does not reveal one.
    #[serde(default = "default_fallback_pages")]
    pub fallback_pages: u32,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_delay_ms: default_page_delay_ms(),
            retry_delays_secs: default_retry_delays(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            per_page: default_per_page(),
            fallback_pages: default_fallback_pages(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.pulsemcp.com".to_string()
}
fn default_page_delay_ms() -> u64 {
    1500
}
fn default_retry_delays() -> Vec<u64> {
    vec![2, 4, 8]
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Universe MCP Enrichment Bot)".to_string()
}
fn default_per_page() -> u32 {
    42
}
fn default_fallback_pages() -> u32 {
    1
}

/// Enrichment pass settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EnrichConfig {
    /// Spacing between records, in milliseconds.
    #[serde(default = "default_record_delay_ms")]
    pub record_delay_ms: u64,
    /// Records enriched more recently than this are skipped.
    #[serde(default = "default_skip_recent_days")]
    pub skip_recent_days: i64,
    #[serde(default = "default_readme_excerpt_chars")]
    pub readme_excerpt_chars: usize,
    #[serde(default = "default_max_capabilities")]
    pub max_capabilities: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            record_delay_ms: default_record_delay_ms(),
            skip_recent_days: default_skip_recent_days(),
            readme_excerpt_chars: default_readme_excerpt_chars(),
            max_capabilities: default_max_capabilities(),
        }
    }
}

fn default_record_delay_ms() -> u64 {
    2500
}
fn default_skip_recent_days() -> i64 {
    7
}
fn default_readme_excerpt_chars() -> usize {
    1500
}
fn default_max_capabilities() -> usize {
    15
}

/// Code-hosting endpoints and the metadata API budget.
#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_raw_base")]
    pub raw_base: String,
    #[serde(default = "default_branches")]
    pub branches: Vec<String>,
    /// Maximum metadata API calls per run (unauthenticated limit is 60/h).
    #[serde(default = "default_api_limit")]
    pub api_limit: u32,
    /// Minimum spacing between metadata API calls, in milliseconds.
    #[serde(default = "default_api_delay_ms")]
    pub api_delay_ms: u64,
    #[serde(default = "default_github_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            raw_base: default_raw_base(),
            branches: default_branches(),
            api_limit: default_api_limit(),
            api_delay_ms: default_api_delay_ms(),
            timeout_secs: default_github_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}
fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".to_string()
}
fn default_branches() -> Vec<String> {
    vec!["main".to_string(), "master".to_string()]
}
fn default_api_limit() -> u32 {
    55
}
fn default_api_delay_ms() -> u64 {
    1200
}
fn default_github_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_web_root")]
    pub web_root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            web_root: default_web_root(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_web_root() -> PathBuf {
    PathBuf::from("./web")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
        }
    }
}

fn default_search_limit() -> usize {
    20
}

impl Config {
    /// All-defaults configuration, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

impl ScrapeConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_delays(&self) -> Vec<Duration> {
        self.retry_delays_secs
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    for (key, value) in [
        ("scrape.base_url", &config.scrape.base_url),
        ("github.api_base", &config.github.api_base),
        ("github.raw_base", &config.github.raw_base),
    ] {
        url::Url::parse(value).with_context(|| format!("{} is not a valid URL: '{}'", key, value))?;
    }

    if config.scrape.timeout_secs == 0 {
        anyhow::bail!("scrape.timeout_secs must be > 0");
    }
    if config.github.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be > 0");
    }
    if config.scrape.per_page == 0 {
        anyhow::bail!("scrape.per_page must be > 0");
    }
    if config.scrape.retry_delays_secs.is_empty() {
        anyhow::bail!("scrape.retry_delays_secs must list at least one delay");
    }
    if config.github.branches.is_empty() {
        anyhow::bail!("github.branches must list at least one branch");
    }
    if config.enrich.skip_recent_days < 0 {
        anyhow::bail!("enrich.skip_recent_days must be >= 0");
    }
    if config.enrich.max_capabilities == 0 {
        anyhow::bail!("enrich.max_capabilities must be > 0");
    }
    if config.search.default_limit == 0 {
        anyhow::bail!("search.default_limit must be >= 1");
    }

    config
        .server
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("server.bind is not a socket address: '{}'", config.server.bind))?;

    Ok(())
}
