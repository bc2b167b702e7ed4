//! The enrichment pipeline's seam to the outside world.
//!
//! [`EnrichSource`] covers the three remote reads the enrichment pass makes
//! for a record: its directory detail page, its repository README, and its
//! repository metadata. The live implementation is
//! [`HttpSource`](crate::enrich::HttpSource); tests substitute canned data.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use universe_mcp::fetch::FetchError;
//! use universe_mcp::github::{RepoInfo, RepoRef};
//! use universe_mcp::traits::EnrichSource;
//!
//! pub struct Offline;
//!
//! #[async_trait]
//! impl EnrichSource for Offline {
//!     async fn fetch_detail_page(&self, _url: &str) -> Result<String, FetchError> {
//!         Ok(String::new())
//!     }
//!     async fn fetch_readme(&self, _repo: &RepoRef) -> Option<String> {
//!         None
//!     }
//!     async fn fetch_repo_info(&self, _repo: &RepoRef) -> Result<Option<RepoInfo>, FetchError> {
//!         Ok(None)
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::fetch::FetchError;
use crate::github::{RepoInfo, RepoRef};

#[async_trait]
pub trait EnrichSource: Send + Sync {
    /// HTML of a record's directory detail page.
    ///
    /// Implementations retry transient failures themselves; an `Err` here
    /// means the record is abandoned for this run.
    async fn fetch_detail_page(&self, url: &str) -> Result<String, FetchError>;

    /// README markdown, or `None` when no branch has one.
    async fn fetch_readme(&self, repo: &RepoRef) -> Option<String>;

    /// Repository metadata. `Ok(None)` means the repository does not exist;
    /// a rate-limit refusal is reported as an `Err` for which
    /// [`FetchError::is_rate_limited`] holds.
    async fn fetch_repo_info(&self, repo: &RepoRef) -> Result<Option<RepoInfo>, FetchError>;
}
