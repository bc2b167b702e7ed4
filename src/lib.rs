//! # Universe MCP
//!
//! A local catalog of the MCP ecosystem: servers, clients and use cases
//! scraped from a public directory, enriched from GitHub, and published as
//! static JSON indexes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Directory  │──▶│   Scraper   │──▶│ data/*.json  │
//! │   website   │   │ (checkpoint)│   │ one per item │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//! ┌─────────────┐   ┌─────────────┐          │
//! │   GitHub    │──▶│  Enricher   │◀─────────┤
//! │ raw + API   │   │ (budgeted)  │──────────┤
//! └─────────────┘   └─────────────┘          ▼
//!                                     ┌──────────────┐
//!                   ┌──────────┐      │   Indexes    │
//!                   │  search  │◀─────│ indexes/*.json│
//!                   │  serve   │      └──────────────┘
//!                   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! umcp scrape all --test        # a couple of pages of each kind
//! umcp enrich --test            # enrich a handful of servers
//! umcp index                    # rebuild indexes/*.json
//! umcp search github --classification official
//! umcp serve                    # web UI + indexes on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Record, classification and record-kind types |
//! | [`store`] | One-file-per-record persistence with merge-on-save |
//! | [`checkpoint`] | Resumable scrape progress |
//! | [`fetch`] | HTTP client and retry policy |
//! | [`rate_limit`] | Token-bucket pacing and API call budget |
//! | [`directory`] | Directory list/detail page parsing |
//! | [`scrape`] | Paginated scraping of one record kind |
//! | [`github`] | GitHub README and repository metadata access |
//! | [`readme`] | Capability, install-command and runtime extraction |
//! | [`classify`] | Keyword-based categorization |
//! | [`score`] | Quality score |
//! | [`enrich`] | Per-record enrichment pipeline |
//! | [`traits`] | Enrichment source abstraction |
//! | [`index`] | Index and statistics generation |
//! | [`search`] | Server search over the generated index |
//! | [`validate`] | Structural validation of record files |
//! | [`stats`] | Enrichment coverage report |
//! | [`server`] | Static file server |
//! | [`update`] | Scrape-then-index pipeline |
//! | [`progress`] | Progress reporting on stderr |

pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod directory;
pub mod enrich;
pub mod fetch;
pub mod github;
pub mod index;
pub mod models;
pub mod progress;
pub mod rate_limit;
pub mod readme;
pub mod score;
pub mod scrape;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
pub mod traits;
pub mod update;
pub mod validate;
