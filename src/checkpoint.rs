//! Resumable scrape progress, one small JSON file per record kind.
//!
//! The checkpoint is advisory: it is written after every list page so an
//! interrupted scrape can pick up at `last_page + 1`, but nothing is lost if
//! it is deleted.

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::Config;
use crate::models::RecordKind;
use crate::store::write_json_atomic;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub last_page: u32,
    #[serde(
        default,
        alias = "servers_scraped",
        alias = "clients_scraped",
        alias = "usecases_scraped"
    )]
    pub items_scraped: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
}

#[derive(Debug)]
pub struct Checkpoint {
    path: PathBuf,
    state: CheckpointState,
}

impl Checkpoint {
    pub fn path_for(config: &Config, kind: RecordKind) -> PathBuf {
        config
            .data
            .checkpoint_dir
            .join(format!("{}.json", kind.segment()))
    }

    pub fn for_kind(config: &Config, kind: RecordKind) -> Self {
        Self::load(Self::path_for(config, kind))
    }

    /// Read the checkpoint at `path`. A missing or unreadable file starts
    /// from scratch.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("ignoring malformed checkpoint {}: {}", path.display(), e);
                CheckpointState::default()
            }),
            Err(_) => CheckpointState::default(),
        };
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    /// First page to fetch when resuming, if any page completed before.
    pub fn resume_page(&self) -> Option<u32> {
        (self.state.last_page > 0).then(|| self.state.last_page.saturating_add(1))
    }

    /// Record a completed page and persist immediately.
    pub fn advance(&mut self, page: u32, items_scraped: u64) -> Result<()> {
        self.state.last_page = page;
        self.state.items_scraped = items_scraped;
        self.state.last_run = Some(Utc::now().to_rfc3339());
        write_json_atomic(&self.path, &self.state)
    }
}
