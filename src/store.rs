//! On-disk record store: one pretty-printed JSON file per record.
//!
//! Layout under the data directory:
//!
//! ```text
//! servers/<classification>/<id>.json
//! clients/<id>.json
//! use-cases/<id>.json
//! ```
//!
//! Every write goes to a temporary file in the target directory and is then
//! renamed over the destination, so an interrupted run never leaves a
//! truncated record behind. Saving merges into whatever is already on disk:
//! fields the new record carries overwrite, fields it lacks are kept.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::{Classification, Record, RecordKind};

/// A record together with the file it was read from.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub path: PathBuf,
    pub record: Record,
}

#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of loading every record of one kind.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub records: Vec<StoredRecord>,
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn into_records(self) -> Vec<Record> {
        self.records.into_iter().map(|s| s.record).collect()
    }
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.data.dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn kind_dir(&self, kind: RecordKind) -> PathBuf {
        self.root.join(kind.segment())
    }

    /// Where a record of `kind` belongs.
    pub fn path_for(&self, kind: RecordKind, record: &Record) -> Result<PathBuf> {
        check_id(&record.id)?;
        let file = format!("{}.json", record.id);
        Ok(match kind {
            RecordKind::Server => self
                .kind_dir(kind)
                .join(record.classification().as_str())
                .join(file),
            RecordKind::Client | RecordKind::UseCase => self.kind_dir(kind).join(file),
        })
    }

    /// Save a record at its canonical path, merging with the existing file.
    ///
    /// A server whose classification changed is moved: the old file is
    /// merged in and then removed, so each id lives in exactly one place.
    pub fn save(&self, kind: RecordKind, record: &Record) -> Result<PathBuf> {
        let path = self.path_for(kind, record)?;

        let previous = if kind == RecordKind::Server && !path.exists() {
            self.find_server_file(&record.id)
        } else {
            None
        };

        match &previous {
            Some(old) => {
                let existing = read_json(old)?;
                write_merged(&path, existing, record)?;
                fs::remove_file(old)
                    .with_context(|| format!("Failed to remove {}", old.display()))?;
                info!(
                    "{} moved from {} to {}",
                    record.id,
                    old.display(),
                    path.display()
                );
            }
            None => self.save_at(&path, record)?,
        }

        Ok(path)
    }

    /// Save a record at an explicit path, merging with the existing file.
    pub fn save_at(&self, path: &Path, record: &Record) -> Result<()> {
        let existing = if path.exists() {
            read_json(path)?
        } else {
            Value::Object(Default::default())
        };
        write_merged(path, existing, record)
    }

    fn find_server_file(&self, id: &str) -> Option<PathBuf> {
        let dir = self.kind_dir(RecordKind::Server);
        Classification::ALL
            .iter()
            .map(|c| dir.join(c.as_str()).join(format!("{}.json", id)))
            .find(|p| p.is_file())
    }

    /// Record files of `kind`, sorted by path. For servers, `classification`
    /// narrows the walk to one subdirectory.
    pub fn list_files(&self, kind: RecordKind, classification: Option<Classification>) -> Vec<PathBuf> {
        let mut dir = self.kind_dir(kind);
        if let (RecordKind::Server, Some(c)) = (kind, classification) {
            dir = dir.join(c.as_str());
        }
        if !dir.is_dir() {
            return Vec::new();
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_record_file(p))
            .collect();
        files.sort();
        files
    }

    /// Load every record of `kind`. Unreadable or malformed files are
    /// reported in [`LoadReport::failures`] and skipped.
    pub fn load(&self, kind: RecordKind) -> LoadReport {
        let mut report = LoadReport::default();
        for path in self.list_files(kind, None) {
            match load_record(&path) {
                Ok(record) => report.records.push(StoredRecord { path, record }),
                Err(e) => {
                    warn!("skipping {}: {:#}", path.display(), e);
                    report.failures.push(LoadFailure {
                        path,
                        message: format!("{:#}", e),
                    });
                }
            }
        }
        report
    }
}

fn is_record_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".json") && !name.starts_with('.')
}

/// Ids become file names, so they must be a single plain path component.
fn check_id(id: &str) -> Result<()> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\'])
        || id.starts_with('.')
    {
        bail!("invalid record id '{}'", id);
    }
    Ok(())
}

pub fn load_record(path: &Path) -> Result<Record> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let record: Record = serde_json::from_str(&content)
        .with_context(|| format!("Malformed record JSON in {}", path.display()))?;
    Ok(record)
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str::<Value>(&content) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) | Err(_) => {
            warn!("{} is not a JSON object; overwriting", path.display());
            Ok(Value::Object(Default::default()))
        }
    }
}

fn write_merged(path: &Path, mut existing: Value, record: &Record) -> Result<()> {
    let update = serde_json::to_value(record)?;
    merge_into(&mut existing, update);
    write_json_atomic(path, &existing)
}

/// Deep-merge `update` into `base`. Objects merge key by key; any other
/// value replaces what was there.
pub fn merge_into(base: &mut Value, update: Value) {
    match (base, update) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(slot) if slot.is_object() && value.is_object() => merge_into(slot, value),
                    _ => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid output path {}", path.display()))?;
    let tmp = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');

    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(())
    })();

    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}
