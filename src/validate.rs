//! Structural validation of record files.
//!
//! Each file is checked as raw JSON first, so problems the lenient loader
//! would paper over (an unknown classification, a score out of range) are
//! reported. A file that passes is then decoded as a [`Record`]; anything the
//! index builder would fail to load, such as a string where `github_stars`
//! needs a number, is an error too. Warnings only flag thin data.
//!
//! [`Record`]: crate::models::Record

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::models::{Classification, Record, RecordKind};
use crate::store::RecordStore;

/// Per-kind error listings printed before "... and N more".
const MAX_LISTED: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFindings {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileIssues {
    pub path: PathBuf,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct KindReport {
    pub kind: RecordKind,
    pub total: usize,
    pub valid: usize,
    pub invalid: Vec<FileIssues>,
    pub warnings: Vec<FileIssues>,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub kinds: Vec<KindReport>,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.kinds.iter().map(|k| k.total).sum()
    }

    pub fn invalid(&self) -> usize {
        self.kinds.iter().map(|k| k.invalid.len()).sum()
    }

    pub fn is_valid(&self) -> bool {
        self.invalid() == 0
    }
}

fn is_http_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

/// Check one parsed record file.
pub fn validate_value(kind: RecordKind, path: &Path, value: &Value) -> FileFindings {
    let mut findings = FileFindings::default();
    let errors = &mut findings.errors;
    let warnings = &mut findings.warnings;

    let Some(obj) = value.as_object() else {
        errors.push("top level is not a JSON object".to_string());
        return findings;
    };

    match non_empty_str(obj.get("id")) {
        None => errors.push("missing or empty 'id'".to_string()),
        Some(id) => {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            if id != stem {
                errors.push(format!("id '{}' does not match file name '{}'", id, stem));
            }
        }
    }

    let name_field = if kind == RecordKind::UseCase { "title" } else { "name" };
    match non_empty_str(obj.get(name_field)) {
        None => errors.push(format!("missing or empty '{}'", name_field)),
        Some("Unknown") => warnings.push(format!("{} is 'Unknown'", name_field)),
        Some(_) => {}
    }

    if non_empty_str(obj.get("description")).is_none() {
        warnings.push("missing description".to_string());
    }

    for field in ["url", "source_url"] {
        match obj.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if is_http_url(s) => {}
            Some(other) => errors.push(format!("'{}' is not an http(s) URL: {}", field, other)),
        }
    }
    if matches!(obj.get("url"), None | Some(Value::Null)) {
        warnings.push("missing directory url".to_string());
    }

    if kind == RecordKind::Server {
        match obj.get("classification") {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => match s.parse::<Classification>() {
                Ok(c) => {
                    let dir = path
                        .parent()
                        .and_then(|p| p.file_name())
                        .and_then(|n| n.to_str());
                    if dir.is_some_and(|d| d != c.as_str()) {
                        warnings.push(format!(
                            "classification '{}' but stored under '{}'",
                            c,
                            dir.unwrap_or("")
                        ));
                    }
                }
                Err(e) => errors.push(e),
            },
            Some(other) => errors.push(format!("'classification' is not a string: {}", other)),
        }
    }

    match obj.get("quality_score") {
        None | Some(Value::Null) => {}
        Some(v) => match v.as_u64() {
            Some(n) if n <= 100 => {}
            _ => errors.push(format!("'quality_score' must be an integer in 0..=100, got {}", v)),
        },
    }

    for field in ["categories", "tags", "capabilities"] {
        match obj.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                if !items.iter().all(Value::is_string) {
                    errors.push(format!("'{}' must contain only strings", field));
                } else if field == "categories" {
                    let mut seen = HashSet::new();
                    if !items.iter().all(|i| seen.insert(i.as_str())) {
                        warnings.push("duplicate categories".to_string());
                    }
                }
            }
            Some(_) => errors.push(format!("'{}' must be an array", field)),
        }
    }

    match obj.get("metadata") {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => errors.push("'metadata' must be an object".to_string()),
    }

    if errors.is_empty() {
        if let Err(e) = Record::deserialize(value) {
            errors.push(format!("does not load as a {}: {}", kind.label(), e));
        }
    }

    findings
}

pub fn validate_file(kind: RecordKind, path: &Path) -> FileFindings {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| format!("unreadable: {}", e))
        .and_then(|c| serde_json::from_str::<Value>(&c).map_err(|e| format!("invalid JSON: {}", e)));
    match parsed {
        Ok(value) => validate_value(kind, path, &value),
        Err(message) => FileFindings {
            errors: vec![message],
            warnings: Vec::new(),
        },
    }
}

pub fn validate_kind(store: &RecordStore, kind: RecordKind) -> KindReport {
    let files = store.list_files(kind, None);
    let mut report = KindReport {
        kind,
        total: files.len(),
        valid: 0,
        invalid: Vec::new(),
        warnings: Vec::new(),
    };

    for path in files {
        let findings = validate_file(kind, &path);
        if !findings.warnings.is_empty() {
            report.warnings.push(FileIssues {
                path: path.clone(),
                messages: findings.warnings,
            });
        }
        if findings.errors.is_empty() {
            report.valid += 1;
        } else {
            report.invalid.push(FileIssues {
                path,
                messages: findings.errors,
            });
        }
    }
    report
}

pub fn validate_all(store: &RecordStore) -> ValidationReport {
    ValidationReport {
        kinds: RecordKind::ALL
            .iter()
            .map(|kind| validate_kind(store, *kind))
            .collect(),
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Validate every record file and print a report.
pub fn run_validate(config: &Config, show_warnings: bool) -> Result<ValidationReport> {
    let store = RecordStore::from_config(config);
    let report = validate_all(&store);

    println!("Universe MCP — Data Validation");
    println!("==============================");
    for kind in &report.kinds {
        println!();
        println!("  {}:", kind.kind);
        println!("    valid:    {}", kind.valid);
        println!("    invalid:  {}", kind.invalid.len());
        println!("    warnings: {}", kind.warnings.len());
        println!("    total:    {}", kind.total);
    }

    for kind in report.kinds.iter().filter(|k| !k.invalid.is_empty()) {
        println!();
        println!("  {} errors:", kind.kind);
        for issue in kind.invalid.iter().take(MAX_LISTED) {
            println!("    {}", issue.path.display());
            for message in &issue.messages {
                println!("      - {}", message);
            }
        }
        if kind.invalid.len() > MAX_LISTED {
            println!("    ... and {} more", kind.invalid.len() - MAX_LISTED);
        }
    }

    if show_warnings {
        for kind in report.kinds.iter().filter(|k| !k.warnings.is_empty()) {
            println!();
            println!("  {} warnings:", kind.kind);
            for issue in &kind.warnings {
                println!("    {}: {}", issue.path.display(), issue.messages.join("; "));
            }
        }
    }

    let total = report.total();
    let invalid = report.invalid();
    println!();
    println!(
        "  Total files: {}  valid: {} ({:.1}%)  invalid: {} ({:.1}%)",
        total,
        total - invalid,
        percent(total - invalid, total),
        invalid,
        percent(invalid, total)
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server_path(class: &str, id: &str) -> PathBuf {
        PathBuf::from(format!("data/servers/{}/{}.json", class, id))
    }

    #[test]
    fn well_formed_server_passes() {
        let value = json!({
            "id": "github",
            "name": "GitHub",
            "description": "Repository management",
            "classification": "official",
            "url": "https://www.pulsemcp.com/servers/github",
            "source_url": null,
            "quality_score": 92,
            "categories": ["api", "git"],
            "metadata": {}
        });
        let findings = validate_value(RecordKind::Server, &server_path("official", "github"), &value);
        assert_eq!(findings, FileFindings::default());
    }

    #[test]
    fn structural_errors_reported() {
        let value = json!({
            "id": "other",
            "name": "",
            "classification": "verified",
            "url": "ftp://example.com/x",
            "quality_score": 140,
            "categories": "git",
            "metadata": []
        });
        let findings = validate_value(RecordKind::Server, &server_path("community", "github"), &value);
        assert_eq!(findings.errors.len(), 7, "{:?}", findings.errors);
    }

    #[test]
    fn warnings_do_not_invalidate() {
        let value = json!({
            "id": "x",
            "name": "Unknown",
            "classification": "official",
            "url": "https://d.example/servers/x",
            "categories": ["git", "git"]
        });
        let findings = validate_value(RecordKind::Server, &server_path("community", "x"), &value);
        assert!(findings.errors.is_empty());
        assert_eq!(findings.warnings.len(), 4, "{:?}", findings.warnings);
    }

    #[test]
    fn mistyped_modelled_fields_are_errors() {
        let path = server_path("community", "acme");
        let base = json!({
            "id": "acme",
            "name": "Acme",
            "description": "d",
            "url": "https://d.example/servers/acme"
        });
        let with = |field: &str, v: Value| {
            let mut value = base.clone();
            value[field] = v;
            validate_value(RecordKind::Server, &path, &value)
        };

        let stars = with("metadata", json!({"github_stars": "1.2k"}));
        assert_eq!(stars.errors.len(), 1, "{:?}", stars.errors);
        assert!(stars.errors[0].starts_with("does not load as a server"));
        assert!(stars.errors[0].contains("1.2k"));

        let metric = with("weekly_metric", json!({"type": "downloads", "value": "lots"}));
        assert_eq!(metric.errors.len(), 1, "{:?}", metric.errors);

        // Unmodelled metadata keys are free-form.
        let extra = with("metadata", json!({"featured": "yes", "github_stars": 12}));
        assert!(extra.errors.is_empty(), "{:?}", extra.errors);
    }

    #[test]
    fn validator_agrees_with_the_loader() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());
        let dir = store.kind_dir(RecordKind::Server).join("community");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("acme.json"),
            r#"{"id": "acme", "name": "Acme", "description": "d",
                "url": "https://d.example/servers/acme",
                "metadata": {"github_stars": "1.2k"}}"#,
        )
        .unwrap();

        assert!(store.load(RecordKind::Server).into_records().is_empty());
        let report = validate_all(&store);
        assert_eq!(report.invalid(), 1);
    }

    #[test]
    fn use_cases_need_a_title() {
        let path = PathBuf::from("data/use-cases/triage.json");
        let value = json!({"id": "triage", "name": "Triage", "url": "https://d.example/use-cases/triage"});
        let findings = validate_value(RecordKind::UseCase, &path, &value);
        assert_eq!(findings.errors, vec!["missing or empty 'title'"]);
    }

    #[test]
    fn unparseable_file_is_invalid() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());
        let dir = store.kind_dir(RecordKind::Client);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("broken.json"), "{").unwrap();
        std::fs::write(
            dir.join("ok.json"),
            r#"{"id": "ok", "name": "Ok", "description": "d", "url": "https://d.example/clients/ok"}"#,
        )
        .unwrap();

        let report = validate_all(&store);
        assert_eq!(report.total(), 2);
        assert_eq!(report.invalid(), 1);
        assert!(!report.is_valid());
        let clients = &report.kinds[1];
        assert_eq!(clients.valid, 1);
        assert!(clients.invalid[0].messages[0].starts_with("invalid JSON"));
    }
}
