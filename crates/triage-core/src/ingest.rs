//! Log-file ingestion into line records.

use anyhow::Result;
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use twox_hash::XxHash64;

use crate::types::{EvidenceType, Record};

pub struct LogParser {
    timestamp: Regex,
    component: Regex,
}

impl LogParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            timestamp: Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")?,
            component: Regex::new(r"\[(?P<bracket>[A-Za-z0-9_\-]+)\]|(?P<prefix>[A-Za-z0-9_]+):")?,
        })
    }

    /// One record per non-empty line, `line_no` 1-based. A missing file
    /// yields no records.
    pub fn parse_log(&self, path: &Path) -> Result<Vec<Record>> {
        if !path.exists() {
            debug!(path = %path.display(), "log file missing, skipping");
            return Ok(vec![]);
        }
        let path = path.canonicalize()?;
        let bytes = fs::read(&path)?;
        let filename = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        let doc_id = format!("{}:{}", content_hash(&bytes), filename);
        let uri = format!("file://{}", path.display());
        let content = String::from_utf8_lossy(&bytes);

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let raw = line.trim();
            if raw.is_empty() {
                continue;
            }
            let line_no = u32::try_from(idx + 1).unwrap_or(u32::MAX);
            let mut record = Record::new(doc_id.clone(), EvidenceType::Log, uri.clone(), raw)
                .with_line_no(line_no)
                .with_meta("filename", filename.clone())
                .with_meta("line_no", line_no);
            let (timestamp, component) = self.extract(raw);
            if let Some(ts) = timestamp {
                record.meta.insert("timestamp".to_string(), Value::String(ts));
            }
            if let Some(comp) = component {
                record.meta.insert("component".to_string(), Value::String(comp));
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Component is searched after the timestamp so `10:00` is never taken
    /// for a `prefix:` tag.
    fn extract(&self, line: &str) -> (Option<String>, Option<String>) {
        let ts = self.timestamp.find(line);
        let rest = ts.map_or(line, |m| &line[m.end()..]);
        let component = self.component.captures(rest).and_then(|c| c.name("bracket").or_else(|| c.name("prefix"))).map(|m| m.as_str().to_string());
        (ts.map(|m| m.as_str().to_string()), component)
    }
}

/// Parse every `*.log` file under `root`, in path order.
pub fn collect_log_records(root: &Path) -> Result<Vec<Record>> {
    let parser = LogParser::new()?;
    let files = list_log_files(root);
    let mut records = Vec::new();
    for (i, file) in files.iter().enumerate() {
        debug!(file = %file.display(), "parsing log {}/{}", i + 1, files.len());
        records.extend(parser.parse_log(file)?);
    }
    info!(files = files.len(), records = records.len(), root = %root.display(), "collected log records");
    Ok(records)
}

fn list_log_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("log"))
        .collect();
    files.sort();
    files
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.write(bytes.len().to_string().as_bytes());
    format!("{:016x}", hasher.finish())
}
