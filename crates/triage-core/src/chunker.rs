use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::{Chunk, Record};

/// Upper bound on window size regardless of caller input.
pub const MAX_TOKENS_CEILING: usize = 4096;
const CHUNK_ID_HEX_LEN: usize = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 512, overlap: 50 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, records: &[Record]) -> Vec<Chunk> {
        to_chunks(records, self.config.max_tokens, self.config.overlap)
    }
}

/// Split records into overlapping word windows with stable ids.
///
/// Tokens are whitespace-delimited words. A window is emitted once it holds
/// `max_tokens` words or the record ends; the next window is seeded with
/// the last `overlap` words when the emitted window is longer than that.
pub fn to_chunks(records: &[Record], max_tokens: usize, overlap: usize) -> Vec<Chunk> {
    let max_tokens = max_tokens.min(MAX_TOKENS_CEILING);
    let mut chunks = Vec::new();
    for record in records {
        let words: Vec<&str> = record.text.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let tag = record.provenance_tag();
        let mut window: Vec<&str> = Vec::new();
        let mut start = 0usize;
        for (i, &word) in words.iter().enumerate() {
            window.push(word);
            if window.len() < max_tokens && i + 1 < words.len() {
                continue;
            }
            chunks.push(Chunk {
                chunk_id: chunk_id(&record.doc_id, start, i, &tag),
                doc_id: record.doc_id.clone(),
                text: window.join(" "),
                meta: chunk_meta(record),
            });
            if overlap > 0 && window.len() > overlap {
                window.drain(..window.len() - overlap);
                start = i + 1 - overlap;
            } else {
                window.clear();
                start = i + 1;
            }
        }
    }
    debug!(records = records.len(), chunks = chunks.len(), max_tokens, overlap, "chunked records");
    chunks
}

/// First 24 hex chars of `blake3("{doc_id}:{start}:{end}:{tag}")`.
pub fn chunk_id(doc_id: &str, window_start: usize, window_end: usize, provenance_tag: &str) -> String {
    let base = format!("{doc_id}:{window_start}:{window_end}:{provenance_tag}");
    let mut hex = blake3::hash(base.as_bytes()).to_hex().to_string();
    hex.truncate(CHUNK_ID_HEX_LEN);
    hex
}

fn chunk_meta(record: &Record) -> crate::types::Meta {
    let mut meta = record.meta.clone();
    meta.insert("type".to_string(), Value::String(record.evidence_type.as_str().to_string()));
    meta.insert("uri".to_string(), Value::String(record.uri.clone()));
    meta
}
