//! Typed extraction of loosely-shaped store rows.
//!
//! Rows are converted once at the ingress boundary. Missing or malformed
//! fields become `None`/empty rather than errors.

use serde_json::{Map, Value};

use crate::traits::RawRow;
use crate::types::{Meta, NeighborEdge};

/// Metadata carried by an evidence row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMeta {
    /// Raw evidence type label; kept as text so unknown types survive.
    pub evidence_type: Option<String>,
    pub filename: Option<String>,
    pub uri: Option<String>,
    pub page: Option<String>,
    pub line_no: Option<String>,
    pub extra: Meta,
}

impl RowMeta {
    fn from_map(map: &Map<String, Value>) -> Self {
        let mut meta = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "type" => meta.evidence_type = text(value),
                "filename" => meta.filename = text(value),
                "uri" => meta.uri = text(value),
                "page" => meta.page = text(value),
                "line_no" => meta.line_no = text(value),
                _ => {
                    meta.extra.insert(key.clone(), value.clone());
                }
            }
        }
        meta
    }

    /// Fill gaps from top-level row fields.
    fn fill_from_row(&mut self, row: &RawRow) {
        let fill = |slot: &mut Option<String>, key: &str| {
            if slot.is_none() {
                *slot = row.get(key).and_then(text);
            }
        };
        fill(&mut self.evidence_type, "type");
        fill(&mut self.filename, "filename");
        fill(&mut self.uri, "uri");
        fill(&mut self.page, "page");
        fill(&mut self.line_no, "line_no");
    }
}

/// An evidence row from a similarity search or a chunk-detail lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRow {
    pub id: Option<String>,
    pub chunk_id: Option<String>,
    pub text: Option<String>,
    pub distance: Option<f64>,
    pub meta: RowMeta,
}

impl StoreRow {
    pub fn from_raw(row: &RawRow) -> Self {
        let mut meta = row.get("meta").and_then(object).map(|m| RowMeta::from_map(&m)).unwrap_or_default();
        meta.fill_from_row(row);
        Self {
            id: row.get("id").and_then(text),
            chunk_id: row.get("chunk_id").and_then(text),
            text: row.get("text").and_then(text),
            distance: row.get("distance").and_then(number),
            meta,
        }
    }

    /// Explicit id first, chunk id second.
    pub fn resolved_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.chunk_id.as_deref())
    }
}

/// Parse one neighbor row. Rows without both endpoints are dropped.
pub fn neighbor_from_raw(row: &RawRow) -> Option<NeighborEdge> {
    let src_chunk_id = row.get("src_chunk_id").and_then(text)?;
    let nbr_chunk_id = row.get("nbr_chunk_id").and_then(text)?;
    let weight = row.get("weight").and_then(number).unwrap_or(0.0).clamp(0.0, 1.0);
    let sources = match row.get("sources") {
        Some(Value::Array(items)) => items.iter().filter_map(text).collect(),
        Some(other) => text(other).into_iter().collect(),
        None => Vec::new(),
    };
    Some(NeighborEdge { src_chunk_id, nbr_chunk_id, weight, sources })
}

/// A classifier prediction row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionRow {
    pub label: Option<String>,
    pub probabilities: Vec<f64>,
}

impl PredictionRow {
    /// Accepts probabilities either as plain numbers or as `{label, prob}`
    /// objects.
    pub fn from_raw(row: &RawRow) -> Self {
        let probabilities = match row.get("predicted_label_probs") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(entry) => entry.get("prob").and_then(number),
                    other => number(other),
                })
                .collect(),
            _ => Vec::new(),
        };
        Self { label: row.get("predicted_label").and_then(text), probabilities }
    }

    pub fn confidence(&self) -> f64 {
        self.probabilities.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Finite numbers only; `"NaN"` and `"inf"` strings count as malformed.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}
