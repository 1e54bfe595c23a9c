//! Domain types shared by the chunker, router and retrieval stages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, Value>;

/// Evidence class of an ingested record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Log,
    Pdf,
    Image,
    ImageOcr,
}

impl EvidenceType {
    pub const ALL: [EvidenceType; 4] = [Self::Log, Self::Pdf, Self::Image, Self::ImageOcr];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::ImageOcr => "image_ocr",
        }
    }

    /// Case-insensitive lookup of the wire label; unknown labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|t| t.as_str().eq_ignore_ascii_case(label))
    }

    /// Types whose location is a page number rather than a line.
    pub fn is_paginated(self) -> bool {
        matches!(self, Self::Pdf | Self::ImageOcr)
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ingested text record prior to chunking.
///
/// - `doc_id`: stable identity of the source document
/// - `evidence_type`/`uri`: copied into every chunk's meta
/// - `page`/`line_no`: optional location markers, part of chunk identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub doc_id: String,
    #[serde(rename = "type")]
    pub evidence_type: EvidenceType,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_no: Option<u32>,
    pub text: String,
    #[serde(default)]
    pub meta: Meta,
}

impl Record {
    pub fn new(doc_id: impl Into<String>, evidence_type: EvidenceType, uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            evidence_type,
            uri: uri.into(),
            page: None,
            line_no: None,
            text: text.into(),
            meta: Meta::new(),
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_line_no(mut self, line_no: u32) -> Self {
        self.line_no = Some(line_no);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Page and line markers joined with `|`, e.g. `p3|l12`.
    pub fn provenance_tag(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(page) = self.page {
            parts.push(format!("p{page}"));
        }
        if let Some(line_no) = self.line_no {
            parts.push(format!("l{line_no}"));
        }
        parts.join("|")
    }
}

/// A token window of a record with a content-addressed identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub doc_id: String,
    pub text: String,
    pub meta: Meta,
}

/// Indicates which path produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Vector,
    Graph,
}

/// A retrieved piece of evidence. `distance` is lower-is-closer; the score
/// fields are only populated once the candidate went through expansion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EvidenceCandidate {
    pub id: Option<ChunkId>,
    pub text: String,
    pub distance: Option<f64>,
    pub source: String,
    pub graph_weight: Option<f64>,
    pub vector_score: Option<f64>,
    pub final_score: Option<f64>,
    pub source_type: Option<SourceKind>,
}

/// Read-only relationship edge between two chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NeighborEdge {
    pub src_chunk_id: ChunkId,
    pub nbr_chunk_id: ChunkId,
    pub weight: f64,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Learned,
    Heuristic,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Learned => "learned",
            Self::Heuristic => "heuristic",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry of the three-way routing table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RouteLabel {
    LogsOnly,
    PdfImage,
    Mixed,
}

impl RouteLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LogsOnly => "logs_only",
            Self::PdfImage => "pdf_image",
            Self::Mixed => "mixed",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "logs_only" => Some(Self::LogsOnly),
            "pdf_image" => Some(Self::PdfImage),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

impl fmt::Display for RouteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output attached to learned decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionMeta {
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

/// Keyword counts attached to heuristic decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeuristicMeta {
    pub log_matches: usize,
    pub doc_matches: usize,
    pub query_length: usize,
    pub label: RouteLabel,
}

/// Evidence-type filter and breadth chosen for one query.
/// An empty `types` means unrestricted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutingDecision {
    pub types: Vec<EvidenceType>,
    pub k: usize,
    pub strategy: Strategy,
    pub label: RouteLabel,
    pub prediction: Option<PredictionMeta>,
    pub heuristic: Option<HeuristicMeta>,
}

impl RoutingDecision {
    pub fn confidence(&self) -> Option<f64> {
        self.prediction.as_ref().map(|p| p.confidence)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.types.is_empty()
    }
}
