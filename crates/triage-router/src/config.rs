use serde::{Deserialize, Serialize};

use triage_core::error::{Error, Result};
use triage_core::types::{EvidenceType, RouteLabel};

/// Evidence filter and breadth for one routing-table entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteSpec {
    #[serde(default)]
    pub types: Vec<EvidenceType>,
    pub k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoutingTable {
    pub logs_only: RouteSpec,
    pub pdf_image: RouteSpec,
    pub mixed: RouteSpec,
}

impl RoutingTable {
    pub fn get(&self, label: RouteLabel) -> &RouteSpec {
        match label {
            RouteLabel::LogsOnly => &self.logs_only,
            RouteLabel::PdfImage => &self.pdf_image,
            RouteLabel::Mixed => &self.mixed,
        }
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self {
            logs_only: RouteSpec { types: vec![EvidenceType::Log], k: 8 },
            pdf_image: RouteSpec { types: vec![EvidenceType::Pdf, EvidenceType::Image, EvidenceType::ImageOcr], k: 6 },
            mixed: RouteSpec { types: vec![], k: 10 },
        }
    }
}

/// Keyword lists and routing table for the router. Loaded from the
/// `router` config section and fixed for the router's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RouterConfig {
    pub log_keywords: Vec<String>,
    pub doc_keywords: Vec<String>,
    pub min_keyword_matches: usize,
    pub routes: RoutingTable,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let words = |list: &[&str]| -> Vec<String> { list.iter().map(|s| (*s).to_string()).collect() };
        Self {
            log_keywords: words(&["error", "warn", "debug", "fatal", "exception", "stack", "trace", "timeout", "connection"]),
            doc_keywords: words(&["pdf", "document", "image", "screenshot", "manual", "guide", "diagram", "chart", "scan", "ocr"]),
            min_keyword_matches: 2,
            routes: RoutingTable::default(),
        }
    }
}

impl RouterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.log_keywords.iter().chain(&self.doc_keywords).any(|k| k.trim().is_empty()) {
            return Err(Error::InvalidConfig("routing keywords must not be blank".to_string()));
        }
        let doc: Vec<String> = self.doc_keywords.iter().map(|k| k.to_lowercase()).collect();
        if let Some(shared) = self.log_keywords.iter().map(|k| k.to_lowercase()).find(|k| doc.contains(k)) {
            return Err(Error::InvalidConfig(format!("keyword `{shared}` appears in both log and document lists")));
        }
        for label in [RouteLabel::LogsOnly, RouteLabel::PdfImage, RouteLabel::Mixed] {
            if self.routes.get(label).k == 0 {
                return Err(Error::InvalidConfig(format!("route `{label}` must request at least one result")));
            }
        }
        Ok(())
    }
}
