use triage_core::row::{RowMeta, StoreRow};
use triage_core::traits::RawRow;
use triage_core::types::{EvidenceCandidate, EvidenceType};

/// Shapes store rows into evidence candidates with a provenance string.
#[derive(Debug, Clone)]
pub struct Normalizer {
    root: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new("store")
    }
}

impl Normalizer {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn normalize_raw(&self, row: &RawRow) -> EvidenceCandidate {
        self.normalize(&StoreRow::from_raw(row))
    }

    pub fn normalize(&self, row: &StoreRow) -> EvidenceCandidate {
        EvidenceCandidate {
            id: row.resolved_id().map(str::to_string),
            text: row.text.clone().unwrap_or_default(),
            distance: row.distance,
            source: self.source(&row.meta),
            ..EvidenceCandidate::default()
        }
    }

    /// `root:{type}:{filename-or-uri}[:location]`.
    ///
    /// Location is `p{page}` for paginated types and the raw line number for
    /// logs; images and unknown types get none. Without a type the string is
    /// just the root.
    pub fn source(&self, meta: &RowMeta) -> String {
        let Some(raw_type) = meta.evidence_type.as_deref() else {
            return self.root.clone();
        };
        let mut parts = vec![self.root.as_str(), raw_type];
        if let Some(file) = meta.filename.as_deref().or(meta.uri.as_deref()) {
            parts.push(file);
        }
        let location = match EvidenceType::from_label(raw_type) {
            Some(t) if t.is_paginated() => meta.page.as_ref().map(|p| format!("p{p}")),
            Some(EvidenceType::Log) => meta.line_no.clone(),
            _ => None,
        };
        let mut source = parts.join(":");
        if let Some(location) = location {
            source.push(':');
            source.push_str(&location);
        }
        source
    }
}
