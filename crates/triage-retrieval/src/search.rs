use tracing::debug;

use triage_core::error::Result;
use triage_core::traits::{EvidenceStore, QueryParams, Template};
use triage_core::types::{EvidenceCandidate, EvidenceType};

use crate::normalize::Normalizer;

/// Absolute breadth ceiling for a similarity query.
pub const MAX_K: usize = 8;

/// Similarity search against the backing store.
pub struct Retriever<S> {
    store: S,
    max_k: usize,
    normalizer: Normalizer,
}

impl<S: EvidenceStore> Retriever<S> {
    /// `max_k` can only tighten the ceiling, never raise it above `MAX_K`.
    pub fn new(store: S, max_k: usize, normalizer: Normalizer) -> Self {
        Self { store, max_k: max_k.clamp(1, MAX_K), normalizer }
    }

    pub fn clamp_k(&self, k: usize) -> usize {
        k.clamp(1, self.max_k)
    }

    /// Closest-first candidates. An empty `types` searches every class.
    /// Store failures propagate; there is no fallback at this level.
    pub fn vector_search(&self, query_text: &str, k: usize, types: &[EvidenceType]) -> Result<Vec<EvidenceCandidate>> {
        let top_k = self.clamp_k(k);
        if top_k != k {
            debug!(requested = k, top_k, "clamped search breadth");
        }
        let mut params = QueryParams::new().text("query_text", query_text).int("top_k", i64::try_from(top_k).unwrap_or(i64::MAX));
        if !types.is_empty() {
            params = params.list("types", types.iter().map(|t| t.as_str()));
        }
        let rows = self.store.run_template(Template::VectorSearch, &params)?;
        let candidates: Vec<EvidenceCandidate> = rows.iter().map(|row| self.normalizer.normalize_raw(row)).collect();
        debug!(top_k, returned = candidates.len(), "vector search complete");
        Ok(candidates)
    }
}
