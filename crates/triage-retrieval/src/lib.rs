//! triage-retrieval
//!
//! Similarity search, row normalization and graph-neighbor re-ranking, plus
//! the `TriageRetriever` facade that chains them behind the router.

pub mod expand;
pub mod normalize;
pub mod search;

use serde::{Deserialize, Serialize};
use tracing::info;

use triage_core::config::RetrievalConfig;
use triage_core::error::Result;
use triage_core::traits::{EvidenceStore, RoutingClassifier};
use triage_core::types::{EvidenceCandidate, RoutingDecision, Strategy};
use triage_router::{Router, RoutingMode};

pub use expand::{blend_score, GraphExpander};
pub use normalize::Normalizer;
pub use search::{Retriever, MAX_K};

/// Per-query knobs; defaults come from the `retrieval` config section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrieveOptions {
    pub mode: RoutingMode,
    pub graph_boost: f64,
    pub expand_neighbors: usize,
}

impl RetrieveOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self { mode: RoutingMode::Auto, graph_boost: config.graph_boost, expand_neighbors: config.expand_neighbors }
    }
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageResult {
    pub decision: RoutingDecision,
    pub strategy: Strategy,
    pub evidence: Vec<EvidenceCandidate>,
}

/// Route, search, then expand, for one query at a time.
pub struct TriageRetriever<S, C> {
    store: S,
    router: Router<C>,
    config: RetrievalConfig,
}

impl<S: EvidenceStore, C: RoutingClassifier> TriageRetriever<S, C> {
    pub fn new(store: S, router: Router<C>, config: RetrievalConfig) -> Self {
        Self { store, router, config }
    }

    pub fn router(&self) -> &Router<C> {
        &self.router
    }

    pub fn retriever(&self) -> Retriever<&S> {
        Retriever::new(&self.store, self.config.max_k, self.normalizer())
    }

    pub fn expander(&self) -> GraphExpander<&S> {
        GraphExpander::new(&self.store, self.normalizer())
    }

    /// Routing errors (learned mode) and search errors propagate; expansion
    /// failures degrade to the plain search results.
    pub fn retrieve(&self, query_text: &str, options: &RetrieveOptions) -> Result<TriageResult> {
        let (decision, strategy) = self.router.predict_routing(query_text, options.mode)?;
        let retriever = self.retriever();
        let final_k = retriever.clamp_k(decision.k);
        let initial = retriever.vector_search(query_text, decision.k, &decision.types)?;
        let evidence = self.expander().expand(&initial, final_k, options.graph_boost, options.expand_neighbors);
        info!(
            strategy = %strategy,
            label = %decision.label,
            initial = initial.len(),
            returned = evidence.len(),
            graph_boost = options.graph_boost,
            "triage retrieval complete"
        );
        Ok(TriageResult { decision, strategy, evidence })
    }

    fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.config.source_root.clone())
    }
}
