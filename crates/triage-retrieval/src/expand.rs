//! Graph-neighbor expansion and score-blending re-ranker.
//!
//! Direct matches keep `final_score == vector_score`. Neighbors pulled in
//! through the relationship graph are scored by blending a synthesized
//! vector score with their edge weight:
//!
//! `final = (1 - graph_boost) * vector_score + graph_boost * graph_weight`
//!
//! Any external failure while expanding degrades to the initial candidates.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use triage_core::error::ExternalCallError;
use triage_core::row::{neighbor_from_raw, StoreRow};
use triage_core::traits::{EvidenceStore, QueryParams, Template};
use triage_core::types::{EvidenceCandidate, NeighborEdge, SourceKind};

use crate::normalize::Normalizer;

/// Lower bound of a synthesized neighbor distance.
const MIN_NEIGHBOR_DISTANCE: f64 = 0.1;

pub fn blend_score(vector_score: f64, graph_weight: f64, graph_boost: f64) -> f64 {
    (1.0 - graph_boost) * vector_score + graph_boost * graph_weight
}

/// Distance assigned to a neighbor that has no similarity distance of its own.
pub fn neighbor_distance(graph_weight: f64) -> f64 {
    (1.0 - graph_weight).max(MIN_NEIGHBOR_DISTANCE)
}

pub struct GraphExpander<S> {
    store: S,
    normalizer: Normalizer,
}

impl<S: EvidenceStore> GraphExpander<S> {
    pub fn new(store: S, normalizer: Normalizer) -> Self {
        Self { store, normalizer }
    }

    /// Augment `initial` with graph neighbors and re-rank.
    ///
    /// Returns `initial` unchanged when `graph_boost` is zero or there is
    /// nothing to expand. Never returns fewer candidates than the initial
    /// set on failure: a store error yields `initial` as-is.
    pub fn expand(&self, initial: &[EvidenceCandidate], final_k: usize, graph_boost: f64, expand_neighbors: usize) -> Vec<EvidenceCandidate> {
        let graph_boost = if graph_boost.is_finite() { graph_boost.clamp(0.0, 1.0) } else { 0.0 };
        if graph_boost == 0.0 || initial.is_empty() {
            return initial.to_vec();
        }
        match self.try_expand(initial, final_k, graph_boost, expand_neighbors) {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!(error = %e, "graph expansion failed, keeping vector results");
                initial.to_vec()
            }
        }
    }

    fn try_expand(
        &self,
        initial: &[EvidenceCandidate],
        final_k: usize,
        graph_boost: f64,
        expand_neighbors: usize,
    ) -> Result<Vec<EvidenceCandidate>, ExternalCallError> {
        let initial_ids = distinct_ids(initial);
        // first occurrence wins for repeated ids
        let mut kept: HashSet<String> = HashSet::new();
        let mut ranked: Vec<EvidenceCandidate> = initial
            .iter()
            .filter(|c| c.id.as_ref().map_or(true, |id| kept.insert(id.clone())))
            .map(score_direct_match)
            .collect();

        if !initial_ids.is_empty() && expand_neighbors > 0 {
            let edges = self.fetch_edges(&initial_ids, expand_neighbors)?;
            let present: HashSet<&str> = initial_ids.iter().map(String::as_str).collect();
            let weights = neighbor_weights(&edges, &present);
            if !weights.is_empty() {
                let neighbors = self.fetch_neighbors(&weights, &present, graph_boost)?;
                debug!(edges = edges.len(), neighbors = neighbors.len(), "merged graph neighbors");
                ranked.extend(neighbors);
            }
        }

        // stable: equal scores keep direct matches ahead of neighbors
        ranked.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
        ranked.truncate(final_k);
        Ok(ranked)
    }

    /// Up to `per_source` heaviest non-self edges for each source id.
    fn fetch_edges(&self, ids: &[String], per_source: usize) -> Result<Vec<NeighborEdge>, ExternalCallError> {
        let params = QueryParams::new()
            .list("chunk_ids", ids.iter().cloned())
            .int("max_neighbors", i64::try_from(per_source).unwrap_or(i64::MAX));
        let rows = self.store.run_template(Template::ChunkNeighbors, &params)?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let mut by_source: HashMap<String, Vec<NeighborEdge>> = HashMap::new();
        for edge in rows.iter().filter_map(neighbor_from_raw) {
            if edge.src_chunk_id == edge.nbr_chunk_id || !wanted.contains(edge.src_chunk_id.as_str()) {
                continue;
            }
            by_source.entry(edge.src_chunk_id.clone()).or_default().push(edge);
        }

        let mut selected = Vec::new();
        for id in ids {
            let Some(mut edges) = by_source.remove(id) else { continue };
            edges.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            edges.truncate(per_source);
            selected.extend(edges);
        }
        Ok(selected)
    }

    fn fetch_neighbors(
        &self,
        weights: &[(String, f64)],
        present: &HashSet<&str>,
        graph_boost: f64,
    ) -> Result<Vec<EvidenceCandidate>, ExternalCallError> {
        let params = QueryParams::new().list("chunk_ids", weights.iter().map(|(id, _)| id.clone()));
        let rows = self.store.run_template(Template::ChunkDetails, &params)?;
        let weight_of: HashMap<&str, f64> = weights.iter().map(|(id, w)| (id.as_str(), *w)).collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut neighbors = Vec::new();
        for row in rows.iter().map(StoreRow::from_raw) {
            let Some(id) = row.resolved_id() else { continue };
            // detail rows for direct matches are dropped in favour of the vector entry
            if present.contains(id) || !seen.insert(id.to_string()) {
                continue;
            }
            let Some(&graph_weight) = weight_of.get(id) else { continue };
            let mut candidate = self.normalizer.normalize(&row);
            let distance = candidate.distance.unwrap_or_else(|| neighbor_distance(graph_weight));
            let vector_score = 1.0 - distance;
            candidate.distance = Some(distance);
            candidate.graph_weight = Some(graph_weight);
            candidate.vector_score = Some(vector_score);
            candidate.final_score = Some(blend_score(vector_score, graph_weight, graph_boost));
            candidate.source_type = Some(SourceKind::Graph);
            neighbors.push(candidate);
        }
        Ok(neighbors)
    }
}

fn score_direct_match(candidate: &EvidenceCandidate) -> EvidenceCandidate {
    let vector_score = 1.0 - candidate.distance.unwrap_or(1.0);
    EvidenceCandidate {
        graph_weight: Some(0.0),
        vector_score: Some(vector_score),
        final_score: Some(vector_score),
        source_type: Some(SourceKind::Vector),
        ..candidate.clone()
    }
}

fn score_of(candidate: &EvidenceCandidate) -> f64 {
    candidate.final_score.filter(|s| s.is_finite()).unwrap_or(f64::NEG_INFINITY)
}

fn distinct_ids(candidates: &[EvidenceCandidate]) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter_map(|c| c.id.clone())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Heaviest edge weight per neighbor not already present, in first-seen order.
fn neighbor_weights(edges: &[NeighborEdge], present: &HashSet<&str>) -> Vec<(String, f64)> {
    let mut order: Vec<(String, f64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for edge in edges {
        let id = edge.nbr_chunk_id.as_str();
        if present.contains(id) {
            continue;
        }
        match index.get(id) {
            Some(&i) => order[i].1 = order[i].1.max(edge.weight),
            None => {
                index.insert(id, order.len());
                order.push((id.to_string(), edge.weight));
            }
        }
    }
    order
}
