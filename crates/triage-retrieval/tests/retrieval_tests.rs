use serde_json::json;

use triage_core::config::RetrievalConfig;
use triage_core::error::Error;
use triage_core::testing::ScriptedStore;
use triage_core::traits::Template;
use triage_core::types::{EvidenceCandidate, EvidenceType, SourceKind};
use triage_retrieval::{GraphExpander, Normalizer, RetrieveOptions, Retriever, TriageRetriever};
use triage_router::{Router, RouterConfig, RoutingMode};

fn candidate(id: &str, distance: f64) -> EvidenceCandidate {
    EvidenceCandidate {
        id: Some(id.to_string()),
        text: format!("text of {id}"),
        distance: Some(distance),
        source: format!("store:log:{id}.log:1"),
        ..EvidenceCandidate::default()
    }
}

fn ids(candidates: &[EvidenceCandidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.id.as_deref().unwrap_or("")).collect()
}

fn expander(store: &ScriptedStore) -> GraphExpander<&ScriptedStore> {
    GraphExpander::new(store, Normalizer::default())
}

#[test]
fn search_breadth_is_clamped() {
    let store = ScriptedStore::new();
    let retriever = Retriever::new(&store, 8, Normalizer::default());
    retriever.vector_search("q", 100, &[]).expect("search");
    retriever.vector_search("q", 0, &[]).expect("search");
    let calls = store.calls();
    assert_eq!(calls[0].0, Template::VectorSearch);
    assert_eq!(calls[0].1.get_int("top_k"), Some(8));
    assert_eq!(calls[1].1.get_int("top_k"), Some(1));
}

#[test]
fn configured_ceiling_cannot_exceed_eight() {
    let store = ScriptedStore::new();
    let retriever = Retriever::new(&store, 50, Normalizer::default());
    assert_eq!(retriever.clamp_k(20), 8);
}

#[test]
fn search_passes_type_filter_only_when_restricted() {
    let store = ScriptedStore::new();
    let retriever = Retriever::new(&store, 8, Normalizer::default());
    retriever.vector_search("q", 5, &[EvidenceType::Pdf, EvidenceType::ImageOcr]).expect("search");
    retriever.vector_search("q", 5, &[]).expect("search");
    let calls = store.calls();
    assert_eq!(calls[0].1.get_list("types"), Some(&["pdf".to_string(), "image_ocr".to_string()][..]));
    assert!(calls[1].1.get("types").is_none());
}

#[test]
fn search_normalizes_rows_in_store_order() {
    let store = ScriptedStore::new().then_rows(json!([
        { "chunk_id": "c1", "text": "db timeout", "distance": 0.12, "meta": { "type": "log", "filename": "a.log", "line_no": 12 } },
        { "id": "c2", "chunk_id": "ignored", "text": "page", "distance": 0.3, "meta": "{\"type\":\"pdf\",\"filename\":\"b.pdf\",\"page\":3}" }
    ]));
    let retriever = Retriever::new(&store, 8, Normalizer::new("kb"));
    let results = retriever.vector_search("q", 5, &[]).expect("search");
    assert_eq!(ids(&results), vec!["c1", "c2"]);
    assert!(results[0].source.ends_with(":log:a.log:12"), "{}", results[0].source);
    assert!(results[1].source.ends_with(":pdf:b.pdf:p3"), "{}", results[1].source);
    assert_eq!(results[1].source, "kb:pdf:b.pdf:p3");
    assert_eq!(results[0].distance, Some(0.12));
}

#[test]
fn search_failure_propagates() {
    let store = ScriptedStore::new().then_fail("quota exceeded");
    let retriever = Retriever::new(&store, 8, Normalizer::default());
    assert!(matches!(retriever.vector_search("q", 5, &[]), Err(Error::External(_))));
}

#[test]
fn zero_boost_is_a_no_op() {
    let store = ScriptedStore::new();
    let initial = vec![candidate("b", 0.4), candidate("a", 0.1)];
    let out = expander(&store).expand(&initial, 8, 0.0, 3);
    assert_eq!(out, initial);
    assert_eq!(store.call_count(), 0);
}

#[test]
fn empty_initial_set_is_a_no_op() {
    let store = ScriptedStore::new();
    assert!(expander(&store).expand(&[], 8, 0.5, 3).is_empty());
    assert_eq!(store.call_count(), 0);
}

#[test]
fn colliding_neighbor_keeps_vector_entry() {
    let store = ScriptedStore::new()
        .then_rows(json!([
            { "src_chunk_id": "c1", "nbr_chunk_id": "c1", "weight": 0.99 },
            { "src_chunk_id": "c1", "nbr_chunk_id": "c2", "weight": 0.9 },
            { "src_chunk_id": "c1", "nbr_chunk_id": "c3", "weight": 0.5 }
        ]))
        .then_rows(json!([
            { "chunk_id": "c2", "text": "dup", "meta": "{}" },
            { "chunk_id": "c3", "text": "content3", "meta": "{}" }
        ]));
    let initial = vec![candidate("c1", 0.1), candidate("c2", 0.2)];
    let out = expander(&store).expand(&initial, 8, 0.2, 3);

    assert_eq!(ids(&out), vec!["c1", "c2", "c3"]);
    let c2 = &out[1];
    assert_eq!(c2.text, "text of c2");
    assert_eq!(c2.source_type, Some(SourceKind::Vector));
    assert_eq!(c2.graph_weight, Some(0.0));
    assert!((c2.final_score.unwrap() - 0.8).abs() < 1e-9);

    let calls = store.calls();
    assert_eq!(calls[1].0, Template::ChunkDetails);
    assert_eq!(calls[1].1.get_list("chunk_ids"), Some(&["c3".to_string()][..]));
}

#[test]
fn direct_matches_are_not_blended_down() {
    let store = ScriptedStore::new()
        .then_rows(json!([{ "src_chunk_id": "a", "nbr_chunk_id": "n", "weight": 0.3 }]))
        .then_rows(json!([{ "chunk_id": "n", "text": "neighbor" }]));
    let out = expander(&store).expand(&[candidate("a", 0.25)], 8, 0.9, 3);
    let a = out.iter().find(|c| c.id.as_deref() == Some("a")).expect("direct match kept");
    assert_eq!(a.vector_score, a.final_score);
    assert!((a.final_score.unwrap() - 0.75).abs() < 1e-9);
}

#[test]
fn neighbor_scores_blend_vector_and_graph_weight() {
    let store = ScriptedStore::new()
        .then_rows(json!([{ "src_chunk_id": "a", "nbr_chunk_id": "n", "weight": 0.8 }]))
        .then_rows(json!([{ "chunk_id": "n", "text": "neighbor", "distance": 0.1 }]));
    let out = expander(&store).expand(&[candidate("a", 0.5)], 8, 0.2, 3);
    assert_eq!(ids(&out), vec!["n", "a"]);
    let n = &out[0];
    assert_eq!(n.source_type, Some(SourceKind::Graph));
    assert_eq!(n.graph_weight, Some(0.8));
    assert!((n.vector_score.unwrap() - 0.9).abs() < 1e-9);
    assert!((n.final_score.unwrap() - 0.88).abs() < 1e-3);
}

#[test]
fn neighbor_without_distance_gets_synthesized_one() {
    let store = ScriptedStore::new()
        .then_rows(json!([
            { "src_chunk_id": "a", "nbr_chunk_id": "strong", "weight": 0.95 },
            { "src_chunk_id": "a", "nbr_chunk_id": "weak", "weight": 0.4 }
        ]))
        .then_rows(json!([
            { "chunk_id": "strong", "text": "s", "meta": { "type": "image", "filename": "s.png" } },
            { "chunk_id": "weak", "text": "w" }
        ]));
    let out = expander(&store).expand(&[candidate("a", 0.7)], 8, 0.5, 3);
    assert_eq!(ids(&out), vec!["strong", "weak", "a"]);
    let strong = &out[0];
    assert_eq!(strong.distance, Some(0.1));
    assert!((strong.final_score.unwrap() - 0.925).abs() < 1e-9);
    assert_eq!(strong.source, "store:image:s.png");
    let weak = &out[1];
    assert!((weak.distance.unwrap() - 0.6).abs() < 1e-9);
    assert!((weak.final_score.unwrap() - 0.4).abs() < 1e-9);
}

#[test]
fn only_heaviest_edges_per_source_are_followed() {
    let store = ScriptedStore::new()
        .then_rows(json!([
            { "src_chunk_id": "a", "nbr_chunk_id": "x", "weight": 0.2 },
            { "src_chunk_id": "a", "nbr_chunk_id": "y", "weight": 0.9 },
            { "src_chunk_id": "a", "nbr_chunk_id": "z", "weight": 0.5 },
            { "src_chunk_id": "stranger", "nbr_chunk_id": "q", "weight": 1.0 }
        ]))
        .then_rows(json!([]));
    expander(&store).expand(&[candidate("a", 0.1)], 8, 0.3, 2);
    let calls = store.calls();
    assert_eq!(calls[0].0, Template::ChunkNeighbors);
    assert_eq!(calls[0].1.get_int("max_neighbors"), Some(2));
    assert_eq!(calls[0].1.get_list("chunk_ids"), Some(&["a".to_string()][..]));
    assert_eq!(calls[1].1.get_list("chunk_ids"), Some(&["y".to_string(), "z".to_string()][..]));
}

#[test]
fn ranking_is_truncated_to_final_k() {
    let store = ScriptedStore::new()
        .then_rows(json!([{ "src_chunk_id": "a", "nbr_chunk_id": "n", "weight": 0.5 }]))
        .then_rows(json!([{ "chunk_id": "n", "text": "neighbor" }]));
    let out = expander(&store).expand(&[candidate("a", 0.1), candidate("b", 0.3)], 2, 0.5, 3);
    assert_eq!(ids(&out), vec!["a", "b"]);
}

#[test]
fn neighbor_fetch_failure_returns_initial_candidates() {
    let store = ScriptedStore::new().then_fail("neighbors table missing");
    let initial = vec![candidate("c1", 0.1), candidate("c2", 0.2)];
    let out = expander(&store).expand(&initial, 8, 0.2, 3);
    assert_eq!(out, initial);
}

#[test]
fn detail_fetch_failure_returns_initial_candidates() {
    let store = ScriptedStore::new()
        .then_rows(json!([{ "src_chunk_id": "c1", "nbr_chunk_id": "c9", "weight": 0.7 }]))
        .then_fail("details timed out");
    let initial = vec![candidate("c2", 0.2), candidate("c1", 0.1)];
    let out = expander(&store).expand(&initial, 8, 0.2, 3);
    assert_eq!(out, initial);
}

#[test]
fn repeated_direct_matches_are_kept_once() {
    let store = ScriptedStore::new().then_rows(json!([]));
    let initial = vec![candidate("a", 0.1), candidate("a", 0.1), candidate("b", 0.2)];
    let out = expander(&store).expand(&initial, 8, 0.2, 3);
    assert_eq!(ids(&out), vec!["a", "b"]);
    assert_eq!(store.calls()[0].1.get_list("chunk_ids"), Some(&["a".to_string(), "b".to_string()][..]));
}

#[test]
fn non_finite_distance_ranks_last() {
    let store = ScriptedStore::new()
        .then_rows(json!([
            { "chunk_id": "low", "text": "l", "distance": 0.8 },
            { "chunk_id": "bad", "text": "b", "distance": "NaN" },
            { "chunk_id": "best", "text": "t", "distance": 0.1 }
        ]))
        .then_rows(json!([]));
    let initial = Retriever::new(&store, 8, Normalizer::default()).vector_search("q", 5, &[]).expect("search");
    assert_eq!(initial[1].distance, None);

    let out = expander(&store).expand(&initial, 8, 0.5, 3);
    assert_eq!(ids(&out), vec!["best", "low", "bad"]);
    let scores: Vec<f64> = out.iter().map(|c| c.final_score.expect("scored")).collect();
    assert!(scores.iter().all(|s| s.is_finite()), "{scores:?}");
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
}

#[test]
fn empty_neighbor_table_keeps_initial_ids() {
    let store = ScriptedStore::new().then_rows(json!([]));
    let out = expander(&store).expand(&[candidate("chunk1", 0.1)], 10, 0.2, 3);
    assert_eq!(ids(&out), vec!["chunk1"]);
    assert_eq!(out[0].distance, Some(0.1));
    assert_eq!(store.call_count(), 1, "no detail lookup without new neighbors");
}

fn triage<'a>(store: &'a ScriptedStore, classifier: &'a ScriptedStore) -> TriageRetriever<&'a ScriptedStore, &'a ScriptedStore> {
    let router = Router::new(classifier, RouterConfig::default()).expect("router");
    TriageRetriever::new(store, router, RetrievalConfig::default())
}

#[test]
fn facade_routes_then_searches_with_clamped_breadth() {
    let store = ScriptedStore::new().then_rows(json!([{ "chunk_id": "c1", "text": "t", "distance": 0.2 }]));
    let classifier = ScriptedStore::new();
    let options = RetrieveOptions { mode: RoutingMode::Heuristic, graph_boost: 0.0, expand_neighbors: 3 };
    let result = triage(&store, &classifier).retrieve("hello", &options).expect("retrieve");

    assert_eq!(result.decision.k, 10);
    assert_eq!(ids(&result.evidence), vec!["c1"]);
    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.get_int("top_k"), Some(8));
    assert!(calls[0].1.get("types").is_none());
}

#[test]
fn facade_applies_routed_type_filter_and_expands() {
    let store = ScriptedStore::new()
        .then_rows(json!([{ "chunk_id": "c1", "text": "t", "distance": 0.4, "meta": { "type": "log", "filename": "a.log", "line_no": 3 } }]))
        .then_rows(json!([{ "src_chunk_id": "c1", "nbr_chunk_id": "c2", "weight": 0.9 }]))
        .then_rows(json!([{ "chunk_id": "c2", "text": "related", "meta": { "type": "log", "filename": "a.log", "line_no": 4 } }]));
    let classifier = ScriptedStore::new();
    let options = RetrieveOptions { mode: RoutingMode::Heuristic, graph_boost: 0.3, expand_neighbors: 3 };
    let result = triage(&store, &classifier).retrieve("ERROR connection timeout", &options).expect("retrieve");

    assert_eq!(result.decision.types, vec![EvidenceType::Log]);
    assert_eq!(ids(&result.evidence), vec!["c2", "c1"]);
    assert_eq!(result.evidence[0].source, "store:log:a.log:4");
    assert_eq!(store.calls()[0].1.get_list("types"), Some(&["log".to_string()][..]));
}

#[test]
fn facade_propagates_learned_routing_failure() {
    let store = ScriptedStore::new();
    let classifier = ScriptedStore::new().then_fail("model missing");
    let options = RetrieveOptions { mode: RoutingMode::Learned, ..RetrieveOptions::default() };
    let err = triage(&store, &classifier).retrieve("q", &options).unwrap_err();
    assert!(matches!(err, Error::RoutingUnavailable(_)));
    assert_eq!(store.call_count(), 0);
}

#[test]
fn facade_propagates_search_failure_but_not_expansion_failure() {
    let classifier = ScriptedStore::new();
    let options = RetrieveOptions { mode: RoutingMode::Heuristic, graph_boost: 0.5, expand_neighbors: 3 };

    let failing_search = ScriptedStore::new().then_fail("search down");
    assert!(matches!(triage(&failing_search, &classifier).retrieve("q", &options), Err(Error::External(_))));

    let failing_graph = ScriptedStore::new()
        .then_rows(json!([{ "chunk_id": "c1", "text": "t", "distance": 0.2 }]))
        .then_fail("graph down");
    let result = triage(&failing_graph, &classifier).retrieve("q", &options).expect("expansion failure absorbed");
    assert_eq!(ids(&result.evidence), vec!["c1"]);
    assert_eq!(result.evidence[0].final_score, None);
}
