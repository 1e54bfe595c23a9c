use triage_core::types::{HeuristicMeta, RouteLabel};

use crate::config::RouterConfig;

/// Keyword-count decision tree. Pure and deterministic.
pub fn classify(query: &str, config: &RouterConfig) -> HeuristicMeta {
    let lowered = query.to_lowercase();
    let count = |keywords: &[String]| keywords.iter().filter(|kw| lowered.contains(&kw.to_lowercase())).count();
    let log_matches = count(&config.log_keywords);
    let doc_matches = count(&config.doc_keywords);
    let query_length = query.chars().count();
    let min = config.min_keyword_matches;

    let label = if log_matches > doc_matches && log_matches >= min {
        RouteLabel::LogsOnly
    } else if doc_matches > log_matches && doc_matches >= min {
        RouteLabel::PdfImage
    } else {
        // long queries and ambiguous ones both land here
        RouteLabel::Mixed
    };
    HeuristicMeta { log_matches, doc_matches, query_length, label }
}
