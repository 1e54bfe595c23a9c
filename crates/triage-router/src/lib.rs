//! triage-router
//!
//! Picks the evidence-type filter and breadth for a query, either from the
//! external learned classifier or from a keyword heuristic.

pub mod config;
pub mod heuristic;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use triage_core::error::{Error, ExternalCallError, Result};
use triage_core::row::PredictionRow;
use triage_core::traits::RoutingClassifier;
use triage_core::types::{PredictionMeta, RouteLabel, RoutingDecision, Strategy};

pub use config::{RouteSpec, RouterConfig, RoutingTable};

const PROBE_QUERY: &str = "test";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    Auto,
    Learned,
    Heuristic,
}

impl FromStr for RoutingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "learned" => Ok(Self::Learned),
            "heuristic" => Ok(Self::Heuristic),
            other => Err(Error::InvalidConfig(format!("unknown routing mode `{other}`"))),
        }
    }
}

/// Why a learned prediction could not be used.
#[derive(Debug)]
enum LearnedFailure {
    Call(ExternalCallError),
    NoPrediction,
    UnknownLabel(String),
}

impl fmt::Display for LearnedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(e) => write!(f, "{e}"),
            Self::NoPrediction => f.write_str("classifier returned no prediction"),
            Self::UnknownLabel(label) => write!(f, "unrecognized label `{label}`"),
        }
    }
}

pub struct Router<C> {
    classifier: C,
    config: RouterConfig,
}

impl<C: RoutingClassifier> Router<C> {
    pub fn new(classifier: C, config: RouterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { classifier, config })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Decide `(types, k)` for a query.
    ///
    /// `Heuristic` never calls the classifier. `Learned` surfaces any
    /// classifier failure as `Error::RoutingUnavailable`. `Auto` falls back
    /// to the heuristic on failure and reports `Strategy::Heuristic`.
    /// Only `Learned` can return an error.
    pub fn predict_routing(&self, query_text: &str, mode: RoutingMode) -> Result<(RoutingDecision, Strategy)> {
        let decision = match mode {
            RoutingMode::Heuristic => self.heuristic(query_text),
            RoutingMode::Learned => self.learned(query_text).map_err(|failure| {
                warn!(%failure, "learned routing required but unavailable");
                Error::RoutingUnavailable(failure.to_string())
            })?,
            RoutingMode::Auto => match self.learned(query_text) {
                Ok(decision) => decision,
                Err(failure) => {
                    warn!(%failure, "learned routing failed, falling back to heuristics");
                    self.heuristic(query_text)
                }
            },
        };
        let strategy = decision.strategy;
        debug!(strategy = %strategy, label = %decision.label, k = decision.k, types = ?decision.types, "routing decided");
        Ok((decision, strategy))
    }

    /// Keyword routing; deterministic and infallible.
    pub fn heuristic(&self, query_text: &str) -> RoutingDecision {
        let meta = heuristic::classify(query_text, &self.config);
        let route = self.config.routes.get(meta.label);
        RoutingDecision {
            types: route.types.clone(),
            k: route.k,
            strategy: Strategy::Heuristic,
            label: meta.label,
            prediction: None,
            heuristic: Some(meta),
        }
    }

    /// Whether the classifier answers a probe query at all.
    pub fn classifier_available(&self) -> bool {
        match self.classifier.predict(PROBE_QUERY) {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "routing classifier probe failed");
                false
            }
        }
    }

    fn learned(&self, query_text: &str) -> std::result::Result<RoutingDecision, LearnedFailure> {
        let rows = self.classifier.predict(query_text).map_err(LearnedFailure::Call)?;
        let prediction = rows.first().map(PredictionRow::from_raw).ok_or(LearnedFailure::NoPrediction)?;
        let label_text = prediction.label.clone().ok_or(LearnedFailure::NoPrediction)?;
        let label = RouteLabel::from_label(&label_text).ok_or_else(|| LearnedFailure::UnknownLabel(label_text.clone()))?;
        let route = self.config.routes.get(label);
        let confidence = prediction.confidence();
        info!(label = %label, confidence, "router predicted");
        Ok(RoutingDecision {
            types: route.types.clone(),
            k: route.k,
            strategy: Strategy::Learned,
            label,
            prediction: Some(PredictionMeta { label: label_text, confidence, probabilities: prediction.probabilities }),
            heuristic: None,
        })
    }
}
