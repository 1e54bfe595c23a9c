use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::ExternalCallError;

/// A row as handed back by the backing store, before typed extraction.
pub type RawRow = Map<String, Value>;

/// Query templates the backing store knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    VectorSearch,
    ChunkNeighbors,
    ChunkDetails,
    RouterPredict,
}

impl Template {
    pub fn name(self) -> &'static str {
        match self {
            Self::VectorSearch => "vector_search.sql",
            Self::ChunkNeighbors => "get_chunk_neighbors.sql",
            Self::ChunkDetails => "get_chunk_details.sql",
            Self::RouterPredict => "router_predict.sql",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    TextList(Vec<String>),
}

/// Named parameters bound into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.0.insert(name.to_string(), ParamValue::Text(value.into()));
        self
    }

    pub fn int(mut self, name: &str, value: i64) -> Self {
        self.0.insert(name.to_string(), ParamValue::Int(value));
        self
    }

    pub fn list<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.insert(name.to_string(), ParamValue::TextList(values.into_iter().map(Into::into).collect()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        match self.0.get(name) {
            Some(ParamValue::TextList(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Queryable data store holding chunks, embeddings and the neighbor graph.
pub trait EvidenceStore: Send + Sync {
    fn run_template(&self, template: Template, params: &QueryParams) -> Result<Vec<RawRow>, ExternalCallError>;
}

impl<S: EvidenceStore + ?Sized> EvidenceStore for &S {
    fn run_template(&self, template: Template, params: &QueryParams) -> Result<Vec<RawRow>, ExternalCallError> {
        (**self).run_template(template, params)
    }
}

/// External learned routing classifier. Rows carry `predicted_label` and
/// `predicted_label_probs`; an empty result is treated as a failure upstream.
pub trait RoutingClassifier: Send + Sync {
    fn predict(&self, query_text: &str) -> Result<Vec<RawRow>, ExternalCallError>;
}

impl<C: RoutingClassifier + ?Sized> RoutingClassifier for &C {
    fn predict(&self, query_text: &str) -> Result<Vec<RawRow>, ExternalCallError> {
        (**self).predict(query_text)
    }
}

/// Serves routing predictions from a store that hosts the classifier model.
pub struct StoreClassifier<S> {
    store: S,
}

impl<S: EvidenceStore> StoreClassifier<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: EvidenceStore> RoutingClassifier for StoreClassifier<S> {
    fn predict(&self, query_text: &str) -> Result<Vec<RawRow>, ExternalCallError> {
        let params = QueryParams::new().text("query_text", query_text);
        self.store.run_template(Template::RouterPredict, &params)
    }
}
