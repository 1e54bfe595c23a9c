//! Scripted collaborators for exercising the pipeline without a live store.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::error::ExternalCallError;
use crate::traits::{EvidenceStore, QueryParams, RawRow, RoutingClassifier, Template};

type Response = Result<Vec<RawRow>, ExternalCallError>;

/// Replays queued responses in order and records every call. Once the
/// queue is drained every call answers with no rows.
#[derive(Default)]
pub struct ScriptedStore {
    responses: Mutex<VecDeque<Response>>,
    calls: Mutex<Vec<(Template, QueryParams)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_rows(self, rows: Value) -> Self {
        self.push(Ok(rows_from_json(rows)));
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.push(Err(ExternalCallError::new("scripted", message)));
        self
    }

    pub fn calls(&self) -> Vec<(Template, QueryParams)> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn push(&self, response: Response) {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner).push_back(response);
    }

    fn next(&self, template: Template, params: &QueryParams) -> Response {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push((template, params.clone()));
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
            .map_err(|e| ExternalCallError::new(template.name(), e.message))
    }
}

impl EvidenceStore for ScriptedStore {
    fn run_template(&self, template: Template, params: &QueryParams) -> Response {
        self.next(template, params)
    }
}

impl RoutingClassifier for ScriptedStore {
    fn predict(&self, query_text: &str) -> Response {
        self.next(Template::RouterPredict, &QueryParams::new().text("query_text", query_text))
    }
}

/// Convert a JSON array of objects into raw rows; non-objects are skipped.
pub fn rows_from_json(value: Value) -> Vec<RawRow> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}
