use thiserror::Error;

/// Failure reported by an external collaborator (store or classifier).
///
/// This is the only error type the collaborator traits return, so callers
/// that absorb external failures can do so without swallowing anything else.
#[derive(Debug, Clone, Error)]
#[error("external call `{template}` failed: {message}")]
pub struct ExternalCallError {
    pub template: String,
    pub message: String,
}

impl ExternalCallError {
    pub fn new(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self { template: template.into(), message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Learned routing required but unavailable: {0}")]
    RoutingUnavailable(String),

    #[error(transparent)]
    External(#[from] ExternalCallError),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
