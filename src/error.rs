use std::sync::Arc;
use thiserror::Error;

/// The model capability could not be loaded. Terminal for the process.
#[derive(Error, Debug, Clone)]
#[error("failed to load sentiment model {model_id}: {cause:#}")]
pub struct InitError {
    pub model_id: String,
    cause: Arc<anyhow::Error>,
}

impl InitError {
    pub fn new(model_id: impl Into<String>, cause: anyhow::Error) -> Self {
        Self {
            model_id: model_id.into(),
            cause: Arc::new(cause),
        }
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Empty or whitespace-only text; the classifier is never consulted.
    #[error("no text to analyze")]
    EmptyInput,

    #[error("sentiment model unavailable")]
    ModelUnavailable(#[source] InitError),

    #[error("classification failed: {0:#}")]
    ClassificationFailed(anyhow::Error),
}

impl ClassifyError {
    /// Whether this is an expected idle state rather than a failure.
    pub fn is_advisory(&self) -> bool {
        matches!(self, ClassifyError::EmptyInput)
    }
}

pub type Result<T, E = ClassifyError> = std::result::Result<T, E>;
