use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::engine::{ModelLoader, SentimentModel};
use crate::error::{ClassifyError, InitError, Result};
use crate::types::{ClassificationResult, RawPrediction, Sentiment};

type LoadOutcome = std::result::Result<Arc<dyn SentimentModel>, InitError>;

#[derive(Debug, Clone)]
pub enum ServiceState {
    Uninitialized,
    Ready,
    Failed(InitError),
}

/// Owns the single memoized model capability for the process.
///
/// The first call to [`ClassifierService::initialize`] runs the loader; concurrent callers wait
/// on that same load and every later call gets its outcome, success or failure, without loading
/// again.
pub struct ClassifierService {
    loader: Box<dyn ModelLoader>,
    model: OnceCell<LoadOutcome>,
}

impl ClassifierService {
    pub fn new<L: ModelLoader + 'static>(loader: L) -> Self {
        Self {
            loader: Box::new(loader),
            model: OnceCell::new(),
        }
    }

    pub fn model_id(&self) -> &str {
        self.loader.model_id()
    }

    pub fn state(&self) -> ServiceState {
        match self.model.get() {
            None => ServiceState::Uninitialized,
            Some(Ok(_)) => ServiceState::Ready,
            Some(Err(err)) => ServiceState::Failed(err.clone()),
        }
    }

    #[tracing::instrument(skip(self), fields(model_id = %self.model_id()))]
    pub async fn initialize(&self) -> std::result::Result<Arc<dyn SentimentModel>, InitError> {
        self.model
            .get_or_init(|| async {
                tracing::info!("Loading sentiment model");
                match self.loader.load().await {
                    Ok(model) => {
                        tracing::info!("Sentiment model loaded");
                        Ok(model)
                    }
                    Err(cause) => {
                        let err = InitError::new(self.model_id(), cause);
                        tracing::error!(error = %err, "Sentiment model failed to load");
                        Err(err)
                    }
                }
            })
            .await
            .clone()
    }

    #[tracing::instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        if text.trim().is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        let model = match self.model.get() {
            Some(Ok(model)) => model.clone(),
            Some(Err(err)) => return Err(ClassifyError::ModelUnavailable(err.clone())),
            None => self
                .initialize()
                .await
                .map_err(ClassifyError::ModelUnavailable)?,
        };

        let raw = model
            .classify_raw(text)
            .await
            .map_err(ClassifyError::ClassificationFailed)?;
        let result = normalize(raw)?;
        tracing::debug!(label = %result.label, score = result.score, "Text classified");
        Ok(result)
    }
}

fn normalize(raw: RawPrediction) -> Result<ClassificationResult> {
    let label = raw
        .label
        .parse::<Sentiment>()
        .map_err(|e| ClassifyError::ClassificationFailed(e.into()))?;
    if !raw.score.is_finite() || !(0.0..=1.0).contains(&raw.score) {
        return Err(ClassifyError::ClassificationFailed(anyhow::anyhow!(
            "score {} for label {} is outside [0, 1]",
            raw.score,
            raw.label
        )));
    }
    Ok(ClassificationResult {
        label,
        score: raw.score,
    })
}
