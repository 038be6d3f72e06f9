use crate::types::RawPrediction;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A loaded text classifier returning only its top label and that label's probability.
#[async_trait]
pub trait SentimentModel: Send + Sync {
    async fn classify_raw(&self, text: &str) -> Result<RawPrediction>;
}

/// Performs the expensive one-time construction of a [`SentimentModel`].
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Identifier of the model this loader produces, used in logs and errors.
    fn model_id(&self) -> &str;

    async fn load(&self) -> Result<Arc<dyn SentimentModel>>;
}
