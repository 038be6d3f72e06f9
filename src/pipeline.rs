use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::chart::BarChart;
use crate::error::{ClassifyError, Result};
use crate::presenter::{DisplayRecord, SentimentPresenter};
use crate::service::ClassifierService;

pub const AWAITING_INPUT_MESSAGE: &str =
    "Enter or paste a financial news article in the text area above to analyze its sentiment.";

#[derive(Debug, Clone, Serialize)]
pub struct SentimentReport {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub record: DisplayRecord,
    pub score_text: String,
    pub explanation: String,
    pub chart: BarChart,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Analysis {
    AwaitingInput { message: String },
    Analyzed { report: SentimentReport },
}

/// Runs one request through classification, presentation and chart rendering.
#[derive(Clone)]
pub struct SentimentPipeline {
    service: Arc<ClassifierService>,
    presenter: SentimentPresenter,
}

impl SentimentPipeline {
    pub fn new(service: Arc<ClassifierService>) -> Self {
        Self {
            service,
            presenter: SentimentPresenter,
        }
    }

    pub fn service(&self) -> &ClassifierService {
        &self.service
    }

    pub async fn analyze(&self, text: &str) -> Result<Analysis> {
        let result = match self.service.classify(text).await {
            Ok(result) => result,
            Err(ClassifyError::EmptyInput) => {
                tracing::debug!("Empty input, awaiting text");
                return Ok(Analysis::AwaitingInput {
                    message: AWAITING_INPUT_MESSAGE.to_string(),
                });
            }
            Err(err) => return Err(err),
        };

        let record = self.presenter.present(&result);
        let report = SentimentReport {
            id: format!("analysis-{}", Uuid::new_v4().simple()),
            created: Utc::now().timestamp(),
            model: self.service.model_id().to_string(),
            score_text: record.score_text(),
            explanation: record.explanation(),
            chart: record.chart(),
            record,
        };
        Ok(Analysis::Analyzed { report })
    }
}
