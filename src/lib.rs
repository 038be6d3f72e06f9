//! Financial news sentiment analysis: a memoized FinBERT classifier, a presenter that maps each
//! classification to a colored single-bar chart, and an HTTP host serving both.

pub mod chart;
pub mod config;
pub mod engine;
pub mod error;
pub mod finbert_engine;
pub mod pipeline;
pub mod presenter;
pub mod samples;
pub mod server;
pub mod service;
pub mod types;

pub use engine::{ModelLoader, SentimentModel};
pub use error::{ClassifyError, InitError};
pub use pipeline::{Analysis, SentimentPipeline, SentimentReport};
pub use presenter::{DisplayRecord, SentimentPresenter};
pub use service::{ClassifierService, ServiceState};
pub use types::{ClassificationResult, RawPrediction, Sentiment};
