#![allow(dead_code)]

use async_trait::async_trait;
use finsent::{ModelLoader, RawPrediction, SentimentModel};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const POSITIVE_WORDS: &[&str] = &["soared", "cheered", "gains", "jumped", "strong"];
const NEGATIVE_WORDS: &[&str] = &["plunged", "tumbled", "decline", "worried", "fell"];

/// Keyword-voting stand-in for FinBERT, reporting labels in the model's lowercase form.
pub struct KeywordModel {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SentimentModel for KeywordModel {
    async fn classify_raw(&self, text: &str) -> anyhow::Result<RawPrediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("\u{0}") {
            anyhow::bail!("input contains a NUL byte");
        }

        let lower = text.to_lowercase();
        let count = |words: &[&str]| words.iter().filter(|w| lower.contains(*w)).count();
        let (positive, negative) = (count(POSITIVE_WORDS), count(NEGATIVE_WORDS));

        let (label, score) = if positive > negative {
            ("positive", 0.9 + 0.01 * positive.min(9) as f32)
        } else if negative > positive {
            ("negative", 0.9 + 0.01 * negative.min(9) as f32)
        } else {
            ("neutral", 0.6)
        };
        Ok(RawPrediction {
            label: label.to_string(),
            score,
        })
    }
}

pub struct FakeLoader {
    pub loads: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
    pub delay: Duration,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self {
            loads: Arc::default(),
            calls: Arc::default(),
            fail: false,
            delay: Duration::from_millis(50),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn loads(&self) -> Arc<AtomicUsize> {
        self.loads.clone()
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl ModelLoader for FakeLoader {
    fn model_id(&self) -> &str {
        "fake/keyword-finbert"
    }

    async fn load(&self) -> anyhow::Result<Arc<dyn SentimentModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            anyhow::bail!("model.safetensors not found");
        }
        Ok(Arc::new(KeywordModel {
            calls: self.calls.clone(),
        }))
    }
}

pub const POSITIVE_ARTICLE: &str = "Stocks soared to new heights today as investors cheered \
    strong earnings reports and positive economic data.";
