use serde::Serialize;
use std::fmt;

use crate::chart::BarChart;
use crate::types::{ClassificationResult, Sentiment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub const POSITIVE_COLOR: Color = Color::rgb(0x2E, 0x7D, 0x32);
pub const NEGATIVE_COLOR: Color = Color::rgb(0xC6, 0x28, 0x28);
pub const NEUTRAL_COLOR: Color = Color::rgb(0x15, 0x65, 0xC0);
pub const FALLBACK_COLOR: Color = Color::rgb(0x9E, 0x9E, 0x9E);

pub fn sentiment_color(sentiment: Sentiment) -> Color {
    match sentiment {
        Sentiment::Positive => POSITIVE_COLOR,
        Sentiment::Negative => NEGATIVE_COLOR,
        Sentiment::Neutral => NEUTRAL_COLOR,
    }
}

/// Looks up the color for a display label, falling back to grey for anything that is not one of
/// the three canonical sentiments.
pub fn color_for_label(label: &str) -> Color {
    match label.parse::<Sentiment>() {
        Ok(sentiment) => sentiment_color(sentiment),
        Err(err) => {
            tracing::warn!(label, error = %err, "No color for label, using fallback");
            FALLBACK_COLOR
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRecord {
    pub label: String,
    pub score: f32,
    pub color: Color,
}

impl DisplayRecord {
    pub fn score_text(&self) -> String {
        format!("{:.4}", self.score)
    }

    pub fn explanation(&self) -> String {
        format!(
            "The sentiment analysis model has determined the overall sentiment of the article to \
             be **{}**. The sentiment score ranges from 0 to 1, with higher scores indicating a \
             stronger confidence in the predicted sentiment. In this case, a score of **{}** \
             suggests the model's confidence level.",
            self.label.to_lowercase(),
            self.score_text()
        )
    }

    pub fn chart(&self) -> BarChart {
        BarChart::single(self)
    }
}

/// Turns classification results into display records. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentPresenter;

impl SentimentPresenter {
    pub fn present(&self, result: &ClassificationResult) -> DisplayRecord {
        let label = result.label.to_string();
        let color = color_for_label(&label);
        DisplayRecord {
            label,
            score: result.score,
            color,
        }
    }
}
