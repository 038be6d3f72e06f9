//! Single-bar score chart for one analysis.
//!
//! The y-axis always spans `[0, 1]` so that charts from separate analyses compare visually.

use serde::Serialize;
use std::fmt;

use crate::presenter::{Color, DisplayRecord};

pub const Y_RANGE: (f32, f32) = (0.0, 1.0);

const WIDTH: f32 = 600.0;
const HEIGHT: f32 = 400.0;
const MARGIN_LEFT: f32 = 70.0;
const MARGIN_RIGHT: f32 = 30.0;
const MARGIN_TOP: f32 = 50.0;
const MARGIN_BOTTOM: f32 = 60.0;
const BAR_WIDTH_RATIO: f32 = 0.8;
const TICKS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub category: String,
    pub value: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub y_range: (f32, f32),
    pub bars: Vec<Bar>,
}

impl BarChart {
    pub fn single(record: &DisplayRecord) -> Self {
        Self {
            title: "Sentiment Score Distribution".to_string(),
            x_label: "Sentiment".to_string(),
            y_label: "Sentiment Score".to_string(),
            y_range: Y_RANGE,
            bars: vec![Bar {
                category: record.label.clone(),
                value: record.score,
                color: record.color,
            }],
        }
    }

    fn plot_width(&self) -> f32 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height(&self) -> f32 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    /// Maps a data value to its SVG y coordinate, clipping at the axis bounds.
    fn y_coord(&self, value: f32) -> f32 {
        let (lo, hi) = self.y_range;
        let fraction = ((value - lo) / (hi - lo)).clamp(0.0, 1.0);
        MARGIN_TOP + self.plot_height() * (1.0 - fraction)
    }

    pub fn to_svg(&self) -> String {
        self.to_string()
    }

    fn write_svg(&self, svg: &mut impl fmt::Write) -> fmt::Result {
        let axis_bottom = MARGIN_TOP + self.plot_height();
        let axis_right = MARGIN_LEFT + self.plot_width();

        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
        )?;
        writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
        writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="16">{}</text>"#,
            WIDTH / 2.0,
            MARGIN_TOP / 2.0 + 5.0,
            escape(&self.title)
        )?;

        let (lo, hi) = self.y_range;
        for i in 0..=TICKS {
            let value = lo + (hi - lo) * i as f32 / TICKS as f32;
            let y = self.y_coord(value);
            writeln!(
                svg,
                r##"<line x1="{MARGIN_LEFT}" y1="{y}" x2="{axis_right}" y2="{y}" stroke="#E0E0E0"/>"##
            )?;
            writeln!(
                svg,
                r#"<text x="{}" y="{}" text-anchor="end" font-size="11">{value:.1}</text>"#,
                MARGIN_LEFT - 8.0,
                y + 4.0
            )?;
        }

        if !self.bars.is_empty() {
            let slot = self.plot_width() / self.bars.len() as f32;
            for (i, bar) in self.bars.iter().enumerate() {
                let bar_width = slot * BAR_WIDTH_RATIO;
                let x = MARGIN_LEFT + slot * i as f32 + (slot - bar_width) / 2.0;
                let y = self.y_coord(bar.value);
                writeln!(
                    svg,
                    r#"<rect class="bar" x="{x}" y="{y}" width="{bar_width}" height="{}" fill="{}"/>"#,
                    axis_bottom - y,
                    bar.color
                )?;
                writeln!(
                    svg,
                    r#"<text x="{}" y="{}" text-anchor="middle" font-size="12">{}</text>"#,
                    x + bar_width / 2.0,
                    axis_bottom + 18.0,
                    escape(&bar.category)
                )?;
            }
        }

        writeln!(
            svg,
            r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{axis_bottom}" stroke="black"/>"#
        )?;
        writeln!(
            svg,
            r#"<line x1="{MARGIN_LEFT}" y1="{axis_bottom}" x2="{axis_right}" y2="{axis_bottom}" stroke="black"/>"#
        )?;
        writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="13">{}</text>"#,
            MARGIN_LEFT + self.plot_width() / 2.0,
            HEIGHT - 15.0,
            escape(&self.x_label)
        )?;
        writeln!(
            svg,
            r#"<text x="20" y="{0}" text-anchor="middle" font-size="13" transform="rotate(-90 20 {0})">{1}</text>"#,
            MARGIN_TOP + self.plot_height() / 2.0,
            escape(&self.y_label)
        )?;
        writeln!(svg, "</svg>")
    }
}

impl fmt::Display for BarChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_svg(f)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::SentimentPresenter;
    use crate::types::{ClassificationResult, Sentiment};

    fn chart_for(label: Sentiment, score: f32) -> BarChart {
        SentimentPresenter
            .present(&ClassificationResult { label, score })
            .chart()
    }

    #[test]
    fn y_range_is_fixed_regardless_of_score() {
        for score in [0.0, 0.01, 0.5, 0.9999, 1.0] {
            let chart = chart_for(Sentiment::Neutral, score);
            assert_eq!(chart.y_range, (0.0, 1.0));
        }
    }

    #[test]
    fn single_bar_carries_label_score_and_color() {
        let chart = chart_for(Sentiment::Negative, 0.83);
        assert_eq!(chart.bars.len(), 1);
        assert_eq!(chart.bars[0].category, "Negative");
        assert_eq!(chart.bars[0].value, 0.83);
        assert_eq!(chart.bars[0].color.to_string(), "#C62828");
        assert_eq!(chart.title, "Sentiment Score Distribution");
    }

    #[test]
    fn bar_height_is_proportional_to_score() {
        let full = chart_for(Sentiment::Positive, 1.0);
        let half = chart_for(Sentiment::Positive, 0.5);
        assert_eq!(full.y_coord(1.0), MARGIN_TOP);
        assert_eq!(full.y_coord(0.0), MARGIN_TOP + full.plot_height());
        assert_eq!(half.y_coord(0.5), MARGIN_TOP + half.plot_height() / 2.0);
    }

    #[test]
    fn svg_has_fixed_axis_ticks_and_bar_color() {
        let svg = chart_for(Sentiment::Positive, 0.42).to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(svg.contains(">0.0</text>"));
        assert!(svg.contains(">1.0</text>"));
        assert!(svg.contains(r##"fill="#2E7D32""##));
        assert!(svg.contains(">Positive</text>"));
        assert_eq!(svg.matches(r#"class="bar""#).count(), 1);
    }

    #[test]
    fn svg_writes_into_any_formatter() {
        let chart = chart_for(Sentiment::Neutral, 0.6);
        let mut out = String::new();
        chart.write_svg(&mut out).unwrap();
        assert_eq!(out, chart.to_svg());
        assert_eq!(format!("{chart}"), out);
    }

    #[test]
    fn escapes_markup_in_labels() {
        assert_eq!(escape("a<b & \"c\">"), "a&lt;b &amp; &quot;c&quot;&gt;");
    }
}
