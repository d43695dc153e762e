//! Text-height estimator: measures sections without a layout engine.
//!
//! Each text block is word-wrapped against the template's content width using
//! the static font metrics, then converted to pixels with the block's font
//! scale and line height. Used by server-side sessions, where no browser is
//! available to report real heights.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{SectionContent, TextBlock};
use crate::measure::font_metrics::{get_metrics, FontFamily, FontMetricTable};
use crate::measure::{MeasureError, MeasurementProvider};
use crate::pagination::types::{SectionDimensions, SectionKind};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Typography of a CV template, in CSS pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMetricsConfig {
    pub font: FontFamily,
    /// Body font size. 14.67px = 11pt at 96 dpi.
    pub font_size_px: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
    /// Width of the page content area.
    pub content_width_px: f32,
    pub title_scale: f32,
    pub heading_scale: f32,
    pub bullet_indent_px: f32,
    /// Space below a section heading.
    pub heading_gap_px: f32,
    /// Space between two entries of one section.
    pub entry_gap_px: f32,
    /// Space below every section, reported as its bottom margin.
    pub section_gap_px: f32,
}

/// A4 at 96 dpi (794px wide) with 48px side margins and 11pt body text.
pub fn default_text_metrics(font: FontFamily) -> TextMetricsConfig {
    TextMetricsConfig {
        font,
        font_size_px: 14.67,
        line_height: 1.4,
        content_width_px: 698.0,
        title_scale: 2.0,
        heading_scale: 1.25,
        bullet_indent_px: 16.0,
        heading_gap_px: 6.0,
        entry_gap_px: 10.0,
        section_gap_px: 18.0,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Measurer
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EstimatingMeasurer {
    config: TextMetricsConfig,
}

impl EstimatingMeasurer {
    pub fn new(config: TextMetricsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TextMetricsConfig {
        &self.config
    }

    /// Synchronous estimate; the provider impl delegates here.
    pub fn estimate(&self, content: &SectionContent) -> Result<SectionDimensions, MeasureError> {
        let c = &self.config;
        if !(c.font_size_px > 0.0 && c.line_height > 0.0 && c.content_width_px > c.bullet_indent_px) {
            return Err(MeasureError::InvalidMetrics(format!(
                "font size {}px, line height {}, content width {}px",
                c.font_size_px, c.line_height, c.content_width_px
            )));
        }

        if content.section.kind == SectionKind::CustomBreak {
            return Ok(SectionDimensions {
                width: c.content_width_px as f64,
                ..SectionDimensions::default()
            });
        }

        let metrics = get_metrics(c.font);
        let height: f32 = content
            .blocks
            .iter()
            .map(|block| self.block_height(metrics, block))
            .sum();

        Ok(SectionDimensions {
            width: c.content_width_px as f64,
            height: height as f64,
            margin_top: 0.0,
            margin_bottom: c.section_gap_px as f64,
            padding_top: 0.0,
            padding_bottom: 0.0,
        })
    }

    fn block_height(&self, metrics: &FontMetricTable, block: &TextBlock) -> f32 {
        let c = &self.config;
        match block {
            TextBlock::Title(text) => self.text_height(metrics, text, c.title_scale, c.content_width_px),
            TextBlock::Heading(text) => {
                self.text_height(metrics, text, c.heading_scale, c.content_width_px) + c.heading_gap_px
            }
            TextBlock::Line(text) | TextBlock::Paragraph(text) => {
                self.text_height(metrics, text, 1.0, c.content_width_px)
            }
            TextBlock::Bullet(text) => {
                self.text_height(metrics, text, 1.0, c.content_width_px - c.bullet_indent_px)
            }
            TextBlock::EntryGap => c.entry_gap_px,
        }
    }

    /// Wrapped height of `text` at `scale` × body size within `width_px`.
    fn text_height(&self, metrics: &FontMetricTable, text: &str, scale: f32, width_px: f32) -> f32 {
        let size = self.config.font_size_px * scale;
        let lines = metrics.wrapped_lines(text, width_px / size);
        lines as f32 * size * self.config.line_height
    }
}

impl Default for EstimatingMeasurer {
    fn default() -> Self {
        Self::new(default_text_metrics(FontFamily::Inter))
    }
}

#[async_trait]
impl MeasurementProvider for EstimatingMeasurer {
    async fn measure(&self, content: &SectionContent) -> Result<SectionDimensions, MeasureError> {
        self.estimate(content)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::types::SectionId;

    fn content(kind: SectionKind, blocks: Vec<TextBlock>) -> SectionContent {
        SectionContent {
            section: SectionId::new(kind.as_str(), kind, 0),
            blocks,
        }
    }

    #[test]
    fn test_single_paragraph_line_height() {
        let measurer = EstimatingMeasurer::default();
        let dims = measurer
            .estimate(&content(
                SectionKind::Summary,
                vec![TextBlock::Paragraph("Short summary".to_string())],
            ))
            .unwrap();
        let expected = 14.67_f32 * 1.4;
        assert!((dims.height as f32 - expected).abs() < 1e-3, "got {}", dims.height);
        assert_eq!(dims.margin_bottom, 18.0);
        assert_eq!(dims.width, 698.0);
    }

    #[test]
    fn test_heading_adds_gap_and_scale() {
        let measurer = EstimatingMeasurer::default();
        let dims = measurer
            .estimate(&content(
                SectionKind::Skills,
                vec![TextBlock::Heading("Skills".to_string())],
            ))
            .unwrap();
        let expected = 14.67_f32 * 1.25 * 1.4 + 6.0;
        assert!((dims.height as f32 - expected).abs() < 1e-3);
    }

    #[test]
    fn test_longer_text_is_taller() {
        let measurer = EstimatingMeasurer::default();
        let short = measurer
            .estimate(&content(
                SectionKind::Summary,
                vec![TextBlock::Paragraph("Backend engineer.".to_string())],
            ))
            .unwrap();
        let long = measurer
            .estimate(&content(
                SectionKind::Summary,
                vec![TextBlock::Paragraph(
                    "Backend engineer focused on distributed storage and streaming systems. ".repeat(8),
                )],
            ))
            .unwrap();
        assert!(long.height > short.height * 3.0);
    }

    #[test]
    fn test_bullets_wrap_narrower_than_paragraphs() {
        let measurer = EstimatingMeasurer::default();
        let text = "Migrated the reporting stack to columnar storage and cut costs ".repeat(3);
        let metrics = get_metrics(FontFamily::Inter);
        let para = measurer.block_height(metrics, &TextBlock::Paragraph(text.clone()));
        let bullet = measurer.block_height(metrics, &TextBlock::Bullet(text));
        assert!(bullet >= para);
    }

    #[test]
    fn test_custom_break_has_no_height() {
        let measurer = EstimatingMeasurer::default();
        let dims = measurer
            .estimate(&content(SectionKind::CustomBreak, vec![]))
            .unwrap();
        assert_eq!(dims.outer_height(), 0.0);
        assert!(dims.is_valid());
    }

    #[test]
    fn test_invalid_metrics_rejected() {
        let mut config = default_text_metrics(FontFamily::Inter);
        config.font_size_px = 0.0;
        let measurer = EstimatingMeasurer::new(config);
        let result = measurer.estimate(&content(SectionKind::Summary, vec![]));
        assert!(matches!(result, Err(MeasureError::InvalidMetrics(_))));
    }

    #[tokio::test]
    async fn test_provider_trait_delegates_to_estimate() {
        let measurer = EstimatingMeasurer::default();
        let section = content(
            SectionKind::Hobbies,
            vec![TextBlock::Paragraph("Chess, climbing".to_string())],
        );
        let via_trait = measurer.measure(&section).await.unwrap();
        assert_eq!(via_trait, measurer.estimate(&section).unwrap());
    }
}
