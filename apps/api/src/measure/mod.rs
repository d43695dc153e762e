// Measurement providers: turn section content into `SectionDimensions`.
// The pagination engine never measures text; the driver asks a provider.

pub mod estimator;
pub mod font_metrics;

use async_trait::async_trait;
use thiserror::Error;

use crate::document::SectionContent;
use crate::pagination::SectionDimensions;

pub use estimator::{default_text_metrics, EstimatingMeasurer, TextMetricsConfig};
pub use font_metrics::FontFamily;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeasureError {
    #[error("Text metrics are unusable: {0}")]
    InvalidMetrics(String),

    #[error("Measurement of section '{section_id}' failed: {message}")]
    Failed { section_id: String, message: String },
}

/// Supplies measured geometry for one section.
///
/// Implementations may be asynchronous (a browser layout pass, a remote
/// renderer). Carried by the driver as `Arc<dyn MeasurementProvider>`.
#[async_trait]
pub trait MeasurementProvider: Send + Sync {
    async fn measure(&self, content: &SectionContent) -> Result<SectionDimensions, MeasureError>;
}
