// Layout core: packs measured CV sections into fixed-size pages.
// Pure and synchronous; callers own scheduling (see `driver`).

pub mod config;
pub mod engine;
pub mod types;
pub mod warnings;

use thiserror::Error;

pub use config::PaginationConfig;
pub use engine::{paginate, PaginationEngine, PaginationOutcome};
pub use types::{
    Measurements, Page, PageBreak, PagePosition, PaginationMetrics, PaginationState,
    SectionDimensions, SectionId, SectionKind,
};
pub use warnings::{collect_warnings, LayoutWarning};

/// Caller misuse of the engine. Per-section anomalies never surface here.
#[derive(Debug, Error, PartialEq)]
pub enum PaginationError {
    #[error("Invalid pagination config: {0}")]
    InvalidConfig(String),

    #[error("Section id '{0}' appears more than once in the section order")]
    DuplicateSection(String),
}
