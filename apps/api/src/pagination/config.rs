//! Pagination policy for one calculation run.
//!
//! Units are whatever the measurement provider reports in; the defaults assume
//! CSS pixels at 96 dpi on an A4 sheet (794 × 1123).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::pagination::types::SectionKind;
use crate::pagination::PaginationError;

pub const A4_HEIGHT_PX: f64 = 1123.0;
pub const DEFAULT_PAGE_MARGIN_PX: f64 = 40.0;
pub const DEFAULT_MIN_SECTION_HEIGHT: f64 = 50.0;
pub const DEFAULT_WIDOW_THRESHOLD: f64 = 100.0;
pub const DEFAULT_ORPHAN_THRESHOLD: f64 = 60.0;

/// Immutable page and break policy.
///
/// Deserializes with every field optional; missing fields take the defaults,
/// so a template only needs to send what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_height: f64,
    pub margin_top: f64,
    pub margin_bottom: f64,
    /// Sections shorter than this are never the cause of a page turn when they fit.
    pub min_section_height: f64,
    /// Minimum space that may be left at the bottom of a page before a break is pulled earlier.
    pub widow_threshold: f64,
    /// A following section shorter than this must not be pushed alone onto a new page.
    pub orphan_threshold: f64,
    /// Section kinds glued to the section immediately after them.
    pub keep_with_next: BTreeSet<SectionKind>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_height: A4_HEIGHT_PX,
            margin_top: DEFAULT_PAGE_MARGIN_PX,
            margin_bottom: DEFAULT_PAGE_MARGIN_PX,
            min_section_height: DEFAULT_MIN_SECTION_HEIGHT,
            widow_threshold: DEFAULT_WIDOW_THRESHOLD,
            orphan_threshold: DEFAULT_ORPHAN_THRESHOLD,
            keep_with_next: BTreeSet::from([SectionKind::Header]),
        }
    }
}

impl PaginationConfig {
    /// Printable height per page.
    pub fn available_height(&self) -> f64 {
        self.page_height - self.margin_top - self.margin_bottom
    }

    /// Lowest y (from the top edge of the sheet) content may reach.
    pub fn content_limit(&self) -> f64 {
        self.page_height - self.margin_bottom
    }

    pub fn keeps_with_next(&self, kind: SectionKind) -> bool {
        self.keep_with_next.contains(&kind)
    }

    /// Rejects configs that would produce an unbounded or always-overflowing layout.
    pub fn validate(&self) -> Result<(), PaginationError> {
        let fields = [
            ("page_height", self.page_height),
            ("margin_top", self.margin_top),
            ("margin_bottom", self.margin_bottom),
            ("min_section_height", self.min_section_height),
            ("widow_threshold", self.widow_threshold),
            ("orphan_threshold", self.orphan_threshold),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(PaginationError::InvalidConfig(format!(
                    "{name} must be finite, got {value}"
                )));
            }
            if value < 0.0 {
                return Err(PaginationError::InvalidConfig(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        if self.page_height <= 0.0 {
            return Err(PaginationError::InvalidConfig(
                "page_height must be greater than zero".to_string(),
            ));
        }
        if self.available_height() <= 0.0 {
            return Err(PaginationError::InvalidConfig(format!(
                "margins ({} + {}) leave no printable area on a {} page",
                self.margin_top, self.margin_bottom, self.page_height
            )));
        }
        Ok(())
    }
}
