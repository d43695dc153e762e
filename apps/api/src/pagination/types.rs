//! Pagination data model: section identities, measured geometry, and the
//! page/position records produced by one calculation.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Section identity
// ────────────────────────────────────────────────────────────────────────────

/// Kind of CV content block. Drives keep-with-next and break policy, never height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Header,
    Summary,
    Experience,
    Education,
    Skills,
    Languages,
    Certifications,
    Projects,
    Hobbies,
    /// Manual page break inserted by the user.
    CustomBreak,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Header => "header",
            SectionKind::Summary => "summary",
            SectionKind::Experience => "experience",
            SectionKind::Education => "education",
            SectionKind::Skills => "skills",
            SectionKind::Languages => "languages",
            SectionKind::Certifications => "certifications",
            SectionKind::Projects => "projects",
            SectionKind::Hobbies => "hobbies",
            SectionKind::CustomBreak => "custom-break",
        }
    }
}

/// A content block in document order.
///
/// `id` must be unique within one section order; two entries sharing an id
/// is a caller contract violation (see `PaginationEngine::update_section_order`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionId {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SectionKind,
    pub order: u32,
}

impl SectionId {
    pub fn new(id: impl Into<String>, kind: SectionKind, order: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            order,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Measured geometry
// ────────────────────────────────────────────────────────────────────────────

/// Geometry of one section as reported by the measurement provider.
///
/// All values are non-negative layout units, in the same unit as `PaginationConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SectionDimensions {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub margin_top: f64,
    #[serde(default)]
    pub margin_bottom: f64,
    #[serde(default)]
    pub padding_top: f64,
    #[serde(default)]
    pub padding_bottom: f64,
}

impl SectionDimensions {
    pub fn with_height(height: f64) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    /// Vertical space the section claims on a page: content plus outer margins.
    pub fn outer_height(&self) -> f64 {
        self.height + self.margin_top + self.margin_bottom
    }

    /// False for NaN/infinite or negative values, which cannot be laid out.
    pub fn is_valid(&self) -> bool {
        [
            self.width,
            self.height,
            self.margin_top,
            self.margin_bottom,
            self.padding_top,
            self.padding_bottom,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
    }
}

/// Section id → dimensions. Replaced wholesale on every update.
pub type Measurements = HashMap<String, SectionDimensions>;

// ────────────────────────────────────────────────────────────────────────────
// Layout results
// ────────────────────────────────────────────────────────────────────────────

/// Placement of a single section.
///
/// Invariant: `visible_height + hidden_height == total_height`, and
/// `spans_multiple_pages` is true only when `hidden_height > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePosition {
    /// 1-based page number.
    pub page_number: u32,
    /// Offset from the top of the page content area (below the top margin).
    pub y_offset: f64,
    pub spans_multiple_pages: bool,
    pub total_height: f64,
    pub visible_height: f64,
    pub hidden_height: f64,
}

/// A section boundary decision, kept for diagnostics and UI highlighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBreak {
    pub section_id: String,
    pub page_number: u32,
    pub y_offset: f64,
    pub is_widow: bool,
    pub is_orphan: bool,
    pub is_manual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub sections: Vec<SectionId>,
    /// Sum of the outer heights of the sections on this page.
    pub total_height: f64,
    /// Printable height: page height minus top and bottom margins.
    pub available_height: f64,
    /// `total_height / available_height`, clamped to `[0, 1]`.
    pub utilization: f64,
    pub has_overflow: bool,
    pub breakpoints: Vec<PageBreak>,
}

/// Complete result of one calculation. Consumers always see a whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationState {
    pub pages: Vec<Page>,
    pub current_page: u32,
    pub total_pages: u32,
    pub section_layout: BTreeMap<String, PagePosition>,
    pub measurements: Measurements,
    pub breakpoints: Vec<PageBreak>,
    pub is_calculating: bool,
    pub last_calculated: DateTime<Utc>,
}

impl PaginationState {
    /// A state with no pages, as produced for an empty section order.
    pub fn empty() -> Self {
        Self {
            pages: Vec::new(),
            current_page: 0,
            total_pages: 0,
            section_layout: BTreeMap::new(),
            measurements: Measurements::new(),
            breakpoints: Vec::new(),
            is_calculating: false,
            last_calculated: Utc::now(),
        }
    }

    pub fn page_for_section(&self, section_id: &str) -> Option<u32> {
        self.section_layout.get(section_id).map(|p| p.page_number)
    }

    pub fn sections_on_page(&self, page_number: u32) -> &[SectionId] {
        self.pages
            .iter()
            .find(|p| p.page_number == page_number)
            .map(|p| p.sections.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_overflow(&self) -> bool {
        self.pages.iter().any(|p| p.has_overflow)
    }
}

/// Observational summary of a calculation. Never fed back into layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationMetrics {
    #[serde(with = "duration_micros")]
    pub calculation_time: Duration,
    pub total_sections: usize,
    pub total_pages: usize,
    pub average_page_utilization: f64,
    pub overflow_sections: usize,
    pub orphan_sections: usize,
    pub widow_sections: usize,
    /// Sections left out of layout because they had no usable measurement.
    pub skipped_sections: usize,
}

/// Serializes a `Duration` as whole microseconds.
mod duration_micros {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_micros(u64::deserialize(d)?))
    }
}
