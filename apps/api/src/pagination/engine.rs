//! Pagination Engine: packs measured sections into fixed-size pages.
//!
//! # Architecture
//! - `paginate` is the pure entry point: `(config, measurements, order)` in,
//!   `PaginationOutcome` out. No I/O, no hidden state.
//! - `PaginationEngine` is a thin wrapper that keeps the last-applied inputs.
//!   Each `update_*` call replaces the stored value wholesale.
//!
//! # Break rules (evaluated per section, one-section lookahead)
//! 1. Overflow: the section does not fit below the current content.
//! 2. Widow: less than `widow_threshold` would remain and the next section won't fit in it.
//! 3. Orphan: the next section is shorter than `orphan_threshold` and won't fit.
//! 4. Keep-with-next: a glued kind fits here but its follower does not, and the pair fits on a fresh page.
//!
//! A triggered break is cancelled when the section is below `min_section_height`
//! and still fits, or when a keep-with-next pair fits together on the current page.
//! A break is never taken from an empty page.

use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pagination::config::PaginationConfig;
use crate::pagination::types::{
    Measurements, Page, PageBreak, PagePosition, PaginationMetrics, PaginationState, SectionId,
    SectionKind,
};
use crate::pagination::PaginationError;

/// Float tolerance for fit comparisons.
const EPSILON: f64 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationOutcome {
    pub state: PaginationState,
    pub metrics: PaginationMetrics,
}

/// Why a section was moved to a new page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakReason {
    Overflow,
    Widow,
    Orphan,
    KeepWithNext,
}

// ────────────────────────────────────────────────────────────────────────────
// Engine wrapper
// ────────────────────────────────────────────────────────────────────────────

/// Holds the last-applied `(config, measurements, order)` triple.
#[derive(Debug, Clone, Default)]
pub struct PaginationEngine {
    config: PaginationConfig,
    measurements: Measurements,
    section_order: Vec<SectionId>,
}

impl PaginationEngine {
    pub fn new(config: PaginationConfig) -> Result<Self, PaginationError> {
        config.validate()?;
        Ok(Self {
            config,
            measurements: Measurements::new(),
            section_order: Vec::new(),
        })
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    pub fn section_order(&self) -> &[SectionId] {
        &self.section_order
    }

    /// Replaces the config. An invalid config is rejected and the previous one kept.
    pub fn update_config(&mut self, config: PaginationConfig) -> Result<(), PaginationError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Replaces the measurement map. Entries for removed sections do not survive.
    pub fn update_measurements(&mut self, measurements: Measurements) {
        self.measurements = measurements;
    }

    /// Replaces the section order. Duplicate ids are rejected.
    pub fn update_section_order(&mut self, order: Vec<SectionId>) -> Result<(), PaginationError> {
        let mut seen = HashSet::with_capacity(order.len());
        if let Some(dup) = order.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(PaginationError::DuplicateSection(dup.id.clone()));
        }
        self.section_order = order;
        Ok(())
    }

    pub fn calculate_pagination(&self) -> PaginationOutcome {
        paginate(&self.config, &self.measurements, &self.section_order)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core sweep
// ────────────────────────────────────────────────────────────────────────────

/// Page being filled during the sweep.
struct OpenPage {
    page_number: u32,
    sections: Vec<SectionId>,
    /// Accumulated height from the top edge of the sheet (starts at `margin_top`).
    height: f64,
}

impl OpenPage {
    fn new(page_number: u32, config: &PaginationConfig) -> Self {
        Self {
            page_number,
            sections: Vec::new(),
            height: config.margin_top,
        }
    }

    fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    fn close(self, config: &PaginationConfig) -> Page {
        let available_height = config.available_height();
        let total_height = self.height - config.margin_top;
        let utilization = if available_height > 0.0 {
            (total_height / available_height).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Page {
            page_number: self.page_number,
            sections: self.sections,
            total_height,
            available_height,
            utilization,
            has_overflow: total_height > available_height + EPSILON,
            breakpoints: Vec::new(),
        }
    }
}

/// Lays out `order` using `measurements` under `config`.
///
/// Sections without a usable measurement are skipped with a warning, as are
/// repeated ids after their first occurrence. The config is expected to have
/// passed `PaginationConfig::validate`; `PaginationEngine` enforces that.
pub fn paginate(
    config: &PaginationConfig,
    measurements: &Measurements,
    order: &[SectionId],
) -> PaginationOutcome {
    let started = Instant::now();
    let available = config.available_height();
    let limit = config.content_limit();

    // Resolve heights up front. An unmeasured section is skipped, and also
    // counts as "no next section" for the one before it.
    let mut seen = HashSet::with_capacity(order.len());
    let mut resolved: Vec<(&SectionId, Option<f64>)> = Vec::with_capacity(order.len());
    let mut skipped_sections = 0usize;
    for section in order {
        if !seen.insert(section.id.as_str()) {
            warn!(section_id = %section.id, "Duplicate section id in order, keeping first occurrence");
            continue;
        }
        let height = match measurements.get(&section.id) {
            Some(dims) if dims.is_valid() => Some(dims.outer_height()),
            Some(dims) => {
                warn!(section_id = %section.id, ?dims, "Section has unusable dimensions, skipping");
                skipped_sections += 1;
                None
            }
            None => {
                warn!(section_id = %section.id, "No measurement recorded for section, skipping");
                skipped_sections += 1;
                None
            }
        };
        resolved.push((section, height));
    }

    let mut pages: Vec<Page> = Vec::new();
    let mut section_layout: BTreeMap<String, PagePosition> = BTreeMap::new();
    let mut overflow_sections = 0usize;
    let mut current = OpenPage::new(1, config);
    let mut manual_break_pending = false;

    for (i, &(section, height)) in resolved.iter().enumerate() {
        let Some(height) = height else {
            continue;
        };
        let next = resolved
            .get(i + 1)
            .and_then(|&(s, h)| h.map(|h| (s.kind, h)));

        // A manual break always lands on the page it follows, even a full one.
        let start_new_page = if manual_break_pending {
            true
        } else if section.kind == SectionKind::CustomBreak {
            false
        } else {
            match break_reason(config, current.height, height, section.kind, next) {
                Some(reason) if !break_cancelled(config, current.height, height, section.kind, next) => {
                    debug!(section_id = %section.id, ?reason, page = current.page_number, "Page break");
                    true
                }
                _ => false,
            }
        };
        manual_break_pending = false;

        if start_new_page && !current.is_empty() {
            let next_number = current.page_number + 1;
            let closed = std::mem::replace(&mut current, OpenPage::new(next_number, config));
            pages.push(closed.close(config));
        }

        let room = (limit - current.height).max(0.0);
        let mut visible_height = height.min(room);
        let mut hidden_height = height - visible_height;
        if hidden_height <= EPSILON {
            visible_height = height;
            hidden_height = 0.0;
        }
        if height > available + EPSILON {
            overflow_sections += 1;
            warn!(
                section_id = %section.id,
                height,
                available,
                "Section is taller than a full page, placing it whole"
            );
        }

        section_layout.insert(
            section.id.clone(),
            PagePosition {
                page_number: current.page_number,
                y_offset: current.height - config.margin_top,
                spans_multiple_pages: hidden_height > 0.0,
                total_height: height,
                visible_height,
                hidden_height,
            },
        );
        current.sections.push(section.clone());
        current.height += height;

        if section.kind == SectionKind::CustomBreak {
            manual_break_pending = true;
        }
    }

    if !current.is_empty() {
        pages.push(current.close(config));
    }

    let breakpoints = assign_breakpoints(config, &mut pages, &section_layout);
    let total_pages = pages.len();
    let average_page_utilization = if pages.is_empty() {
        0.0
    } else {
        pages.iter().map(|p| p.utilization).sum::<f64>() / total_pages as f64
    };

    let metrics = PaginationMetrics {
        calculation_time: started.elapsed(),
        total_sections: section_layout.len(),
        total_pages,
        average_page_utilization,
        overflow_sections,
        orphan_sections: breakpoints.iter().filter(|b| b.is_orphan).count(),
        widow_sections: breakpoints.iter().filter(|b| b.is_widow).count(),
        skipped_sections,
    };

    debug!(
        pages = metrics.total_pages,
        sections = metrics.total_sections,
        skipped = metrics.skipped_sections,
        "Pagination calculated"
    );

    let state = PaginationState {
        current_page: if pages.is_empty() { 0 } else { 1 },
        total_pages: total_pages as u32,
        pages,
        section_layout,
        measurements: measurements.clone(),
        breakpoints,
        is_calculating: false,
        last_calculated: Utc::now(),
    };

    PaginationOutcome { state, metrics }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

/// First break rule the section trips, in precedence order.
fn break_reason(
    config: &PaginationConfig,
    current_height: f64,
    height: f64,
    kind: SectionKind,
    next: Option<(SectionKind, f64)>,
) -> Option<BreakReason> {
    let limit = config.content_limit();
    if current_height + height > limit + EPSILON {
        return Some(BreakReason::Overflow);
    }

    let (_, next_height) = next?;
    let remaining = limit - (current_height + height);

    if remaining < config.widow_threshold && next_height > remaining + EPSILON {
        return Some(BreakReason::Widow);
    }
    if next_height < config.orphan_threshold && next_height > remaining + EPSILON {
        return Some(BreakReason::Orphan);
    }
    if config.keeps_with_next(kind)
        && height + next_height > (limit - current_height) + EPSILON
        && height + next_height <= config.available_height() + EPSILON
    {
        return Some(BreakReason::KeepWithNext);
    }
    None
}

/// Exceptions that keep a section on the current page despite a triggered rule.
fn break_cancelled(
    config: &PaginationConfig,
    current_height: f64,
    height: f64,
    kind: SectionKind,
    next: Option<(SectionKind, f64)>,
) -> bool {
    let limit = config.content_limit();
    let fits = current_height + height <= limit + EPSILON;
    if height < config.min_section_height && fits {
        return true;
    }
    if let Some((next_kind, next_height)) = next {
        let glued = config.keeps_with_next(kind) || config.keeps_with_next(next_kind);
        if glued && current_height + height + next_height <= limit + EPSILON {
            return true;
        }
    }
    false
}

/// Records the leading and trailing boundary of every page.
///
/// The first section of every page is an orphan when its visible height is
/// below `orphan_threshold`, and the last section of every page is a widow when
/// below `widow_threshold`. Manual breaks carry neither flag.
fn assign_breakpoints(
    config: &PaginationConfig,
    pages: &mut [Page],
    layout: &BTreeMap<String, PagePosition>,
) -> Vec<PageBreak> {
    let mut all = Vec::new();

    for page in pages.iter_mut() {
        let (Some(first), Some(last)) = (page.sections.first(), page.sections.last()) else {
            continue;
        };
        let mut boundary = vec![first];
        if last.id != first.id {
            boundary.push(last);
        }

        for section in boundary {
            let Some(position) = layout.get(&section.id) else {
                continue;
            };
            let is_manual = section.kind == SectionKind::CustomBreak;
            let is_first = section.id == first.id;
            let is_last = section.id == last.id;
            page.breakpoints.push(PageBreak {
                section_id: section.id.clone(),
                page_number: page.page_number,
                y_offset: position.y_offset,
                is_orphan: is_first
                    && !is_manual
                    && position.visible_height < config.orphan_threshold,
                is_widow: is_last
                    && !is_manual
                    && position.visible_height < config.widow_threshold,
                is_manual,
            });
        }
        all.extend(page.breakpoints.iter().cloned());
    }
    all
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
