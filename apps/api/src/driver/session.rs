//! Pagination session: the editing-side state around one CV document.
//!
//! Owns the document, the user's preferred section order, the last measured
//! content of every section, and the latest published snapshot. A
//! recalculation runs in three steps so measurement can be awaited without
//! holding the session:
//!
//! 1. `prepare_calculation` derives the section order and lists sections whose
//!    content changed since they were last measured.
//! 2. `CalculationJob::run` measures those sections through a provider.
//! 3. `apply_calculation` merges the results, re-paginates, and publishes.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::{CvDocument, SectionContent, DEFAULT_KIND_ORDER};
use crate::driver::DriverError;
use crate::measure::{MeasureError, MeasurementProvider};
use crate::pagination::{
    collect_warnings, paginate, LayoutWarning, Measurements, PaginationConfig, PaginationEngine,
    PaginationMetrics, PaginationState, SectionDimensions, SectionId,
};

// ────────────────────────────────────────────────────────────────────────────
// Published snapshot
// ────────────────────────────────────────────────────────────────────────────

/// What consumers read: always a complete, self-consistent calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationSnapshot {
    /// Number of calculations applied so far (0 before the first one).
    pub revision: u64,
    pub state: PaginationState,
    pub metrics: Option<PaginationMetrics>,
    pub warnings: Vec<LayoutWarning>,
}

impl PaginationSnapshot {
    fn initial() -> Self {
        Self {
            revision: 0,
            state: PaginationState::empty(),
            metrics: None,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

/// Page navigation request, as sent by the preview's pager controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavigateAction {
    First,
    Last,
    Next,
    Previous,
    Page { page: u32 },
}

// ────────────────────────────────────────────────────────────────────────────
// Calculation job
// ────────────────────────────────────────────────────────────────────────────

/// Work captured from the session for one recalculation.
#[derive(Debug, Clone)]
pub struct CalculationJob {
    pub sections: Vec<SectionContent>,
    /// Indices into `sections` that need (re-)measuring.
    pub stale: Vec<usize>,
}

/// A finished job: the captured sections plus fresh measurements for the stale ones.
#[derive(Debug)]
pub struct CalculationResult {
    pub sections: Vec<SectionContent>,
    pub measured: Vec<(usize, Result<SectionDimensions, MeasureError>)>,
}

impl CalculationJob {
    /// Measures stale sections one after another; merging happens in `apply_calculation`.
    pub async fn run(self, provider: &dyn MeasurementProvider) -> CalculationResult {
        let mut measured = Vec::with_capacity(self.stale.len());
        for &idx in &self.stale {
            let result = provider.measure(&self.sections[idx]).await;
            measured.push((idx, result));
        }
        CalculationResult {
            sections: self.sections,
            measured,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

pub struct PaginationSession {
    document: CvDocument,
    engine: PaginationEngine,
    /// Preferred position of every section id seen so far, including currently empty ones.
    preferred_order: Vec<String>,
    /// Content each current measurement was taken from.
    measured_content: HashMap<String, SectionContent>,
    measurements: Measurements,
    snapshot: Arc<PaginationSnapshot>,
}

impl PaginationSession {
    pub fn new(document: CvDocument, config: PaginationConfig) -> Result<Self, DriverError> {
        document.validate()?;
        let engine = PaginationEngine::new(config)?;
        Ok(Self {
            document,
            engine,
            preferred_order: DEFAULT_KIND_ORDER.iter().map(|k| k.as_str().to_string()).collect(),
            measured_content: HashMap::new(),
            measurements: Measurements::new(),
            snapshot: Arc::new(PaginationSnapshot::initial()),
        })
    }

    pub fn document(&self) -> &CvDocument {
        &self.document
    }

    pub fn config(&self) -> &PaginationConfig {
        self.engine.config()
    }

    pub fn snapshot(&self) -> Arc<PaginationSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Replaces the document content. The caller schedules the recalculation.
    ///
    /// A document with unusable page-break ids is rejected and the current one kept.
    pub fn update_document(&mut self, document: CvDocument) -> Result<(), DriverError> {
        document.validate()?;
        self.document = document;
        Ok(())
    }

    pub fn update_config(&mut self, config: PaginationConfig) -> Result<(), DriverError> {
        self.engine.update_config(config)?;
        Ok(())
    }

    /// Flags the published state as (not) having a recalculation underway.
    pub fn set_calculating(&mut self, calculating: bool) -> bool {
        if self.snapshot.state.is_calculating == calculating {
            return false;
        }
        Arc::make_mut(&mut self.snapshot).state.is_calculating = calculating;
        true
    }

    // ── section order ───────────────────────────────────────────────────────

    /// Non-empty sections in the user's order, with `order` renumbered.
    pub fn ordered_sections(&mut self) -> Vec<SectionContent> {
        let derived = self.document.derive_sections();
        self.adopt_new_ids(&derived);

        let rank: HashMap<&str, usize> = self
            .preferred_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut sections = derived;
        sections.sort_by_key(|s| rank.get(s.section.id.as_str()).copied().unwrap_or(usize::MAX));
        for (i, s) in sections.iter_mut().enumerate() {
            s.section.order = i as u32;
        }
        sections
    }

    /// Ids of the sections currently laid out, in order.
    pub fn visible_order(&mut self) -> Vec<String> {
        self.ordered_sections()
            .into_iter()
            .map(|s| s.section.id)
            .collect()
    }

    /// Inserts ids never seen before right after their predecessor in document order.
    fn adopt_new_ids(&mut self, derived: &[SectionContent]) {
        for (i, section) in derived.iter().enumerate() {
            if self.preferred_order.iter().any(|id| *id == section.section.id) {
                continue;
            }
            let insert_at = if i == 0 {
                0
            } else {
                let prev = &derived[i - 1].section.id;
                self.preferred_order
                    .iter()
                    .position(|id| id == prev)
                    .map(|p| p + 1)
                    .unwrap_or(self.preferred_order.len())
            };
            self.preferred_order.insert(insert_at, section.section.id.clone());
        }
    }

    /// Moves the section at `from` to `to` in the visible order.
    ///
    /// Returns false (and changes nothing) when the indices are equal or out of range.
    pub fn reorder_section(&mut self, from: usize, to: usize) -> bool {
        let mut visible = self.visible_order();
        if from == to || from >= visible.len() || to >= visible.len() {
            return false;
        }
        let moved = visible.remove(from);
        visible.insert(to, moved);

        let hidden: Vec<String> = self
            .preferred_order
            .iter()
            .filter(|id| !visible.contains(id))
            .cloned()
            .collect();
        self.preferred_order = visible;
        self.preferred_order.extend(hidden);
        info!(from, to, "Section reordered");
        true
    }

    pub fn move_section_up(&mut self, index: usize) -> bool {
        if index == 0 {
            return false;
        }
        self.reorder_section(index, index - 1)
    }

    pub fn move_section_down(&mut self, index: usize) -> bool {
        let len = self.visible_order().len();
        if index + 1 >= len {
            return false;
        }
        self.reorder_section(index, index + 1)
    }

    /// Moves a section by id. Errors when the section is not currently laid out.
    pub fn move_section(&mut self, section_id: &str, direction: MoveDirection) -> Result<bool, DriverError> {
        let index = self
            .visible_order()
            .iter()
            .position(|id| id == section_id)
            .ok_or_else(|| DriverError::SectionNotFound(section_id.to_string()))?;
        Ok(match direction {
            MoveDirection::Up => self.move_section_up(index),
            MoveDirection::Down => self.move_section_down(index),
        })
    }

    // ── navigation ──────────────────────────────────────────────────────────

    pub fn current_page(&self) -> u32 {
        self.snapshot.state.current_page
    }

    /// Sets the current page. Pages outside `[1, total_pages]` are ignored.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        let total = self.snapshot.state.total_pages;
        if page < 1 || page > total {
            return false;
        }
        if page != self.snapshot.state.current_page {
            Arc::make_mut(&mut self.snapshot).state.current_page = page;
        }
        true
    }

    pub fn go_to_next_page(&mut self) -> bool {
        self.go_to_page(self.current_page() + 1)
    }

    pub fn go_to_previous_page(&mut self) -> bool {
        match self.current_page() {
            0 => false,
            page => self.go_to_page(page - 1),
        }
    }

    pub fn go_to_first_page(&mut self) -> bool {
        self.go_to_page(1)
    }

    pub fn go_to_last_page(&mut self) -> bool {
        self.go_to_page(self.snapshot.state.total_pages)
    }

    /// Applies a navigation request. Returns false when it was out of range.
    pub fn navigate(&mut self, action: NavigateAction) -> bool {
        match action {
            NavigateAction::First => self.go_to_first_page(),
            NavigateAction::Last => self.go_to_last_page(),
            NavigateAction::Next => self.go_to_next_page(),
            NavigateAction::Previous => self.go_to_previous_page(),
            NavigateAction::Page { page } => self.go_to_page(page),
        }
    }

    /// Navigates to the page holding `section_id` and returns that page.
    pub fn jump_to_section(&mut self, section_id: &str) -> Result<u32, DriverError> {
        let page = self
            .snapshot
            .state
            .page_for_section(section_id)
            .ok_or_else(|| DriverError::SectionNotFound(section_id.to_string()))?;
        self.go_to_page(page);
        debug!(
            section_id,
            page,
            neighbours = self.snapshot.state.sections_on_page(page).len(),
            "Jumped to section"
        );
        Ok(page)
    }

    // ── recalculation ───────────────────────────────────────────────────────

    pub fn prepare_calculation(&mut self) -> CalculationJob {
        let sections = self.ordered_sections();
        let stale = sections
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                !self.measurements.contains_key(&s.section.id)
                    || self.measured_content.get(&s.section.id) != Some(*s)
            })
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        debug!(sections = sections.len(), stale = stale.len(), "Prepared pagination job");
        CalculationJob { sections, stale }
    }

    /// Merges fresh measurements, re-paginates, and publishes a new snapshot.
    ///
    /// The measurement map is rebuilt from the job's sections only, so entries
    /// for removed sections are dropped. A failed measurement leaves that
    /// section out of the layout and forces a retry on the next calculation.
    pub fn apply_calculation(&mut self, result: CalculationResult) -> Arc<PaginationSnapshot> {
        let CalculationResult { sections, measured } = result;
        let mut fresh: HashMap<usize, Result<SectionDimensions, MeasureError>> =
            measured.into_iter().collect();

        let mut measurements = Measurements::with_capacity(sections.len());
        let mut measured_content = HashMap::with_capacity(sections.len());
        for (idx, content) in sections.iter().enumerate() {
            let id = &content.section.id;
            match fresh.remove(&idx) {
                Some(Ok(dims)) => {
                    measurements.insert(id.clone(), dims);
                    measured_content.insert(id.clone(), content.clone());
                }
                Some(Err(e)) => {
                    warn!(section_id = %id, error = %e, "Measurement failed, section left out of layout");
                }
                None => {
                    if let (Some(dims), Some(prev)) =
                        (self.measurements.get(id), self.measured_content.get(id))
                    {
                        measurements.insert(id.clone(), *dims);
                        measured_content.insert(id.clone(), prev.clone());
                    }
                }
            }
        }
        self.measurements = measurements;
        self.measured_content = measured_content;

        let order: Vec<SectionId> = sections.into_iter().map(|s| s.section).collect();
        self.engine.update_measurements(self.measurements.clone());
        let outcome = match self.engine.update_section_order(order.clone()) {
            Ok(()) => self.engine.calculate_pagination(),
            // Unreachable for validated documents; lay out first occurrences.
            Err(e) => {
                warn!(error = %e, "Section order rejected");
                paginate(self.engine.config(), &self.measurements, &order)
            }
        };
        let mut state = outcome.state;
        let previous_page = self.snapshot.state.current_page;
        if state.total_pages > 0 {
            state.current_page = previous_page.clamp(1, state.total_pages);
        }
        let warnings = collect_warnings(&state, &order);
        for warning in &warnings {
            debug!(warning = %warning.message(), "Layout warning");
        }

        let revision = self.snapshot.revision + 1;
        info!(
            revision,
            pages = state.total_pages,
            sections = outcome.metrics.total_sections,
            warnings = warnings.len(),
            overflow = state.has_overflow(),
            "Pagination updated"
        );
        self.snapshot = Arc::new(PaginationSnapshot {
            revision,
            state,
            metrics: Some(outcome.metrics),
            warnings,
        });
        self.snapshot()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
