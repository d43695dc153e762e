//! Layout Warnings: user-facing notices derived from a finished pagination.
//!
//! The engine never blocks editing or export on these; the editor shows them
//! so the user can shorten a section, reorder, or insert a manual break.

use serde::{Deserialize, Serialize};

use crate::pagination::types::{PaginationState, SectionId};

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutWarning {
    /// Content on this page runs past the bottom margin.
    PageOverflow { page_number: u32, overflow_height: f64 },
    /// A single section is taller than a whole page and is cut off.
    OversizedSection {
        section_id: String,
        page_number: u32,
        hidden_height: f64,
    },
    /// A short section is left at the bottom of a page.
    Widow { section_id: String, page_number: u32 },
    /// A short section opens a page on its own.
    Orphan { section_id: String, page_number: u32 },
    /// The section had no measurement and was left out of the layout.
    SkippedSection { section_id: String },
}

impl LayoutWarning {
    pub fn message(&self) -> String {
        match self {
            LayoutWarning::PageOverflow {
                page_number,
                overflow_height,
            } => format!("Page {page_number} is overflowing by {overflow_height:.0}"),
            LayoutWarning::OversizedSection {
                section_id,
                page_number,
                hidden_height,
            } => format!(
                "Section '{section_id}' does not fit on page {page_number}; {hidden_height:.0} is cut off"
            ),
            LayoutWarning::Widow {
                section_id,
                page_number,
            } => format!("Section '{section_id}' is stranded at the bottom of page {page_number}"),
            LayoutWarning::Orphan {
                section_id,
                page_number,
            } => format!("Section '{section_id}' starts page {page_number} on its own"),
            LayoutWarning::SkippedSection { section_id } => {
                format!("Section '{section_id}' could not be measured and is not shown")
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Core functions
// ────────────────────────────────────────────────────────────────────────────

/// Collects warnings in page order, followed by skipped sections in document order.
///
/// `order` is the section order the state was calculated from; sections in it
/// without a recorded position are reported as skipped. A short section at the
/// top of the first page or the bottom of the last page sits at a document edge
/// rather than a break, so its flag is not surfaced as a warning.
pub fn collect_warnings(state: &PaginationState, order: &[SectionId]) -> Vec<LayoutWarning> {
    let mut warnings = Vec::new();

    for page in &state.pages {
        if page.has_overflow {
            warnings.push(LayoutWarning::PageOverflow {
                page_number: page.page_number,
                overflow_height: page.total_height - page.available_height,
            });
        }
        for section in &page.sections {
            if let Some(pos) = state.section_layout.get(&section.id) {
                if pos.spans_multiple_pages {
                    warnings.push(LayoutWarning::OversizedSection {
                        section_id: section.id.clone(),
                        page_number: pos.page_number,
                        hidden_height: pos.hidden_height,
                    });
                }
            }
        }
        for brk in &page.breakpoints {
            if brk.is_orphan && brk.page_number > 1 {
                warnings.push(LayoutWarning::Orphan {
                    section_id: brk.section_id.clone(),
                    page_number: brk.page_number,
                });
            }
            if brk.is_widow && brk.page_number < state.total_pages {
                warnings.push(LayoutWarning::Widow {
                    section_id: brk.section_id.clone(),
                    page_number: brk.page_number,
                });
            }
        }
    }

    warnings.extend(
        order
            .iter()
            .filter(|s| !state.section_layout.contains_key(&s.id))
            .map(|s| LayoutWarning::SkippedSection {
                section_id: s.id.clone(),
            }),
    );
    warnings
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
