//! CV document model and section derivation.
//!
//! The editor holds one `CvDocument`; `derive_sections` turns it into the
//! ordered, non-empty content blocks the measurement provider and the
//! pagination engine work on. Empty sections (no summary text, an empty
//! skills list, ...) produce no section at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pagination::types::{SectionId, SectionKind};

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("Invalid page break '{id}': {reason}")]
    InvalidPageBreak { id: String, reason: &'static str },
}

// ────────────────────────────────────────────────────────────────────────────
// Document content
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub title: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceEntry {
    pub company: String,
    pub role: String,
    pub start: String,
    pub end: Option<String>,
    pub location: Option<String>,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    pub field: String,
    pub start: String,
    pub end: Option<String>,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillGroup {
    pub category: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageEntry {
    pub language: String,
    pub proficiency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificationEntry {
    pub name: String,
    pub issuer: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectEntry {
    pub name: String,
    pub description: String,
    pub tech_stack: Vec<String>,
    pub url: Option<String>,
    pub bullets: Vec<String>,
}

/// A manual page break placed right after the section of kind `after`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageBreakMarker {
    pub id: String,
    pub after: SectionKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvDocument {
    pub personal: PersonalInfo,
    pub summary: String,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<SkillGroup>,
    pub languages: Vec<LanguageEntry>,
    pub certifications: Vec<CertificationEntry>,
    pub projects: Vec<ProjectEntry>,
    pub hobbies: Vec<String>,
    pub page_breaks: Vec<PageBreakMarker>,
}

// ────────────────────────────────────────────────────────────────────────────
// Derived sections
// ────────────────────────────────────────────────────────────────────────────

/// One renderable unit of text inside a section, as the measurer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum TextBlock {
    /// Large display line (name in the header).
    Title(String),
    /// Section heading ("Experience").
    Heading(String),
    /// Single styled line such as "Role · Company · 2021 – Present".
    Line(String),
    /// Wrapped body text.
    Paragraph(String),
    /// Wrapped, indented list item.
    Bullet(String),
    /// Vertical gap between two entries of the same section.
    EntryGap,
}

/// Content of one section, in a form independent of the document schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionContent {
    pub section: SectionId,
    pub blocks: Vec<TextBlock>,
}

/// Default top-to-bottom order of section kinds.
pub const DEFAULT_KIND_ORDER: [SectionKind; 9] = [
    SectionKind::Header,
    SectionKind::Summary,
    SectionKind::Experience,
    SectionKind::Education,
    SectionKind::Skills,
    SectionKind::Languages,
    SectionKind::Certifications,
    SectionKind::Projects,
    SectionKind::Hobbies,
];

/// Stable id of the (single) section of a given kind.
pub fn section_id_for(kind: SectionKind) -> &'static str {
    kind.as_str()
}

impl CvDocument {
    /// Checks that every manual page-break id is usable as a section id.
    ///
    /// Marker ids share one namespace with the section ids (the kind names), so
    /// an id that is blank, names a section kind, or repeats another marker
    /// would make two layout entries indistinguishable.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.page_breaks.len());
        for marker in &self.page_breaks {
            let id = marker.id.as_str();
            let reason = if id.trim().is_empty() {
                Some("id must not be empty")
            } else if id == SectionKind::CustomBreak.as_str()
                || DEFAULT_KIND_ORDER.iter().any(|k| k.as_str() == id)
            {
                Some("id is reserved for a section")
            } else if seen.contains(&id) {
                Some("id is used by another page break")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(DocumentError::InvalidPageBreak {
                    id: id.to_string(),
                    reason,
                });
            }
            seen.push(id);
        }
        Ok(())
    }

    /// Derives non-empty sections in default document order, manual breaks
    /// following the section they are anchored to. `order` fields are set to
    /// the position in the returned list.
    pub fn derive_sections(&self) -> Vec<SectionContent> {
        let mut out = Vec::new();
        for kind in DEFAULT_KIND_ORDER {
            if let Some(blocks) = self.blocks_for(kind) {
                out.push((SectionId::new(section_id_for(kind), kind, 0), blocks));
            }
            for marker in self.page_breaks.iter().filter(|m| m.after == kind) {
                out.push((
                    SectionId::new(marker.id.clone(), SectionKind::CustomBreak, 0),
                    Vec::new(),
                ));
            }
        }
        out.into_iter()
            .enumerate()
            .map(|(i, (mut section, blocks))| {
                section.order = i as u32;
                SectionContent { section, blocks }
            })
            .collect()
    }

    /// Text blocks for a section kind, or `None` when the section has no content.
    fn blocks_for(&self, kind: SectionKind) -> Option<Vec<TextBlock>> {
        let blocks = match kind {
            SectionKind::Header => self.header_blocks(),
            SectionKind::Summary => {
                let summary = self.summary.trim();
                if summary.is_empty() {
                    Vec::new()
                } else {
                    vec![
                        TextBlock::Heading("Summary".to_string()),
                        TextBlock::Paragraph(summary.to_string()),
                    ]
                }
            }
            SectionKind::Experience => entries_section(
                "Experience",
                self.experience
                    .iter()
                    .filter(|e| !e.company.trim().is_empty() || !e.role.trim().is_empty())
                    .map(|e| {
                        let mut blocks = vec![TextBlock::Line(join_nonempty(&[
                            &e.role,
                            &e.company,
                            &date_range(&e.start, e.end.as_deref()),
                            e.location.as_deref().unwrap_or(""),
                        ]))];
                        blocks.extend(bullets(&e.bullets));
                        blocks
                    }),
            ),
            SectionKind::Education => entries_section(
                "Education",
                self.education
                    .iter()
                    .filter(|e| !e.institution.trim().is_empty())
                    .map(|e| {
                        let mut blocks = vec![
                            TextBlock::Line(join_nonempty(&[&e.degree, &e.field])),
                            TextBlock::Line(join_nonempty(&[
                                &e.institution,
                                &date_range(&e.start, e.end.as_deref()),
                            ])),
                        ];
                        blocks.extend(bullets(&e.details));
                        blocks
                    }),
            ),
            SectionKind::Skills => {
                let lines: Vec<TextBlock> = self
                    .skills
                    .iter()
                    .filter(|g| g.items.iter().any(|i| !i.trim().is_empty()))
                    .map(|g| {
                        let items = g.items.join(", ");
                        if g.category.trim().is_empty() {
                            TextBlock::Paragraph(items)
                        } else {
                            TextBlock::Paragraph(format!("{}: {}", g.category.trim(), items))
                        }
                    })
                    .collect();
                with_heading("Skills", lines)
            }
            SectionKind::Languages => {
                let langs: Vec<String> = self
                    .languages
                    .iter()
                    .filter(|l| !l.language.trim().is_empty())
                    .map(|l| join_nonempty(&[&l.language, &l.proficiency]))
                    .collect();
                if langs.is_empty() {
                    Vec::new()
                } else {
                    vec![
                        TextBlock::Heading("Languages".to_string()),
                        TextBlock::Paragraph(langs.join(", ")),
                    ]
                }
            }
            SectionKind::Certifications => with_heading(
                "Certifications",
                self.certifications
                    .iter()
                    .filter(|c| !c.name.trim().is_empty())
                    .map(|c| {
                        TextBlock::Line(join_nonempty(&[
                            &c.name,
                            &c.issuer,
                            c.date.as_deref().unwrap_or(""),
                        ]))
                    })
                    .collect(),
            ),
            SectionKind::Projects => entries_section(
                "Projects",
                self.projects
                    .iter()
                    .filter(|p| !p.name.trim().is_empty())
                    .map(|p| {
                        let mut blocks = vec![TextBlock::Line(join_nonempty(&[
                            &p.name,
                            p.url.as_deref().unwrap_or(""),
                        ]))];
                        if !p.description.trim().is_empty() {
                            blocks.push(TextBlock::Paragraph(p.description.trim().to_string()));
                        }
                        if !p.tech_stack.is_empty() {
                            blocks.push(TextBlock::Line(p.tech_stack.join(", ")));
                        }
                        blocks.extend(bullets(&p.bullets));
                        blocks
                    }),
            ),
            SectionKind::Hobbies => {
                let hobbies: Vec<&str> = self
                    .hobbies
                    .iter()
                    .map(|h| h.trim())
                    .filter(|h| !h.is_empty())
                    .collect();
                if hobbies.is_empty() {
                    Vec::new()
                } else {
                    vec![
                        TextBlock::Heading("Interests".to_string()),
                        TextBlock::Paragraph(hobbies.join(", ")),
                    ]
                }
            }
            SectionKind::CustomBreak => Vec::new(),
        };
        (!blocks.is_empty()).then_some(blocks)
    }

    fn header_blocks(&self) -> Vec<TextBlock> {
        let p = &self.personal;
        let mut blocks = Vec::new();
        if !p.full_name.trim().is_empty() {
            blocks.push(TextBlock::Title(p.full_name.trim().to_string()));
        }
        if !p.title.trim().is_empty() {
            blocks.push(TextBlock::Line(p.title.trim().to_string()));
        }
        let mut contact: Vec<&str> = vec![p.email.as_str(), p.phone.as_str(), p.location.as_str()];
        contact.extend(p.links.iter().map(String::as_str));
        let contact = join_nonempty(&contact);
        if !contact.is_empty() {
            blocks.push(TextBlock::Paragraph(contact));
        }
        blocks
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" · ")
}

fn date_range(start: &str, end: Option<&str>) -> String {
    match (start.trim(), end.map(str::trim)) {
        ("", _) => String::new(),
        (s, Some(e)) if !e.is_empty() => format!("{s} – {e}"),
        (s, _) => format!("{s} – Present"),
    }
}

fn bullets(items: &[String]) -> impl Iterator<Item = TextBlock> + '_ {
    items
        .iter()
        .map(|b| b.trim())
        .filter(|b| !b.is_empty())
        .map(|b| TextBlock::Bullet(b.to_string()))
}

fn with_heading(heading: &str, body: Vec<TextBlock>) -> Vec<TextBlock> {
    if body.is_empty() {
        return body;
    }
    let mut blocks = vec![TextBlock::Heading(heading.to_string())];
    blocks.extend(body);
    blocks
}

/// Heading followed by entries separated by `EntryGap`.
fn entries_section(heading: &str, entries: impl Iterator<Item = Vec<TextBlock>>) -> Vec<TextBlock> {
    let mut body = Vec::new();
    for entry in entries {
        if !body.is_empty() {
            body.push(TextBlock::EntryGap);
        }
        body.extend(entry);
    }
    with_heading(heading, body)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
