//! Style enforcement on freshly grafted blocks.
//!
//! Every run gets the template's body font, size and color; bold and italic
//! stay as authored. Page-relative fields (page number, page count, page
//! references, tables of contents) are emptied, since their values belong to
//! the clause's original layout.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use clausier_docx::{Document, Element, NodeKey, RunFormat};
use clausier_shared::TemplateStyle;

static PAGE_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(PAGE|NUMPAGES|SECTIONPAGES|PAGEREF|TOC)\b").expect("page field regex")
});

/// Whether a field instruction depends on page layout.
pub fn is_page_field(instruction: &str) -> bool {
    PAGE_FIELD_RE.is_match(instruction)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleReport {
    pub runs_formatted: usize,
    pub fields_neutralized: usize,
}

/// Apply the template character style to the blocks in `keys` and empty
/// their page-relative fields. Blocks outside `keys` are never touched.
#[instrument(skip_all, fields(blocks = keys.len()))]
pub fn enforce_style(doc: &mut Document, keys: &[NodeKey], style: &TemplateStyle) -> StyleReport {
    let decisions = plan_fields(doc, keys);
    let format = RunFormat {
        font: Some(style.body_font.clone()),
        size_half_points: Some(style.size_half_points),
        color: Some(style.color.clone()),
        bold: None,
    };

    let mut report = StyleReport {
        fields_neutralized: decisions.iter().filter(|blank| **blank).count(),
        ..StyleReport::default()
    };
    let mut scrubber = FieldScrubber::new(&decisions);

    for key in keys {
        let Some(block) = doc.block_mut(*key) else {
            continue;
        };
        for mut paragraph in block.paragraphs_mut() {
            report.fields_neutralized += remove_simple_page_fields(paragraph.element_mut());
            for run in paragraph.runs_mut() {
                scrubber.apply(run);
                format.apply(run);
                report.runs_formatted += 1;
            }
        }
    }

    debug!(
        runs = report.runs_formatted,
        fields = report.fields_neutralized,
        "template style enforced"
    );
    report
}

// ---------------------------------------------------------------------------
// Complex fields
// ---------------------------------------------------------------------------

/// One open complex field while walking runs.
#[derive(Debug, Clone, Copy)]
struct OpenField {
    /// Index into the per-field decision list.
    index: usize,
    /// Past `fldChar separate`: text now belongs to the cached result.
    in_result: bool,
}

/// First pass: read the full instruction of every complex field (in the
/// order fields begin) and decide whether it must be emptied. Fields can
/// span runs and paragraphs, so the decision needs the whole instruction.
fn plan_fields(doc: &Document, keys: &[NodeKey]) -> Vec<bool> {
    let mut instructions: Vec<String> = Vec::new();
    let mut stack: Vec<OpenField> = Vec::new();

    for block in keys.iter().filter_map(|key| doc.block(*key)) {
        for paragraph in block.paragraphs() {
            for run in paragraph.runs() {
                for child in run.elements() {
                    match child.local_name() {
                        "fldChar" => match child.attr("fldCharType") {
                            Some("begin") => {
                                stack.push(OpenField {
                                    index: instructions.len(),
                                    in_result: false,
                                });
                                instructions.push(String::new());
                            }
                            Some("separate") => {
                                if let Some(top) = stack.last_mut() {
                                    top.in_result = true;
                                }
                            }
                            Some("end") => {
                                stack.pop();
                            }
                            _ => {}
                        },
                        "instrText" => {
                            if let Some(top) = stack.last() {
                                if !top.in_result {
                                    instructions[top.index].push_str(&child.text());
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    instructions.iter().map(|instr| is_page_field(instr)).collect()
}

/// Second pass: walks runs in the same order as [`plan_fields`] and empties
/// instruction and result text of the fields marked for removal (and of
/// anything nested inside them).
struct FieldScrubber<'a> {
    decisions: &'a [bool],
    next_index: usize,
    stack: Vec<OpenField>,
}

impl<'a> FieldScrubber<'a> {
    fn new(decisions: &'a [bool]) -> Self {
        Self {
            decisions,
            next_index: 0,
            stack: Vec::new(),
        }
    }

    fn blanking(&self) -> bool {
        self.stack
            .iter()
            .any(|field| self.decisions.get(field.index).copied().unwrap_or(false))
    }

    fn apply(&mut self, run: &mut Element) {
        for child in run.elements_mut() {
            match child.local_name() {
                "fldChar" => match child.attr("fldCharType") {
                    Some("begin") => {
                        self.stack.push(OpenField {
                            index: self.next_index,
                            in_result: false,
                        });
                        self.next_index += 1;
                    }
                    Some("separate") => {
                        if let Some(top) = self.stack.last_mut() {
                            top.in_result = true;
                        }
                    }
                    Some("end") => {
                        self.stack.pop();
                    }
                    _ => {}
                },
                "instrText" | "t" if self.blanking() => child.set_text(""),
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Simple fields
// ---------------------------------------------------------------------------

/// Remove `w:fldSimple` elements with a page-relative instruction, at any
/// depth under the paragraph. Returns how many were removed.
fn remove_simple_page_fields(el: &mut Element) -> usize {
    let before = el.children.len();
    el.retain_elements(|child| {
        !(child.is("fldSimple") && child.attr("instr").is_some_and(is_page_field))
    });
    let mut removed = before - el.children.len();
    for child in el.elements_mut() {
        if !child.is("r") {
            removed += remove_simple_page_fields(child);
        }
    }
    removed
}
