//! Summary placement.
//!
//! The summary text is laid out one paragraph per line, right after the
//! template's "Synthèse" marker when it has one, or under a new heading at
//! the top of the document otherwise.

use serde::Serialize;
use tracing::{debug, instrument};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use clausier_docx::{Alignment, Anchor, Block, Document, NodeKey, ParagraphBuilder, RunFormat, empty_paragraph};
use clausier_shared::{Result, TemplateStyle};

/// Normalized text identifying the summary marker paragraph.
const MARKER: &str = "synthese";

/// Summary lines rendered as bold headings.
const HEADINGS: &[&str] = &["POINTS CLÉS", "POINTS CLES", "CONFLITS"];

/// Title of the heading added when the summary goes at the top.
const TOP_HEADING: &str = "Synthèse";

/// Where the summary ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryPlacement {
    /// After the template's marker paragraph.
    AtMarker,
    /// At the start of the document, under an added heading.
    AtTop,
}

/// Lower-case, decompose and drop combining marks (`Synthèse` -> `synthese`).
pub fn fold_diacritics(text: &str) -> String {
    text.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Result of a summary injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    pub placement: SummaryPlacement,
    /// Keys of the inserted blocks, in document order.
    pub inserted: Vec<NodeKey>,
}

/// Insert `summary_text` into `doc`, one paragraph per line.
#[instrument(skip_all, fields(lines = summary_text.lines().count()))]
pub fn inject_summary(
    doc: &mut Document,
    summary_text: &str,
    style: &TemplateStyle,
) -> Result<SummaryOutcome> {
    let lines: Vec<Block> = summary_text
        .split('\n')
        .map(|line| summary_line(line.trim_end_matches('\r'), style))
        .collect();
    let mut inserted = Vec::with_capacity(lines.len() + 2);

    let placement = match find_marker(doc) {
        Some(marker) => {
            let mut anchor = doc.insert_after(marker, empty_paragraph())?;
            inserted.push(anchor.key());
            for block in lines {
                anchor = doc.insert_after(anchor, block)?;
                inserted.push(anchor.key());
            }
            SummaryPlacement::AtMarker
        }
        None => {
            let blocks = [top_heading(style), empty_paragraph()].into_iter().chain(lines);
            for (index, block) in blocks.enumerate() {
                inserted.push(doc.insert_at(index, block).key());
            }
            SummaryPlacement::AtTop
        }
    };

    debug!(?placement, blocks = inserted.len(), "summary inserted");
    Ok(SummaryOutcome { placement, inserted })
}

/// Anchor after which the summary goes: the first non-empty body paragraph
/// whose folded text contains the marker, or the blank placeholder line
/// right after it.
fn find_marker(doc: &Document) -> Option<Anchor> {
    let blocks: Vec<(NodeKey, &Block)> = doc.blocks().collect();
    let index = blocks.iter().position(|(_, block)| {
        block.as_paragraph().is_some_and(|p| {
            let text = p.text();
            !text.trim().is_empty() && fold_diacritics(&text).contains(MARKER)
        })
    })?;

    let placeholder = blocks.get(index + 1).filter(|(_, block)| {
        block
            .as_paragraph()
            .is_some_and(|p| p.text().trim().is_empty())
    });
    let key = placeholder.map_or(blocks[index].0, |(key, _)| *key);
    doc.anchor(key)
}

fn summary_line(line: &str, style: &TemplateStyle) -> Block {
    let is_heading = HEADINGS.contains(&line.trim().to_uppercase().as_str());
    let format = RunFormat {
        font: Some(if is_heading { style.heading_font.clone() } else { style.body_font.clone() }),
        size_half_points: Some(style.size_half_points),
        color: Some(style.color.clone()),
        bold: is_heading.then_some(true),
    };

    let mut builder = ParagraphBuilder::new().align(Alignment::Justify).space_after(3);
    if is_heading {
        builder = builder.space_before(6);
    }
    builder.run(line, &format).build()
}

fn top_heading(style: &TemplateStyle) -> Block {
    let format = RunFormat {
        font: Some(style.heading_font.clone()),
        size_half_points: Some(style.size_half_points),
        color: Some(style.color.clone()),
        bold: Some(true),
    };
    ParagraphBuilder::new()
        .align(Alignment::Left)
        .space_after(6)
        .run(TOP_HEADING, &format)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clausier_docx::Paragraph;

    fn is_bold(p: &Paragraph<'_>) -> bool {
        p.runs()
            .first()
            .and_then(|r| r.child("rPr"))
            .and_then(|rpr| rpr.child("b"))
            .is_some()
    }

    #[test]
    fn folding_removes_accents_and_case() {
        assert_eq!(fold_diacritics("SYNTHÈSE :"), "synthese :");
        assert_eq!(fold_diacritics("Synthèse du contrat"), "synthese du contrat");
    }

    #[test]
    fn summary_goes_after_marker_and_placeholder() {
        let mut doc =
            Document::from_paragraph_texts(&["Contrat", "Synthèse", "", "Article 1"]).expect("doc");

        let SummaryOutcome { placement, inserted } =
            inject_summary(&mut doc, "POINTS CLÉS\n• Durée 3 ans", &TemplateStyle::default())
                .expect("inject");

        assert_eq!(placement, SummaryPlacement::AtMarker);
        assert_eq!(inserted.len(), 3);
        assert_eq!(
            doc.paragraph_texts(),
            ["Contrat", "Synthèse", "", "", "POINTS CLÉS", "• Durée 3 ans", "Article 1"]
        );

        let heading = doc.block(inserted[1]).and_then(Block::as_paragraph).expect("heading");
        assert!(is_bold(&heading));
        let item = doc.block(inserted[2]).and_then(Block::as_paragraph).expect("item");
        assert!(!is_bold(&item));
    }

    #[test]
    fn marker_without_placeholder() {
        let mut doc = Document::from_paragraph_texts(&["SYNTHESE", "Article 1"]).expect("doc");
        inject_summary(&mut doc, "CONFLITS", &TemplateStyle::default()).expect("inject");
        assert_eq!(doc.paragraph_texts(), ["SYNTHESE", "", "CONFLITS", "Article 1"]);
    }

    #[test]
    fn missing_marker_puts_summary_on_top() {
        let mut doc = Document::from_paragraph_texts(&["Contrat de prestation"]).expect("doc");

        let SummaryOutcome { placement, inserted } =
            inject_summary(&mut doc, "POINTS CLES\n• Prix fixe", &TemplateStyle::default())
                .expect("inject");

        assert_eq!(placement, SummaryPlacement::AtTop);
        assert_eq!(inserted.len(), 4);
        assert_eq!(
            doc.paragraph_texts(),
            ["Synthèse", "", "POINTS CLES", "• Prix fixe", "Contrat de prestation"]
        );
        let title = doc.block(inserted[0]).and_then(Block::as_paragraph).expect("title");
        assert!(is_bold(&title));
    }

    #[test]
    fn summary_lines_use_template_style() {
        let block = summary_line("• Durée 3 ans", &TemplateStyle::default());
        let p = block.as_paragraph().expect("paragraph");
        let rpr = p.runs()[0].child("rPr").expect("rPr");
        assert_eq!(rpr.child("rFonts").and_then(|f| f.attr("ascii")), Some("Montserrat Medium"));
        assert_eq!(
            p.properties().and_then(|pp| pp.child("jc")).and_then(|jc| jc.attr("val")),
            Some("both")
        );
    }
}
