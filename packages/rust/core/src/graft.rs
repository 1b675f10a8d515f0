//! Block grafting: copies a clause's body into the target after an anchor.

use tracing::{debug, instrument};

use clausier_docx::{Anchor, Block, Document, Element, NodeKey, XmlNode};
use clausier_shared::{DanglingNumbering, Result};

use crate::numbering::RemapTable;

/// Inline markup that points into parts of the source package (media,
/// comments, notes) which are not imported. Removed from grafted copies.
const DROPPED_MARKUP: &[&str] = &[
    "drawing",
    "pict",
    "object",
    "AlternateContent",
    "commentRangeStart",
    "commentRangeEnd",
    "commentReference",
    "footnoteReference",
    "endnoteReference",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct GraftOptions {
    /// What to do with a list reference the remap table does not cover.
    pub dangling: DanglingNumbering,
}

#[derive(Debug, Clone)]
pub struct GraftOutcome {
    /// Anchor on the last grafted block (the input anchor if nothing was
    /// grafted).
    pub anchor: Anchor,
    /// Keys of the grafted blocks, in document order.
    pub inserted: Vec<NodeKey>,
    /// List references that pointed outside the remap table.
    pub dangling_references: usize,
}

/// Copy every body block of `source` into `target` right after `anchor`,
/// preserving source order.
///
/// Terminal section properties are skipped and embedded ones stripped, so
/// the target keeps its single page layout. List references are rewritten
/// through `remap`, including those of paragraphs inside block-level content
/// controls. Namespaces the source declares are declared on the target too.
/// `source` is only read.
#[instrument(skip_all, fields(source_blocks = source.len(), remapped = remap.len()))]
pub fn graft(
    target: &mut Document,
    anchor: Anchor,
    source: &Document,
    remap: &RemapTable,
    options: &GraftOptions,
) -> Result<GraftOutcome> {
    let mut anchor = anchor;
    let mut inserted = Vec::new();
    let mut dangling_references = 0;
    target.adopt_namespaces(source);

    for (_, block) in source.blocks() {
        if block.is_section_properties() {
            continue;
        }

        let mut copy = block.clone();
        scrub(copy.element_mut());
        dangling_references += rewrite_paragraphs(&mut copy, remap, options);

        anchor = target.insert_after(anchor, copy)?;
        inserted.push(anchor.key());
    }

    debug!(inserted = inserted.len(), dangling_references, "clause grafted");
    Ok(GraftOutcome {
        anchor,
        inserted,
        dangling_references,
    })
}

/// Strip section breaks and translate list references in every paragraph of
/// a copied block. Returns the number of dangling references met.
fn rewrite_paragraphs(block: &mut Block, remap: &RemapTable, options: &GraftOptions) -> usize {
    let mut dangling = 0;

    for mut paragraph in block.paragraphs_mut() {
        paragraph.remove_section_properties();

        let Some(raw) = paragraph.view().num_id().map(|raw| raw.trim().to_string()) else {
            continue;
        };
        let source_id = raw.parse::<u32>().ok();
        match source_id.map(|id| (id, remap.get(id))) {
            // numId 0 explicitly switches numbering off
            Some((0, _)) => {}
            Some((_, Some(target_id))) => paragraph.set_num_id(target_id),
            _ => {
                dangling += 1;
                match options.dangling {
                    DanglingNumbering::Strip => {
                        debug!(num_id = %raw, "dangling list reference stripped");
                        paragraph.remove_numbering();
                    }
                    DanglingNumbering::Keep => {
                        debug!(num_id = %raw, "dangling list reference kept");
                    }
                }
            }
        }
    }

    dangling
}

/// Remove markup bound to unimported source parts and unwrap hyperlinks
/// into their runs.
fn scrub(el: &mut Element) {
    let children = std::mem::take(&mut el.children);
    for node in children {
        match node {
            XmlNode::Element(mut child) => {
                if DROPPED_MARKUP.contains(&child.local_name()) {
                    continue;
                }
                scrub(&mut child);
                if child.is("hyperlink") {
                    el.children.extend(child.children);
                } else {
                    el.children.push(XmlNode::Element(child));
                }
            }
            text => el.children.push(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clausier_docx::{ParagraphMut, plain_paragraph, xml};

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn block(xml_text: &str) -> Block {
        let wrapped = format!(r#"<w:body xmlns:w="{W_NS}" xmlns:r="r">{xml_text}</w:body>"#);
        let body = xml::parse(&wrapped).expect("parse");
        let el = body.elements().next().cloned().expect("element");
        Block::from_element(el)
    }

    fn numbered(text: &str, num_id: u32) -> Block {
        let mut b = plain_paragraph(text);
        ParagraphMut::new(b.element_mut()).set_num_id(num_id);
        b
    }

    fn first_anchor(doc: &Document) -> Anchor {
        let key = doc.blocks().next().map(|(k, _)| k).expect("block");
        doc.anchor(key).expect("anchor")
    }

    #[test]
    fn grafts_in_order_after_anchor() {
        let mut target = Document::from_paragraph_texts(&["Titre", "Signature"]).expect("target");
        let source = Document::from_paragraph_texts(&["Article 1", "Article 2"]).expect("source");
        let anchor = first_anchor(&target);

        let outcome = graft(&mut target, anchor, &source, &RemapTable::default(), &GraftOptions::default())
            .expect("graft");

        assert_eq!(target.paragraph_texts(), ["Titre", "Article 1", "Article 2", "Signature"]);
        assert_eq!(outcome.inserted.len(), 2);
        assert_eq!(outcome.anchor.key(), outcome.inserted[1]);
        assert_eq!(target.section_properties_count(), 1);
    }

    #[test]
    fn section_properties_never_reach_target() {
        let mut target = Document::blank().expect("target");
        let mut source = Document::blank().expect("source");
        source.append(block(
            r#"<w:p><w:pPr><w:sectPr><w:pgSz w:w="16838" w:h="11906"/></w:sectPr></w:pPr><w:r><w:t>Paysage</w:t></w:r></w:p>"#,
        ));
        let anchor = target.append(plain_paragraph("ancre"));

        graft(&mut target, anchor, &source, &RemapTable::default(), &GraftOptions::default()).expect("graft");

        assert_eq!(target.section_properties_count(), 1);
        let has_embedded = target
            .blocks()
            .filter_map(|(_, b)| b.as_paragraph())
            .any(|p| p.has_section_properties());
        assert!(!has_embedded);
    }

    #[test]
    fn list_references_are_remapped_including_tables() {
        let mut target = Document::blank().expect("target");
        let mut source = Document::blank().expect("source");
        source.append(numbered("premier", 1));
        source.append(block(
            r#"<w:tbl><w:tr><w:tc><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="2"/></w:numPr></w:pPr><w:r><w:t>cellule</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        ));
        let mut remap = RemapTable::default();
        remap.insert(1, 7);
        remap.insert(2, 8);
        let anchor = target.append(plain_paragraph("ancre"));

        let outcome = graft(&mut target, anchor, &source, &remap, &GraftOptions::default()).expect("graft");

        let ids: Vec<String> = outcome
            .inserted
            .iter()
            .filter_map(|key| target.block(*key))
            .flat_map(|b| b.paragraphs())
            .filter_map(|p| p.num_id().map(str::to_string))
            .collect();
        assert_eq!(ids, ["7", "8"]);
        assert_eq!(outcome.dangling_references, 0);
    }

    #[test]
    fn dangling_references_follow_policy() {
        let mut source = Document::blank().expect("source");
        source.append(numbered("orphelin", 5));
        source.append(numbered("désactivé", 0));

        let mut target = Document::blank().expect("target");
        let anchor = target.append(plain_paragraph("ancre"));
        let outcome = graft(&mut target, anchor, &source, &RemapTable::default(), &GraftOptions::default())
            .expect("strip");
        let refs: Vec<_> = outcome
            .inserted
            .iter()
            .filter_map(|key| target.block(*key).and_then(Block::as_paragraph))
            .map(|p| p.num_id().map(str::to_string))
            .collect();
        assert_eq!(refs, [None, Some("0".to_string())]);
        assert_eq!(outcome.dangling_references, 1);

        let mut target = Document::blank().expect("target");
        let anchor = target.append(plain_paragraph("ancre"));
        let keep = GraftOptions {
            dangling: DanglingNumbering::Keep,
        };
        let outcome = graft(&mut target, anchor, &source, &RemapTable::default(), &keep).expect("keep");
        let first = outcome.inserted[0];
        assert_eq!(target.block(first).and_then(Block::as_paragraph).and_then(|p| p.num_id()), Some("5"));
    }

    #[test]
    fn content_control_paragraphs_are_rewritten() {
        let mut target = Document::blank().expect("target");
        let mut source = Document::blank().expect("source");
        source.append(block(
            r#"<w:sdt><w:sdtPr><w:alias w:val="Obligations"/></w:sdtPr><w:sdtContent><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>suivi</w:t></w:r></w:p><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="6"/></w:numPr><w:sectPr/></w:pPr><w:r><w:t>orphelin</w:t></w:r></w:p></w:sdtContent></w:sdt>"#,
        ));
        let mut remap = RemapTable::default();
        remap.insert(1, 3);
        let anchor = target.append(plain_paragraph("ancre"));

        let outcome = graft(&mut target, anchor, &source, &remap, &GraftOptions::default()).expect("graft");

        let grafted = target.block(outcome.inserted[0]).expect("content control");
        assert!(matches!(grafted, Block::Other(_)));
        let paragraphs = grafted.paragraphs();
        assert_eq!(paragraphs[0].num_id(), Some("3"));
        assert_eq!(paragraphs[1].num_id(), None);
        assert!(!paragraphs[1].has_section_properties());
        assert_eq!(outcome.dangling_references, 1);
    }

    #[test]
    fn foreign_markup_is_removed_and_links_unwrapped() {
        let mut target = Document::blank().expect("target");
        let mut source = Document::blank().expect("source");
        source.append(block(
            r#"<w:p><w:hyperlink r:id="rId9"><w:r><w:t>site</w:t></w:r></w:hyperlink><w:r><w:drawing/></w:r><w:commentRangeStart w:id="0"/><w:r><w:t> fin</w:t><w:commentReference w:id="0"/></w:r></w:p>"#,
        ));
        let anchor = target.append(plain_paragraph("ancre"));

        let outcome = graft(&mut target, anchor, &source, &RemapTable::default(), &GraftOptions::default())
            .expect("graft");
        let p = target.block(outcome.inserted[0]).expect("block").element();

        assert_eq!(Block::Paragraph(p.clone()).text(), "site fin");
        let mut names = Vec::new();
        p.walk(&mut |el| names.push(el.local_name().to_string()));
        for gone in ["hyperlink", "drawing", "commentRangeStart", "commentReference"] {
            assert!(!names.iter().any(|n| n == gone), "{gone} survived");
        }
    }

    #[test]
    fn source_is_not_modified() {
        let mut target = Document::blank().expect("target");
        let mut source = Document::blank().expect("source");
        source.append(numbered("liste", 1));
        let before: Vec<Block> = source.blocks().map(|(_, b)| b.clone()).collect();
        let mut remap = RemapTable::default();
        remap.insert(1, 3);
        let anchor = target.append(plain_paragraph("ancre"));

        graft(&mut target, anchor, &source, &remap, &GraftOptions::default()).expect("graft");
        let after: Vec<Block> = source.blocks().map(|(_, b)| b.clone()).collect();
        assert_eq!(after, before);
        assert_eq!(source.blocks().filter_map(|(_, b)| b.as_paragraph()).filter_map(|p| p.num_id()).collect::<Vec<_>>(), ["1"]);
    }
}
