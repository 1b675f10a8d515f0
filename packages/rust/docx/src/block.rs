//! Block-level content of a document body.
//!
//! A [`Block`] owns its XML subtree. Paragraph-level reads and edits go
//! through the [`Paragraph`] / [`ParagraphMut`] views, which also reach the
//! paragraphs nested in table cells.

use crate::xml::{Element, XmlNode};

/// Schema order of `w:pPr` children.
pub const PPR_ORDER: &[&str] = &[
    "pStyle",
    "keepNext",
    "keepLines",
    "pageBreakBefore",
    "framePr",
    "widowControl",
    "numPr",
    "suppressLineNumbers",
    "pBdr",
    "shd",
    "tabs",
    "suppressAutoHyphens",
    "kinsoku",
    "wordWrap",
    "overflowPunct",
    "topLinePunct",
    "autoSpaceDE",
    "autoSpaceDN",
    "bidi",
    "adjustRightInd",
    "snapToGrid",
    "spacing",
    "ind",
    "contextualSpacing",
    "mirrorIndents",
    "suppressOverlap",
    "jc",
    "textDirection",
    "textAlignment",
    "textboxTightWrap",
    "outlineLvl",
    "divId",
    "cnfStyle",
    "rPr",
    "sectPr",
    "pPrChange",
];

/// Schema order of `w:rPr` children.
pub const RPR_ORDER: &[&str] = &[
    "rStyle",
    "rFonts",
    "b",
    "bCs",
    "i",
    "iCs",
    "caps",
    "smallCaps",
    "strike",
    "dstrike",
    "outline",
    "shadow",
    "emboss",
    "imprint",
    "noProof",
    "snapToGrid",
    "vanish",
    "webHidden",
    "color",
    "spacing",
    "w",
    "kern",
    "position",
    "sz",
    "szCs",
    "highlight",
    "u",
    "effect",
    "bdr",
    "shd",
    "fitText",
    "vertAlign",
    "rtl",
    "cs",
    "em",
    "lang",
    "eastAsianLayout",
    "specVanish",
    "oMath",
    "rPrChange",
];

/// Order of `w:numPr` children.
const NUMPR_ORDER: &[&str] = &["ilvl", "numId"];

/// Paragraph-level containers whose runs belong to the paragraph text.
const RUN_CONTAINERS: &[&str] = &["hyperlink", "smartTag", "ins", "fldSimple", "customXml", "sdtContent", "sdt"];

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A top-level element of the document body.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Element),
    Table(Element),
    /// Terminal section properties (`w:sectPr` as a direct body child).
    SectionProperties(Element),
    /// Anything else (`w:sdt`, bookmarks, custom XML...).
    Other(Element),
}

impl Block {
    /// Classify a body child element.
    pub fn from_element(el: Element) -> Self {
        match el.local_name() {
            "p" => Self::Paragraph(el),
            "tbl" => Self::Table(el),
            "sectPr" => Self::SectionProperties(el),
            _ => Self::Other(el),
        }
    }

    pub fn element(&self) -> &Element {
        match self {
            Self::Paragraph(el) | Self::Table(el) | Self::SectionProperties(el) | Self::Other(el) => el,
        }
    }

    pub fn element_mut(&mut self) -> &mut Element {
        match self {
            Self::Paragraph(el) | Self::Table(el) | Self::SectionProperties(el) | Self::Other(el) => el,
        }
    }

    pub fn into_element(self) -> Element {
        match self {
            Self::Paragraph(el) | Self::Table(el) | Self::SectionProperties(el) | Self::Other(el) => el,
        }
    }

    pub fn is_section_properties(&self) -> bool {
        matches!(self, Self::SectionProperties(_))
    }

    /// The paragraph view when this block is a paragraph.
    pub fn as_paragraph(&self) -> Option<Paragraph<'_>> {
        match self {
            Self::Paragraph(el) => Some(Paragraph::new(el)),
            _ => None,
        }
    }

    /// Paragraphs of this block: itself, or every paragraph nested in a
    /// table or a block-level container such as `w:sdt` and `w:customXml`.
    pub fn paragraphs(&self) -> Vec<Paragraph<'_>> {
        match self {
            Self::Paragraph(el) => vec![Paragraph::new(el)],
            Self::Table(el) | Self::Other(el) => {
                let mut found = Vec::new();
                el.descendants_named("p", &mut found);
                found.into_iter().map(Paragraph::new).collect()
            }
            Self::SectionProperties(_) => Vec::new(),
        }
    }

    pub fn paragraphs_mut(&mut self) -> Vec<ParagraphMut<'_>> {
        match self {
            Self::Paragraph(el) => vec![ParagraphMut::new(el)],
            Self::Table(el) | Self::Other(el) => {
                let mut found = Vec::new();
                el.descendants_named_mut("p", &mut found);
                found.into_iter().map(ParagraphMut::new).collect()
            }
            Self::SectionProperties(_) => Vec::new(),
        }
    }

    /// Plain text of the block (nested paragraphs joined by newlines).
    pub fn text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Paragraph views
// ---------------------------------------------------------------------------

/// Read-only view over a `w:p` element.
#[derive(Debug, Clone, Copy)]
pub struct Paragraph<'a> {
    el: &'a Element,
}

impl<'a> Paragraph<'a> {
    pub fn new(el: &'a Element) -> Self {
        Self { el }
    }

    pub fn element(&self) -> &'a Element {
        self.el
    }

    /// The properties subtree (`w:pPr`).
    pub fn properties(&self) -> Option<&'a Element> {
        self.el.child("pPr")
    }

    /// Paragraph style id (`w:pStyle`).
    pub fn style_id(&self) -> Option<&'a str> {
        self.properties()?.child("pStyle")?.attr("val")
    }

    /// Raw NumId of the paragraph's numbering reference.
    pub fn num_id(&self) -> Option<&'a str> {
        self.properties()?.child("numPr")?.child("numId")?.attr("val")
    }

    pub fn has_numbering(&self) -> bool {
        self.properties().and_then(|p| p.child("numPr")).is_some()
    }

    pub fn has_section_properties(&self) -> bool {
        self.properties().and_then(|p| p.child("sectPr")).is_some()
    }

    /// Text runs in document order, including runs wrapped in hyperlinks,
    /// insertions and similar inline containers.
    pub fn runs(&self) -> Vec<&'a Element> {
        let mut runs = Vec::new();
        collect_runs(self.el, &mut runs);
        runs
    }

    /// Font name of the first run, or of the symbol it carries.
    pub fn first_run_font(&self) -> Option<&'a str> {
        self.runs().into_iter().next().and_then(run_font)
    }

    /// Visible text: `w:t` content, tabs as `\t`, breaks as `\n`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for run in self.runs() {
            run_text(run, &mut out);
        }
        out
    }
}

fn collect_runs<'a>(el: &'a Element, out: &mut Vec<&'a Element>) {
    for child in el.elements() {
        if child.is("r") {
            out.push(child);
        } else if RUN_CONTAINERS.contains(&child.local_name()) {
            collect_runs(child, out);
        }
    }
}

fn collect_runs_mut<'a>(el: &'a mut Element, out: &mut Vec<&'a mut Element>) {
    for child in el.elements_mut() {
        if child.is("r") {
            out.push(child);
        } else if RUN_CONTAINERS.contains(&child.local_name()) {
            collect_runs_mut(child, out);
        }
    }
}

/// Font of a run: the font of the symbol it carries, else its ASCII font.
pub fn run_font(run: &Element) -> Option<&str> {
    if let Some(font) = run.child("sym").and_then(|sym| sym.attr("font")) {
        return Some(font);
    }
    let fonts = run.child("rPr")?.child("rFonts")?;
    fonts.attr("ascii").or_else(|| fonts.attr("hAnsi"))
}

/// Append the visible text of a run to `out`.
pub fn run_text(run: &Element, out: &mut String) {
    for child in run.elements() {
        match child.local_name() {
            "t" => out.push_str(&child.text()),
            "tab" => out.push('\t'),
            "br" | "cr" => out.push('\n'),
            "noBreakHyphen" => out.push('-'),
            _ => {}
        }
    }
}

/// Mutable view over a `w:p` element.
#[derive(Debug)]
pub struct ParagraphMut<'a> {
    el: &'a mut Element,
}

impl<'a> ParagraphMut<'a> {
    pub fn new(el: &'a mut Element) -> Self {
        Self { el }
    }

    pub fn view(&self) -> Paragraph<'_> {
        Paragraph::new(self.el)
    }

    pub fn element_mut(&mut self) -> &mut Element {
        self.el
    }

    /// The properties subtree, created as the first child when missing.
    pub fn properties_mut(&mut self) -> &mut Element {
        self.el.ensure_first_child("w:pPr")
    }

    /// Remove an embedded section break; returns whether one was present.
    pub fn remove_section_properties(&mut self) -> bool {
        match self.el.child_mut("pPr") {
            Some(ppr) => ppr.remove_children("sectPr") > 0,
            None => false,
        }
    }

    /// Point the numbering reference at another NumId.
    pub fn set_num_id(&mut self, num_id: u32) {
        let num_pr = self.properties_mut().ensure_child("w:numPr", PPR_ORDER);
        if num_pr.child("ilvl").is_none() {
            num_pr.insert_ordered(Element::new("w:ilvl").with_attr("w:val", "0"), NUMPR_ORDER);
        }
        num_pr
            .ensure_child("w:numId", NUMPR_ORDER)
            .set_attr("w:val", num_id.to_string());
    }

    /// Drop the numbering reference entirely.
    pub fn remove_numbering(&mut self) -> bool {
        match self.el.child_mut("pPr") {
            Some(ppr) => ppr.remove_children("numPr") > 0,
            None => false,
        }
    }

    pub fn set_style_id(&mut self, style_id: &str) {
        self.properties_mut()
            .ensure_child("w:pStyle", PPR_ORDER)
            .set_attr("w:val", style_id);
    }

    pub fn runs_mut(&mut self) -> Vec<&mut Element> {
        let mut runs = Vec::new();
        collect_runs_mut(self.el, &mut runs);
        runs
    }

    /// Remove every run (and inline run container), then add one plain run
    /// holding `text`. Paragraph properties are kept.
    pub fn replace_runs_with_text(&mut self, text: &str) {
        self.el.retain_elements(|child| {
            !(child.is("r") || RUN_CONTAINERS.contains(&child.local_name()))
        });
        self.el.push(text_run(text));
    }
}

/// A bare `w:r` holding `text` (whitespace preserved).
pub fn text_run(text: &str) -> Element {
    let mut t = Element::new("w:t");
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        t.set_attr("xml:space", "preserve");
    }
    t.children.push(XmlNode::Text(text.to_string()));
    Element::new("w:r").with_child(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    fn para(xml_text: &str) -> Element {
        let wrapped = format!(
            r#"<w:body xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{xml_text}</w:body>"#
        );
        let body = xml::parse(&wrapped).expect("parse");
        body.elements().next().cloned().expect("one element")
    }

    #[test]
    fn classifies_body_children() {
        assert!(matches!(Block::from_element(Element::new("w:p")), Block::Paragraph(_)));
        assert!(matches!(Block::from_element(Element::new("w:tbl")), Block::Table(_)));
        assert!(Block::from_element(Element::new("w:sectPr")).is_section_properties());
        assert!(matches!(Block::from_element(Element::new("w:sdt")), Block::Other(_)));
    }

    #[test]
    fn paragraph_text_spans_containers() {
        let el = para(
            r#"<w:p><w:r><w:t>Article</w:t><w:tab/></w:r><w:hyperlink r:id="rId4"><w:r><w:t>lien</w:t></w:r></w:hyperlink><w:r><w:br/><w:t xml:space="preserve"> fin</w:t></w:r></w:p>"#,
        );
        let view = Paragraph::new(&el);
        assert_eq!(view.text(), "Article\tlien\n fin");
        assert_eq!(view.runs().len(), 3);
    }

    #[test]
    fn numbering_reference_edits() {
        let mut el = para(
            r#"<w:p><w:pPr><w:pStyle w:val="Normal"/><w:numPr><w:ilvl w:val="1"/><w:numId w:val="4"/></w:numPr><w:jc w:val="both"/></w:pPr></w:p>"#,
        );
        assert_eq!(Paragraph::new(&el).num_id(), Some("4"));

        let mut view = ParagraphMut::new(&mut el);
        view.set_num_id(12);
        assert_eq!(view.view().num_id(), Some("12"));
        let ilvl = view.view().properties().and_then(|p| p.child("numPr")).and_then(|n| n.child("ilvl")).and_then(|i| i.attr("val"));
        assert_eq!(ilvl, Some("1"));

        assert!(view.remove_numbering());
        assert!(!view.view().has_numbering());
    }

    #[test]
    fn set_num_id_creates_reference_in_schema_position() {
        let mut el = para(r#"<w:p><w:pPr><w:pStyle w:val="Corps"/><w:jc w:val="both"/></w:pPr></w:p>"#);
        ParagraphMut::new(&mut el).set_num_id(3);
        let names: Vec<_> = el
            .child("pPr")
            .expect("pPr")
            .elements()
            .map(|e| e.local_name().to_string())
            .collect();
        assert_eq!(names, ["pStyle", "numPr", "jc"]);
    }

    #[test]
    fn style_goes_first_in_properties() {
        let mut el = para(r#"<w:p><w:pPr><w:jc w:val="both"/></w:pPr><w:r><w:t>x</w:t></w:r></w:p>"#);
        ParagraphMut::new(&mut el).set_style_id("ListBullet");
        let ppr = el.child("pPr").expect("pPr");
        assert_eq!(ppr.elements().next().map(|e| e.local_name()), Some("pStyle"));
        assert_eq!(Paragraph::new(&el).style_id(), Some("ListBullet"));
    }

    #[test]
    fn first_run_font_prefers_symbol() {
        let el = para(r#"<w:p><w:r><w:rPr><w:rFonts w:ascii="Arial"/></w:rPr><w:sym w:font="Wingdings" w:char="F0A7"/></w:r></w:p>"#);
        assert_eq!(Paragraph::new(&el).first_run_font(), Some("Wingdings"));

        let el = para(r#"<w:p><w:r><w:rPr><w:rFonts w:ascii="Symbol" w:hAnsi="Symbol"/></w:rPr><w:t>·</w:t></w:r></w:p>"#);
        assert_eq!(Paragraph::new(&el).first_run_font(), Some("Symbol"));
    }

    #[test]
    fn replace_runs_keeps_properties() {
        let mut el = para(
            r#"<w:p><w:pPr><w:jc w:val="both"/></w:pPr><w:r><w:t>• </w:t></w:r><w:hyperlink><w:r><w:t>Point</w:t></w:r></w:hyperlink></w:p>"#,
        );
        ParagraphMut::new(&mut el).replace_runs_with_text("Point");
        assert_eq!(Paragraph::new(&el).text(), "Point");
        assert!(el.child("pPr").is_some());
        assert!(el.child("hyperlink").is_none());
    }

    #[test]
    fn table_paragraphs_are_reachable() {
        let el = para(
            r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>A</w:t></w:r></w:p></w:tc><w:tc><w:tbl><w:tr><w:tc><w:p><w:r><w:t>B</w:t></w:r></w:p></w:tc></w:tr></w:tbl></w:tc></w:tr></w:tbl>"#,
        );
        let mut block = Block::from_element(el);
        assert_eq!(block.text(), "A\nB");
        assert_eq!(block.paragraphs_mut().len(), 2);
    }

    #[test]
    fn content_control_paragraphs_are_reachable() {
        let el = para(
            r#"<w:sdt><w:sdtPr><w:docPartObj><w:docPartGallery w:val="Table of Contents"/></w:docPartObj></w:sdtPr><w:sdtContent><w:p><w:r><w:t>Sommaire</w:t></w:r></w:p><w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>Objet</w:t></w:r></w:p></w:sdtContent></w:sdt>"#,
        );
        let mut block = Block::from_element(el);
        assert!(matches!(block, Block::Other(_)));
        assert_eq!(block.text(), "Sommaire\nObjet");

        let mut paragraphs = block.paragraphs_mut();
        assert_eq!(paragraphs.len(), 2);
        paragraphs[1].set_num_id(9);
        assert_eq!(block.paragraphs()[1].num_id(), Some("9"));
    }

    #[test]
    fn bookmark_blocks_have_no_paragraphs() {
        let block = Block::from_element(Element::new("w:bookmarkStart").with_attr("w:id", "0"));
        assert!(block.paragraphs().is_empty());
        assert_eq!(block.text(), "");
    }
}
