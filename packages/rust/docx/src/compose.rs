//! Construction of new paragraphs and run formatting.
//!
//! Used for section headers, spacers and summary lines, and by the style
//! pass that forces the template font onto grafted runs.

use crate::block::{Block, PPR_ORDER, RPR_ORDER, text_run};
use crate::xml::Element;

/// Twentieths of a point per point (`w:spacing` unit).
const TWIPS_PER_POINT: u32 = 20;

/// Paragraph alignment (`w:jc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    fn as_val(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "both",
        }
    }
}

/// Character formatting applied to a run. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunFormat {
    pub font: Option<String>,
    pub size_half_points: Option<u32>,
    /// `RRGGBB`.
    pub color: Option<String>,
    pub bold: Option<bool>,
}

impl RunFormat {
    /// Apply the format to a `w:r`, creating `w:rPr` as needed. Existing
    /// italic/underline/etc. flags are untouched.
    pub fn apply(&self, run: &mut Element) {
        let rpr = run.ensure_first_child("w:rPr");

        if let Some(font) = &self.font {
            let fonts = rpr.ensure_child("w:rFonts", RPR_ORDER);
            for theme_attr in ["asciiTheme", "hAnsiTheme", "cstheme"] {
                fonts.remove_attr(theme_attr);
            }
            fonts.set_attr("w:ascii", font.as_str());
            fonts.set_attr("w:hAnsi", font.as_str());
            fonts.set_attr("w:cs", font.as_str());
        }

        if let Some(bold) = self.bold {
            if bold {
                let b = rpr.ensure_child("w:b", RPR_ORDER);
                b.remove_attr("val");
            } else {
                rpr.remove_children("b");
            }
        }

        if let Some(color) = &self.color {
            let el = rpr.ensure_child("w:color", RPR_ORDER);
            for theme_attr in ["themeColor", "themeTint", "themeShade"] {
                el.remove_attr(theme_attr);
            }
            el.set_attr("w:val", color.as_str());
        }

        if let Some(size) = self.size_half_points {
            rpr.ensure_child("w:sz", RPR_ORDER)
                .set_attr("w:val", size.to_string());
            rpr.ensure_child("w:szCs", RPR_ORDER)
                .set_attr("w:val", size.to_string());
        }
    }
}

/// Builder for a new paragraph block.
#[derive(Debug, Clone, Default)]
pub struct ParagraphBuilder {
    style_id: Option<String>,
    alignment: Option<Alignment>,
    space_before_pt: Option<u32>,
    space_after_pt: Option<u32>,
    runs: Vec<Element>,
}

impl ParagraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(mut self, style_id: impl Into<String>) -> Self {
        self.style_id = Some(style_id.into());
        self
    }

    pub fn align(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn space_before(mut self, points: u32) -> Self {
        self.space_before_pt = Some(points);
        self
    }

    pub fn space_after(mut self, points: u32) -> Self {
        self.space_after_pt = Some(points);
        self
    }

    /// Add a run holding `text`, formatted with `format`.
    pub fn run(mut self, text: &str, format: &RunFormat) -> Self {
        let mut run = text_run(text);
        format.apply(&mut run);
        self.runs.push(run);
        self
    }

    pub fn build(self) -> Block {
        let mut p = Element::new("w:p");
        let mut ppr = Element::new("w:pPr");

        if let Some(style_id) = self.style_id {
            ppr.insert_ordered(Element::new("w:pStyle").with_attr("w:val", style_id), PPR_ORDER);
        }
        if self.space_before_pt.is_some() || self.space_after_pt.is_some() {
            let mut spacing = Element::new("w:spacing");
            if let Some(before) = self.space_before_pt {
                spacing.set_attr("w:before", (before * TWIPS_PER_POINT).to_string());
            }
            if let Some(after) = self.space_after_pt {
                spacing.set_attr("w:after", (after * TWIPS_PER_POINT).to_string());
            }
            ppr.insert_ordered(spacing, PPR_ORDER);
        }
        if let Some(alignment) = self.alignment {
            ppr.insert_ordered(Element::new("w:jc").with_attr("w:val", alignment.as_val()), PPR_ORDER);
        }

        if !ppr.children.is_empty() {
            p.push(ppr);
        }
        for run in self.runs {
            p.push(run);
        }
        Block::Paragraph(p)
    }
}

/// An empty paragraph (spacers, separators).
pub fn empty_paragraph() -> Block {
    Block::Paragraph(Element::new("w:p"))
}

/// A paragraph with one unformatted run.
pub fn plain_paragraph(text: &str) -> Block {
    let mut p = Element::new("w:p");
    p.push(text_run(text));
    Block::Paragraph(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(el: &Element) -> Vec<String> {
        el.elements().map(|e| e.local_name().to_string()).collect()
    }

    #[test]
    fn run_format_sets_ordered_properties() {
        let mut run = text_run("texte");
        let format = RunFormat {
            font: Some("Montserrat Medium".into()),
            size_half_points: Some(22),
            color: Some("003DA5".into()),
            bold: None,
        };
        format.apply(&mut run);

        let rpr = run.child("rPr").expect("rPr");
        assert_eq!(names(&run)[0], "rPr");
        assert_eq!(names(rpr), ["rFonts", "color", "sz", "szCs"]);
        assert_eq!(rpr.child("rFonts").and_then(|f| f.attr("ascii")), Some("Montserrat Medium"));
        assert_eq!(rpr.child("sz").and_then(|f| f.attr("val")), Some("22"));
    }

    #[test]
    fn run_format_preserves_italic_and_overrides_theme() {
        let mut run = Element::new("w:r").with_child(
            Element::new("w:rPr")
                .with_child(Element::new("w:rFonts").with_attr("w:asciiTheme", "minorHAnsi"))
                .with_child(Element::new("w:i"))
                .with_child(Element::new("w:color").with_attr("w:val", "FF0000").with_attr("w:themeColor", "accent1")),
        );
        RunFormat {
            font: Some("Arial".into()),
            color: Some("003DA5".into()),
            ..RunFormat::default()
        }
        .apply(&mut run);

        let rpr = run.child("rPr").expect("rPr");
        assert!(rpr.child("i").is_some());
        let fonts = rpr.child("rFonts").expect("fonts");
        assert_eq!(fonts.attr("asciiTheme"), None);
        assert_eq!(fonts.attr("hAnsi"), Some("Arial"));
        let color = rpr.child("color").expect("color");
        assert_eq!(color.attr("val"), Some("003DA5"));
        assert_eq!(color.attr("themeColor"), None);
    }

    #[test]
    fn builder_produces_styled_paragraph() {
        let block = ParagraphBuilder::new()
            .style("Heading1")
            .align(Alignment::Left)
            .space_before(24)
            .space_after(12)
            .run("1. OBJET", &RunFormat { bold: Some(true), ..RunFormat::default() })
            .build();

        let p = block.as_paragraph().expect("paragraph");
        assert_eq!(p.text(), "1. OBJET");
        assert_eq!(p.style_id(), Some("Heading1"));
        let ppr = p.properties().expect("pPr");
        assert_eq!(names(ppr), ["pStyle", "spacing", "jc"]);
        assert_eq!(ppr.child("spacing").and_then(|s| s.attr("before")), Some("480"));
        assert!(p.runs()[0].child("rPr").and_then(|r| r.child("b")).is_some());
    }

    #[test]
    fn empty_and_plain_paragraphs() {
        assert_eq!(empty_paragraph().text(), "");
        assert_eq!(plain_paragraph("Durée").text(), "Durée");
    }
}
