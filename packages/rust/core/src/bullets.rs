//! Bullet normalization.
//!
//! Clause authors often fake list items with a typed glyph, a dingbat font
//! or a leftover `1/3 ` counter instead of real list numbering. Such
//! paragraphs are rewritten into the template's list styles.

use std::sync::LazyLock;

use regex::Regex;

use clausier_docx::block::{run_font, run_text};
use clausier_docx::{Document, Paragraph, ParagraphMut};
use clausier_shared::TemplateStyle;

/// Fonts whose glyphs are used as bullets.
pub const SYMBOL_FONTS: &[&str] = &["Symbol", "Wingdings", "Wingdings 2", "Wingdings 3", "Webdings"];

/// Code points symbol fonts map their glyphs to (Word stores a Symbol bullet
/// as U+F0B7).
const SYMBOL_GLYPHS: std::ops::RangeInclusive<char> = '\u{F000}'..='\u{F0FF}';

/// Characters typed at the start of a line to mimic a bullet.
pub const BULLET_GLYPHS: &[char] = &[
    '•', '◦', '·', '▪', '–', '-', '—', '‣', '∙', '○', '■', '□', '✓', '✔',
];

static RATIO_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+/\d+\s+").expect("ratio prefix regex"));

static ORDERED_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[.)]\s+").expect("ordered prefix regex"));

/// One way of recognizing a pseudo list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulletRule {
    /// The first run is set in one of these fonts.
    SymbolFont(&'static [&'static str]),
    /// The trimmed text starts with one of these characters.
    Glyph(&'static [char]),
    /// The text starts with an `n/m ` counter.
    RatioArtifact,
}

/// Rules in evaluation order; the first match wins.
pub const BULLET_RULES: &[BulletRule] = &[
    BulletRule::SymbolFont(SYMBOL_FONTS),
    BulletRule::Glyph(BULLET_GLYPHS),
    BulletRule::RatioArtifact,
];

impl BulletRule {
    pub fn matches(&self, paragraph: &Paragraph<'_>, text: &str) -> bool {
        match self {
            Self::SymbolFont(fonts) => paragraph
                .first_run_font()
                .is_some_and(|font| fonts.contains(&font)),
            Self::Glyph(glyphs) => text.trim().starts_with(*glyphs),
            Self::RatioArtifact => RATIO_PREFIX_RE.is_match(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Number,
}

/// A paragraph recognized as a hand-made list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoListItem {
    pub rule: BulletRule,
    pub kind: ListKind,
    /// Text with the marker removed.
    pub cleaned: String,
}

/// Style ids of the target's list styles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListStyles {
    pub bullet: String,
    pub number: String,
}

impl ListStyles {
    /// Resolve the configured style names against `doc`'s styles part.
    pub fn resolve(doc: &Document, style: &TemplateStyle) -> Self {
        Self {
            bullet: doc.style_id_for_name(&style.bullet_style),
            number: doc.style_id_for_name(&style.number_style),
        }
    }

    fn style_for(&self, kind: ListKind) -> &str {
        match kind {
            ListKind::Bullet => &self.bullet,
            ListKind::Number => &self.number,
        }
    }
}

/// Recognize a pseudo list item. Paragraphs with real numbering, or with
/// nothing left once the marker is removed, are not list items.
pub fn classify(paragraph: &Paragraph<'_>) -> Option<PseudoListItem> {
    if paragraph.has_numbering() {
        return None;
    }

    let text = paragraph.text();
    let rule = BULLET_RULES
        .iter()
        .find(|rule| rule.matches(paragraph, &text))
        .copied()?;

    let stripped = text.trim();
    let (kind, cleaned) = match (ORDERED_PREFIX_RE.find(stripped), rule) {
        (Some(prefix), _) => (ListKind::Number, stripped[prefix.end()..].trim().to_string()),
        (None, BulletRule::SymbolFont(fonts)) => {
            // glyph and text can share one symbol-font run
            let rest = strip_marker(&text_after_symbol_runs(paragraph, fonts));
            let cleaned = if rest.is_empty() { strip_marker(stripped) } else { rest };
            (ListKind::Bullet, cleaned)
        }
        (None, _) => (ListKind::Bullet, strip_marker(stripped)),
    };

    if cleaned.is_empty() {
        return None;
    }
    Some(PseudoListItem { rule, kind, cleaned })
}

/// Text of the paragraph once its leading symbol-font runs are dropped.
/// Those runs hold the bullet glyph itself.
fn text_after_symbol_runs(paragraph: &Paragraph<'_>, fonts: &[&str]) -> String {
    let mut out = String::new();
    let mut leading = true;
    for run in paragraph.runs() {
        if leading && run_font(run).is_some_and(|font| fonts.contains(&font)) {
            continue;
        }
        leading = false;
        run_text(run, &mut out);
    }
    out
}

/// Drop a leading `n/m ` counter, then any run of bullet glyphs (typed or
/// symbol-font) and the whitespace after them.
fn strip_marker(text: &str) -> String {
    let text = RATIO_PREFIX_RE.replace(text.trim(), "");
    text.trim_start_matches(|c: char| {
        BULLET_GLYPHS.contains(&c) || SYMBOL_GLYPHS.contains(&c) || c.is_whitespace()
    })
    .trim_end()
    .to_string()
}

/// Rewrite a pseudo list item into a single clean run with the matching
/// list style. Returns the kind applied, or `None` if the paragraph was left
/// alone.
pub fn normalize_bullets(paragraph: &mut ParagraphMut<'_>, styles: &ListStyles) -> Option<ListKind> {
    let item = classify(&paragraph.view())?;
    paragraph.replace_runs_with_text(&item.cleaned);
    paragraph.set_style_id(styles.style_for(item.kind));
    Some(item.kind)
}
