//! Section definition file parser.
//!
//! The file lists one section per line, either as `N→Name` (explicit
//! order) or as a bare name (next sequential order):
//!
//! ```text
//! 1→Désignation des Parties
//! 2→Préambule
//! Définitions
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use clausier_shared::{ClausierError, Result, Section};

/// Separator between the order and the name of a section line.
const ORDER_SEPARATOR: char = '→';

static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("punctuation regex"));

static SEPARATOR_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("separator run regex"));

/// Sections used when no definition file exists.
pub fn default_sections() -> Vec<Section> {
    vec![
        Section::new("designation_parties", "Désignation des Parties", 1),
        Section::new("preambule", "Préambule", 2),
        Section::new("definitions", "Définitions", 3),
    ]
}

/// Key of a section name: lower-cased, punctuation removed, runs of spaces
/// and dashes turned into `_`. Letters keep their accents.
pub fn section_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned = PUNCTUATION_RE.replace_all(&lowered, "");
    SEPARATOR_RUN_RE.replace_all(cleaned.trim(), "_").into_owned()
}

/// Parse definition file content into sections sorted by order.
///
/// Lines with an unparsable order or an empty name are skipped. Bare lines
/// are numbered from 1 independently of the explicit orders.
pub fn parse_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut next_order = 1;

    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match line.split_once(ORDER_SEPARATOR) {
            Some((order, name)) => {
                let name = name.trim();
                let Ok(order) = order.trim().parse::<u32>() else {
                    debug!(line, "section line with invalid order skipped");
                    continue;
                };
                if name.is_empty() {
                    continue;
                }
                sections.push(Section::new(section_key(name), name, order));
            }
            None => {
                sections.push(Section::new(section_key(line), line, next_order));
                next_order += 1;
            }
        }
    }

    sections.sort_by_key(|section| section.order);
    sections
}

/// Load the definition file at `path`, or the default sections when it does
/// not exist.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_sections(path: &Path) -> Result<Vec<Section>> {
    if !path.exists() {
        warn!("section file not found, using default sections");
        return Ok(default_sections());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ClausierError::io(path, e))?;
    let sections = parse_sections(&content);
    debug!(count = sections.len(), "sections loaded");
    Ok(sections)
}
