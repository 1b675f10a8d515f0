//! Core domain types for contract assembly.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// A named, ordered grouping of clauses in the assembled contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Stable key clauses refer to (e.g. `designation_des_parties`).
    pub key: String,
    /// Display name, written into the section header.
    pub name: String,
    /// Display order (ascending).
    pub order: u32,
}

impl Section {
    pub fn new(key: impl Into<String>, name: impl Into<String>, order: u32) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            order,
        }
    }
}

// ---------------------------------------------------------------------------
// Clause
// ---------------------------------------------------------------------------

/// One externally supplied source document holding a single provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// Clause name (file stem for local clauses).
    pub name: String,
    /// Key of the section this clause belongs to.
    pub section_tag: String,
    /// Order of that section, as seen by the discovery step.
    pub section_order: u32,
    /// Path of the source document.
    pub source_path: PathBuf,
}

impl Clause {
    pub fn new(
        name: impl Into<String>,
        section_tag: impl Into<String>,
        section_order: u32,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            section_tag: section_tag.into(),
            section_order,
            source_path: source_path.into(),
        }
    }
}

/// Selected clauses keyed by section key, each list in author order.
pub type ClausesBySection = HashMap<String, Vec<Clause>>;

/// Group a flat clause list by section key, preserving list order.
pub fn group_by_section(clauses: &[Clause]) -> ClausesBySection {
    let mut grouped: ClausesBySection = HashMap::new();
    for clause in clauses {
        grouped
            .entry(clause.section_tag.clone())
            .or_default()
            .push(clause.clone());
    }
    grouped
}

// ---------------------------------------------------------------------------
// MergeWarning
// ---------------------------------------------------------------------------

/// A recoverable problem recorded while assembling a contract.
///
/// Warnings never abort an assembly; they travel with the result so the
/// caller can show what was skipped or degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeWarning {
    /// The template was absent or unreadable; a blank document was used.
    #[error("template {path:?} unavailable ({reason}), using a blank document")]
    MissingTemplate { path: PathBuf, reason: String },

    /// A clause source could not be loaded and was skipped.
    #[error("clause '{clause}' skipped: {reason}")]
    ClauseLoadFailure { clause: String, reason: String },

    /// A clause names a section key that is not part of the section list.
    #[error("clause '{clause}' refers to unknown section '{section_tag}'")]
    UnknownSection { clause: String, section_tag: String },

    /// No summary could be produced or inserted.
    #[error("summary unavailable: {reason}")]
    SummaryUnavailable { reason: String },
}
