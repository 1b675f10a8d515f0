//! Contract assembly engine for Clausier.
//!
//! Grafts clause documents into a template: imports their numbering
//! definitions under fresh ids, copies their body blocks after a moving
//! anchor, normalizes typed bullets, forces the template's character style,
//! sequences sections with numbered headers, and places an optional summary.

pub mod bullets;
pub mod graft;
pub mod loader;
pub mod numbering;
pub mod orchestrator;
pub mod provenance;
pub mod style;
pub mod summary;

pub use bullets::{BULLET_RULES, BulletRule, ListKind, ListStyles, PseudoListItem, classify, normalize_bullets};
pub use graft::{GraftOptions, GraftOutcome, graft};
pub use loader::{ClauseLoader, PackageLoader};
pub use numbering::{NumberingAllocator, RemapTable, import_numbering};
pub use orchestrator::{
    AssembleOptions, AssembleReport, Assembly, ProgressReporter, SilentProgress, assemble,
    contract_text, default_output_path,
};
pub use provenance::{Provenance, ProvenanceTable};
pub use style::{StyleReport, enforce_style};
pub use summary::{SummaryOutcome, SummaryPlacement, fold_diacritics, inject_summary};
