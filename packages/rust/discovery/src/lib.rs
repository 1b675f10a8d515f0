//! Clause discovery.
//!
//! Before assembling, Clausier needs to know which sections a contract has
//! and which clause documents are available for each. Sections come from a
//! plain-text definition file (`parties.ini`); clauses come from a local
//! directory tree with one folder per section.

pub mod local;
pub mod sections;

pub use local::{Discovery, SkippedFile, UNORDERED, discover_clauses};
pub use sections::{default_sections, load_sections, parse_sections, section_key};
