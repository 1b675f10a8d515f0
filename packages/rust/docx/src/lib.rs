//! Word-processing package model for Clausier.
//!
//! Reads and writes `.docx` packages and exposes the pieces the assembly
//! engine edits:
//! - [`Package`]: the zip container and its relationships
//! - [`xml`]: an owned XML tree that round-trips untouched content
//! - [`Document`]: body blocks with stable [`NodeKey`]s and [`Anchor`]s
//! - [`NumberingTable`]: abstract definitions and numbering instances
//! - [`compose`]: builders for new paragraphs and run formatting

mod blank;
pub mod block;
pub mod compose;
pub mod document;
pub mod numbering;
pub mod package;
pub mod xml;

pub use block::{Block, Paragraph, ParagraphMut};
pub use compose::{Alignment, ParagraphBuilder, RunFormat, empty_paragraph, plain_paragraph};
pub use document::{Anchor, Document, NodeKey};
pub use numbering::{AbstractId, NumId, NumberingTable};
pub use package::{Package, is_compound_signature, is_zip_signature};
pub use xml::{Element, XmlNode};
