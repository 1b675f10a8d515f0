//! Zip container of a word-processing package.
//!
//! Parts are kept as raw bytes in archive order; only the parts the engine
//! edits are parsed. Everything else is carried through unchanged on save.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use clausier_shared::{ClausierError, Result};

use crate::xml;

/// Relationship type suffixes (the part after the last `/`).
pub const REL_OFFICE_DOCUMENT: &str = "officeDocument";
pub const REL_NUMBERING: &str = "numbering";
pub const REL_STYLES: &str = "styles";

/// Signature of a zip archive.
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Signature of an OLE compound file (legacy binary documents).
const COMPOUND_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Whether `bytes` start like a zip container.
pub fn is_zip_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_SIGNATURE)
}

/// Whether `bytes` start like a legacy compound document.
pub fn is_compound_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(COMPOUND_SIGNATURE)
}

/// One named part of the package.
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
}

/// A relationship declared in a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

/// In-memory word-processing package.
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: Vec<Part>,
}

impl Package {
    /// Read a package from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ClausierError::io(path, e))?;
        Self::from_bytes(&bytes)
    }

    /// Read a package from an in-memory zip archive.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if !is_zip_signature(bytes) {
            return Err(ClausierError::Package("not a zip container".into()));
        }

        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ClausierError::Package(format!("cannot open archive: {e}")))?;

        let mut parts = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| ClausierError::Package(format!("cannot read entry {index}: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| ClausierError::Package(format!("cannot read '{name}': {e}")))?;
            parts.push(Part { name, data });
        }

        debug!(parts = parts.len(), "package read");
        Ok(Self { parts })
    }

    /// Build a package from `(name, bytes)` pairs, in archive order.
    pub fn from_parts<I, N>(parts: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: Into<String>,
    {
        Self {
            parts: parts
                .into_iter()
                .map(|(name, data)| Part {
                    name: name.into(),
                    data,
                })
                .collect(),
        }
    }

    /// Names of all parts, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    /// A part decoded as UTF-8 text.
    pub fn part_str(&self, name: &str) -> Result<Option<&str>> {
        match self.part(name) {
            None => Ok(None),
            Some(bytes) => std::str::from_utf8(bytes)
                .map(Some)
                .map_err(|e| ClausierError::xml(format!("part '{name}' is not UTF-8: {e}"))),
        }
    }

    /// Replace a part, or add it at the end of the archive.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(Part {
                name: name.to_string(),
                data,
            }),
        }
    }

    /// Relationships declared for `source_part` (`""` for the package root).
    pub fn relationships(&self, source_part: &str) -> Result<Vec<Relationship>> {
        let rels_name = rels_part_name(source_part);
        let Some(xml_text) = self.part_str(&rels_name)? else {
            return Ok(Vec::new());
        };
        let root = xml::parse(xml_text)?;
        Ok(root
            .elements()
            .filter(|el| el.is("Relationship"))
            .map(|el| Relationship {
                id: el.attr("Id").unwrap_or_default().to_string(),
                rel_type: el.attr("Type").unwrap_or_default().to_string(),
                target: el.attr("Target").unwrap_or_default().to_string(),
                external: el.attr("TargetMode") == Some("External"),
            })
            .collect())
    }

    /// Resolve the part targeted by the first relationship of `rel_kind`
    /// declared by `source_part`.
    pub fn related_part(&self, source_part: &str, rel_kind: &str) -> Result<Option<String>> {
        let rels = self.relationships(source_part)?;
        Ok(rels
            .iter()
            .find(|rel| !rel.external && rel.rel_type.rsplit('/').next() == Some(rel_kind))
            .map(|rel| resolve_target(source_part, &rel.target)))
    }

    /// Name of the main document part.
    pub fn main_document_part(&self) -> Result<String> {
        if let Some(name) = self.related_part("", REL_OFFICE_DOCUMENT)? {
            if self.part(&name).is_some() {
                return Ok(name);
            }
        }
        if self.part("word/document.xml").is_some() {
            return Ok("word/document.xml".into());
        }
        Err(ClausierError::Package(
            "package has no main document part".into(),
        ))
    }

    /// Serialize the package as a zip archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for part in &self.parts {
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer
                .start_file(part.name.as_str(), options)
                .map_err(|e| ClausierError::Package(format!("cannot add '{}': {e}", part.name)))?;
            writer
                .write_all(&part.data)
                .map_err(|e| ClausierError::Package(format!("cannot write '{}': {e}", part.name)))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| ClausierError::Package(format!("cannot finish archive: {e}")))?;
        Ok(cursor.into_inner())
    }
}

/// `.rels` part name for a source part (`word/document.xml` ->
/// `word/_rels/document.xml.rels`, root -> `_rels/.rels`).
fn rels_part_name(source_part: &str) -> String {
    match source_part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None if source_part.is_empty() => "_rels/.rels".into(),
        None => format!("_rels/{source_part}.rels"),
    }
}

/// Resolve a relationship target relative to its source part's directory.
fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_names() {
        assert_eq!(rels_part_name(""), "_rels/.rels");
        assert_eq!(rels_part_name("word/document.xml"), "word/_rels/document.xml.rels");
    }

    #[test]
    fn targets_resolve_relative_to_source() {
        assert_eq!(resolve_target("word/document.xml", "numbering.xml"), "word/numbering.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
        assert_eq!(resolve_target("word/document.xml", "/word/styles.xml"), "word/styles.xml");
        assert_eq!(resolve_target("word/sub/doc.xml", "../styles.xml"), "word/styles.xml");
    }

    #[test]
    fn signatures() {
        assert!(is_zip_signature(b"PK\x03\x04rest"));
        assert!(!is_zip_signature(b"%PDF-1.7"));
        assert!(is_compound_signature(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0]));
    }

    #[test]
    fn zip_roundtrip_keeps_parts_in_order() {
        let package = Package::from_parts([
            ("[Content_Types].xml", b"<Types/>".to_vec()),
            ("word/document.xml", b"<w:document/>".to_vec()),
            ("word/media/image1.png", vec![0x89, 0x50, 0x4E, 0x47]),
        ]);

        let bytes = package.to_bytes().expect("zip");
        let reread = Package::from_bytes(&bytes).expect("unzip");

        let names: Vec<_> = reread.part_names().collect();
        assert_eq!(names, ["[Content_Types].xml", "word/document.xml", "word/media/image1.png"]);
        assert_eq!(reread.part("word/media/image1.png"), Some(&[0x89, 0x50, 0x4E, 0x47][..]));
    }

    #[test]
    fn main_part_found_through_root_relationships() {
        let rels = br#"<?xml version="1.0"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/main.xml"/></Relationships>"#;
        let package = Package::from_parts([
            ("_rels/.rels", rels.to_vec()),
            ("word/main.xml", b"<w:document/>".to_vec()),
        ]);
        assert_eq!(package.main_document_part().expect("main part"), "word/main.xml");
    }

    #[test]
    fn non_zip_bytes_are_rejected() {
        let err = Package::from_bytes(b"plain text").unwrap_err();
        assert!(err.to_string().contains("not a zip container"));
    }
}
