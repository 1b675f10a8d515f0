//! Clause loading.
//!
//! A clause file is either a word-processing package or a legacy binary
//! document. Legacy files are not parsed structurally: their readable text
//! is salvaged into a generated document, or a placeholder paragraph when
//! nothing readable comes out.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use clausier_docx::{Document, is_compound_signature, is_zip_signature};
use clausier_shared::{ClausierError, Result};

/// Minimum length of a salvaged line.
const MIN_LINE_CHARS: usize = 6;

/// Minimum amount of salvaged text worth keeping.
const MIN_TEXT_CHARS: usize = 10;

static SYMBOL_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[~=\-_*+#@$%^&()\[\]{}|\\<>/?.,;:'"`\s]+$"#).expect("symbol line regex")
});

static MARKUP_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[<>{}\\x]").expect("markup start regex"));

static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("spaces regex"));

/// Loads a clause file into a [`Document`].
pub trait ClauseLoader {
    fn load(&self, path: &Path) -> Result<Document>;
}

/// Loads packages directly and salvages legacy binary documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageLoader;

impl ClauseLoader for PackageLoader {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn load(&self, path: &Path) -> Result<Document> {
        let bytes =
            std::fs::read(path).map_err(|e| ClausierError::clause_load(path, e.to_string()))?;

        if is_zip_signature(&bytes) {
            return Document::from_bytes(&bytes)
                .map_err(|e| ClausierError::clause_load(path, e.to_string()));
        }
        if is_compound_signature(&bytes) {
            return legacy_document(path, &bytes);
        }

        Err(ClausierError::clause_load(
            path,
            "not a word-processing document",
        ))
    }
}

/// Build a document from the text found in a legacy binary file.
fn legacy_document(path: &Path, bytes: &[u8]) -> Result<Document> {
    let lines = salvage_text(bytes);
    let total: usize = lines.iter().map(|line| line.chars().count()).sum();

    if total < MIN_TEXT_CHARS {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        warn!(file = %name, "no readable text in legacy document, inserting placeholder");
        return Document::from_paragraph_texts(&[format!(
            "[Contenu du fichier {name} non convertible automatiquement]"
        )]);
    }

    debug!(lines = lines.len(), "legacy document text salvaged");
    Document::from_paragraph_texts(&lines)
}

/// Readable lines of a binary file. UTF-16LE text (how legacy documents
/// usually store it) is tried first, then single-byte Latin-1.
pub fn salvage_text(bytes: &[u8]) -> Vec<String> {
    let wide = clean_lines(&decode_utf16le(bytes));
    if !wide.is_empty() {
        return wide;
    }
    clean_lines(&decode_latin1(bytes))
}

/// Printable UTF-16LE characters; anything else (CR included) becomes a
/// break.
fn decode_utf16le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|unit| match unit {
            Ok(c) if is_text_char(c) => c,
            _ => '\n',
        })
        .collect()
}

/// Printable bytes read as Latin-1; control bytes become spaces, CR/LF
/// become breaks.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            b'\r' | b'\n' => '\n',
            32..=126 | 160..=255 => char::from(b),
            _ => ' ',
        })
        .collect()
}

fn is_text_char(c: char) -> bool {
    matches!(c, ' ' | '\t')
        || c.is_alphanumeric()
        || c.is_ascii_punctuation()
        || "«»’“”–—…€°".contains(c)
}

/// Collapse whitespace and keep lines that look like prose.
fn clean_lines(raw: &str) -> Vec<String> {
    raw.split('\n')
        .map(|line| SPACES_RE.replace_all(line.trim(), " ").into_owned())
        .filter(|line| {
            line.chars().count() >= MIN_LINE_CHARS
                && !MARKUP_START_RE.is_match(line)
                && !SYMBOL_LINE_RE.is_match(line)
                && line.chars().filter(|c| c.is_alphabetic()).count() * 2 >= line.chars().count()
        })
        .collect()
}
