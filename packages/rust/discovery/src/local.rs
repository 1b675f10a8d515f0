//! Local clause directory scanner.
//!
//! Layout: one sub-directory per section, named `NN_Section_Name`, holding
//! the clause documents of that section.
//!
//! ```text
//! clauses/
//! ├── 01_Designation_des_Parties/
//! │   └── Parties personnes morales.docx
//! └── 02_Preambule/
//!     ├── Contexte.docx
//!     └── Historique.doc
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use clausier_docx::{is_compound_signature, is_zip_signature};
use clausier_shared::{Clause, ClausierError, Result, Section};

/// Order given to directories whose name carries no number.
pub const UNORDERED: u32 = 999;

/// Prefix of the lock files office suites leave next to open documents.
const LOCK_FILE_PREFIX: &str = "~$";

const EXTENSIONS: &[&str] = &["docx", "doc"];

/// A file that looked like a clause but was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a directory scan.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Clauses sorted by (section order, name).
    pub clauses: Vec<Clause>,
    pub skipped: Vec<SkippedFile>,
}

/// Section a directory stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DirectorySection {
    key: String,
    order: u32,
}

/// Map `NN_Section_Name` to a section: the definition with order `NN` if
/// there is one, else a section derived from the name.
fn directory_section(dir_name: &str, sections: &[Section]) -> DirectorySection {
    let parsed = dir_name
        .split_once('_')
        .and_then(|(order, rest)| Some((order.parse::<u32>().ok()?, rest)));

    match parsed {
        Some((order, rest)) => match sections.iter().find(|s| s.order == order) {
            Some(section) => DirectorySection {
                key: section.key.clone(),
                order,
            },
            None => DirectorySection {
                key: rest.to_lowercase(),
                order,
            },
        },
        None => DirectorySection {
            key: dir_name.to_lowercase(),
            order: UNORDERED,
        },
    }
}

/// Scan `clauses_dir` for clause documents.
#[instrument(skip_all, fields(dir = %clauses_dir.display()))]
pub fn discover_clauses(clauses_dir: &Path, sections: &[Section]) -> Result<Discovery> {
    let mut discovery = Discovery::default();

    for section_dir in sorted_entries(clauses_dir)? {
        if !section_dir.is_dir() {
            continue;
        }
        let dir_name = file_name(&section_dir);
        let section = directory_section(&dir_name, sections);
        debug!(dir = %dir_name, key = %section.key, order = section.order, "section directory");

        for path in sorted_entries(&section_dir)? {
            if !is_candidate(&path) {
                continue;
            }
            match check_signature(&path) {
                Ok(()) => discovery.clauses.push(Clause::new(
                    clause_name(&path),
                    section.key.clone(),
                    section.order,
                    path,
                )),
                Err(reason) => {
                    warn!(file = %path.display(), %reason, "file skipped");
                    discovery.skipped.push(SkippedFile { path, reason });
                }
            }
        }
    }

    discovery
        .clauses
        .sort_by(|a, b| (a.section_order, &a.name).cmp(&(b.section_order, &b.name)));
    info!(
        clauses = discovery.clauses.len(),
        skipped = discovery.skipped.len(),
        "clauses discovered"
    );
    Ok(discovery)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .map_err(|e| ClausierError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| ClausierError::io(dir, e))?;
    entries.sort();
    Ok(entries)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A `.docx`/`.doc` file that is not an office lock file.
fn is_candidate(path: &Path) -> bool {
    if !path.is_file() || file_name(path).starts_with(LOCK_FILE_PREFIX) {
        return false;
    }
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| EXTENSIONS.contains(&ext.as_str()))
}

fn clause_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Accept zip packages and legacy compound documents.
fn check_signature(path: &Path) -> std::result::Result<(), String> {
    let mut header = [0u8; 8];
    let read = std::fs::File::open(path)
        .and_then(|mut file| file.read(&mut header))
        .map_err(|e| format!("unreadable: {e}"))?;
    let header = &header[..read];

    if is_zip_signature(header) || is_compound_signature(header) {
        Ok(())
    } else {
        Err("not a word-processing document".into())
    }
}
