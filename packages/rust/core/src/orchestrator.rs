//! Section orchestration.
//!
//! Drives a whole merge session: opens the template, walks the sections in
//! display order, grafts every clause of a displayed section after a moving
//! anchor, then hands back an [`Assembly`] that is finished (summary, save,
//! checksum) in a separate step.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use clausier_docx::{
    Alignment, Anchor, Block, Document, NodeKey, ParagraphBuilder, ParagraphMut, RunFormat,
    empty_paragraph,
};
use clausier_shared::{
    Clause, ClausesBySection, ClausierError, DanglingNumbering, MergeWarning, Result, Section,
    TemplateStyle,
};

use crate::bullets::{ListStyles, normalize_bullets};
use crate::graft::{GraftOptions, graft};
use crate::loader::ClauseLoader;
use crate::numbering::{NumberingAllocator, import_numbering};
use crate::provenance::{Provenance, ProvenanceTable};
use crate::style::enforce_style;
use crate::summary::{SummaryPlacement, inject_summary};

/// Progress callback for reporting assembly status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a new phase starts.
    fn phase(&self, name: &str);
    /// Called after each clause is grafted.
    fn clause_merged(&self, name: &str, current: usize, total: usize);
    /// Called when the document has been written.
    fn done(&self, report: &AssembleReport);
}

/// A no-op progress reporter.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn clause_merged(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &AssembleReport) {}
}

/// Options for a merge session.
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    pub style: TemplateStyle,
    pub dangling: DanglingNumbering,
    /// Merge clauses of a section in name order instead of selection order.
    pub sort_by_name: bool,
}

/// An assembled, not yet saved, contract.
#[derive(Debug)]
pub struct Assembly {
    pub document: Document,
    pub warnings: Vec<MergeWarning>,
    pub sections_displayed: usize,
    pub clauses_merged: usize,
    pub provenance: ProvenanceTable,
    style: TemplateStyle,
}

/// Output from a finished assembly.
#[derive(Debug, Clone, Serialize)]
pub struct AssembleReport {
    pub output: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
    pub summary_placement: Option<SummaryPlacement>,
    pub summary_path: Option<PathBuf>,
    pub sections_displayed: usize,
    pub clauses_merged: usize,
    pub warnings: Vec<MergeWarning>,
}

/// Assemble a contract from `template` (or a blank document) and the
/// selected clauses.
///
/// Fails only when no clause at all is selected. Everything else (missing
/// template, unreadable clause, unknown section key) becomes a warning on
/// the returned [`Assembly`].
#[instrument(skip_all, fields(sections = sections.len(), clauses = clause_count(clauses)))]
pub fn assemble(
    template: Option<&Path>,
    sections: &[Section],
    clauses: &ClausesBySection,
    loader: &dyn ClauseLoader,
    options: &AssembleOptions,
    progress: &dyn ProgressReporter,
) -> Result<Assembly> {
    let total = clause_count(clauses);
    if total == 0 {
        return Err(ClausierError::NoClausesProvided);
    }

    let mut warnings = Vec::new();
    progress.phase("Opening template");
    let document = open_template(template, &mut warnings)?;

    let mut session = Session {
        provenance: ProvenanceTable::from_template(&document),
        allocator: NumberingAllocator::for_table(document.numbering()),
        document,
        warnings,
        options,
        graft_options: GraftOptions {
            dangling: options.dangling,
        },
        merged: 0,
        attempted: 0,
        total,
    };
    session.report_unknown_sections(sections, clauses);

    let mut ordered: Vec<&Section> = sections.iter().collect();
    ordered.sort_by_key(|section| section.order);

    progress.phase("Merging clauses");
    let mut displayed = 0;
    for section in ordered {
        let Some(selected) = clauses.get(&section.key).filter(|list| !list.is_empty()) else {
            debug!(section = %section.key, "no clause selected, section skipped");
            continue;
        };

        if displayed > 0 {
            session.append_scaffold(empty_paragraph());
        }
        displayed += 1;

        let mut selected: Vec<&Clause> = selected.iter().collect();
        if options.sort_by_name {
            selected.sort_by(|a, b| a.name.cmp(&b.name));
        }
        session.merge_section(displayed, section, &selected, loader, progress)?;
    }

    info!(
        sections = displayed,
        clauses = session.merged,
        warnings = session.warnings.len(),
        "assembly complete"
    );

    Ok(Assembly {
        document: session.document,
        warnings: session.warnings,
        sections_displayed: displayed,
        clauses_merged: session.merged,
        provenance: session.provenance,
        style: options.style.clone(),
    })
}

fn clause_count(clauses: &ClausesBySection) -> usize {
    clauses.values().map(Vec::len).sum()
}

fn open_template(template: Option<&Path>, warnings: &mut Vec<MergeWarning>) -> Result<Document> {
    let reason = match template {
        Some(path) if path.is_file() => match Document::open(path) {
            Ok(document) => {
                info!(path = %path.display(), blocks = document.len(), "template opened");
                return Ok(document);
            }
            Err(e) => e.to_string(),
        },
        Some(_) => "file not found".to_string(),
        None => "no template given".to_string(),
    };

    let warning = MergeWarning::MissingTemplate {
        path: template.map(Path::to_path_buf).unwrap_or_default(),
        reason,
    };
    warn!("{warning}");
    warnings.push(warning);
    Document::blank()
}

/// Mutable state of one merge session.
struct Session<'a> {
    document: Document,
    provenance: ProvenanceTable,
    allocator: NumberingAllocator,
    warnings: Vec<MergeWarning>,
    options: &'a AssembleOptions,
    graft_options: GraftOptions,
    merged: usize,
    attempted: usize,
    total: usize,
}

impl Session<'_> {
    fn report_unknown_sections(&mut self, sections: &[Section], clauses: &ClausesBySection) {
        let mut unknown: Vec<&Clause> = clauses
            .iter()
            .filter(|(key, _)| !sections.iter().any(|s| &s.key == *key))
            .flat_map(|(_, list)| list)
            .collect();
        unknown.sort_by(|a, b| (&a.section_tag, &a.name).cmp(&(&b.section_tag, &b.name)));

        for clause in unknown {
            self.warn(MergeWarning::UnknownSection {
                clause: clause.name.clone(),
                section_tag: clause.section_tag.clone(),
            });
        }
    }

    fn warn(&mut self, warning: MergeWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    fn append_scaffold(&mut self, block: Block) -> Anchor {
        let anchor = self.document.append(block);
        self.provenance.record(anchor.key(), Provenance::Scaffold);
        anchor
    }

    fn insert_scaffold(&mut self, after: Anchor, block: Block) -> Result<Anchor> {
        let anchor = self.document.insert_after(after, block)?;
        self.provenance.record(anchor.key(), Provenance::Scaffold);
        Ok(anchor)
    }

    fn merge_section(
        &mut self,
        index: usize,
        section: &Section,
        selected: &[&Clause],
        loader: &dyn ClauseLoader,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        debug!(index, section = %section.key, clauses = selected.len(), "section displayed");
        let header = section_header(index, &section.name, &self.options.style);
        self.append_scaffold(header);
        let mut anchor = self.append_scaffold(empty_paragraph());

        for clause in selected {
            self.attempted += 1;
            let source = match loader.load(&clause.source_path) {
                Ok(source) => source,
                Err(e) => {
                    self.warn(MergeWarning::ClauseLoadFailure {
                        clause: clause.name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            anchor = self.merge_clause(anchor, clause, &source)?;
            self.merged += 1;
            progress.clause_merged(&clause.name, self.attempted, self.total);
        }
        Ok(())
    }

    /// Graft one loaded clause after `anchor` and return the anchor on the
    /// spacer that follows it.
    fn merge_clause(&mut self, anchor: Anchor, clause: &Clause, source: &Document) -> Result<Anchor> {
        if let Some(table) = self.document.numbering() {
            self.allocator.observe(table);
        }
        let remap = import_numbering(&mut self.document, source, &mut self.allocator);
        let outcome = graft(&mut self.document, anchor, source, &remap, &self.graft_options)?;

        self.provenance
            .record_all(&outcome.inserted, Provenance::Clause(self.merged));
        let keys = outcome.inserted.as_slice();

        let list_styles = ListStyles::resolve(&self.document, &self.options.style);
        let normalized = self.normalize_bullets(keys, &list_styles);
        let report = enforce_style(&mut self.document, keys, &self.options.style);

        debug!(
            clause = %clause.name,
            blocks = keys.len(),
            lists = remap.len(),
            normalized,
            runs = report.runs_formatted,
            fields = report.fields_neutralized,
            "clause merged"
        );
        self.insert_scaffold(outcome.anchor, empty_paragraph())
    }

    fn normalize_bullets(&mut self, keys: &[NodeKey], styles: &ListStyles) -> usize {
        let mut normalized = 0;
        for key in keys {
            let Some(Block::Paragraph(element)) = self.document.block_mut(*key) else {
                continue;
            };
            let mut paragraph = ParagraphMut::new(element);
            if normalize_bullets(&mut paragraph, styles).is_some() {
                normalized += 1;
            }
        }
        normalized
    }
}

/// `"{index}. {name}"` in the heading font, bold.
fn section_header(index: usize, name: &str, style: &TemplateStyle) -> Block {
    let name = if style.uppercase_headings {
        name.to_uppercase()
    } else {
        name.to_string()
    };
    let format = RunFormat {
        font: Some(style.heading_font.clone()),
        size_half_points: Some(style.size_half_points),
        color: Some(style.color.clone()),
        bold: Some(true),
    };
    ParagraphBuilder::new()
        .align(Alignment::Left)
        .space_before(24)
        .space_after(12)
        .run(&format!("{index}. {name}"), &format)
        .build()
}

impl Assembly {
    /// Record a warning raised outside the merge loop (e.g. by the summary
    /// generator).
    pub fn push_warning(&mut self, warning: MergeWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Plain text of the assembled contract, for the summary generator.
    pub fn contract_text(&self, max_chars: usize) -> String {
        contract_text(&self.document, max_chars)
    }

    /// Insert the summary (if any), write the optional summary sidecar and
    /// save the document to `output`.
    #[instrument(skip_all, fields(output = %output.display()))]
    pub fn finish(
        mut self,
        summary: Option<&str>,
        output: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<AssembleReport> {
        let summary = summary.map(str::trim);
        if summary == Some("") {
            self.push_warning(MergeWarning::SummaryUnavailable {
                reason: "summary text is empty".into(),
            });
        }
        let summary = summary.filter(|text| !text.is_empty());

        let mut summary_placement = None;
        if let Some(text) = summary {
            progress.phase("Inserting summary");
            match inject_summary(&mut self.document, text, &self.style) {
                Ok(outcome) => {
                    self.provenance.record_all(&outcome.inserted, Provenance::Scaffold);
                    summary_placement = Some(outcome.placement);
                }
                Err(e) => self.push_warning(MergeWarning::SummaryUnavailable {
                    reason: e.to_string(),
                }),
            }
        }

        progress.phase("Saving document");
        let bytes = self.document.save(output)?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let sha256 = format!("{:x}", hasher.finalize());

        let summary_path = summary.and_then(|text| write_summary_sidecar(output, text));

        let report = AssembleReport {
            output: output.to_path_buf(),
            size_bytes: bytes.len() as u64,
            sha256,
            summary_placement,
            summary_path,
            sections_displayed: self.sections_displayed,
            clauses_merged: self.clauses_merged,
            warnings: self.warnings,
        };
        info!(
            bytes = report.size_bytes,
            sha256 = %report.sha256,
            warnings = report.warnings.len(),
            "contract written"
        );
        progress.done(&report);
        Ok(report)
    }
}

/// Write `<stem>_summary.txt` next to `output`. A failure only costs the
/// sidecar.
fn write_summary_sidecar(output: &Path, text: &str) -> Option<PathBuf> {
    let stem = output.file_stem()?.to_string_lossy();
    let path = output.with_file_name(format!("{stem}_summary.txt"));
    match std::fs::write(&path, text) {
        Ok(()) => {
            debug!(path = %path.display(), "summary sidecar written");
            Some(path)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not write summary sidecar");
            None
        }
    }
}

/// Non-empty body paragraph texts joined by newlines, cut to `max_chars`
/// characters.
pub fn contract_text(document: &Document, max_chars: usize) -> String {
    let text = document
        .paragraph_texts()
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}

/// `dir/contrat_<YYYYmmdd_HHMMSS>.docx`.
pub fn default_output_path(dir: &Path) -> PathBuf {
    dir.join(format!("contrat_{}.docx", Local::now().format("%Y%m%d_%H%M%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use clausier_shared::group_by_section;

    /// Serves in-memory documents keyed by path.
    struct MemoryLoader(HashMap<PathBuf, Vec<String>>);

    impl MemoryLoader {
        fn new(entries: &[(&str, &[&str])]) -> Self {
            Self(
                entries
                    .iter()
                    .map(|(path, lines)| {
                        (PathBuf::from(path), lines.iter().map(|l| l.to_string()).collect())
                    })
                    .collect(),
            )
        }
    }

    impl ClauseLoader for MemoryLoader {
        fn load(&self, path: &Path) -> Result<Document> {
            let lines = self
                .0
                .get(path)
                .ok_or_else(|| ClausierError::clause_load(path, "not found"))?;
            Document::from_paragraph_texts(lines)
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressReporter for Recorder {
        fn phase(&self, name: &str) {
            self.0.lock().expect("lock").push(format!("phase:{name}"));
        }
        fn clause_merged(&self, name: &str, current: usize, total: usize) {
            self.0.lock().expect("lock").push(format!("{name} {current}/{total}"));
        }
        fn done(&self, _report: &AssembleReport) {
            self.0.lock().expect("lock").push("done".into());
        }
    }

    fn sections() -> Vec<Section> {
        vec![
            Section::new("c", "C", 3),
            Section::new("a", "A", 1),
            Section::new("b", "B", 2),
        ]
    }

    fn non_empty(doc: &Document) -> Vec<String> {
        doc.paragraph_texts()
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect()
    }

    #[test]
    fn no_clauses_is_fatal() {
        let err = assemble(
            None,
            &sections(),
            &ClausesBySection::new(),
            &MemoryLoader::new(&[]),
            &AssembleOptions::default(),
            &SilentProgress,
        )
        .unwrap_err();
        assert!(matches!(err, ClausierError::NoClausesProvided));
    }

    #[test]
    fn empty_sections_are_skipped_without_consuming_an_index() {
        let clauses = group_by_section(&[
            Clause::new("X", "a", 1, "x"),
            Clause::new("Y", "a", 1, "y"),
            Clause::new("Z", "c", 3, "z"),
        ]);
        let loader = MemoryLoader::new(&[("x", &["Texte X"]), ("y", &["Texte Y"]), ("z", &["Texte Z"])]);
        let recorder = Recorder::default();

        let assembly = assemble(None, &sections(), &clauses, &loader, &AssembleOptions::default(), &recorder)
            .expect("assemble");

        assert_eq!(non_empty(&assembly.document), ["1. A", "Texte X", "Texte Y", "2. C", "Texte Z"]);
        assert_eq!(assembly.sections_displayed, 2);
        assert_eq!(assembly.clauses_merged, 3);
        assert!(matches!(assembly.warnings[0], MergeWarning::MissingTemplate { .. }));

        let texts = assembly.document.paragraph_texts();
        let separator = texts.iter().position(|t| t == "2. C").expect("header C");
        assert!(texts[separator - 1].is_empty());
        assert_eq!(texts.last().map(String::as_str), Some(""));

        let events = recorder.0.lock().expect("lock").clone();
        assert!(events.contains(&"Y 2/3".to_string()));
    }

    #[test]
    fn load_failures_and_unknown_sections_become_warnings() {
        let clauses = group_by_section(&[
            Clause::new("Perdue", "a", 1, "absent"),
            Clause::new("Valide", "a", 1, "ok"),
            Clause::new("Orpheline", "inconnue", 9, "ok"),
        ]);
        let loader = MemoryLoader::new(&[("ok", &["Contenu"])]);

        let assembly = assemble(None, &sections(), &clauses, &loader, &AssembleOptions::default(), &SilentProgress)
            .expect("assemble");

        assert_eq!(non_empty(&assembly.document), ["1. A", "Contenu"]);
        assert_eq!(assembly.clauses_merged, 1);
        assert!(assembly.warnings.iter().any(|w| matches!(
            w,
            MergeWarning::ClauseLoadFailure { clause, .. } if clause == "Perdue"
        )));
        assert!(assembly.warnings.iter().any(|w| matches!(
            w,
            MergeWarning::UnknownSection { section_tag, .. } if section_tag == "inconnue"
        )));
    }

    #[test]
    fn clauses_can_be_sorted_by_name() {
        let clauses = group_by_section(&[
            Clause::new("Zeta", "a", 1, "z"),
            Clause::new("Alpha", "a", 1, "a"),
        ]);
        let loader = MemoryLoader::new(&[("z", &["Zeta"]), ("a", &["Alpha"])]);
        let options = AssembleOptions {
            sort_by_name: true,
            ..AssembleOptions::default()
        };

        let assembly = assemble(None, &sections(), &clauses, &loader, &options, &SilentProgress).expect("assemble");
        assert_eq!(non_empty(&assembly.document), ["1. A", "Alpha", "Zeta"]);
    }

    #[test]
    fn headers_follow_style() {
        let mut style = TemplateStyle::default();
        let block = section_header(2, "Préambule", &style);
        assert_eq!(block.text(), "2. PRÉAMBULE");

        style.uppercase_headings = false;
        let block = section_header(2, "Préambule", &style);
        assert_eq!(block.text(), "2. Préambule");
        let p = block.as_paragraph().expect("paragraph");
        assert_eq!(p.first_run_font(), Some("Montserrat ExtraBold"));
    }

    #[test]
    fn grafted_content_gets_clause_provenance() {
        let clauses = group_by_section(&[Clause::new("X", "a", 1, "x")]);
        let loader = MemoryLoader::new(&[("x", &["Un", "Deux"])]);

        let assembly = assemble(None, &sections(), &clauses, &loader, &AssembleOptions::default(), &SilentProgress)
            .expect("assemble");

        let keys = assembly.provenance.clause_keys(0);
        let texts: Vec<String> = keys
            .iter()
            .filter_map(|k| assembly.document.block(*k))
            .map(Block::text)
            .collect();
        assert_eq!(texts, ["Un", "Deux"]);
    }

    #[test]
    fn post_passes_cover_each_clause_blocks_once() {
        let clauses = group_by_section(&[
            Clause::new("X", "a", 1, "x"),
            Clause::new("Y", "a", 1, "y"),
        ]);
        let loader = MemoryLoader::new(&[("x", &["• Premier", "Texte X"]), ("y", &["• Second"])]);

        let assembly = assemble(None, &sections(), &clauses, &loader, &AssembleOptions::default(), &SilentProgress)
            .expect("assemble");

        for (index, expected) in [(0, vec!["Premier", "Texte X"]), (1, vec!["Second"])] {
            let paragraphs: Vec<_> = assembly
                .provenance
                .clause_keys(index)
                .into_iter()
                .filter_map(|k| assembly.document.block(k))
                .filter_map(|b| b.as_paragraph().map(|p| (p.text(), p.first_run_font(), p.runs().len())))
                .collect();
            let texts: Vec<&str> = paragraphs.iter().map(|(t, _, _)| t.as_str()).collect();
            assert_eq!(texts, expected);
            for (text, font, runs) in &paragraphs {
                assert_eq!(*font, Some("Montserrat Medium"), "{text}");
                assert_eq!(*runs, 1, "{text}");
            }
        }
    }

    #[test]
    fn contract_text_skips_blanks_and_truncates() {
        let doc = Document::from_paragraph_texts(&["Titre", "", "  ", "Clause"]).expect("doc");
        assert_eq!(contract_text(&doc, 100), "Titre\nClause");
        assert_eq!(contract_text(&doc, 3), "Tit");
    }

    #[test]
    fn output_path_is_timestamped() {
        let path = default_output_path(Path::new("output"));
        let name = path.file_name().expect("name").to_string_lossy().into_owned();
        assert!(name.starts_with("contrat_") && name.ends_with(".docx"));
        assert_eq!(name.len(), "contrat_20240101_120000.docx".len());
    }

    #[test]
    fn finish_writes_document_summary_and_checksum() {
        let dir = std::env::temp_dir().join(format!("clausier-finish-{}", uuid::Uuid::now_v7()));
        let clauses = group_by_section(&[Clause::new("X", "a", 1, "x")]);
        let loader = MemoryLoader::new(&[("x", &["Texte"])]);
        let assembly = assemble(None, &sections(), &clauses, &loader, &AssembleOptions::default(), &SilentProgress)
            .expect("assemble");

        let output = dir.join("contrat.docx");
        let report = assembly
            .finish(Some("POINTS CLÉS\n• Durée 3 ans"), &output, &SilentProgress)
            .expect("finish");

        let written = std::fs::read(&output).expect("read output");
        assert_eq!(report.size_bytes, written.len() as u64);
        assert_eq!(report.sha256.len(), 64);
        assert_eq!(report.summary_placement, Some(SummaryPlacement::AtTop));
        let sidecar = report.summary_path.clone().expect("sidecar");
        assert_eq!(sidecar, dir.join("contrat_summary.txt"));
        assert!(std::fs::read_to_string(&sidecar).expect("sidecar").contains("POINTS CLÉS"));

        let reopened = Document::open(&output).expect("reopen");
        assert_eq!(reopened.paragraph_texts()[0], "Synthèse");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_summary_is_a_warning() {
        let dir = std::env::temp_dir().join(format!("clausier-finish-{}", uuid::Uuid::now_v7()));
        let clauses = group_by_section(&[Clause::new("X", "a", 1, "x")]);
        let loader = MemoryLoader::new(&[("x", &["Texte"])]);
        let assembly = assemble(None, &sections(), &clauses, &loader, &AssembleOptions::default(), &SilentProgress)
            .expect("assemble");

        let report = assembly
            .finish(Some("  \n"), &dir.join("c.docx"), &SilentProgress)
            .expect("finish");
        assert_eq!(report.summary_placement, None);
        assert_eq!(report.summary_path, None);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, MergeWarning::SummaryUnavailable { .. })));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
