//! CLI command definitions, routing, and tracing setup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use clausier_core::{
    AssembleOptions, AssembleReport, PackageLoader, ProgressReporter, SummaryPlacement, assemble,
    default_output_path,
};
use clausier_discovery::{discover_clauses, load_sections};
use clausier_shared::{
    AppConfig, Clause, Section, SummaryConfig, TemplateStyle, group_by_section, init_config,
    load_config,
};
use clausier_summary::generate_summary;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Clausier: assemble contracts from a clause library.
#[derive(Parser)]
#[command(
    name = "clausier",
    version,
    about = "Assemble a contract from clause documents into a template.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where sections and clauses are read from. Unset flags fall back to the
/// `[defaults]` of the config file.
#[derive(clap::Args, Debug, Clone)]
pub(crate) struct LibraryArgs {
    /// Clause library root (one sub-directory per section).
    #[arg(long)]
    pub clauses_dir: Option<PathBuf>,

    /// Section definition file.
    #[arg(long)]
    pub sections: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Assemble a contract from selected clauses.
    Assemble {
        #[command(flatten)]
        library: LibraryArgs,

        /// Template document (defaults to the configured template).
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Clause to include, by name (repeatable).
        #[arg(short, long = "clause")]
        clauses: Vec<String>,

        /// Include every discovered clause.
        #[arg(long, conflicts_with = "clauses")]
        all: bool,

        /// Merge the clauses of each section in name order.
        #[arg(long)]
        sort_by_name: bool,

        /// Output document (defaults to <output_dir>/contrat_<timestamp>.docx).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Generate and insert a summary of the contract.
        #[arg(long)]
        summary: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List section definitions.
    Sections {
        /// Section definition file.
        #[arg(long)]
        sections: Option<PathBuf>,
    },

    /// List discovered clauses by section.
    Clauses {
        #[command(flatten)]
        library: LibraryArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "clausier=info",
        1 => "clausier=debug",
        _ => "clausier=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Assemble {
            library,
            template,
            clauses,
            all,
            sort_by_name,
            out,
            summary,
            json,
        } => {
            let request = AssembleRequest {
                library,
                template,
                clauses,
                all,
                sort_by_name,
                out,
                summary,
                json,
            };
            cmd_assemble(request).await
        }
        Command::Sections { sections } => cmd_sections(sections.as_deref()),
        Command::Clauses { library } => cmd_clauses(&library),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Library resolution
// ---------------------------------------------------------------------------

fn sections_path(config: &AppConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.defaults.sections_file))
}

fn clauses_dir(config: &AppConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.defaults.clauses_dir))
}

/// Sections and discovered clauses for a library.
fn load_library(config: &AppConfig, library: &LibraryArgs) -> Result<(Vec<Section>, Vec<Clause>)> {
    let sections = load_sections(&sections_path(config, library.sections.as_deref()))?;
    let dir = clauses_dir(config, library.clauses_dir.as_deref());
    if !dir.is_dir() {
        return Err(eyre!("clause directory '{}' does not exist", dir.display()));
    }
    let discovery = discover_clauses(&dir, &sections)?;
    for skipped in &discovery.skipped {
        eprintln!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    Ok((sections, discovery.clauses))
}

/// Pick clauses by name (case-insensitive), or all of them.
fn select_clauses(available: &[Clause], names: &[String], all: bool) -> Result<Vec<Clause>> {
    if all {
        return Ok(available.to_vec());
    }

    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        let clause = available
            .iter()
            .find(|c| c.name.to_lowercase() == name.to_lowercase())
            .ok_or_else(|| eyre!("unknown clause '{name}' (see `clausier clauses`)"))?;
        selected.push(clause.clone());
    }
    Ok(selected)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

struct AssembleRequest {
    library: LibraryArgs,
    template: Option<PathBuf>,
    clauses: Vec<String>,
    all: bool,
    sort_by_name: bool,
    out: Option<PathBuf>,
    summary: bool,
    json: bool,
}

async fn cmd_assemble(request: AssembleRequest) -> Result<()> {
    let config = load_config()?;
    let (sections, available) = load_library(&config, &request.library)?;
    let selected = select_clauses(&available, &request.clauses, request.all)?;

    let template = request
        .template
        .unwrap_or_else(|| PathBuf::from(&config.defaults.template));
    let output = request
        .out
        .unwrap_or_else(|| default_output_path(Path::new(&config.defaults.output_dir)));
    let options = AssembleOptions {
        style: TemplateStyle::from(&config),
        dangling: config.numbering.dangling,
        sort_by_name: request.sort_by_name,
    };

    info!(
        template = %template.display(),
        clauses = selected.len(),
        output = %output.display(),
        "assembling contract"
    );

    let reporter = CliProgress::new();
    let mut assembly = assemble(
        Some(&template),
        &sections,
        &group_by_section(&selected),
        &PackageLoader,
        &options,
        &reporter,
    )?;

    let summary = if request.summary || config.summary.enabled {
        let summary_config = SummaryConfig::from(&config);
        reporter.phase("Generating summary");
        let text = assembly.contract_text(summary_config.max_chars);
        match generate_summary(&summary_config, &text).await {
            Ok(summary) => Some(summary),
            Err(warning) => {
                assembly.push_warning(warning);
                None
            }
        }
    } else {
        None
    };

    let report = assembly.finish(summary.as_deref(), &output, &reporter)?;

    if request.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &AssembleReport) {
    println!();
    println!("  Contract assembled!");
    println!("  Path:     {}", report.output.display());
    println!("  Sections: {}", report.sections_displayed);
    println!("  Clauses:  {}", report.clauses_merged);
    println!("  Size:     {} bytes", report.size_bytes);
    println!("  SHA-256:  {}", report.sha256);
    match report.summary_placement {
        Some(SummaryPlacement::AtMarker) => println!("  Summary:  inserted at the template marker"),
        Some(SummaryPlacement::AtTop) => println!("  Summary:  inserted at the top"),
        None => {}
    }
    if let Some(path) = &report.summary_path {
        println!("  Summary file: {}", path.display());
    }
    if !report.warnings.is_empty() {
        println!();
        println!("  Warnings:");
        for warning in &report.warnings {
            println!("  - {warning}");
        }
    }
    println!();
}

fn cmd_sections(sections: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let sections = load_sections(&sections_path(&config, sections))?;
    for section in &sections {
        println!("{:>4}  {:<32} {}", section.order, section.key, section.name);
    }
    Ok(())
}

fn cmd_clauses(library: &LibraryArgs) -> Result<()> {
    let config = load_config()?;
    let (sections, clauses) = load_library(&config, library)?;

    for (order, name, members) in clause_listing(&sections, &clauses) {
        println!("{order:>3}. {name}");
        for clause in members {
            println!("       {clause}");
        }
    }
    println!();
    println!("  {} clause(s)", clauses.len());
    Ok(())
}

/// One entry per section key, in first-seen order: display order, section
/// name and the names of its clauses.
fn clause_listing<'a>(sections: &'a [Section], clauses: &'a [Clause]) -> Vec<(u32, &'a str, Vec<&'a str>)> {
    let mut seen = HashSet::new();
    let mut listing = Vec::new();

    for clause in clauses {
        let key = clause.section_tag.as_str();
        if !seen.insert(key) {
            continue;
        }
        let name = sections
            .iter()
            .find(|s| s.key == key)
            .map_or(key, |s| s.name.as_str());
        let members = clauses
            .iter()
            .filter(|c| c.section_tag == key)
            .map(|c| c.name.as_str())
            .collect();
        listing.push((clause.section_order, name, members));
    }
    listing
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .map(|style| style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn clause_merged(&self, name: &str, current: usize, total: usize) {
        self.spinner.set_message(format!("Merging [{current}/{total}] {name}"));
    }

    fn done(&self, _report: &AssembleReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Vec<Clause> {
        vec![
            Clause::new("Parties", "designation_parties", 1, "a/Parties.docx"),
            Clause::new("Contexte", "preambule", 2, "b/Contexte.docx"),
        ]
    }

    #[test]
    fn selection_by_name_ignores_case() {
        let selected = select_clauses(&library(), &["contexte".into()], false).expect("select");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "Contexte");
    }

    #[test]
    fn unknown_clause_is_rejected() {
        assert!(select_clauses(&library(), &["Absente".into()], false).is_err());
    }

    #[test]
    fn all_selects_everything() {
        assert_eq!(select_clauses(&library(), &[], true).expect("select").len(), 2);
        assert!(select_clauses(&library(), &[], false).expect("select").is_empty());
    }

    #[test]
    fn listing_shows_each_section_once() {
        let sections = vec![
            Section::new("designation_parties", "Désignation des Parties", 1),
            Section::new("preambule", "Préambule", 2),
        ];
        // same tag under two orders, and two tags sharing one order
        let clauses = vec![
            Clause::new("Parties", "designation_parties", 1, "a/Parties.docx"),
            Clause::new("Contexte", "preambule", 2, "b/Contexte.docx"),
            Clause::new("Annexe", "annexes", 2, "x/Annexe.docx"),
            Clause::new("Signataires", "designation_parties", 7, "c/Signataires.docx"),
        ];

        let listing = clause_listing(&sections, &clauses);

        assert_eq!(
            listing,
            vec![
                (1, "Désignation des Parties", vec!["Parties", "Signataires"]),
                (2, "Préambule", vec!["Contexte"]),
                (2, "annexes", vec!["Annexe"]),
            ]
        );
    }

    #[test]
    fn cli_parses_assemble() {
        let cli = Cli::try_parse_from([
            "clausier", "-vv", "assemble", "--clause", "Parties", "-c", "Contexte", "--summary",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Assemble { clauses, summary, all, .. } => {
                assert_eq!(clauses, ["Parties", "Contexte"]);
                assert!(summary);
                assert!(!all);
            }
            _ => panic!("expected assemble"),
        }
    }
}
