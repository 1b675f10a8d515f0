//! Application configuration for Clausier.
//!
//! User config lives at `~/.clausier/clausier.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClausierError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "clausier.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".clausier";

// ---------------------------------------------------------------------------
// Config structs (matching clausier.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Template visual identity applied to grafted content.
    #[serde(default)]
    pub style: StyleConfig,

    /// AI summary settings.
    #[serde(default)]
    pub summary: SummaryFileConfig,

    /// Numbering import policy.
    #[serde(default)]
    pub numbering: NumberingConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Template document every contract starts from.
    #[serde(default = "default_template")]
    pub template: String,

    /// Root of the local clause library.
    #[serde(default = "default_clauses_dir")]
    pub clauses_dir: String,

    /// Section definition file.
    #[serde(default = "default_sections_file")]
    pub sections_file: String,

    /// Directory for generated contracts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            clauses_dir: default_clauses_dir(),
            sections_file: default_sections_file(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_template() -> String {
    "clauses/Exemple contrat V2 clausier km.docx".into()
}
fn default_clauses_dir() -> String {
    "clauses".into()
}
fn default_sections_file() -> String {
    "parties.ini".into()
}
fn default_output_dir() -> String {
    "output".into()
}

/// `[style]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Font forced onto grafted text runs.
    #[serde(default = "default_body_font")]
    pub body_font: String,

    /// Font of section headers and summary headings.
    #[serde(default = "default_heading_font")]
    pub heading_font: String,

    /// Font size in points.
    #[serde(default = "default_size_pt")]
    pub size_pt: f32,

    /// Text color as `RRGGBB`.
    #[serde(default = "default_color")]
    pub color: String,

    /// Whether section names are upper-cased in headers.
    #[serde(default = "default_true")]
    pub uppercase_headings: bool,

    /// Display name of the template's bullet list paragraph style.
    #[serde(default = "default_bullet_style")]
    pub bullet_style: String,

    /// Display name of the template's numbered list paragraph style.
    #[serde(default = "default_number_style")]
    pub number_style: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            body_font: default_body_font(),
            heading_font: default_heading_font(),
            size_pt: default_size_pt(),
            color: default_color(),
            uppercase_headings: true,
            bullet_style: default_bullet_style(),
            number_style: default_number_style(),
        }
    }
}

fn default_body_font() -> String {
    "Montserrat Medium".into()
}
fn default_heading_font() -> String {
    "Montserrat ExtraBold".into()
}
fn default_size_pt() -> f32 {
    11.0
}
fn default_color() -> String {
    "003DA5".into()
}
fn default_true() -> bool {
    true
}
fn default_bullet_style() -> String {
    "List Bullet".into()
}
fn default_number_style() -> String {
    "List Number".into()
}

/// `[summary]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryFileConfig {
    /// Generate and insert a summary after assembly.
    #[serde(default)]
    pub enabled: bool,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat-completion endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of contract characters sent to the generator.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for SummaryFileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_chars: default_max_chars(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_chars() -> usize {
    16_000
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    500
}

/// What to do with a grafted list reference that has no target definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DanglingNumbering {
    /// Remove the reference; the paragraph grafts as a plain paragraph.
    #[default]
    Strip,
    /// Leave the numeric id untouched.
    Keep,
}

/// `[numbering]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumberingConfig {
    #[serde(default)]
    pub dangling: DanglingNumbering,
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags)
// ---------------------------------------------------------------------------

/// Template visual identity, as consumed by the splicing engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateStyle {
    /// Font forced onto grafted runs.
    pub body_font: String,
    /// Font for headers and summary headings.
    pub heading_font: String,
    /// Font size in half-points (the unit of `w:sz`).
    pub size_half_points: u32,
    /// Text color as `RRGGBB`.
    pub color: String,
    /// Upper-case section names in headers.
    pub uppercase_headings: bool,
    /// Display name of the bullet list style.
    pub bullet_style: String,
    /// Display name of the numbered list style.
    pub number_style: String,
}

impl Default for TemplateStyle {
    fn default() -> Self {
        Self::from(&StyleConfig::default())
    }
}

impl From<&StyleConfig> for TemplateStyle {
    fn from(style: &StyleConfig) -> Self {
        Self {
            body_font: style.body_font.clone(),
            heading_font: style.heading_font.clone(),
            size_half_points: (style.size_pt * 2.0).round().max(1.0) as u32,
            color: style.color.trim_start_matches('#').to_uppercase(),
            uppercase_headings: style.uppercase_headings,
            bullet_style: style.bullet_style.clone(),
            number_style: style.number_style.clone(),
        }
    }
}

impl From<&AppConfig> for TemplateStyle {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.style)
    }
}

/// Runtime summary configuration.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub api_key_env: String,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_chars: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&AppConfig> for SummaryConfig {
    fn from(config: &AppConfig) -> Self {
        let s = &config.summary;
        Self {
            api_key_env: s.api_key_env.clone(),
            endpoint: s.endpoint.clone(),
            model: s.model.clone(),
            timeout_secs: s.timeout_secs,
            max_chars: s.max_chars,
            temperature: s.temperature,
            max_tokens: s.max_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.clausier/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ClausierError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.clausier/clausier.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ClausierError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ClausierError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ClausierError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ClausierError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ClausierError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the summary API key from its environment variable.
pub fn resolve_api_key(config: &SummaryConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(ClausierError::config(format!(
            "summary API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("clauses_dir"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("Montserrat Medium"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.summary.timeout_secs, 60);
        assert_eq!(parsed.numbering.dangling, DanglingNumbering::Strip);
        assert_eq!(parsed.style.color, "003DA5");
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r##"
[style]
body_font = "Arial"
size_pt = 10.5
color = "#1f1f1f"

[numbering]
dangling = "keep"
"##;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.sections_file, "parties.ini");
        assert_eq!(config.numbering.dangling, DanglingNumbering::Keep);

        let style = TemplateStyle::from(&config);
        assert_eq!(style.body_font, "Arial");
        assert_eq!(style.size_half_points, 21);
        assert_eq!(style.color, "1F1F1F");
        assert_eq!(style.heading_font, "Montserrat ExtraBold");
    }

    #[test]
    fn template_style_defaults() {
        let style = TemplateStyle::default();
        assert_eq!(style.size_half_points, 22);
        assert_eq!(style.bullet_style, "List Bullet");
        assert!(style.uppercase_headings);
    }

    #[test]
    fn api_key_resolution() {
        let mut config = SummaryConfig::from(&AppConfig::default());
        // Use a unique env var name to avoid interfering with other tests
        config.api_key_env = "CLAUSIER_TEST_NONEXISTENT_KEY_12345".into();
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
