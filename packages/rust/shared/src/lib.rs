//! Shared types, error model, and configuration for Clausier.
//!
//! This crate is the foundation depended on by all other Clausier crates.
//! It provides:
//! - [`ClausierError`]: the unified error type
//! - [`MergeWarning`]: recoverable problems recorded during assembly
//! - Domain types ([`Section`], [`Clause`])
//! - Configuration ([`AppConfig`], [`TemplateStyle`], [`SummaryConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DanglingNumbering, DefaultsConfig, NumberingConfig, StyleConfig, SummaryConfig,
    SummaryFileConfig, TemplateStyle, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_api_key,
};
pub use error::{ClausierError, Result};
pub use types::{Clause, ClausesBySection, MergeWarning, Section, group_by_section};
