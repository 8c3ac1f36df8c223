//! CLI command definitions.
//!
//! This module defines the command structure for the tosca2hot CLI.
//! Each subcommand maps to one stage boundary of the translation
//! pipeline.

use clap::{Parser, Subcommand};

pub mod translate;
pub mod validate;

/// tosca2hot - translate TOSCA service templates into Heat templates
#[derive(Parser)]
#[command(name = "tosca2hot")]
#[command(version, about = "Translate TOSCA service templates into Heat Orchestration Templates")]
#[command(long_about = r#"
tosca2hot parses a TOSCA Simple Profile service template, resolves every
requirement against the capabilities the topology offers, validates the
result against the type definitions, and emits a Heat Orchestration
Template.

COMMANDS:
  translate  → Run the full pipeline and write the HOT document
  validate   → Stop after validation and report every finding

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Translation error
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a service template into a HOT document
    Translate(translate::TranslateArgs),
    /// Validate a service template and report findings
    Validate(validate::ValidateArgs),
}
