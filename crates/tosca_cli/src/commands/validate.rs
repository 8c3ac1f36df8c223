//! Validate command - stop after validation and report every finding.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use tosca_cli::pipeline::{self, PipelineOptions};
use tosca_model::{Resolver, TemplateModel, Validator};

#[derive(Args)]
pub struct ValidateArgs {
    /// Path to the TOSCA service template
    #[arg(short, long)]
    pub template: PathBuf,

    /// Extra type definition files or directories
    #[arg(short, long)]
    pub definitions: Vec<PathBuf>,

    /// Treat warnings as failures
    #[arg(long)]
    pub strict: bool,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("Validating template: {}", args.template.display());

    let registry = pipeline::build_registry(&args.definitions)?;
    let document = pipeline::load_document(&args.template)?;
    let model = TemplateModel::parse(&document, &registry)?;
    let graph = Resolver::resolve(model, &registry)?;
    let report = Validator::validate(&graph, &registry);

    for finding in &report.findings {
        println!("{finding}");
    }

    let failed = report.has_errors() || (args.strict && !report.is_empty());
    if failed {
        anyhow::bail!(
            "validation failed: {} error(s), {} warning(s)",
            report.errors().len(),
            report.warnings().len()
        );
    }

    println!(
        "Template OK: {} node template(s), {} relationship(s), {} warning(s)",
        graph.model.node_templates.len(),
        graph.relationships.len(),
        report.warnings().len()
    );
    Ok(())
}
