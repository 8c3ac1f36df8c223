//! Translate command - run the full pipeline and write the HOT document.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use tosca_cli::pipeline::{self, PipelineOptions};

#[derive(Args)]
pub struct TranslateArgs {
    /// Path to the TOSCA service template
    #[arg(short, long)]
    pub template: PathBuf,

    /// Extra type definition files or directories
    #[arg(short, long)]
    pub definitions: Vec<PathBuf>,

    /// Mapping rules document overlaying the built-in table
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Write the HOT document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: OutputFormat,

    /// Treat warnings as failures
    #[arg(long)]
    pub strict: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

pub fn execute(args: TranslateArgs) -> Result<()> {
    info!("Translating template: {}", args.template.display());

    let options = PipelineOptions {
        definitions: args.definitions,
        rules: args.rules,
        strict: args.strict,
    };
    let run = pipeline::translate_template(&args.template, &options)?;

    for finding in &run.report.findings {
        eprintln!("{finding}");
    }

    let Some(hot) = run.hot else {
        anyhow::bail!(
            "validation failed: {} error(s), {} warning(s); no output written",
            run.report.errors().len(),
            run.report.warnings().len()
        );
    };

    let rendered = match args.format {
        OutputFormat::Yaml => serde_yaml::to_string(&hot)?,
        OutputFormat::Json => {
            let mut rendered = serde_json::to_string_pretty(&hot)?;
            rendered.push('\n');
            rendered
        }
    };

    match &args.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!("Wrote HOT document to {}", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
