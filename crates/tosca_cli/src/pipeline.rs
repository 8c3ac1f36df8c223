//! Pipeline wiring: load documents, run every stage, keep the output
//! unwritten until all fatal checks have passed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};
use walkdir::WalkDir;

use tosca_hot::{HotTemplate, MappingRules, Translator};
use tosca_model::{Resolver, TemplateModel, ValidationReport, Validator};
use tosca_types::{TypeRegistry, Value};

/// Options shared by the CLI commands.
#[derive(Debug, Default)]
pub struct PipelineOptions {
    /// Extra type definition documents (files or directories).
    pub definitions: Vec<PathBuf>,
    /// Operator-supplied mapping rules document.
    pub rules: Option<PathBuf>,
    /// Treat warnings as failures.
    pub strict: bool,
}

/// Outcome of a full pipeline run. `hot` is `None` when validation blocked
/// translation; the findings say why.
#[derive(Debug)]
pub struct TranslationRun {
    pub report: ValidationReport,
    pub hot: Option<HotTemplate>,
}

impl TranslationRun {
    /// Whether the run produced a document.
    pub fn succeeded(&self) -> bool {
        self.hot.is_some()
    }
}

/// Load and decode one YAML document.
pub fn load_document(path: &Path) -> Result<Value> {
    debug!("Loading document from {:?}", path);
    let source = fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    Value::from_yaml_str(&source).with_context(|| format!("cannot decode {}", path.display()))
}

/// Build the type registry: built-in definitions extended with every
/// operator-supplied document. Directory arguments are walked for YAML
/// files.
pub fn build_registry(definitions: &[PathBuf]) -> Result<TypeRegistry> {
    let mut registry = TypeRegistry::builtin().context("built-in type definitions")?;
    for path in definitions {
        for file in definition_files(path)? {
            let document = load_document(&file)?;
            registry
                .extend(&document)
                .with_context(|| format!("type definitions in {}", file.display()))?;
        }
    }
    info!("Type registry ready with {} types", registry.len());
    Ok(registry)
}

fn definition_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("definitions path not found: {}", path.display());
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}

/// Build the mapping rules: built-in table, optionally overlaid with an
/// operator-supplied document.
pub fn build_rules(path: Option<&Path>) -> Result<MappingRules> {
    let mut rules = MappingRules::builtin();
    if let Some(path) = path {
        let document = load_document(path)?;
        rules
            .extend_from_document(&document)
            .with_context(|| format!("mapping rules in {}", path.display()))?;
    }
    Ok(rules)
}

/// Run the whole pipeline for one service template.
///
/// Parse and resolution failures are fatal and propagate as errors.
/// Validation findings never abort by themselves; translation is simply
/// withheld when any `Error` finding (or, under `--strict`, any finding at
/// all) is present, so no partial document can ever be written.
pub fn translate_template(template: &Path, options: &PipelineOptions) -> Result<TranslationRun> {
    let registry = build_registry(&options.definitions)?;
    let rules = build_rules(options.rules.as_deref())?;
    let document = load_document(template)?;

    let model = TemplateModel::parse(&document, &registry)
        .with_context(|| format!("parsing {}", template.display()))?;
    let inputs = model.inputs.clone();
    let description = model.description.clone();

    let graph = Resolver::resolve(model, &registry)
        .with_context(|| format!("resolving {}", template.display()))?;
    info!("Resolved {} relationship(s)", graph.relationships.len());

    let report = Validator::validate(&graph, &registry);
    let blocked = report.has_errors() || (options.strict && !report.is_empty());
    if blocked {
        return Ok(TranslationRun { report, hot: None });
    }

    let translation = Translator::translate(&graph, &rules, &registry)?;
    let hot = HotTemplate::build(&inputs, translation, description)?;
    Ok(TranslationRun {
        report,
        hot: Some(hot),
    })
}
