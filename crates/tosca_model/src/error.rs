//! Error types for template parsing and requirement resolution.

use thiserror::Error;
use tosca_types::TypeError;

/// Result type alias for template model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Structural errors raised while building the template model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Template is missing required section: {0}")]
    MissingSection(String),

    #[error("Malformed '{section}' section: {message}")]
    MalformedSection { section: String, message: String },

    #[error("Duplicate name in '{section}': {name}")]
    DuplicateName { section: String, name: String },

    #[error("Node template '{node}' references undeclared type: {type_name}")]
    UnknownNodeType { node: String, type_name: String },

    #[error("{section} '{name}' references undeclared type: {type_name}")]
    UnknownEntityType {
        section: String,
        name: String,
        type_name: String,
    },

    #[error("Template has {} structural error(s): {}", .0.len(), render(.0))]
    Collected(Vec<ModelError>),

    #[error("Type registry error: {0}")]
    Type(#[from] TypeError),
}

fn render(errors: &[ModelError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// One failed requirement resolution, attributed to its node and
/// requirement name.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Node '{node}', requirement '{requirement}': {message}")]
    Unresolved {
        node: String,
        requirement: String,
        message: String,
    },

    #[error("Node '{node}', requirement '{requirement}': ambiguous target ({message})")]
    Ambiguous {
        node: String,
        requirement: String,
        message: String,
    },

    #[error(
        "Node '{node}', requirement '{requirement}': target '{target}' offers no capability of type {capability_type}"
    )]
    CapabilityMismatch {
        node: String,
        requirement: String,
        target: String,
        capability_type: String,
    },
}

/// All resolution failures for a template, collected so the author sees
/// every problem in one run.
#[derive(Error, Debug)]
#[error("Requirement resolution failed with {} error(s): {}", .errors.len(), render_resolve(.errors))]
pub struct ResolveErrors {
    pub errors: Vec<ResolveError>,
}

fn render_resolve(errors: &[ResolveError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
