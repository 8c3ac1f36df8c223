//! Error types for translation and output assembly.

use thiserror::Error;
use tosca_types::TypeError;

/// Result type alias for translation operations.
pub type TranslateResult<T> = Result<T, TranslateError>;

/// Errors that can occur while translating a resolved graph into a HOT
/// document.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Node '{node}' has type {type_name} with no mapping rule (and no mapped ancestor)")]
    UnsupportedType { node: String, type_name: String },

    #[error("Resource name collision in output document: {0}")]
    NameCollision(String),

    #[error("Property reference cycle through node '{node}', property '{property}'")]
    PropertyCycle { node: String, property: String },

    #[error("Malformed mapping rules: {0}")]
    MalformedRules(String),

    #[error("Type registry error: {0}")]
    Type(#[from] TypeError),
}
