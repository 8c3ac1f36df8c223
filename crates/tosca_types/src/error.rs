//! Error types for the type system.

use thiserror::Error;

/// Result type alias for type system operations.
pub type TypeResult<T> = Result<T, TypeError>;

/// Errors that can occur while loading or querying type definitions.
#[derive(Error, Debug)]
pub enum TypeError {
    #[error("Type not found in registry: {0}")]
    UnknownType(String),

    #[error("Type '{type_name}' is derived from undefined parent '{parent}'")]
    UnknownParent { type_name: String, parent: String },

    #[error("Inheritance cycle detected through type '{0}'")]
    CycleDetected(String),

    #[error("Cannot infer entity kind from type name: {0}")]
    UnknownKind(String),

    #[error("Malformed definition for '{type_name}': {message}")]
    Malformed { type_name: String, message: String },

    #[error("Document decode error: {0}")]
    Document(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
