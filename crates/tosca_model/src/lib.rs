//! # tosca_model
//!
//! Service template model, requirement resolver, and validator for
//! tosca2hot.
//!
//! A decoded service template document enters as a generic
//! [`tosca_types::Value`] tree and leaves this crate as a fully resolved,
//! validated topology graph:
//!
//! 1. [`TemplateModel::parse`] binds the document's sections to the type
//!    registry and checks structural correctness.
//! 2. [`Resolver::resolve`] matches every declared requirement to a
//!    capability offered by another node, producing relationship edges.
//! 3. [`Validator::validate`] checks property values against the effective
//!    type schemas and accumulates findings instead of failing fast.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tosca_types::{TypeRegistry, Value};
//! use tosca_model::{Resolver, TemplateModel, Validator};
//!
//! let registry = TypeRegistry::builtin().unwrap();
//! let document = Value::from_yaml_str("tosca_definitions_version: tosca_simple_1.0").unwrap();
//!
//! let model = TemplateModel::parse(&document, &registry).unwrap();
//! let graph = Resolver::resolve(model, &registry).unwrap();
//! let report = Validator::validate(&graph, &registry);
//! assert!(!report.has_errors());
//! ```

pub mod error;
pub mod expr;
pub mod resolver;
pub mod template;
pub mod validator;

pub use error::{ModelError, ModelResult, ResolveError, ResolveErrors};
pub use expr::Expr;
pub use resolver::{Capability, Relationship, ResolvedGraph, Resolver};
pub use template::{
    GroupDef, NodeTemplate, OutputDef, PolicyDef, RequirementAssignment, TemplateModel,
};
pub use validator::{Severity, ValidationFinding, ValidationReport, Validator};
