//! # tosca_hot
//!
//! Heat Orchestration Template translation and output assembly for
//! tosca2hot.
//!
//! The translator maps every node of a resolved topology graph to one or
//! more Heat resources through a data-driven mapping-rules table, rewrites
//! TOSCA intrinsic functions into their Heat equivalents, and turns
//! relationship edges into `depends_on` entries. The output builder
//! assembles the final document sections; serializing them is left to the
//! caller.
//!
//! ## Features
//!
//! - **Mapping rules**: built-in coverage of the normative node types,
//!   extensible from operator-supplied documents
//! - **Intrinsic rewriting**: `get_input` → `get_param`, `get_attribute` →
//!   `get_attr`, `concat` → `list_join`, with static resolution of
//!   `get_property` where the value is known
//! - **Deterministic output**: insertion-ordered sections, name-collision
//!   detection
//!
//! ## Example
//!
//! ```rust,no_run
//! use tosca_types::{TypeRegistry, Value};
//! use tosca_model::{Resolver, TemplateModel};
//! use tosca_hot::{HotTemplate, MappingRules, Translator};
//!
//! let registry = TypeRegistry::builtin().unwrap();
//! let document = Value::from_yaml_str("tosca_definitions_version: tosca_simple_1.0").unwrap();
//! let model = TemplateModel::parse(&document, &registry).unwrap();
//! let inputs = model.inputs.clone();
//! let description = model.description.clone();
//!
//! let graph = Resolver::resolve(model, &registry).unwrap();
//! let translation = Translator::translate(&graph, &MappingRules::builtin(), &registry).unwrap();
//! let hot = HotTemplate::build(&inputs, translation, description).unwrap();
//! ```

pub mod error;
pub mod hot;
pub mod rules;
pub mod translator;

pub use error::{TranslateError, TranslateResult};
pub use hot::{HotOutput, HotParameter, HotResource, HotTemplate, HEAT_TEMPLATE_VERSION};
pub use rules::{MappingRule, MappingRules, PolicyMapping, ResourceExpansion};
pub use translator::{TranslatedOutput, TranslatedResource, Translation, Translator};
