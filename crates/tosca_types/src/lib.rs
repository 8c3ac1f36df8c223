//! # tosca_types
//!
//! TOSCA entity type system and type registry for tosca2hot.
//!
//! This crate holds the vendor-neutral side of the translator: the generic
//! document value model, the schema model (properties, constraints,
//! capabilities, requirements), the entity type records, and the registry
//! that answers effective-definition and subtype queries across a
//! single-inheritance hierarchy.
//!
//! ## Features
//!
//! - **Value model**: owned scalar/sequence/mapping values converted from a
//!   generic YAML/JSON loader at the document boundary
//! - **Schema model**: typed property schemas with constraint clauses
//! - **Type registry**: kind-namespaced entity types with parent and cycle
//!   validation at load time and O(depth) effective-definition lookups
//! - **Normative types**: the built-in TOSCA Simple Profile definitions
//!   shipped as an embedded document
//!
//! ## Example
//!
//! ```rust
//! use tosca_types::TypeRegistry;
//!
//! let registry = TypeRegistry::builtin().unwrap();
//! assert!(registry.is_subtype("tosca.nodes.Database", "tosca.nodes.Root"));
//!
//! let props = registry.effective_properties("tosca.nodes.Database").unwrap();
//! assert!(props.contains_key("db_name"));
//! ```

pub mod entity;
pub mod error;
pub mod registry;
pub mod schema;
pub mod value;

pub use entity::{EntityKind, EntityType};
pub use error::{TypeError, TypeResult};
pub use registry::TypeRegistry;
pub use schema::{
    AttributeSchema, CapabilityDefinition, Constraint, PropertySchema, RequirementDefinition,
    TypeTag,
};
pub use value::Value;
