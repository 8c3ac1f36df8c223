//! Type registry: loading, indexing, and effective-definition queries.

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

use crate::entity::{EntityKind, EntityType};
use crate::error::{TypeError, TypeResult};
use crate::schema::{
    AttributeSchema, CapabilityDefinition, PropertySchema, RequirementDefinition,
};
use crate::value::Value;

/// The built-in TOSCA Simple Profile type definitions.
const BUILTIN_DEFINITIONS: &str = include_str!("definitions/tosca_definitions.yaml");

/// An index of all known entity types.
///
/// Built once per run, validated on load (every parent exists, no
/// inheritance cycles), and read-only afterwards. All effective-definition
/// queries walk the parent chain from the named type towards the root; an
/// entry closer to the named type shadows a parent entry of the same name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, EntityType>,
}

impl TypeRegistry {
    /// Load a registry from a type definition document (a mapping of
    /// type-name to definition).
    pub fn load(document: &Value) -> TypeResult<TypeRegistry> {
        let mut registry = TypeRegistry::default();
        registry.merge_document(document)?;
        registry.validate_hierarchy()?;
        debug!("Loaded type registry with {} types", registry.len());
        Ok(registry)
    }

    /// Load the built-in TOSCA Simple Profile definitions.
    pub fn builtin() -> TypeResult<TypeRegistry> {
        let document = Value::from_yaml_str(BUILTIN_DEFINITIONS)?;
        TypeRegistry::load(&document)
    }

    /// Merge an additional definition document into the registry.
    ///
    /// A redefinition of an existing type replaces it; the hierarchy is
    /// re-validated afterwards so an extension cannot smuggle in a missing
    /// parent or a cycle.
    pub fn extend(&mut self, document: &Value) -> TypeResult<()> {
        self.merge_document(document)?;
        self.validate_hierarchy()
    }

    fn merge_document(&mut self, document: &Value) -> TypeResult<()> {
        let map = document
            .as_map()
            .ok_or_else(|| TypeError::Document("type definitions must be a mapping".to_string()))?;
        for (name, raw) in map {
            let entity = EntityType::from_value(name, raw)?;
            if self.types.insert(name.clone(), entity).is_some() {
                debug!("Redefining type: {}", name);
            }
        }
        Ok(())
    }

    /// Reject unknown parents, cross-kind inheritance, and cycles.
    ///
    /// Running this at load time is what lets every later chain walk
    /// terminate without its own visited set.
    fn validate_hierarchy(&self) -> TypeResult<()> {
        for entity in self.types.values() {
            let Some(parent_name) = &entity.derived_from else {
                continue;
            };
            let parent =
                self.types
                    .get(parent_name)
                    .ok_or_else(|| TypeError::UnknownParent {
                        type_name: entity.name.clone(),
                        parent: parent_name.clone(),
                    })?;
            if parent.kind != entity.kind {
                return Err(TypeError::Malformed {
                    type_name: entity.name.clone(),
                    message: format!(
                        "derived from '{parent_name}' of different kind ({} vs {})",
                        entity.kind, parent.kind
                    ),
                });
            }

            let mut visited = HashSet::new();
            let mut cursor = Some(&entity.name);
            while let Some(name) = cursor {
                if !visited.insert(name.clone()) {
                    return Err(TypeError::CycleDetected(entity.name.clone()));
                }
                cursor = self.types.get(name).and_then(|t| t.derived_from.as_ref());
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    pub fn get_required(&self, name: &str) -> TypeResult<&EntityType> {
        self.get(name)
            .ok_or_else(|| TypeError::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Look up a type and require a specific kind.
    pub fn get_kind(&self, name: &str, kind: EntityKind) -> Option<&EntityType> {
        self.get(name).filter(|t| t.kind == kind)
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The chain from the named type up to its root, named type first.
    pub fn parent_chain(&self, name: &str) -> TypeResult<Vec<&EntityType>> {
        let mut chain = Vec::new();
        let mut cursor = Some(self.get_required(name)?);
        while let Some(entity) = cursor {
            chain.push(entity);
            // Hierarchy was validated at load; a missing parent here would
            // mean the registry was mutated after load.
            cursor = match &entity.derived_from {
                Some(parent) => Some(self.get_required(parent)?),
                None => None,
            };
        }
        Ok(chain)
    }

    /// Whether `name` equals `ancestor` or derives from it, directly or
    /// transitively. Unknown names are never subtypes of anything.
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> bool {
        let mut cursor = self.get(name);
        while let Some(entity) = cursor {
            if entity.name == ancestor {
                return true;
            }
            cursor = entity.derived_from.as_deref().and_then(|p| self.get(p));
        }
        false
    }

    /// Merged property schemas across the ancestor chain.
    pub fn effective_properties(&self, name: &str) -> TypeResult<IndexMap<String, PropertySchema>> {
        let mut merged = IndexMap::new();
        for entity in self.parent_chain(name)? {
            for (prop_name, schema) in &entity.properties {
                merged
                    .entry(prop_name.clone())
                    .or_insert_with(|| schema.clone());
            }
        }
        Ok(merged)
    }

    /// Merged attribute schemas across the ancestor chain.
    pub fn effective_attributes(
        &self,
        name: &str,
    ) -> TypeResult<IndexMap<String, AttributeSchema>> {
        let mut merged = IndexMap::new();
        for entity in self.parent_chain(name)? {
            for (attr_name, schema) in &entity.attributes {
                merged
                    .entry(attr_name.clone())
                    .or_insert_with(|| schema.clone());
            }
        }
        Ok(merged)
    }

    /// Merged capability definitions across the ancestor chain.
    pub fn effective_capabilities(
        &self,
        name: &str,
    ) -> TypeResult<IndexMap<String, CapabilityDefinition>> {
        let mut merged = IndexMap::new();
        for entity in self.parent_chain(name)? {
            for (cap_name, definition) in &entity.capabilities {
                merged
                    .entry(cap_name.clone())
                    .or_insert_with(|| definition.clone());
            }
        }
        Ok(merged)
    }

    /// Merged requirement definitions across the ancestor chain, in
    /// declaration order; a child entry shadows a parent entry of the same
    /// name.
    pub fn effective_requirements(&self, name: &str) -> TypeResult<Vec<RequirementDefinition>> {
        let mut merged: Vec<RequirementDefinition> = Vec::new();
        for entity in self.parent_chain(name)? {
            for definition in &entity.requirements {
                if !merged.iter().any(|d| d.name == definition.name) {
                    merged.push(definition.clone());
                }
            }
        }
        Ok(merged)
    }

    /// Union of interface type names across the ancestor chain.
    pub fn effective_interfaces(&self, name: &str) -> TypeResult<Vec<String>> {
        let mut merged: Vec<String> = Vec::new();
        for entity in self.parent_chain(name)? {
            for interface in &entity.interfaces {
                if !merged.contains(interface) {
                    merged.push(interface.clone());
                }
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TypeTag;

    fn load(source: &str) -> TypeResult<TypeRegistry> {
        TypeRegistry::load(&Value::from_yaml_str(source).unwrap())
    }

    const THREE_LEVELS: &str = r#"
test.nodes.Base:
  properties:
    shared:
      type: string
      default: from-base
    base_only:
      type: integer
test.nodes.Middle:
  derived_from: test.nodes.Base
  properties:
    shared:
      type: string
      default: from-middle
    middle_only:
      type: boolean
test.nodes.Leaf:
  derived_from: test.nodes.Middle
  properties:
    leaf_only:
      type: float
"#;

    #[test]
    fn test_effective_properties_union_and_shadowing() {
        let registry = load(THREE_LEVELS).unwrap();
        let props = registry.effective_properties("test.nodes.Leaf").unwrap();

        // Union of all three levels.
        assert_eq!(props.len(), 4);
        assert!(props.contains_key("base_only"));
        assert!(props.contains_key("middle_only"));
        assert!(props.contains_key("leaf_only"));

        // The entry closest to the queried type wins.
        assert_eq!(
            props["shared"].default,
            Some(Value::String("from-middle".to_string()))
        );
        assert_eq!(props["leaf_only"].type_tag, TypeTag::Float);
    }

    #[test]
    fn test_effective_properties_middle_view() {
        let registry = load(THREE_LEVELS).unwrap();
        let props = registry.effective_properties("test.nodes.Middle").unwrap();
        assert_eq!(props.len(), 3);
        assert!(!props.contains_key("leaf_only"));
    }

    #[test]
    fn test_is_subtype_reflexive_and_transitive() {
        let registry = load(THREE_LEVELS).unwrap();
        assert!(registry.is_subtype("test.nodes.Leaf", "test.nodes.Leaf"));
        assert!(registry.is_subtype("test.nodes.Leaf", "test.nodes.Middle"));
        assert!(registry.is_subtype("test.nodes.Leaf", "test.nodes.Base"));
        assert!(!registry.is_subtype("test.nodes.Base", "test.nodes.Leaf"));
        assert!(!registry.is_subtype("test.nodes.Middle", "test.nodes.Leaf"));
        assert!(!registry.is_subtype("missing.nodes.Type", "test.nodes.Base"));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let result = load("test.nodes.Orphan:\n  derived_from: test.nodes.Missing");
        assert!(matches!(result, Err(TypeError::UnknownParent { .. })));
    }

    #[test]
    fn test_cycle_rejected() {
        let result = load(
            r#"
test.nodes.A:
  derived_from: test.nodes.B
test.nodes.B:
  derived_from: test.nodes.A
"#,
        );
        assert!(matches!(result, Err(TypeError::CycleDetected(_))));
    }

    #[test]
    fn test_cross_kind_inheritance_rejected() {
        let result = load(
            r#"
test.capabilities.Base: ~
test.nodes.Odd:
  derived_from: test.capabilities.Base
"#,
        );
        assert!(matches!(result, Err(TypeError::Malformed { .. })));
    }

    #[test]
    fn test_requirement_shadowing() {
        let registry = load(
            r#"
test.nodes.Base:
  requirements:
    - host:
        capability: test.capabilities.Thing
        occurrences: [0, 1]
test.nodes.Child:
  derived_from: test.nodes.Base
  requirements:
    - host:
        capability: test.capabilities.Other
test.capabilities.Thing: ~
test.capabilities.Other: ~
"#,
        )
        .unwrap();
        let requirements = registry.effective_requirements("test.nodes.Child").unwrap();
        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].capability, "test.capabilities.Other");
        assert_eq!(requirements[0].occurrences, (1, Some(1)));
    }

    #[test]
    fn test_extend_revalidates() {
        let mut registry = load(THREE_LEVELS).unwrap();
        let bad = Value::from_yaml_str("test.nodes.New:\n  derived_from: test.nodes.Gone").unwrap();
        assert!(registry.extend(&bad).is_err());
    }

    #[test]
    fn test_builtin_loads() {
        let registry = TypeRegistry::builtin().unwrap();
        assert!(registry.contains("tosca.nodes.Compute"));
        assert!(registry.contains("tosca.relationships.HostedOn"));
        assert!(registry.is_subtype(
            "tosca.capabilities.Endpoint.Database",
            "tosca.capabilities.Endpoint"
        ));
    }
}
