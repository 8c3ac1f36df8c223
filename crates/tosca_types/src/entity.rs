//! Entity type records.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{TypeError, TypeResult};
use crate::schema::{
    AttributeSchema, CapabilityDefinition, PropertySchema, RequirementDefinition,
};
use crate::value::Value;

/// The namespace an entity type belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Node,
    Capability,
    Relationship,
    Data,
    Interface,
    Group,
    Policy,
}

impl EntityKind {
    /// Infer the kind from a TOSCA type name. Type names carry their
    /// namespace segment (`tosca.nodes.Compute`, `my.capabilities.Queue`).
    pub fn from_type_name(name: &str) -> TypeResult<EntityKind> {
        let segment = |s: &str| name.contains(&format!(".{s}."));
        if segment("nodes") {
            Ok(EntityKind::Node)
        } else if segment("capabilities") {
            Ok(EntityKind::Capability)
        } else if segment("relationships") {
            Ok(EntityKind::Relationship)
        } else if segment("datatypes") {
            Ok(EntityKind::Data)
        } else if segment("interfaces") {
            Ok(EntityKind::Interface)
        } else if segment("groups") {
            Ok(EntityKind::Group)
        } else if segment("policies") {
            Ok(EntityKind::Policy)
        } else {
            Err(TypeError::UnknownKind(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Capability => "capability",
            EntityKind::Relationship => "relationship",
            EntityKind::Data => "data",
            EntityKind::Interface => "interface",
            EntityKind::Group => "group",
            EntityKind::Policy => "policy",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entity type definition as loaded from a type definition document.
///
/// Fields that are not meaningful for a kind stay empty (a relationship
/// type has no capabilities, an interface type only has operations).
/// Schema lookups that must see the whole ancestor chain go through
/// [`crate::TypeRegistry`], never through a single record.
#[derive(Debug, Clone, Serialize)]
pub struct EntityType {
    pub name: String,
    pub kind: EntityKind,
    pub derived_from: Option<String>,
    pub description: Option<String>,
    pub properties: IndexMap<String, PropertySchema>,
    pub attributes: IndexMap<String, AttributeSchema>,
    pub capabilities: IndexMap<String, CapabilityDefinition>,
    pub requirements: Vec<RequirementDefinition>,
    /// Interface type names declared on a node type.
    pub interfaces: Vec<String>,
    /// Operation names, for interface types.
    pub operations: Vec<String>,
}

impl EntityType {
    /// Parse a `type-name: {derived_from, properties, ...}` definition.
    pub fn from_value(name: &str, value: &Value) -> TypeResult<EntityType> {
        let kind = EntityKind::from_type_name(name)?;
        let map = match value {
            Value::Null => return Ok(EntityType::empty(name, kind)),
            other => other.as_map().ok_or_else(|| TypeError::Malformed {
                type_name: name.to_string(),
                message: "definition must be a mapping".to_string(),
            })?,
        };

        let mut entity = EntityType::empty(name, kind);
        entity.derived_from = map
            .get("derived_from")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        entity.description = map
            .get("description")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        if let Some(block) = map.get("properties").and_then(|v| v.as_map()) {
            for (prop_name, raw) in block {
                entity.properties.insert(
                    prop_name.clone(),
                    PropertySchema::from_value(name, prop_name, raw)?,
                );
            }
        }
        if let Some(block) = map.get("attributes").and_then(|v| v.as_map()) {
            for (attr_name, raw) in block {
                entity.attributes.insert(
                    attr_name.clone(),
                    AttributeSchema::from_value(name, attr_name, raw)?,
                );
            }
        }
        if let Some(block) = map.get("capabilities").and_then(|v| v.as_map()) {
            for (cap_name, raw) in block {
                entity.capabilities.insert(
                    cap_name.clone(),
                    CapabilityDefinition::from_value(name, cap_name, raw)?,
                );
            }
        }
        if let Some(entries) = map.get("requirements").and_then(|v| v.as_list()) {
            for entry in entries {
                entity
                    .requirements
                    .push(RequirementDefinition::from_entry(name, entry)?);
            }
        }
        entity.interfaces = name_list(map.get("interfaces"));
        entity.operations = name_list(map.get("operations"));

        Ok(entity)
    }

    fn empty(name: &str, kind: EntityKind) -> EntityType {
        EntityType {
            name: name.to_string(),
            kind,
            derived_from: None,
            description: None,
            properties: IndexMap::new(),
            attributes: IndexMap::new(),
            capabilities: IndexMap::new(),
            requirements: Vec::new(),
            interfaces: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Whether this is a root type (no parent).
    pub fn is_root(&self) -> bool {
        self.derived_from.is_none()
    }
}

fn name_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_inference() {
        assert_eq!(
            EntityKind::from_type_name("tosca.nodes.Compute").unwrap(),
            EntityKind::Node
        );
        assert_eq!(
            EntityKind::from_type_name("tosca.capabilities.Endpoint.Database").unwrap(),
            EntityKind::Capability
        );
        assert_eq!(
            EntityKind::from_type_name("tosca.relationships.HostedOn").unwrap(),
            EntityKind::Relationship
        );
        assert!(EntityKind::from_type_name("something.else").is_err());
    }

    #[test]
    fn test_parse_node_type() {
        let doc = Value::from_yaml_str(
            r#"
derived_from: tosca.nodes.Root
properties:
  port:
    type: integer
    required: false
capabilities:
  host:
    type: tosca.capabilities.Container
requirements:
  - host:
      capability: tosca.capabilities.Container
      relationship: tosca.relationships.HostedOn
interfaces: [tosca.interfaces.node.Lifecycle]
"#,
        )
        .unwrap();
        let entity = EntityType::from_value("tosca.nodes.DBMS", &doc).unwrap();
        assert_eq!(entity.kind, EntityKind::Node);
        assert_eq!(entity.derived_from.as_deref(), Some("tosca.nodes.Root"));
        assert!(entity.properties.contains_key("port"));
        assert_eq!(entity.capabilities["host"].type_name, "tosca.capabilities.Container");
        assert_eq!(entity.requirements[0].name, "host");
        assert_eq!(entity.interfaces, vec!["tosca.interfaces.node.Lifecycle"]);
    }

    #[test]
    fn test_parse_empty_root() {
        let entity = EntityType::from_value("tosca.relationships.Root", &Value::Null).unwrap();
        assert!(entity.is_root());
        assert_eq!(entity.kind, EntityKind::Relationship);
    }
}
