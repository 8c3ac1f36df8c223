//! The parsed service template model.
//!
//! Parsing establishes structural correctness only: sections have the
//! right shape, node types exist in the registry, names are unique.
//! Property values are bound to their schemas later, by the validator,
//! so one run can report every problem in a template at once.

use indexmap::IndexMap;
use tracing::debug;

use tosca_types::{EntityKind, PropertySchema, TypeRegistry, Value};

use crate::error::ModelError;
use crate::expr::Expr;

/// A requirement assignment on a node template.
///
/// The shorthand form `- host: some_name` leaves the intent of `some_name`
/// open (node template or capability type); the resolver decides. The long
/// form names the pieces explicitly.
#[derive(Debug, Clone)]
pub struct RequirementAssignment {
    pub name: String,
    /// Shorthand target: a node template name or capability type name.
    pub target: Option<String>,
    /// Explicit target node template.
    pub node: Option<String>,
    /// Explicit capability type or capability name on the target.
    pub capability: Option<String>,
    /// Relationship type override.
    pub relationship: Option<String>,
}

/// One declared node in the topology.
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    pub name: String,
    pub type_name: String,
    pub properties: IndexMap<String, Expr>,
    pub requirements: Vec<RequirementAssignment>,
    /// Capability property overrides: capability name → property → value.
    pub capabilities: IndexMap<String, IndexMap<String, Expr>>,
    /// Interface assignments, kept as raw values; the validator checks the
    /// interface names against the registry.
    pub interfaces: IndexMap<String, Value>,
}

/// A declared template output.
#[derive(Debug, Clone)]
pub struct OutputDef {
    pub name: String,
    pub description: Option<String>,
    pub value: Expr,
}

/// A named group of node templates.
#[derive(Debug, Clone)]
pub struct GroupDef {
    pub name: String,
    pub type_name: String,
    pub members: Vec<String>,
    pub properties: IndexMap<String, Expr>,
}

/// A policy applied to node templates or groups.
#[derive(Debug, Clone)]
pub struct PolicyDef {
    pub name: String,
    pub type_name: String,
    pub targets: Vec<String>,
    pub properties: IndexMap<String, Expr>,
}

/// The parsed, typed representation of one service template.
#[derive(Debug)]
pub struct TemplateModel {
    pub version: String,
    pub description: Option<String>,
    pub inputs: IndexMap<String, PropertySchema>,
    pub node_templates: IndexMap<String, NodeTemplate>,
    pub groups: IndexMap<String, GroupDef>,
    pub policies: IndexMap<String, PolicyDef>,
    pub outputs: IndexMap<String, OutputDef>,
}

impl TemplateModel {
    /// Parse a decoded service template document against the registry.
    ///
    /// All structural errors are collected and returned together.
    pub fn parse(document: &Value, registry: &TypeRegistry) -> Result<TemplateModel, ModelError> {
        let root = document.as_map().ok_or_else(|| ModelError::MalformedSection {
            section: "template".to_string(),
            message: "document root must be a mapping".to_string(),
        })?;

        let mut errors = Vec::new();

        let version = match root
            .get("tosca_definitions_version")
            .and_then(|v| v.as_str())
        {
            Some(version) => version.to_string(),
            None => {
                errors.push(ModelError::MissingSection(
                    "tosca_definitions_version".to_string(),
                ));
                String::new()
            }
        };

        let mut model = TemplateModel {
            version,
            description: root
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            inputs: IndexMap::new(),
            node_templates: IndexMap::new(),
            groups: IndexMap::new(),
            policies: IndexMap::new(),
            outputs: IndexMap::new(),
        };

        if let Some(section) = root.get("inputs") {
            parse_inputs(section, &mut model, &mut errors);
        }
        if let Some(section) = root.get("node_templates") {
            parse_node_templates(section, registry, &mut model, &mut errors);
        }
        if let Some(section) = root.get("groups") {
            parse_groups(section, registry, &mut model, &mut errors);
        }
        if let Some(section) = root.get("policies") {
            parse_policies(section, registry, &mut model, &mut errors);
        }
        if let Some(section) = root.get("outputs") {
            parse_outputs(section, &mut model, &mut errors);
        }

        match errors.len() {
            0 => {
                debug!(
                    "Parsed template: {} inputs, {} node templates, {} outputs",
                    model.inputs.len(),
                    model.node_templates.len(),
                    model.outputs.len()
                );
                Ok(model)
            }
            1 => Err(errors.remove(0)),
            _ => Err(ModelError::Collected(errors)),
        }
    }

    pub fn node(&self, name: &str) -> Option<&NodeTemplate> {
        self.node_templates.get(name)
    }
}

fn parse_inputs(section: &Value, model: &mut TemplateModel, errors: &mut Vec<ModelError>) {
    let Some(entries) = section.as_map() else {
        errors.push(ModelError::MalformedSection {
            section: "inputs".to_string(),
            message: "must be a mapping".to_string(),
        });
        return;
    };
    for (name, raw) in entries {
        match PropertySchema::from_value("inputs", name, raw) {
            Ok(schema) => {
                if model.inputs.insert(name.clone(), schema).is_some() {
                    errors.push(ModelError::DuplicateName {
                        section: "inputs".to_string(),
                        name: name.clone(),
                    });
                }
            }
            Err(e) => errors.push(ModelError::MalformedSection {
                section: "inputs".to_string(),
                message: e.to_string(),
            }),
        }
    }
}

fn parse_node_templates(
    section: &Value,
    registry: &TypeRegistry,
    model: &mut TemplateModel,
    errors: &mut Vec<ModelError>,
) {
    let Some(entries) = section.as_map() else {
        errors.push(ModelError::MalformedSection {
            section: "node_templates".to_string(),
            message: "must be a mapping".to_string(),
        });
        return;
    };
    for (name, raw) in entries {
        match parse_node_template(name, raw, registry) {
            Ok(node) => {
                if model.node_templates.insert(name.clone(), node).is_some() {
                    errors.push(ModelError::DuplicateName {
                        section: "node_templates".to_string(),
                        name: name.clone(),
                    });
                }
            }
            Err(e) => errors.push(e),
        }
    }
}

fn parse_node_template(
    name: &str,
    raw: &Value,
    registry: &TypeRegistry,
) -> Result<NodeTemplate, ModelError> {
    let malformed = |message: String| ModelError::MalformedSection {
        section: format!("node_templates.{name}"),
        message,
    };

    let map = raw
        .as_map()
        .ok_or_else(|| malformed("must be a mapping".to_string()))?;
    let type_name = map
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing node type".to_string()))?;

    if registry.get_kind(type_name, EntityKind::Node).is_none() {
        return Err(ModelError::UnknownNodeType {
            node: name.to_string(),
            type_name: type_name.to_string(),
        });
    }

    let mut properties = IndexMap::new();
    if let Some(block) = map.get("properties").and_then(|v| v.as_map()) {
        for (prop_name, value) in block {
            let expr = Expr::parse(value)
                .map_err(|e| malformed(format!("property '{prop_name}': {e}")))?;
            properties.insert(prop_name.clone(), expr);
        }
    }

    let mut requirements = Vec::new();
    if let Some(entries) = map.get("requirements").and_then(|v| v.as_list()) {
        for entry in entries {
            requirements.push(parse_requirement(name, entry)?);
        }
    }

    let mut capabilities = IndexMap::new();
    if let Some(block) = map.get("capabilities").and_then(|v| v.as_map()) {
        for (cap_name, cap_raw) in block {
            let overrides = cap_raw
                .as_map()
                .and_then(|m| m.get("properties"))
                .and_then(|v| v.as_map());
            let mut parsed = IndexMap::new();
            if let Some(overrides) = overrides {
                for (prop_name, value) in overrides {
                    let expr = Expr::parse(value).map_err(|e| {
                        malformed(format!("capability '{cap_name}' property '{prop_name}': {e}"))
                    })?;
                    parsed.insert(prop_name.clone(), expr);
                }
            }
            capabilities.insert(cap_name.clone(), parsed);
        }
    }

    let interfaces = map
        .get("interfaces")
        .and_then(|v| v.as_map())
        .cloned()
        .unwrap_or_default();

    Ok(NodeTemplate {
        name: name.to_string(),
        type_name: type_name.to_string(),
        properties,
        requirements,
        capabilities,
        interfaces,
    })
}

fn parse_requirement(node: &str, entry: &Value) -> Result<RequirementAssignment, ModelError> {
    let malformed = |message: String| ModelError::MalformedSection {
        section: format!("node_templates.{node}.requirements"),
        message,
    };

    let map = entry
        .as_map()
        .filter(|m| m.len() == 1)
        .ok_or_else(|| malformed("requirement entry must be a single-key mapping".to_string()))?;
    let (name, body) = map.iter().next().expect("len checked above");

    if let Some(target) = body.as_str() {
        return Ok(RequirementAssignment {
            name: name.clone(),
            target: Some(target.to_string()),
            node: None,
            capability: None,
            relationship: None,
        });
    }

    let body = body
        .as_map()
        .ok_or_else(|| malformed(format!("requirement '{name}' must be a name or mapping")))?;
    let field = |key: &str| body.get(key).and_then(|v| v.as_str()).map(str::to_string);
    Ok(RequirementAssignment {
        name: name.clone(),
        target: None,
        node: field("node"),
        capability: field("capability"),
        relationship: field("relationship"),
    })
}

fn parse_groups(
    section: &Value,
    registry: &TypeRegistry,
    model: &mut TemplateModel,
    errors: &mut Vec<ModelError>,
) {
    let Some(entries) = section.as_map() else {
        errors.push(ModelError::MalformedSection {
            section: "groups".to_string(),
            message: "must be a mapping".to_string(),
        });
        return;
    };
    for (name, raw) in entries {
        match parse_group(name, raw, registry) {
            Ok(group) => {
                if model.groups.insert(name.clone(), group).is_some() {
                    errors.push(ModelError::DuplicateName {
                        section: "groups".to_string(),
                        name: name.clone(),
                    });
                }
            }
            Err(e) => errors.push(e),
        }
    }
}

fn parse_group(name: &str, raw: &Value, registry: &TypeRegistry) -> Result<GroupDef, ModelError> {
    let malformed = |message: String| ModelError::MalformedSection {
        section: format!("groups.{name}"),
        message,
    };
    let map = raw
        .as_map()
        .ok_or_else(|| malformed("must be a mapping".to_string()))?;
    let type_name = map
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("tosca.groups.Root");
    if registry.get_kind(type_name, EntityKind::Group).is_none() {
        return Err(ModelError::UnknownEntityType {
            section: "group".to_string(),
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
    }
    let members = map
        .get("members")
        .and_then(|v| v.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(GroupDef {
        name: name.to_string(),
        type_name: type_name.to_string(),
        members,
        properties: parse_property_block(map, &malformed)?,
    })
}

fn parse_policies(
    section: &Value,
    registry: &TypeRegistry,
    model: &mut TemplateModel,
    errors: &mut Vec<ModelError>,
) {
    let Some(entries) = section.as_map() else {
        errors.push(ModelError::MalformedSection {
            section: "policies".to_string(),
            message: "must be a mapping".to_string(),
        });
        return;
    };
    for (name, raw) in entries {
        match parse_policy(name, raw, registry) {
            Ok(policy) => {
                if model.policies.insert(name.clone(), policy).is_some() {
                    errors.push(ModelError::DuplicateName {
                        section: "policies".to_string(),
                        name: name.clone(),
                    });
                }
            }
            Err(e) => errors.push(e),
        }
    }
}

fn parse_policy(name: &str, raw: &Value, registry: &TypeRegistry) -> Result<PolicyDef, ModelError> {
    let malformed = |message: String| ModelError::MalformedSection {
        section: format!("policies.{name}"),
        message,
    };
    let map = raw
        .as_map()
        .ok_or_else(|| malformed("must be a mapping".to_string()))?;
    let type_name = map
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing policy type".to_string()))?;
    if registry.get_kind(type_name, EntityKind::Policy).is_none() {
        return Err(ModelError::UnknownEntityType {
            section: "policy".to_string(),
            name: name.to_string(),
            type_name: type_name.to_string(),
        });
    }
    let targets = map
        .get("targets")
        .and_then(|v| v.as_list())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok(PolicyDef {
        name: name.to_string(),
        type_name: type_name.to_string(),
        targets,
        properties: parse_property_block(map, &malformed)?,
    })
}

fn parse_property_block(
    map: &IndexMap<String, Value>,
    malformed: &dyn Fn(String) -> ModelError,
) -> Result<IndexMap<String, Expr>, ModelError> {
    let mut properties = IndexMap::new();
    if let Some(block) = map.get("properties").and_then(|v| v.as_map()) {
        for (prop_name, value) in block {
            let expr = Expr::parse(value)
                .map_err(|e| malformed(format!("property '{prop_name}': {e}")))?;
            properties.insert(prop_name.clone(), expr);
        }
    }
    Ok(properties)
}

fn parse_outputs(section: &Value, model: &mut TemplateModel, errors: &mut Vec<ModelError>) {
    let Some(entries) = section.as_map() else {
        errors.push(ModelError::MalformedSection {
            section: "outputs".to_string(),
            message: "must be a mapping".to_string(),
        });
        return;
    };
    for (name, raw) in entries {
        let Some(map) = raw.as_map() else {
            errors.push(ModelError::MalformedSection {
                section: "outputs".to_string(),
                message: format!("output '{name}' must be a mapping"),
            });
            continue;
        };
        let Some(value) = map.get("value") else {
            errors.push(ModelError::MalformedSection {
                section: "outputs".to_string(),
                message: format!("output '{name}' is missing a value"),
            });
            continue;
        };
        match Expr::parse(value) {
            Ok(expr) => {
                let output = OutputDef {
                    name: name.clone(),
                    description: map
                        .get("description")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    value: expr,
                };
                if model.outputs.insert(name.clone(), output).is_some() {
                    errors.push(ModelError::DuplicateName {
                        section: "outputs".to_string(),
                        name: name.clone(),
                    });
                }
            }
            Err(e) => errors.push(ModelError::MalformedSection {
                section: "outputs".to_string(),
                message: format!("output '{name}': {e}"),
            }),
        }
    }
}
