//! Requirement resolution: building the relationship graph.
//!
//! Every requirement declared on a node template is matched against the
//! capabilities the other node templates offer. Matching uses the
//! registry's subtype queries, honors occurrence ranges, and breaks ties
//! among equally suitable implicit candidates by template declaration
//! order, so resolution output is deterministic across runs.

use indexmap::IndexMap;
use tracing::debug;

use tosca_types::{EntityKind, RequirementDefinition, TypeRegistry};

use crate::error::{ResolveError, ResolveErrors};
use crate::expr::Expr;
use crate::template::{NodeTemplate, RequirementAssignment, TemplateModel};

/// A realized capability on a node template: the capability type's
/// defaults, the node type's fixed values, and the template's overrides,
/// merged in that order.
#[derive(Debug, Clone)]
pub struct Capability {
    pub name: String,
    pub type_name: String,
    pub node: String,
    pub properties: IndexMap<String, Expr>,
}

/// A resolved, typed edge from a requirement to a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub type_name: String,
    pub source: String,
    pub target: String,
    pub requirement: String,
    pub capability: String,
}

/// The template model plus its resolved relationship graph. Immutable
/// once resolution has produced it.
#[derive(Debug)]
pub struct ResolvedGraph {
    pub model: TemplateModel,
    /// Realized capabilities per node template, in declaration order.
    pub capabilities: IndexMap<String, Vec<Capability>>,
    pub relationships: Vec<Relationship>,
}

impl ResolvedGraph {
    pub fn capabilities_of(&self, node: &str) -> &[Capability] {
        self.capabilities
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn relationships_from<'a>(
        &'a self,
        source: &'a str,
    ) -> impl Iterator<Item = &'a Relationship> {
        self.relationships.iter().filter(move |r| r.source == source)
    }
}

/// The requirement resolver.
pub struct Resolver;

impl Resolver {
    /// Resolve every requirement in the model, collecting all failures so
    /// the template author gets a complete report in one run.
    pub fn resolve(
        model: TemplateModel,
        registry: &TypeRegistry,
    ) -> Result<ResolvedGraph, ResolveErrors> {
        let mut errors = Vec::new();

        let capabilities = realize_capabilities(&model, registry, &mut errors);

        let mut relationships = Vec::new();
        for (source, node) in &model.node_templates {
            let declared = match registry.effective_requirements(&node.type_name) {
                Ok(declared) => declared,
                Err(e) => {
                    errors.push(ResolveError::Unresolved {
                        node: source.clone(),
                        requirement: "<type>".to_string(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            for assignment in &node.requirements {
                match resolve_requirement(
                    node,
                    assignment,
                    &declared,
                    &model,
                    &capabilities,
                    registry,
                ) {
                    Ok(edges) => relationships.extend(edges),
                    Err(e) => errors.push(e),
                }
            }
        }

        if errors.is_empty() {
            debug!(
                "Resolved {} relationship(s) across {} node template(s)",
                relationships.len(),
                model.node_templates.len()
            );
            Ok(ResolvedGraph {
                model,
                capabilities,
                relationships,
            })
        } else {
            Err(ResolveErrors { errors })
        }
    }
}

/// Merge each node's effective capability definitions into realized
/// capabilities, applying template overrides.
fn realize_capabilities(
    model: &TemplateModel,
    registry: &TypeRegistry,
    errors: &mut Vec<ResolveError>,
) -> IndexMap<String, Vec<Capability>> {
    let mut realized = IndexMap::new();
    for (name, node) in &model.node_templates {
        let mut capabilities = Vec::new();
        let definitions = match registry.effective_capabilities(&node.type_name) {
            Ok(definitions) => definitions,
            Err(e) => {
                errors.push(ResolveError::Unresolved {
                    node: name.clone(),
                    requirement: "<capabilities>".to_string(),
                    message: e.to_string(),
                });
                realized.insert(name.clone(), capabilities);
                continue;
            }
        };

        for (cap_name, definition) in definitions {
            let mut properties: IndexMap<String, Expr> = IndexMap::new();

            // Schema defaults from the capability type.
            if let Ok(schema) = registry.effective_properties(&definition.type_name) {
                for (prop, prop_schema) in schema {
                    if let Some(default) = prop_schema.default {
                        properties.insert(prop, Expr::Literal(default));
                    }
                }
            } else {
                errors.push(ResolveError::Unresolved {
                    node: name.clone(),
                    requirement: format!("<capability {cap_name}>"),
                    message: format!("unknown capability type {}", definition.type_name),
                });
            }

            // Fixed values from the declaring node type.
            for (prop, value) in &definition.properties {
                properties.insert(prop.clone(), Expr::Literal(value.clone()));
            }

            // Template overrides.
            if let Some(overrides) = node.capabilities.get(&cap_name) {
                for (prop, expr) in overrides {
                    properties.insert(prop.clone(), expr.clone());
                }
            }

            capabilities.push(Capability {
                name: cap_name,
                type_name: definition.type_name,
                node: name.clone(),
                properties,
            });
        }
        realized.insert(name.clone(), capabilities);
    }
    realized
}

fn resolve_requirement(
    node: &NodeTemplate,
    assignment: &RequirementAssignment,
    declared: &[RequirementDefinition],
    model: &TemplateModel,
    capabilities: &IndexMap<String, Vec<Capability>>,
    registry: &TypeRegistry,
) -> Result<Vec<Relationship>, ResolveError> {
    let unresolved = |message: String| ResolveError::Unresolved {
        node: node.name.clone(),
        requirement: assignment.name.clone(),
        message,
    };

    let definition = declared
        .iter()
        .find(|d| d.name == assignment.name)
        .ok_or_else(|| {
            unresolved(format!(
                "not declared by node type {}",
                node.type_name
            ))
        })?;

    // The capability field of a long-form assignment may name a capability
    // type, or a capability on the target node.
    let mut required_type = definition.capability.clone();
    let mut capability_filter = None;
    if let Some(capability) = &assignment.capability {
        if registry.get_kind(capability, EntityKind::Capability).is_some() {
            required_type = capability.clone();
        } else {
            capability_filter = Some(capability.clone());
        }
    }

    // Untangle the shorthand target: node template, capability type, or
    // genuinely ambiguous.
    let mut explicit_target = assignment.node.clone();
    if explicit_target.is_none() {
        if let Some(target) = &assignment.target {
            let names_node = model.node_templates.contains_key(target);
            let names_capability = registry
                .get_kind(target, EntityKind::Capability)
                .is_some();
            match (names_node, names_capability) {
                (true, true) => {
                    return Err(ResolveError::Ambiguous {
                        node: node.name.clone(),
                        requirement: assignment.name.clone(),
                        message: format!(
                            "'{target}' names both a node template and a capability type"
                        ),
                    })
                }
                (true, false) => explicit_target = Some(target.clone()),
                (false, true) => required_type = target.clone(),
                (false, false) => {
                    return Err(unresolved(format!(
                        "targets unknown name '{target}'"
                    )))
                }
            }
        }
    }

    if !registry.contains(&required_type) {
        return Err(unresolved(format!(
            "requires unknown capability type '{required_type}'"
        )));
    }

    let relationship_type = resolve_relationship_type(
        node,
        assignment,
        definition,
        &required_type,
        registry,
    )?;

    let edge = |target: &str, capability: &str| Relationship {
        type_name: relationship_type.clone(),
        source: node.name.clone(),
        target: target.to_string(),
        requirement: assignment.name.clone(),
        capability: capability.to_string(),
    };

    // Explicit target: the named node must offer a conforming capability.
    if let Some(target) = explicit_target {
        let offered = capabilities.get(&target).map(Vec::as_slice).unwrap_or_default();
        let matched = offered
            .iter()
            .filter(|c| {
                capability_filter
                    .as_ref()
                    .map_or(true, |wanted| &c.name == wanted)
            })
            .find(|c| registry.is_subtype(&c.type_name, &required_type));
        return match matched {
            Some(capability) => Ok(vec![edge(&target, &capability.name)]),
            None => Err(ResolveError::CapabilityMismatch {
                node: node.name.clone(),
                requirement: assignment.name.clone(),
                target,
                capability_type: required_type,
            }),
        };
    }

    // Implicit: scan the other node templates in declaration order.
    // Candidates whose capability type matches exactly rank ahead of
    // subtype matches; within a rank, declaration order decides.
    let mut candidates: Vec<(u8, &str, &str)> = Vec::new();
    for (candidate_name, candidate) in &model.node_templates {
        if candidate_name == &node.name {
            continue;
        }
        if let Some(node_filter) = &definition.node {
            if !registry.is_subtype(&candidate.type_name, node_filter) {
                continue;
            }
        }
        let offered = capabilities
            .get(candidate_name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let conforming = offered.iter().filter(|c| {
            capability_filter
                .as_ref()
                .map_or(true, |wanted| &c.name == wanted)
                && registry.is_subtype(&c.type_name, &required_type)
        });
        // First exact-type match wins; otherwise the first subtype match.
        let mut best: Option<(u8, &Capability)> = None;
        for capability in conforming {
            let rank = u8::from(capability.type_name != required_type);
            if best.map_or(true, |(prior, _)| rank < prior) {
                best = Some((rank, capability));
            }
            if rank == 0 {
                break;
            }
        }
        if let Some((rank, capability)) = best {
            candidates.push((rank, candidate_name.as_str(), capability.name.as_str()));
        }
    }
    candidates.sort_by_key(|(rank, _, _)| *rank);

    let (min, max) = definition.occurrences;
    if (candidates.len() as u32) < min {
        return Err(unresolved(format!(
            "{} matching node(s) found, requirement occurrences demand at least {min}",
            candidates.len()
        )));
    }
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let take = match max {
        Some(max) => max as usize,
        None => candidates.len(),
    };
    if candidates.len() > take {
        debug!(
            "Node '{}' requirement '{}': {} candidates, keeping the first {} in declaration order",
            node.name,
            assignment.name,
            candidates.len(),
            take
        );
    }
    Ok(candidates
        .into_iter()
        .take(take)
        .map(|(_, target, capability)| edge(target, capability))
        .collect())
}

fn resolve_relationship_type(
    node: &NodeTemplate,
    assignment: &RequirementAssignment,
    definition: &RequirementDefinition,
    required_type: &str,
    registry: &TypeRegistry,
) -> Result<String, ResolveError> {
    let name = assignment
        .relationship
        .clone()
        .or_else(|| definition.relationship.clone())
        .unwrap_or_else(|| default_relationship_for(required_type, registry));
    if registry.get_kind(&name, EntityKind::Relationship).is_none() {
        return Err(ResolveError::Unresolved {
            node: node.name.clone(),
            requirement: assignment.name.clone(),
            message: format!("unknown relationship type '{name}'"),
        });
    }
    Ok(name)
}

/// Default relationship type implied by the required capability type.
fn default_relationship_for(capability_type: &str, registry: &TypeRegistry) -> String {
    const DEFAULTS: [(&str, &str); 4] = [
        ("tosca.capabilities.Container", "tosca.relationships.HostedOn"),
        ("tosca.capabilities.Endpoint", "tosca.relationships.ConnectsTo"),
        ("tosca.capabilities.Attachment", "tosca.relationships.AttachesTo"),
        (
            "tosca.capabilities.network.Linkable",
            "tosca.relationships.network.LinksTo",
        ),
    ];
    for (capability, relationship) in DEFAULTS {
        if registry.is_subtype(capability_type, capability) {
            return relationship.to_string();
        }
    }
    "tosca.relationships.DependsOn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateModel;
    use tosca_types::Value;

    fn resolve(source: &str) -> Result<ResolvedGraph, ResolveErrors> {
        let registry = TypeRegistry::builtin().unwrap();
        let model =
            TemplateModel::parse(&Value::from_yaml_str(source).unwrap(), &registry).unwrap();
        Resolver::resolve(model, &registry)
    }

    #[test]
    fn test_explicit_target_produces_one_relationship() {
        let graph = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  server:
    type: tosca.nodes.Compute
  dbms:
    type: tosca.nodes.DBMS
    requirements:
      - host: server
"#,
        )
        .unwrap();
        assert_eq!(graph.relationships.len(), 1);
        let edge = &graph.relationships[0];
        assert_eq!(edge.type_name, "tosca.relationships.HostedOn");
        assert_eq!(edge.source, "dbms");
        assert_eq!(edge.target, "server");
        assert_eq!(edge.capability, "host");
    }

    #[test]
    fn test_capability_type_mismatch_is_reported() {
        let result = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  other_db:
    type: tosca.nodes.Database
  dbms:
    type: tosca.nodes.DBMS
    requirements:
      - host: other_db
"#,
        );
        let errors = result.unwrap_err().errors;
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            ResolveError::CapabilityMismatch {
                node,
                requirement,
                target,
                capability_type,
            } => {
                assert_eq!(node, "dbms");
                assert_eq!(requirement, "host");
                assert_eq!(target, "other_db");
                assert_eq!(capability_type, "tosca.capabilities.Container");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_implicit_tie_breaks_by_declaration_order() {
        let graph = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  first_server:
    type: tosca.nodes.Compute
  second_server:
    type: tosca.nodes.Compute
  dbms:
    type: tosca.nodes.DBMS
    requirements:
      - host:
          capability: tosca.capabilities.Container
"#,
        )
        .unwrap();
        assert_eq!(graph.relationships.len(), 1);
        assert_eq!(graph.relationships[0].target, "first_server");
    }

    #[test]
    fn test_implicit_resolution_is_deterministic() {
        let source = r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  alpha:
    type: tosca.nodes.Compute
  beta:
    type: tosca.nodes.Compute
  dbms:
    type: tosca.nodes.DBMS
    requirements:
      - host:
          capability: tosca.capabilities.Container
"#;
        let first = resolve(source).unwrap();
        let second = resolve(source).unwrap();
        assert_eq!(first.relationships, second.relationships);
    }

    #[test]
    fn test_unresolved_requirement_is_reported() {
        let result = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  dbms:
    type: tosca.nodes.DBMS
    requirements:
      - host: missing_server
"#,
        );
        let errors = result.unwrap_err().errors;
        assert!(matches!(errors[0], ResolveError::Unresolved { .. }));
    }

    #[test]
    fn test_all_failures_collected_in_one_pass() {
        let result = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  dbms:
    type: tosca.nodes.DBMS
    requirements:
      - host: missing_server
  web:
    type: tosca.nodes.WebApplication
    requirements:
      - host: another_missing
"#,
        );
        assert_eq!(result.unwrap_err().errors.len(), 2);
    }

    #[test]
    fn test_ambiguous_shorthand_target() {
        // A node template deliberately named like a capability type.
        let result = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  tosca.capabilities.Container:
    type: tosca.nodes.Compute
  dbms:
    type: tosca.nodes.DBMS
    requirements:
      - host: tosca.capabilities.Container
"#,
        );
        let errors = result.unwrap_err().errors;
        assert!(matches!(errors[0], ResolveError::Ambiguous { .. }));
    }

    #[test]
    fn test_optional_requirement_without_candidates() {
        // `dependency` has occurrences [0, UNBOUNDED]; with no other node
        // offering the capability the result is zero edges, not an error.
        let graph = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  lonely:
    type: tosca.nodes.Compute
    requirements:
      - dependency: tosca.capabilities.Node
"#,
        )
        .unwrap();
        assert!(graph.relationships.is_empty());
    }

    #[test]
    fn test_unbounded_requirement_matches_all_candidates() {
        let graph = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  app:
    type: tosca.nodes.SoftwareComponent
    requirements:
      - dependency:
          capability: tosca.capabilities.Node
  first:
    type: tosca.nodes.Compute
  second:
    type: tosca.nodes.Compute
"#,
        )
        .unwrap();
        let targets: Vec<&str> = graph
            .relationships_from("app")
            .map(|r| r.target.as_str())
            .collect();
        assert_eq!(targets, vec!["first", "second"]);
    }

    #[test]
    fn test_capability_overrides_reach_realized_capability() {
        let graph = resolve(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  db:
    type: tosca.nodes.Database
    capabilities:
      database_endpoint:
        properties:
          port: 3306
"#,
        )
        .unwrap();
        let endpoint = graph
            .capabilities_of("db")
            .iter()
            .find(|c| c.name == "database_endpoint")
            .unwrap();
        assert_eq!(
            endpoint.properties["port"],
            Expr::Literal(Value::Integer(3306))
        );
        // Default from the capability type schema survives the merge.
        assert_eq!(
            endpoint.properties["protocol"],
            Expr::Literal(Value::String("tcp".to_string()))
        );
    }
}
