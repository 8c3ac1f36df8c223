//! Translation of the resolved graph into Heat resources.
//!
//! Each node expands into one or more resources according to the mapping
//! rules; every intrinsic function in a property or output value is
//! rewritten into its Heat equivalent. Relationship edges surface as
//! `depends_on` entries on the source node's primary resource.

use indexmap::IndexMap;
use tracing::{debug, warn};

use tosca_model::{Expr, ResolvedGraph};
use tosca_model::expr::SELF_REF;
use tosca_types::{TypeRegistry, Value};

use crate::error::{TranslateError, TranslateResult};
use crate::rules::MappingRules;

/// One translated Heat resource. Never mutated after translation.
#[derive(Debug, Clone)]
pub struct TranslatedResource {
    pub name: String,
    pub resource_type: String,
    pub properties: IndexMap<String, Value>,
    pub depends_on: Vec<String>,
}

/// One translated Heat output.
#[derive(Debug, Clone)]
pub struct TranslatedOutput {
    pub name: String,
    pub description: Option<String>,
    pub value: Value,
}

/// The translator's result, consumed by the output builder.
#[derive(Debug)]
pub struct Translation {
    pub resources: Vec<TranslatedResource>,
    pub outputs: Vec<TranslatedOutput>,
}

/// The graph-to-resources translator.
pub struct Translator;

impl Translator {
    /// Translate every node and output of the resolved graph.
    ///
    /// Fails with [`TranslateError::UnsupportedType`] when a node's type
    /// has no mapping rule; unmappable nodes are never silently dropped.
    pub fn translate(
        graph: &ResolvedGraph,
        rules: &MappingRules,
        registry: &TypeRegistry,
    ) -> TranslateResult<Translation> {
        let rewriter = Rewriter {
            graph,
            rules,
            registry,
        };

        let mut resources = Vec::new();
        for (name, node) in &graph.model.node_templates {
            let (matched, rule) = rules.rule_for(registry, &node.type_name).ok_or_else(|| {
                TranslateError::UnsupportedType {
                    node: name.clone(),
                    type_name: node.type_name.clone(),
                }
            })?;
            debug!("Expanding node '{}' via rule for {}", name, matched);

            // Relationship edges become depends_on on the primary resource,
            // naming each target's primary resource.
            let mut depends_on: Vec<String> = Vec::new();
            for relationship in graph.relationships_from(name) {
                if !depends_on.contains(&relationship.target) {
                    depends_on.push(relationship.target.clone());
                }
            }

            for (index, expansion) in rule.expansions.iter().enumerate() {
                let resource_name = match &expansion.suffix {
                    None => name.clone(),
                    Some(suffix) => format!("{name}_{suffix}"),
                };
                let mut properties = expansion.defaults.clone();

                for (property, sibling_suffix) in &expansion.sibling_refs {
                    let sibling = if sibling_suffix.is_empty() {
                        name.clone()
                    } else {
                        format!("{name}_{sibling_suffix}")
                    };
                    properties.insert(
                        property.clone(),
                        intrinsic("get_resource", Value::String(sibling)),
                    );
                }

                if let Some(host_property) = &expansion.host_ref {
                    if let Some(host) = hosted_target(graph, registry, name) {
                        properties.insert(
                            host_property.clone(),
                            intrinsic("get_resource", Value::String(host)),
                        );
                    }
                }

                let mut translated: IndexMap<String, Value> = IndexMap::new();
                for (prop_name, expr) in &node.properties {
                    let heat_name = match expansion.property_map.get(prop_name) {
                        Some(mapped) => mapped.clone(),
                        None if expansion.include_unmapped => prop_name.clone(),
                        None => {
                            debug!(
                                "Node '{}': property '{}' has no mapping for {}",
                                name, prop_name, expansion.resource_type
                            );
                            continue;
                        }
                    };
                    let mut visiting = Vec::new();
                    let value = rewriter.rewrite(expr, Some(name.as_str()), &mut visiting)?;
                    translated.insert(heat_name, value);
                }
                if !translated.is_empty() {
                    match &expansion.property_container {
                        Some(container) => {
                            properties.insert(container.clone(), Value::Map(translated));
                        }
                        None => properties.extend(translated),
                    }
                }

                resources.push(TranslatedResource {
                    name: resource_name,
                    resource_type: expansion.resource_type.clone(),
                    properties,
                    depends_on: if index == 0 {
                        depends_on.clone()
                    } else {
                        Vec::new()
                    },
                });
            }
        }

        // Policies attached to groups or nodes become their recognized Heat
        // constructs; unrecognized policy types are advisory and skipped.
        for (name, policy) in &graph.model.policies {
            let Some(mapping) = rules.policy_rule_for(registry, &policy.type_name) else {
                warn!(
                    "Policy '{}' of type {} has no target construct, skipped",
                    name, policy.type_name
                );
                continue;
            };
            let mut properties = mapping.defaults.clone();
            for (prop_name, expr) in &policy.properties {
                let Some(heat_name) = mapping.property_map.get(prop_name) else {
                    debug!("Policy '{}': property '{}' has no mapping", name, prop_name);
                    continue;
                };
                let mut visiting = Vec::new();
                properties.insert(heat_name.clone(), rewriter.rewrite(expr, None, &mut visiting)?);
            }

            // The policy depends on the primary resource of every node it
            // governs; group targets expand to their members.
            let mut depends_on: Vec<String> = Vec::new();
            for target in &policy.targets {
                let nodes: Vec<&String> = match graph.model.groups.get(target) {
                    Some(group) => group.members.iter().collect(),
                    None => vec![target],
                };
                for node in nodes {
                    if graph.model.node_templates.contains_key(node)
                        && !depends_on.contains(node)
                    {
                        depends_on.push(node.clone());
                    }
                }
            }

            resources.push(TranslatedResource {
                name: name.clone(),
                resource_type: mapping.resource_type.clone(),
                properties,
                depends_on,
            });
        }

        let mut outputs = Vec::new();
        for (name, output) in &graph.model.outputs {
            let mut visiting = Vec::new();
            let value = rewriter.rewrite(&output.value, None, &mut visiting)?;
            outputs.push(TranslatedOutput {
                name: name.clone(),
                description: output.description.clone(),
                value,
            });
        }

        debug!(
            "Translated {} resource(s) and {} output(s)",
            resources.len(),
            outputs.len()
        );
        Ok(Translation { resources, outputs })
    }
}

/// Primary resource of the node's HostedOn target, if one was resolved.
fn hosted_target(graph: &ResolvedGraph, registry: &TypeRegistry, node: &str) -> Option<String> {
    graph
        .relationships_from(node)
        .find(|r| registry.is_subtype(&r.type_name, "tosca.relationships.HostedOn"))
        .map(|r| r.target.clone())
}

fn intrinsic(function: &str, argument: Value) -> Value {
    let mut call = IndexMap::with_capacity(1);
    call.insert(function.to_string(), argument);
    Value::Map(call)
}

/// Rewrites TOSCA intrinsic expression trees into Heat intrinsics.
struct Rewriter<'a> {
    graph: &'a ResolvedGraph,
    rules: &'a MappingRules,
    registry: &'a TypeRegistry,
}

impl Rewriter<'_> {
    fn rewrite(
        &self,
        expr: &Expr,
        context: Option<&str>,
        visiting: &mut Vec<(String, String)>,
    ) -> TranslateResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::GetInput(input) => Ok(intrinsic("get_param", Value::String(input.clone()))),
            Expr::GetAttribute { node, attribute } => {
                let target = self.deref_target(node, context);
                let heat_attribute = self.rules.attribute(attribute);
                Ok(intrinsic(
                    "get_attr",
                    Value::List(vec![
                        Value::String(target),
                        Value::String(heat_attribute.to_string()),
                    ]),
                ))
            }
            Expr::GetProperty { node, path } => {
                let target = self.deref_target(node, context);
                self.resolve_property(&target, path, visiting)
            }
            Expr::Concat(items) => {
                let joined = items
                    .iter()
                    .map(|item| self.rewrite(item, context, visiting))
                    .collect::<TranslateResult<Vec<_>>>()?;
                Ok(intrinsic(
                    "list_join",
                    Value::List(vec![Value::String(String::new()), Value::List(joined)]),
                ))
            }
            Expr::List(items) => {
                let rewritten = items
                    .iter()
                    .map(|item| self.rewrite(item, context, visiting))
                    .collect::<TranslateResult<Vec<_>>>()?;
                Ok(Value::List(rewritten))
            }
            Expr::Map(entries) => {
                let mut rewritten = IndexMap::with_capacity(entries.len());
                for (key, entry) in entries {
                    rewritten.insert(key.clone(), self.rewrite(entry, context, visiting)?);
                }
                Ok(Value::Map(rewritten))
            }
        }
    }

    fn deref_target(&self, node: &str, context: Option<&str>) -> String {
        if node == SELF_REF {
            context.unwrap_or(node).to_string()
        } else {
            node.to_string()
        }
    }

    /// `get_property` resolution: inline the value when it is statically
    /// known (following references through the target's own expressions),
    /// otherwise fall back to a cross-resource attribute reference.
    fn resolve_property(
        &self,
        target: &str,
        path: &[String],
        visiting: &mut Vec<(String, String)>,
    ) -> TranslateResult<Value> {
        let property = path.first().map(String::as_str).unwrap_or_default();
        let fallback = || {
            intrinsic(
                "get_attr",
                Value::List(vec![
                    Value::String(target.to_string()),
                    Value::String(property.to_string()),
                ]),
            )
        };

        let Some(template) = self.graph.model.node(target) else {
            return Ok(fallback());
        };

        let key = (target.to_string(), property.to_string());
        if visiting.contains(&key) {
            return Err(TranslateError::PropertyCycle {
                node: target.to_string(),
                property: property.to_string(),
            });
        }

        let resolved = match template.properties.get(property) {
            Some(expr) => {
                visiting.push(key);
                let value = self.rewrite(expr, Some(target), visiting)?;
                visiting.pop();
                value
            }
            None => {
                // A schema default is as statically known as a literal.
                let schema = self.registry.effective_properties(&template.type_name)?;
                match schema.get(property).and_then(|s| s.default.clone()) {
                    Some(default) => default,
                    None => return Ok(fallback()),
                }
            }
        };

        // Navigate any remaining path segments into the resolved value.
        let mut cursor = resolved;
        for segment in &path[1..] {
            let Some(next) = cursor.as_map().and_then(|m| m.get(segment)).cloned() else {
                return Ok(fallback());
            };
            cursor = next;
        }
        Ok(cursor)
    }
}
