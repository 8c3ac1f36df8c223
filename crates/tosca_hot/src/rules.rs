//! The data-driven mapping-rules table.
//!
//! Translation is a lookup, not a type switch: every node type maps to a
//! list of resource expansions, found by walking from the node's type
//! towards the root until a mapped ancestor appears. Operators can load
//! their own table from a document and overlay the built-in one.

use indexmap::IndexMap;

use tosca_types::{TypeRegistry, Value};

use crate::error::{TranslateError, TranslateResult};

/// One target resource produced for a node.
#[derive(Debug, Clone, Default)]
pub struct ResourceExpansion {
    /// Heat resource type, e.g. `OS::Nova::Server`.
    pub resource_type: String,
    /// Name suffix for secondary resources; the primary expansion has
    /// none and takes the node template's own name.
    pub suffix: Option<String>,
    /// TOSCA property name → Heat property name.
    pub property_map: IndexMap<String, String>,
    /// Heat properties supplied by the rule itself (values the source
    /// model does not carry).
    pub defaults: IndexMap<String, Value>,
    /// Nest translated node properties under this Heat property.
    pub property_container: Option<String>,
    /// Pass through properties that have no `property_map` entry.
    pub include_unmapped: bool,
    /// Heat property → sibling suffix, filled with `get_resource` of the
    /// sibling expansion ("" names the primary).
    pub sibling_refs: IndexMap<String, String>,
    /// Heat property filled with `get_resource` of the node's HostedOn
    /// target, when one is resolved.
    pub host_ref: Option<String>,
}

impl ResourceExpansion {
    pub fn new(resource_type: impl Into<String>) -> Self {
        ResourceExpansion {
            resource_type: resource_type.into(),
            ..ResourceExpansion::default()
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_default(mut self, property: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(property.into(), value);
        self
    }

    pub fn with_mapped_property(
        mut self,
        tosca_name: impl Into<String>,
        heat_name: impl Into<String>,
    ) -> Self {
        self.property_map.insert(tosca_name.into(), heat_name.into());
        self
    }

    pub fn with_property_container(mut self, container: impl Into<String>) -> Self {
        self.property_container = Some(container.into());
        self
    }

    pub fn with_unmapped_passthrough(mut self) -> Self {
        self.include_unmapped = true;
        self
    }

    pub fn with_sibling_ref(
        mut self,
        property: impl Into<String>,
        sibling_suffix: impl Into<String>,
    ) -> Self {
        self.sibling_refs.insert(property.into(), sibling_suffix.into());
        self
    }

    pub fn with_host_ref(mut self, property: impl Into<String>) -> Self {
        self.host_ref = Some(property.into());
        self
    }
}

/// The full expansion of one node type.
#[derive(Debug, Clone)]
pub struct MappingRule {
    /// Resource expansions, primary first.
    pub expansions: Vec<ResourceExpansion>,
}

/// Target construct for a recognized policy type.
#[derive(Debug, Clone, Default)]
pub struct PolicyMapping {
    pub resource_type: String,
    pub property_map: IndexMap<String, String>,
    pub defaults: IndexMap<String, Value>,
}

/// Mapping table from node type names to resource expansions, plus the
/// policy-construct table and the attribute-name rewrite map used by
/// `get_attribute` translation.
#[derive(Debug, Clone, Default)]
pub struct MappingRules {
    rules: IndexMap<String, MappingRule>,
    policy_rules: IndexMap<String, PolicyMapping>,
    attribute_map: IndexMap<String, String>,
}

impl MappingRules {
    pub fn new() -> Self {
        MappingRules::default()
    }

    /// The built-in table covering the normative node types.
    pub fn builtin() -> Self {
        let mut rules = MappingRules::new();

        rules.insert(
            "tosca.nodes.Compute",
            MappingRule {
                expansions: vec![ResourceExpansion::new("OS::Nova::Server")
                    .with_default("flavor", Value::String("m1.small".to_string()))
                    .with_default("image", Value::String("fedora-software-config".to_string()))],
            },
        );

        // Software layers become a deployment plus its config; the
        // deployment is the primary resource and carries the server link.
        for software_type in [
            "tosca.nodes.SoftwareComponent",
            "tosca.nodes.WebApplication",
            "tosca.nodes.Database",
        ] {
            rules.insert(
                software_type,
                MappingRule {
                    expansions: vec![
                        ResourceExpansion::new("OS::Heat::SoftwareDeployment")
                            .with_sibling_ref("config", "config")
                            .with_host_ref("server")
                            .with_property_container("input_values")
                            .with_unmapped_passthrough(),
                        ResourceExpansion::new("OS::Heat::SoftwareConfig")
                            .with_suffix("config")
                            .with_default("group", Value::String("script".to_string())),
                    ],
                },
            );
        }

        rules.insert(
            "tosca.nodes.BlockStorage",
            MappingRule {
                expansions: vec![ResourceExpansion::new("OS::Cinder::Volume")
                    .with_mapped_property("size", "size")
                    .with_mapped_property("volume_id", "name")],
            },
        );

        rules.insert(
            "tosca.nodes.ObjectStorage",
            MappingRule {
                expansions: vec![ResourceExpansion::new("OS::Swift::Container")
                    .with_mapped_property("name", "name")],
            },
        );

        rules.insert(
            "tosca.nodes.Network",
            MappingRule {
                expansions: vec![
                    ResourceExpansion::new("OS::Neutron::Net")
                        .with_mapped_property("network_name", "name"),
                    ResourceExpansion::new("OS::Neutron::Subnet")
                        .with_suffix("subnet")
                        .with_sibling_ref("network", "")
                        .with_mapped_property("cidr", "cidr")
                        .with_mapped_property("ip_version", "ip_version"),
                ],
            },
        );

        rules.policy_rules.insert(
            "tosca.policies.Scaling".to_string(),
            PolicyMapping {
                resource_type: "OS::Heat::ScalingPolicy".to_string(),
                property_map: IndexMap::from([
                    ("increment".to_string(), "scaling_adjustment".to_string()),
                    ("cooldown".to_string(), "cooldown".to_string()),
                ]),
                defaults: IndexMap::from([(
                    "adjustment_type".to_string(),
                    Value::String("change_in_capacity".to_string()),
                )]),
            },
        );
        rules.policy_rules.insert(
            "tosca.policies.Placement".to_string(),
            PolicyMapping {
                resource_type: "OS::Nova::ServerGroup".to_string(),
                property_map: IndexMap::new(),
                defaults: IndexMap::from([(
                    "policies".to_string(),
                    Value::List(vec![Value::String("affinity".to_string())]),
                )]),
            },
        );

        for (tosca_attr, heat_attr) in [
            ("ip_address", "first_address"),
            ("private_address", "first_address"),
            ("public_address", "first_address"),
        ] {
            rules
                .attribute_map
                .insert(tosca_attr.to_string(), heat_attr.to_string());
        }

        rules
    }

    pub fn insert(&mut self, type_name: impl Into<String>, rule: MappingRule) {
        self.rules.insert(type_name.into(), rule);
    }

    /// Overlay rules loaded from a document onto this table.
    ///
    /// Document shape:
    ///
    /// ```yaml
    /// attribute_map:
    ///   private_address: first_address
    /// rules:
    ///   my.nodes.Queue:
    ///     - resource_type: OS::Zaqar::Queue
    ///       property_map:
    ///         queue_name: name
    ///       defaults:
    ///         ttl: 3600
    /// ```
    pub fn extend_from_document(&mut self, document: &Value) -> TranslateResult<()> {
        let root = document
            .as_map()
            .ok_or_else(|| TranslateError::MalformedRules("document must be a mapping".into()))?;

        if let Some(attrs) = root.get("attribute_map") {
            let attrs = attrs.as_map().ok_or_else(|| {
                TranslateError::MalformedRules("attribute_map must be a mapping".into())
            })?;
            for (tosca_attr, heat_attr) in attrs {
                let heat_attr = heat_attr.as_str().ok_or_else(|| {
                    TranslateError::MalformedRules(format!(
                        "attribute_map entry '{tosca_attr}' must be a string"
                    ))
                })?;
                self.attribute_map
                    .insert(tosca_attr.clone(), heat_attr.to_string());
            }
        }

        if let Some(policies) = root.get("policy_rules") {
            let policies = policies.as_map().ok_or_else(|| {
                TranslateError::MalformedRules("policy_rules must be a mapping".into())
            })?;
            for (type_name, raw) in policies {
                self.policy_rules
                    .insert(type_name.clone(), parse_policy_mapping(type_name, raw)?);
            }
        }

        let Some(rules) = root.get("rules") else {
            return Ok(());
        };
        let rules = rules
            .as_map()
            .ok_or_else(|| TranslateError::MalformedRules("rules must be a mapping".into()))?;
        for (type_name, expansions) in rules {
            let rule = parse_rule(type_name, expansions)?;
            self.rules.insert(type_name.clone(), rule);
        }
        Ok(())
    }

    /// Find the rule for a node type, walking towards the root until a
    /// mapped ancestor appears. Returns the matched type name alongside
    /// the rule.
    pub fn rule_for<'a>(
        &'a self,
        registry: &TypeRegistry,
        type_name: &str,
    ) -> Option<(&'a str, &'a MappingRule)> {
        let chain = registry.parent_chain(type_name).ok()?;
        for entity in chain {
            if let Some((matched, rule)) = self.rules.get_key_value(&entity.name) {
                return Some((matched.as_str(), rule));
            }
        }
        None
    }

    /// Find the policy construct for a policy type, walking towards the
    /// root until a mapped ancestor appears.
    pub fn policy_rule_for<'a>(
        &'a self,
        registry: &TypeRegistry,
        type_name: &str,
    ) -> Option<&'a PolicyMapping> {
        let chain = registry.parent_chain(type_name).ok()?;
        chain
            .iter()
            .find_map(|entity| self.policy_rules.get(&entity.name))
    }

    /// Heat attribute name for a TOSCA attribute, defaulting to identity.
    pub fn attribute<'a>(&'a self, tosca_attr: &'a str) -> &'a str {
        self.attribute_map
            .get(tosca_attr)
            .map(String::as_str)
            .unwrap_or(tosca_attr)
    }
}

fn parse_policy_mapping(type_name: &str, raw: &Value) -> TranslateResult<PolicyMapping> {
    let map = raw.as_map().ok_or_else(|| {
        TranslateError::MalformedRules(format!("policy rule for '{type_name}' must be a mapping"))
    })?;
    let resource_type = map
        .get("resource_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            TranslateError::MalformedRules(format!(
                "policy rule for '{type_name}' is missing resource_type"
            ))
        })?;
    let mut mapping = PolicyMapping {
        resource_type: resource_type.to_string(),
        ..PolicyMapping::default()
    };
    if let Some(pairs) = map.get("property_map").and_then(|v| v.as_map()) {
        for (tosca_name, heat_name) in pairs {
            let heat_name = heat_name.as_str().ok_or_else(|| {
                TranslateError::MalformedRules(format!(
                    "property_map entry '{tosca_name}' for '{type_name}' must be a string"
                ))
            })?;
            mapping
                .property_map
                .insert(tosca_name.clone(), heat_name.to_string());
        }
    }
    if let Some(defaults) = map.get("defaults").and_then(|v| v.as_map()) {
        mapping.defaults = defaults.clone();
    }
    Ok(mapping)
}

fn parse_rule(type_name: &str, raw: &Value) -> TranslateResult<MappingRule> {
    let entries = raw.as_list().ok_or_else(|| {
        TranslateError::MalformedRules(format!("rule for '{type_name}' must be a list"))
    })?;
    if entries.is_empty() {
        return Err(TranslateError::MalformedRules(format!(
            "rule for '{type_name}' has no expansions"
        )));
    }

    let mut expansions = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let map = entry.as_map().ok_or_else(|| {
            TranslateError::MalformedRules(format!(
                "expansion {index} for '{type_name}' must be a mapping"
            ))
        })?;
        let resource_type = map
            .get("resource_type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                TranslateError::MalformedRules(format!(
                    "expansion {index} for '{type_name}' is missing resource_type"
                ))
            })?;

        let mut expansion = ResourceExpansion::new(resource_type);
        expansion.suffix = map
            .get("suffix")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        if index == 0 && expansion.suffix.is_some() {
            return Err(TranslateError::MalformedRules(format!(
                "primary expansion for '{type_name}' must not declare a suffix"
            )));
        }
        if let Some(pairs) = map.get("property_map").and_then(|v| v.as_map()) {
            for (tosca_name, heat_name) in pairs {
                let heat_name = heat_name.as_str().ok_or_else(|| {
                    TranslateError::MalformedRules(format!(
                        "property_map entry '{tosca_name}' for '{type_name}' must be a string"
                    ))
                })?;
                expansion
                    .property_map
                    .insert(tosca_name.clone(), heat_name.to_string());
            }
        }
        if let Some(defaults) = map.get("defaults").and_then(|v| v.as_map()) {
            expansion.defaults = defaults.clone();
        }
        expansion.property_container = map
            .get("property_container")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        expansion.include_unmapped = map
            .get("include_unmapped")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if let Some(refs) = map.get("sibling_refs").and_then(|v| v.as_map()) {
            for (property, suffix) in refs {
                let suffix = suffix.as_str().ok_or_else(|| {
                    TranslateError::MalformedRules(format!(
                        "sibling_refs entry '{property}' for '{type_name}' must be a string"
                    ))
                })?;
                expansion
                    .sibling_refs
                    .insert(property.clone(), suffix.to_string());
            }
        }
        expansion.host_ref = map
            .get("host_ref")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        expansions.push(expansion);
    }
    Ok(MappingRule { expansions })
}
