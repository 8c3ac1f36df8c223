//! Whole-graph validation.
//!
//! Validation is a separate pass over the fully resolved graph. It never
//! aborts: every check appends a finding tagged `Error` or `Warning`, so a
//! template author sees all problems in one run. Whether an `Error`
//! finding stops translation is the caller's policy.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use tosca_types::{Constraint, EntityKind, TypeRegistry, TypeTag, Value};

use crate::expr::{Expr, SELF_REF};
use crate::resolver::ResolvedGraph;

/// Finding severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation finding, attributed to a node and field path.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFinding {
    pub node: String,
    pub field_path: String,
    pub severity: Severity,
    pub message: String,
}

impl std::fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}.{}: {}",
            self.severity, self.node, self.field_path, self.message
        )
    }
}

/// Accumulated result of a validation pass, in deterministic order: node
/// declaration order first, then field path.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn errors(&self) -> Vec<&ValidationFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationFinding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    fn push(&mut self, node: &str, path: String, severity: Severity, message: String) {
        self.findings.push(ValidationFinding {
            node: node.to_string(),
            field_path: path,
            severity,
            message,
        });
    }

    fn error(&mut self, node: &str, path: String, message: String) {
        self.push(node, path, Severity::Error, message);
    }

    fn warning(&mut self, node: &str, path: String, message: String) {
        self.push(node, path, Severity::Warning, message);
    }
}

/// The template validator.
pub struct Validator;

impl Validator {
    /// Validate the resolved graph against the effective type schemas.
    pub fn validate(graph: &ResolvedGraph, registry: &TypeRegistry) -> ValidationReport {
        let mut report = ValidationReport::default();

        check_inputs(graph, registry, &mut report);
        for (name, node) in &graph.model.node_templates {
            check_node(name, node, graph, registry, &mut report);
        }
        check_groups(graph, registry, &mut report);
        check_policies(graph, registry, &mut report);
        check_outputs(graph, &mut report);

        debug!(
            "Validation produced {} finding(s), {} error(s)",
            report.findings.len(),
            report.errors().len()
        );
        report
    }
}

fn check_inputs(graph: &ResolvedGraph, registry: &TypeRegistry, report: &mut ValidationReport) {
    for (name, schema) in &graph.model.inputs {
        if let Some(default) = &schema.default {
            let path = format!("{name}.default");
            if check_value(
                "inputs",
                &path,
                default,
                &schema.type_tag,
                schema.entry_schema.as_ref(),
                registry,
                report,
            ) {
                check_constraints("inputs", &path, default, &schema.constraints, report);
            }
        }
    }
}

fn check_node(
    name: &str,
    node: &crate::template::NodeTemplate,
    graph: &ResolvedGraph,
    registry: &TypeRegistry,
    report: &mut ValidationReport,
) {
    // (a) required properties present, (b) types conform, (c) constraints hold
    check_typed_properties(name, &node.type_name, &node.properties, graph, registry, report);

    // (d) capability overrides follow the capability type's schema
    for (cap_name, overrides) in &node.capabilities {
        let path = format!("capabilities.{cap_name}");
        let Some(capability) = graph
            .capabilities_of(name)
            .iter()
            .find(|c| &c.name == cap_name)
        else {
            report.error(
                name,
                path,
                format!("capability not defined by type {}", node.type_name),
            );
            continue;
        };
        let cap_schema = match registry.effective_properties(&capability.type_name) {
            Ok(cap_schema) => cap_schema,
            Err(e) => {
                report.error(name, path, e.to_string());
                continue;
            }
        };
        for (prop_name, expr) in overrides {
            let path = format!("capabilities.{cap_name}.{prop_name}");
            let Some(prop_schema) = cap_schema.get(prop_name) else {
                report.warning(
                    name,
                    path,
                    format!(
                        "property not defined by capability type {}",
                        capability.type_name
                    ),
                );
                continue;
            };
            match expr.as_value() {
                Some(value) => {
                    if check_value(
                        name,
                        &path,
                        &value,
                        &prop_schema.type_tag,
                        prop_schema.entry_schema.as_ref(),
                        registry,
                        report,
                    ) {
                        check_constraints(name, &path, &value, &prop_schema.constraints, report);
                    }
                }
                None => check_references(name, &path, expr, graph, registry, true, report),
            }
        }
    }

    check_interfaces(name, node, registry, report);
}

fn check_interfaces(
    name: &str,
    node: &crate::template::NodeTemplate,
    registry: &TypeRegistry,
    report: &mut ValidationReport,
) {
    let effective = registry
        .effective_interfaces(&node.type_name)
        .unwrap_or_default();
    for (iface_name, body) in &node.interfaces {
        let path = format!("interfaces.{iface_name}");
        let resolved = effective.iter().find(|full| {
            *full == iface_name || full.rsplit('.').next() == Some(iface_name.as_str())
        });
        let Some(full_name) = resolved else {
            report.error(
                name,
                path,
                format!("interface not declared by type {}", node.type_name),
            );
            continue;
        };
        let operations = registry
            .get_kind(full_name, EntityKind::Interface)
            .map(|t| t.operations.clone())
            .unwrap_or_default();
        if operations.is_empty() {
            continue;
        }
        if let Some(assigned) = body.as_map() {
            for op in assigned.keys() {
                if !operations.contains(op) {
                    report.warning(
                        name,
                        format!("interfaces.{iface_name}.{op}"),
                        format!("operation not declared by interface {full_name}"),
                    );
                }
            }
        }
    }
}

fn check_groups(graph: &ResolvedGraph, registry: &TypeRegistry, report: &mut ValidationReport) {
    for (name, group) in &graph.model.groups {
        for member in &group.members {
            if !graph.model.node_templates.contains_key(member) {
                report.error(
                    name,
                    "members".to_string(),
                    format!("member '{member}' is not a node template"),
                );
            }
        }
        check_typed_properties(name, &group.type_name, &group.properties, graph, registry, report);
    }
}

fn check_policies(graph: &ResolvedGraph, registry: &TypeRegistry, report: &mut ValidationReport) {
    for (name, policy) in &graph.model.policies {
        for target in &policy.targets {
            let known = graph.model.node_templates.contains_key(target)
                || graph.model.groups.contains_key(target);
            if !known {
                report.error(
                    name,
                    "targets".to_string(),
                    format!("target '{target}' is neither a node template nor a group"),
                );
            }
        }
        check_typed_properties(
            name,
            &policy.type_name,
            &policy.properties,
            graph,
            registry,
            report,
        );
    }
}

/// Property checks shared by groups and policies: same rules as node
/// properties, against the declaring type's effective schema.
fn check_typed_properties(
    name: &str,
    type_name: &str,
    properties: &IndexMap<String, Expr>,
    graph: &ResolvedGraph,
    registry: &TypeRegistry,
    report: &mut ValidationReport,
) {
    let schema = match registry.effective_properties(type_name) {
        Ok(schema) => schema,
        Err(e) => {
            report.error(name, "type".to_string(), e.to_string());
            return;
        }
    };
    for (prop_name, prop_schema) in &schema {
        if prop_schema.required
            && prop_schema.default.is_none()
            && !properties.contains_key(prop_name)
        {
            report.error(
                name,
                format!("properties.{prop_name}"),
                "missing required property".to_string(),
            );
        }
    }
    for (prop_name, expr) in properties {
        let path = format!("properties.{prop_name}");
        let Some(prop_schema) = schema.get(prop_name) else {
            report.warning(name, path, format!("property not defined by type {type_name}"));
            continue;
        };
        match expr.as_value() {
            Some(value) => {
                if check_value(
                    name,
                    &path,
                    &value,
                    &prop_schema.type_tag,
                    prop_schema.entry_schema.as_ref(),
                    registry,
                    report,
                ) {
                    check_constraints(name, &path, &value, &prop_schema.constraints, report);
                }
            }
            None => check_references(name, &path, expr, graph, registry, true, report),
        }
    }
}

fn check_outputs(graph: &ResolvedGraph, report: &mut ValidationReport) {
    for (name, output) in &graph.model.outputs {
        let path = format!("{name}.value");
        let mut callback = |expr: &Expr| {
            reference_finding("outputs", &path, expr, graph, false, report);
        };
        output.value.visit_intrinsics(&mut callback);
    }
}

/// Check intrinsic references inside a non-literal value.
fn check_references(
    node: &str,
    path: &str,
    expr: &Expr,
    graph: &ResolvedGraph,
    registry: &TypeRegistry,
    allow_self: bool,
    report: &mut ValidationReport,
) {
    let mut callback = |intrinsic: &Expr| {
        reference_finding(node, path, intrinsic, graph, allow_self, report);
        // Soft checks on the referenced member names.
        match intrinsic {
            Expr::GetAttribute {
                node: target,
                attribute,
            } => {
                if let Some(template) = resolve_target(node, target, graph, allow_self) {
                    if let Ok(attrs) = registry.effective_attributes(&template.type_name) {
                        if !attrs.contains_key(attribute) {
                            report.warning(
                                node,
                                path.to_string(),
                                format!(
                                    "attribute '{attribute}' not defined by type {}",
                                    template.type_name
                                ),
                            );
                        }
                    }
                }
            }
            Expr::GetProperty {
                node: target,
                path: prop_path,
            } => {
                if let (Some(template), Some(first)) = (
                    resolve_target(node, target, graph, allow_self),
                    prop_path.first(),
                ) {
                    if let Ok(props) = registry.effective_properties(&template.type_name) {
                        if !props.contains_key(first) {
                            report.warning(
                                node,
                                path.to_string(),
                                format!(
                                    "property '{first}' not defined by type {}",
                                    template.type_name
                                ),
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    };
    expr.visit_intrinsics(&mut callback);
}

fn resolve_target<'a>(
    node: &str,
    target: &str,
    graph: &'a ResolvedGraph,
    allow_self: bool,
) -> Option<&'a crate::template::NodeTemplate> {
    if target == SELF_REF {
        if allow_self {
            graph.model.node(node)
        } else {
            None
        }
    } else {
        graph.model.node(target)
    }
}

/// The hard reference checks shared by node properties and outputs.
fn reference_finding(
    node: &str,
    path: &str,
    intrinsic: &Expr,
    graph: &ResolvedGraph,
    allow_self: bool,
    report: &mut ValidationReport,
) {
    match intrinsic {
        Expr::GetInput(input) => {
            if !graph.model.inputs.contains_key(input) {
                report.error(
                    node,
                    path.to_string(),
                    format!("get_input references undeclared input '{input}'"),
                );
            }
        }
        Expr::GetProperty { node: target, .. } | Expr::GetAttribute { node: target, .. } => {
            let known = (target == SELF_REF && allow_self)
                || graph.model.node_templates.contains_key(target);
            if !known {
                report.error(
                    node,
                    path.to_string(),
                    format!("references unknown node template '{target}'"),
                );
            }
        }
        _ => {}
    }
}

/// Type-conformance check, recursing into named data types. Returns
/// whether the value's own shape conforms, so callers can skip
/// constraint checks on already-mistyped values.
fn check_value(
    node: &str,
    path: &str,
    value: &Value,
    tag: &TypeTag,
    entry: Option<&TypeTag>,
    registry: &TypeRegistry,
    report: &mut ValidationReport,
) -> bool {
    match tag {
        TypeTag::Named(type_name) => {
            let Some(_) = registry.get_kind(type_name, EntityKind::Data) else {
                report.error(
                    node,
                    path.to_string(),
                    format!("unknown data type '{type_name}'"),
                );
                return false;
            };
            let Some(fields) = value.as_map() else {
                report.error(
                    node,
                    path.to_string(),
                    format!("expected {type_name}, got {}", value.type_of()),
                );
                return false;
            };
            check_data_type(node, path, type_name, fields, registry, report);
            true
        }
        TypeTag::List => match value.as_list() {
            Some(items) => {
                if let Some(entry_tag) = entry {
                    for (index, item) in items.iter().enumerate() {
                        let item_path = format!("{path}[{index}]");
                        check_value(node, &item_path, item, entry_tag, None, registry, report);
                    }
                }
                true
            }
            None => {
                report.error(
                    node,
                    path.to_string(),
                    format!("expected list, got {}", value.type_of()),
                );
                false
            }
        },
        TypeTag::Map => match value.as_map() {
            Some(entries) => {
                if let Some(entry_tag) = entry {
                    for (key, item) in entries {
                        let item_path = format!("{path}.{key}");
                        check_value(node, &item_path, item, entry_tag, None, registry, report);
                    }
                }
                true
            }
            None => {
                report.error(
                    node,
                    path.to_string(),
                    format!("expected map, got {}", value.type_of()),
                );
                false
            }
        },
        primitive => {
            if primitive.accepts(value) {
                true
            } else {
                report.error(
                    node,
                    path.to_string(),
                    format!("expected {primitive}, got {}", value.type_of()),
                );
                false
            }
        }
    }
}

fn check_data_type(
    node: &str,
    path: &str,
    type_name: &str,
    fields: &IndexMap<String, Value>,
    registry: &TypeRegistry,
    report: &mut ValidationReport,
) {
    let schema = match registry.effective_properties(type_name) {
        Ok(schema) => schema,
        Err(e) => {
            report.error(node, path.to_string(), e.to_string());
            return;
        }
    };
    for (field_name, field_schema) in &schema {
        if field_schema.required
            && field_schema.default.is_none()
            && !fields.contains_key(field_name)
        {
            report.error(
                node,
                format!("{path}.{field_name}"),
                format!("missing required field of {type_name}"),
            );
        }
    }
    for (field_name, field_value) in fields {
        let field_path = format!("{path}.{field_name}");
        let Some(field_schema) = schema.get(field_name) else {
            report.warning(
                node,
                field_path,
                format!("field not defined by data type {type_name}"),
            );
            continue;
        };
        if check_value(
            node,
            &field_path,
            field_value,
            &field_schema.type_tag,
            field_schema.entry_schema.as_ref(),
            registry,
            report,
        ) {
            check_constraints(node, &field_path, field_value, &field_schema.constraints, report);
        }
    }
}

fn check_constraints(
    node: &str,
    path: &str,
    value: &Value,
    constraints: &[Constraint],
    report: &mut ValidationReport,
) {
    for constraint in constraints {
        if let Err(message) = constraint.check(value) {
            report.error(node, path.to_string(), message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use crate::template::TemplateModel;

    fn validate(source: &str) -> ValidationReport {
        let registry = TypeRegistry::builtin().unwrap();
        let model =
            TemplateModel::parse(&Value::from_yaml_str(source).unwrap(), &registry).unwrap();
        let graph = Resolver::resolve(model, &registry).unwrap();
        Validator::validate(&graph, &registry)
    }

    fn validate_with(defs: &str, source: &str) -> ValidationReport {
        let mut registry = TypeRegistry::builtin().unwrap();
        registry
            .extend(&Value::from_yaml_str(defs).unwrap())
            .unwrap();
        let model =
            TemplateModel::parse(&Value::from_yaml_str(source).unwrap(), &registry).unwrap();
        let graph = Resolver::resolve(model, &registry).unwrap();
        Validator::validate(&graph, &registry)
    }

    const SIZED_TYPE: &str = r#"
test.nodes.Sized:
  derived_from: tosca.nodes.Root
  properties:
    size:
      type: integer
      constraints:
        - in_range: [1, 100]
    label:
      type: string
      required: false
"#;

    #[test]
    fn test_missing_required_property_is_an_error() {
        let report = validate_with(
            SIZED_TYPE,
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  box:
    type: test.nodes.Sized
"#,
        );
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].node, "box");
        assert_eq!(errors[0].field_path, "properties.size");
    }

    #[test]
    fn test_conforming_node_yields_no_errors() {
        let report = validate_with(
            SIZED_TYPE,
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  box:
    type: test.nodes.Sized
    properties:
      size: 10
      label: crate
"#,
        );
        assert!(!report.has_errors());
        assert!(report.is_empty());
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let report = validate_with(
            SIZED_TYPE,
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  box:
    type: test.nodes.Sized
    properties:
      size: not-a-number
"#,
        );
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("expected integer"));
    }

    #[test]
    fn test_constraint_violation_is_reported() {
        let report = validate_with(
            SIZED_TYPE,
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  box:
    type: test.nodes.Sized
    properties:
      size: 500
"#,
        );
        assert!(report.has_errors());
        assert!(report.errors()[0].message.contains("violates"));
    }

    #[test]
    fn test_unknown_property_is_a_warning() {
        let report = validate_with(
            SIZED_TYPE,
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  box:
    type: test.nodes.Sized
    properties:
      size: 10
      mystery: true
"#,
        );
        assert!(!report.has_errors());
        assert_eq!(report.warnings().len(), 1);
    }

    #[test]
    fn test_undeclared_input_reference_is_an_error() {
        let report = validate_with(
            SIZED_TYPE,
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  box:
    type: test.nodes.Sized
    properties:
      size:
        get_input: missing_input
"#,
        );
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("missing_input"));
    }

    #[test]
    fn test_capability_override_constraint() {
        let report = validate(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  db:
    type: tosca.nodes.Database
    capabilities:
      database_endpoint:
        properties:
          port: 123456
"#,
        );
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field_path, "capabilities.database_endpoint.port");
    }

    #[test]
    fn test_output_referencing_unknown_node_is_an_error() {
        let report = validate(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  server:
    type: tosca.nodes.Compute
outputs:
  address:
    value:
      get_attribute: [ghost, public_address]
"#,
        );
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].node, "outputs");
        assert_eq!(errors[0].field_path, "address.value");
    }

    #[test]
    fn test_data_type_validated_recursively() {
        let report = validate_with(
            r#"
test.nodes.Secured:
  derived_from: tosca.nodes.Root
  properties:
    credential:
      type: tosca.datatypes.Credential
"#,
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  vault:
    type: test.nodes.Secured
    properties:
      credential:
        user: admin
"#,
        );
        // `token` is required by tosca.datatypes.Credential.
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field_path, "properties.credential.token");
    }

    #[test]
    fn test_input_default_checked_against_constraints() {
        let report = validate(
            r#"
tosca_definitions_version: tosca_simple_1.0
inputs:
  cpus:
    type: integer
    default: 3
    constraints:
      - valid_values: [1, 2, 4, 8]
"#,
        );
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].node, "inputs");
        assert_eq!(errors[0].field_path, "cpus.default");
    }

    #[test]
    fn test_group_with_unknown_member_is_an_error() {
        let report = validate(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  server:
    type: tosca.nodes.Compute
groups:
  servers:
    type: tosca.groups.Root
    members: [server, ghost]
"#,
        );
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].node, "servers");
        assert!(errors[0].message.contains("ghost"));
    }

    #[test]
    fn test_policy_target_and_properties_checked() {
        let report = validate(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  server:
    type: tosca.nodes.Compute
policies:
  scale_out:
    type: tosca.policies.Scaling
    targets: [nowhere]
    properties:
      increment: not-a-number
"#,
        );
        let errors = report.errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field_path, "targets");
        assert_eq!(errors[1].field_path, "properties.increment");
    }

    #[test]
    fn test_conforming_group_and_policy_validate_cleanly() {
        let report = validate(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  server:
    type: tosca.nodes.Compute
groups:
  servers:
    members: [server]
policies:
  scale_out:
    type: tosca.policies.Scaling
    targets: [servers]
    properties:
      increment: 2
      cooldown: 120
"#,
        );
        assert!(report.is_empty(), "unexpected findings: {:?}", report.findings);
    }

    #[test]
    fn test_unknown_interface_is_an_error() {
        let report = validate(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  server:
    type: tosca.nodes.Compute
    interfaces:
      NoSuchInterface:
        create: setup.sh
"#,
        );
        assert!(report.has_errors());
    }

    #[test]
    fn test_lifecycle_interface_accepted_by_short_name() {
        let report = validate(
            r#"
tosca_definitions_version: tosca_simple_1.0
node_templates:
  server:
    type: tosca.nodes.Compute
    interfaces:
      Lifecycle:
        create: setup.sh
        configure: configure.sh
"#,
        );
        assert!(!report.has_errors());
        assert!(report.is_empty());
    }
}
