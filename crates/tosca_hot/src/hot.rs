//! The Heat Orchestration Template document model.
//!
//! A purely structural assembly: sections are insertion-ordered mappings,
//! ready for an external serializer (`serde_yaml::to_string` or
//! `serde_json`). No pretty-printing concerns live here.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use tosca_types::{Constraint, PropertySchema, TypeTag, Value};

use crate::error::{TranslateError, TranslateResult};
use crate::translator::{TranslatedOutput, TranslatedResource, Translation};

/// The Heat template version tag emitted in every document.
pub const HEAT_TEMPLATE_VERSION: &str = "2013-05-23";

/// A parameter in the `parameters` section.
#[derive(Debug, Clone, Serialize)]
pub struct HotParameter {
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Value>,
}

impl HotParameter {
    /// Convert a template input declaration into a Heat parameter.
    pub fn from_input(schema: &PropertySchema) -> HotParameter {
        HotParameter {
            param_type: heat_parameter_type(&schema.type_tag).to_string(),
            description: schema.description.clone(),
            default: schema.default.clone(),
            constraints: schema
                .constraints
                .iter()
                .filter_map(heat_constraint)
                .collect(),
        }
    }
}

/// Heat parameter type for a TOSCA type tag.
fn heat_parameter_type(tag: &TypeTag) -> &'static str {
    match tag {
        TypeTag::String => "string",
        TypeTag::Integer | TypeTag::Float => "number",
        TypeTag::Boolean => "boolean",
        TypeTag::List => "comma_delimited_list",
        TypeTag::Map | TypeTag::Named(_) => "json",
    }
}

/// Heat constraint clause for a TOSCA constraint, where one exists.
fn heat_constraint(constraint: &Constraint) -> Option<Value> {
    let clause = |name: &str, body: Value| {
        let mut map = IndexMap::with_capacity(1);
        map.insert(name.to_string(), body);
        Some(Value::Map(map))
    };
    let bounds = |min: Option<&Value>, max: Option<&Value>| {
        let mut map = IndexMap::new();
        if let Some(min) = min {
            map.insert("min".to_string(), min.clone());
        }
        if let Some(max) = max {
            map.insert("max".to_string(), max.clone());
        }
        Value::Map(map)
    };

    match constraint {
        Constraint::InRange { min, max } => clause("range", bounds(Some(min), Some(max))),
        Constraint::GreaterOrEqual(min) => clause("range", bounds(Some(min), None)),
        Constraint::LessOrEqual(max) => clause("range", bounds(None, Some(max))),
        Constraint::ValidValues(values) => {
            clause("allowed_values", Value::List(values.clone()))
        }
        Constraint::Length(len) => {
            let len = Value::Integer(*len as i64);
            clause("length", bounds(Some(&len), Some(&len)))
        }
        Constraint::MinLength(min) => {
            clause("length", bounds(Some(&Value::Integer(*min as i64)), None))
        }
        Constraint::MaxLength(max) => {
            clause("length", bounds(None, Some(&Value::Integer(*max as i64))))
        }
        Constraint::Pattern(pattern) => {
            clause("allowed_pattern", Value::String(pattern.clone()))
        }
        // Strict and exclusive bounds have no Heat counterpart.
        Constraint::Equal(_) | Constraint::GreaterThan(_) | Constraint::LessThan(_) => {
            debug!("Constraint {constraint:?} has no Heat counterpart, dropped");
            None
        }
    }
}

/// A resource in the `resources` section.
#[derive(Debug, Clone, Serialize)]
pub struct HotResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub properties: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl From<TranslatedResource> for HotResource {
    fn from(resource: TranslatedResource) -> HotResource {
        HotResource {
            resource_type: resource.resource_type,
            properties: resource.properties,
            depends_on: resource.depends_on,
        }
    }
}

/// An output in the `outputs` section.
#[derive(Debug, Clone, Serialize)]
pub struct HotOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: Value,
}

/// A complete Heat Orchestration Template.
#[derive(Debug, Serialize)]
pub struct HotTemplate {
    pub heat_template_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: IndexMap<String, HotParameter>,
    pub resources: IndexMap<String, HotResource>,
    pub outputs: IndexMap<String, HotOutput>,
}

impl HotTemplate {
    /// Assemble the output document from translated resources and outputs
    /// plus the template's declared inputs.
    ///
    /// Preserves insertion order throughout and fails with
    /// [`TranslateError::NameCollision`] when two resource expansions
    /// produce the same name.
    pub fn build(
        inputs: &IndexMap<String, PropertySchema>,
        translation: Translation,
        description: Option<String>,
    ) -> TranslateResult<HotTemplate> {
        let mut parameters = IndexMap::with_capacity(inputs.len());
        for (name, schema) in inputs {
            parameters.insert(name.clone(), HotParameter::from_input(schema));
        }

        let mut resources = IndexMap::with_capacity(translation.resources.len());
        for resource in translation.resources {
            let name = resource.name.clone();
            if resources.insert(name.clone(), HotResource::from(resource)).is_some() {
                return Err(TranslateError::NameCollision(name));
            }
        }

        let mut outputs = IndexMap::with_capacity(translation.outputs.len());
        for TranslatedOutput {
            name,
            description,
            value,
        } in translation.outputs
        {
            if outputs
                .insert(name.clone(), HotOutput { description, value })
                .is_some()
            {
                return Err(TranslateError::NameCollision(name));
            }
        }

        Ok(HotTemplate {
            heat_template_version: HEAT_TEMPLATE_VERSION.to_string(),
            description,
            parameters,
            resources,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_translation() -> Translation {
        Translation {
            resources: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn input(source: &str) -> PropertySchema {
        PropertySchema::from_value("inputs", "test", &Value::from_yaml_str(source).unwrap())
            .unwrap()
    }

    #[test]
    fn test_empty_template_has_well_formed_sections() {
        let mut inputs = IndexMap::new();
        inputs.insert(
            "db_port".to_string(),
            input("type: integer\ndescription: Port for the MySQL database.\ndefault: 3306"),
        );

        let template = HotTemplate::build(&inputs, empty_translation(), None).unwrap();
        assert_eq!(template.heat_template_version, HEAT_TEMPLATE_VERSION);
        assert!(template.resources.is_empty());
        assert!(template.outputs.is_empty());
        assert_eq!(template.parameters.len(), 1);
        assert_eq!(template.parameters["db_port"].param_type, "number");
        assert_eq!(
            template.parameters["db_port"].default,
            Some(Value::Integer(3306))
        );
    }

    #[test]
    fn test_constraint_translation() {
        let schema = input(
            r#"
type: integer
constraints:
  - in_range: [1, 65535]
  - valid_values: [80, 443, 8080]
"#,
        );
        let parameter = HotParameter::from_input(&schema);
        assert_eq!(parameter.constraints.len(), 2);

        let range = parameter.constraints[0].as_map().unwrap();
        let bounds = range["range"].as_map().unwrap();
        assert_eq!(bounds["min"], Value::Integer(1));
        assert_eq!(bounds["max"], Value::Integer(65535));

        let allowed = parameter.constraints[1].as_map().unwrap();
        assert_eq!(allowed["allowed_values"].as_list().unwrap().len(), 3);
    }

    #[test]
    fn test_resource_name_collision_rejected() {
        let translation = Translation {
            resources: vec![
                TranslatedResource {
                    name: "twin".to_string(),
                    resource_type: "OS::Heat::None".to_string(),
                    properties: IndexMap::new(),
                    depends_on: Vec::new(),
                },
                TranslatedResource {
                    name: "twin".to_string(),
                    resource_type: "OS::Heat::None".to_string(),
                    properties: IndexMap::new(),
                    depends_on: Vec::new(),
                },
            ],
            outputs: Vec::new(),
        };
        let result = HotTemplate::build(&IndexMap::new(), translation, None);
        assert!(matches!(result, Err(TranslateError::NameCollision(name)) if name == "twin"));
    }

    #[test]
    fn test_serialized_shape() {
        let mut inputs = IndexMap::new();
        inputs.insert("cpus".to_string(), input("type: integer\ndefault: 2"));
        let translation = Translation {
            resources: vec![TranslatedResource {
                name: "server".to_string(),
                resource_type: "OS::Nova::Server".to_string(),
                properties: IndexMap::new(),
                depends_on: Vec::new(),
            }],
            outputs: Vec::new(),
        };
        let template =
            HotTemplate::build(&inputs, translation, Some("A server.".to_string())).unwrap();
        let rendered = serde_yaml::to_string(&template).unwrap();

        assert!(rendered.contains("heat_template_version: '2013-05-23'")
            || rendered.contains("heat_template_version: 2013-05-23"));
        assert!(rendered.contains("type: OS::Nova::Server"));
        // Numeric literals must stay unquoted.
        assert!(rendered.contains("default: 2"));
        // Empty depends_on is omitted entirely.
        assert!(!rendered.contains("depends_on"));
    }
}
