//! Schema model: property schemas, constraint clauses, capability and
//! requirement definitions.
//!
//! These are the building blocks of an entity type definition. The same
//! shapes appear in a service template's `inputs` section, so the template
//! model reuses the parsers here.

use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;

use crate::error::{TypeError, TypeResult};
use crate::value::Value;

/// Declared type of a property, attribute, or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Map,
    /// A named data type, resolved through the registry and validated
    /// recursively.
    Named(String),
}

impl TypeTag {
    pub fn parse(tag: &str) -> TypeTag {
        match tag {
            "string" => TypeTag::String,
            "integer" => TypeTag::Integer,
            "float" => TypeTag::Float,
            "boolean" => TypeTag::Boolean,
            "list" => TypeTag::List,
            "map" => TypeTag::Map,
            other => TypeTag::Named(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TypeTag::String => "string",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::Boolean => "boolean",
            TypeTag::List => "list",
            TypeTag::Map => "map",
            TypeTag::Named(name) => name,
        }
    }

    /// Whether a literal value conforms to this tag. Named types are
    /// checked structurally here (must be a mapping); their fields are the
    /// validator's business.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            TypeTag::String => matches!(value, Value::String(_)),
            TypeTag::Integer => matches!(value, Value::Integer(_)),
            TypeTag::Float => matches!(value, Value::Float(_) | Value::Integer(_)),
            TypeTag::Boolean => matches!(value, Value::Boolean(_)),
            TypeTag::List => matches!(value, Value::List(_)),
            TypeTag::Map | TypeTag::Named(_) => matches!(value, Value::Map(_)),
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single constraint clause on a property or parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    Equal(Value),
    GreaterThan(Value),
    GreaterOrEqual(Value),
    LessThan(Value),
    LessOrEqual(Value),
    InRange { min: Value, max: Value },
    ValidValues(Vec<Value>),
    Length(usize),
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
}

impl Constraint {
    /// Parse one `- clause_name: argument` entry.
    pub fn from_value(owner: &str, value: &Value) -> TypeResult<Constraint> {
        let map = value.as_map().filter(|m| m.len() == 1).ok_or_else(|| {
            TypeError::Malformed {
                type_name: owner.to_string(),
                message: "constraint clause must be a single-key mapping".to_string(),
            }
        })?;
        let (clause, arg) = map.iter().next().expect("len checked above");
        let malformed = |message: &str| TypeError::Malformed {
            type_name: owner.to_string(),
            message: format!("constraint '{clause}': {message}"),
        };

        match clause.as_str() {
            "equal" => Ok(Constraint::Equal(arg.clone())),
            "greater_than" => Ok(Constraint::GreaterThan(arg.clone())),
            "greater_or_equal" => Ok(Constraint::GreaterOrEqual(arg.clone())),
            "less_than" => Ok(Constraint::LessThan(arg.clone())),
            "less_or_equal" => Ok(Constraint::LessOrEqual(arg.clone())),
            "in_range" => {
                let bounds = arg
                    .as_list()
                    .filter(|l| l.len() == 2)
                    .ok_or_else(|| malformed("expects a two-element list"))?;
                Ok(Constraint::InRange {
                    min: bounds[0].clone(),
                    max: bounds[1].clone(),
                })
            }
            "valid_values" => {
                let values = arg.as_list().ok_or_else(|| malformed("expects a list"))?;
                Ok(Constraint::ValidValues(values.to_vec()))
            }
            "length" => Ok(Constraint::Length(usize_arg(arg).ok_or_else(|| {
                malformed("expects a non-negative integer")
            })?)),
            "min_length" => Ok(Constraint::MinLength(usize_arg(arg).ok_or_else(|| {
                malformed("expects a non-negative integer")
            })?)),
            "max_length" => Ok(Constraint::MaxLength(usize_arg(arg).ok_or_else(|| {
                malformed("expects a non-negative integer")
            })?)),
            "pattern" => Ok(Constraint::Pattern(
                arg.as_str()
                    .ok_or_else(|| malformed("expects a string"))?
                    .to_string(),
            )),
            other => Err(malformed(&format!("unknown clause '{other}'"))),
        }
    }

    /// Parse a `constraints:` sequence.
    pub fn parse_list(owner: &str, value: &Value) -> TypeResult<Vec<Constraint>> {
        let entries = value.as_list().ok_or_else(|| TypeError::Malformed {
            type_name: owner.to_string(),
            message: "constraints must be a list".to_string(),
        })?;
        entries
            .iter()
            .map(|entry| Constraint::from_value(owner, entry))
            .collect()
    }

    /// Check a literal value against this clause. Returns a human-readable
    /// message on violation.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Constraint::Equal(expected) => {
                if value == expected {
                    Ok(())
                } else {
                    Err(format!("value {value} is not equal to {expected}"))
                }
            }
            Constraint::GreaterThan(bound) => compare(value, bound, |o| o > 0.0, ">"),
            Constraint::GreaterOrEqual(bound) => compare(value, bound, |o| o >= 0.0, ">="),
            Constraint::LessThan(bound) => compare(value, bound, |o| o < 0.0, "<"),
            Constraint::LessOrEqual(bound) => compare(value, bound, |o| o <= 0.0, "<="),
            Constraint::InRange { min, max } => {
                compare(value, min, |o| o >= 0.0, ">=")?;
                compare(value, max, |o| o <= 0.0, "<=")
            }
            Constraint::ValidValues(allowed) => {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    let rendered: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                    Err(format!(
                        "value {value} is not one of [{}]",
                        rendered.join(", ")
                    ))
                }
            }
            Constraint::Length(expected) => match value_len(value) {
                Some(len) if len == *expected => Ok(()),
                Some(len) => Err(format!("length {len} is not {expected}")),
                None => Err(format!("length is not defined for {}", value.type_of())),
            },
            Constraint::MinLength(min) => match value_len(value) {
                Some(len) if len >= *min => Ok(()),
                Some(len) => Err(format!("length {len} is below minimum {min}")),
                None => Err(format!("length is not defined for {}", value.type_of())),
            },
            Constraint::MaxLength(max) => match value_len(value) {
                Some(len) if len <= *max => Ok(()),
                Some(len) => Err(format!("length {len} exceeds maximum {max}")),
                None => Err(format!("length is not defined for {}", value.type_of())),
            },
            Constraint::Pattern(pattern) => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("pattern applies to strings, got {}", value.type_of()))?;
                let regex = Regex::new(pattern)
                    .map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
                if regex.is_match(text) {
                    Ok(())
                } else {
                    Err(format!("value '{text}' does not match pattern '{pattern}'"))
                }
            }
        }
    }
}

fn usize_arg(value: &Value) -> Option<usize> {
    value.as_i64().and_then(|i| usize::try_from(i).ok())
}

fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::List(items) => Some(items.len()),
        Value::Map(map) => Some(map.len()),
        _ => None,
    }
}

fn compare(
    value: &Value,
    bound: &Value,
    accept: impl Fn(f64) -> bool,
    op: &str,
) -> Result<(), String> {
    let (left, right) = match (value.as_f64(), bound.as_f64()) {
        (Some(l), Some(r)) => (l, r),
        _ => {
            return Err(format!(
                "cannot compare {} with {}",
                value.type_of(),
                bound.type_of()
            ))
        }
    };
    if accept(left - right) {
        Ok(())
    } else {
        Err(format!("value {value} violates {op} {bound}"))
    }
}

/// Schema of a single property.
#[derive(Debug, Clone, Serialize)]
pub struct PropertySchema {
    pub name: String,
    pub type_tag: TypeTag,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    pub constraints: Vec<Constraint>,
    /// For `list` and `map` properties, the declared entry type.
    pub entry_schema: Option<TypeTag>,
}

impl PropertySchema {
    /// Parse a `name: {type, description, required, default, constraints,
    /// entry_schema}` block.
    pub fn from_value(owner: &str, name: &str, value: &Value) -> TypeResult<PropertySchema> {
        let map = value.as_map().ok_or_else(|| TypeError::Malformed {
            type_name: owner.to_string(),
            message: format!("property '{name}' must be a mapping"),
        })?;

        let type_tag = map
            .get("type")
            .and_then(|v| v.as_str())
            .map(TypeTag::parse)
            .ok_or_else(|| TypeError::Malformed {
                type_name: owner.to_string(),
                message: format!("property '{name}' is missing a type"),
            })?;

        let constraints = match map.get("constraints") {
            Some(raw) => Constraint::parse_list(owner, raw)?,
            None => Vec::new(),
        };

        let entry_schema = map
            .get("entry_schema")
            .and_then(|v| v.as_map())
            .and_then(|m| m.get("type"))
            .and_then(|v| v.as_str())
            .map(TypeTag::parse);

        Ok(PropertySchema {
            name: name.to_string(),
            type_tag,
            description: map
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            required: map.get("required").and_then(|v| v.as_bool()).unwrap_or(true),
            default: map.get("default").cloned(),
            constraints,
            entry_schema,
        })
    }
}

/// Schema of a single attribute (runtime-populated, so no constraints).
#[derive(Debug, Clone, Serialize)]
pub struct AttributeSchema {
    pub name: String,
    pub type_tag: TypeTag,
    pub description: Option<String>,
    pub default: Option<Value>,
}

impl AttributeSchema {
    pub fn from_value(owner: &str, name: &str, value: &Value) -> TypeResult<AttributeSchema> {
        let map = value.as_map().ok_or_else(|| TypeError::Malformed {
            type_name: owner.to_string(),
            message: format!("attribute '{name}' must be a mapping"),
        })?;
        let type_tag = map
            .get("type")
            .and_then(|v| v.as_str())
            .map(TypeTag::parse)
            .ok_or_else(|| TypeError::Malformed {
                type_name: owner.to_string(),
                message: format!("attribute '{name}' is missing a type"),
            })?;
        Ok(AttributeSchema {
            name: name.to_string(),
            type_tag,
            description: map
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            default: map.get("default").cloned(),
        })
    }
}

/// A capability offered by a node type.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityDefinition {
    pub name: String,
    pub type_name: String,
    /// Fixed property values supplied by the declaring node type.
    pub properties: IndexMap<String, Value>,
    pub valid_source_types: Vec<String>,
}

impl CapabilityDefinition {
    /// Parse `name: type-name` shorthand or a full mapping.
    pub fn from_value(owner: &str, name: &str, value: &Value) -> TypeResult<CapabilityDefinition> {
        if let Some(type_name) = value.as_str() {
            return Ok(CapabilityDefinition {
                name: name.to_string(),
                type_name: type_name.to_string(),
                properties: IndexMap::new(),
                valid_source_types: Vec::new(),
            });
        }
        let map = value.as_map().ok_or_else(|| TypeError::Malformed {
            type_name: owner.to_string(),
            message: format!("capability '{name}' must be a type name or mapping"),
        })?;
        let type_name = map
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TypeError::Malformed {
                type_name: owner.to_string(),
                message: format!("capability '{name}' is missing a type"),
            })?;
        let properties = map
            .get("properties")
            .and_then(|v| v.as_map())
            .cloned()
            .unwrap_or_default();
        let valid_source_types = string_list(map.get("valid_source_types"));
        Ok(CapabilityDefinition {
            name: name.to_string(),
            type_name: type_name.to_string(),
            properties,
            valid_source_types,
        })
    }
}

/// A requirement declared by a node type.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementDefinition {
    pub name: String,
    /// Required capability type.
    pub capability: String,
    /// Optional node type the target must conform to.
    pub node: Option<String>,
    /// Relationship type created for each match.
    pub relationship: Option<String>,
    /// Minimum and maximum match count; `None` max means unbounded.
    pub occurrences: (u32, Option<u32>),
}

impl RequirementDefinition {
    /// Parse one `- name: ...` entry from a type's requirements sequence.
    pub fn from_entry(owner: &str, entry: &Value) -> TypeResult<RequirementDefinition> {
        let map = entry.as_map().filter(|m| m.len() == 1).ok_or_else(|| {
            TypeError::Malformed {
                type_name: owner.to_string(),
                message: "requirement entry must be a single-key mapping".to_string(),
            }
        })?;
        let (name, body) = map.iter().next().expect("len checked above");

        // Shorthand: `- dependency: tosca.capabilities.Node`
        if let Some(capability) = body.as_str() {
            return Ok(RequirementDefinition {
                name: name.clone(),
                capability: capability.to_string(),
                node: None,
                relationship: None,
                occurrences: (1, Some(1)),
            });
        }

        let body = body.as_map().ok_or_else(|| TypeError::Malformed {
            type_name: owner.to_string(),
            message: format!("requirement '{name}' must be a capability name or mapping"),
        })?;
        let capability = body
            .get("capability")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TypeError::Malformed {
                type_name: owner.to_string(),
                message: format!("requirement '{name}' is missing a capability"),
            })?;
        let occurrences = match body.get("occurrences") {
            Some(raw) => parse_occurrences(owner, name, raw)?,
            None => (1, Some(1)),
        };
        Ok(RequirementDefinition {
            name: name.clone(),
            capability: capability.to_string(),
            node: body
                .get("node")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            relationship: body
                .get("relationship")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            occurrences,
        })
    }
}

fn parse_occurrences(owner: &str, name: &str, raw: &Value) -> TypeResult<(u32, Option<u32>)> {
    let malformed = || TypeError::Malformed {
        type_name: owner.to_string(),
        message: format!("requirement '{name}' has malformed occurrences"),
    };
    let bounds = raw.as_list().filter(|l| l.len() == 2).ok_or_else(malformed)?;
    let min = bounds[0]
        .as_i64()
        .and_then(|i| u32::try_from(i).ok())
        .ok_or_else(malformed)?;
    let max = match &bounds[1] {
        Value::String(s) if s == "UNBOUNDED" => None,
        other => Some(
            other
                .as_i64()
                .and_then(|i| u32::try_from(i).ok())
                .filter(|m| *m >= min)
                .ok_or_else(malformed)?,
        ),
    };
    Ok((min, max))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
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
