//! Intrinsic-function expression trees.
//!
//! Property and output values are not plain literals: they may call the
//! TOSCA intrinsic functions `get_input`, `get_property`, `get_attribute`,
//! and `concat` anywhere in a nested value. Parsing turns the raw document
//! value into an [`Expr`] tree so the validator can check references and
//! the translator can rewrite intrinsics without re-inspecting mappings.

use indexmap::IndexMap;
use tosca_types::Value;

/// The node name intrinsics use to refer to their own template.
pub const SELF_REF: &str = "SELF";

/// A parsed property or output value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A scalar literal.
    Literal(Value),
    /// `{get_input: name}` — reference to a template input.
    GetInput(String),
    /// `{get_property: [node, prop, ...]}` — another node's property.
    GetProperty { node: String, path: Vec<String> },
    /// `{get_attribute: [node, attribute]}` — a runtime attribute.
    GetAttribute { node: String, attribute: String },
    /// `{concat: [expr, ...]}` — string concatenation.
    Concat(Vec<Expr>),
    /// A sequence with possibly-intrinsic entries.
    List(Vec<Expr>),
    /// A mapping with possibly-intrinsic entries.
    Map(IndexMap<String, Expr>),
}

impl Expr {
    /// Parse a raw document value, recognizing intrinsic calls at any
    /// depth. Returns a message describing the malformed call on failure.
    pub fn parse(value: &Value) -> Result<Expr, String> {
        match value {
            Value::Map(map) if map.len() == 1 => {
                let (key, arg) = map.iter().next().expect("len checked above");
                match key.as_str() {
                    "get_input" => Self::parse_get_input(arg),
                    "get_property" => Self::parse_get_property(arg),
                    "get_attribute" => Self::parse_get_attribute(arg),
                    "concat" => Self::parse_concat(arg),
                    _ => Self::parse_map(map),
                }
            }
            Value::Map(map) => Self::parse_map(map),
            Value::List(items) => {
                let parsed = items.iter().map(Expr::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::List(parsed))
            }
            scalar => Ok(Expr::Literal(scalar.clone())),
        }
    }

    fn parse_map(map: &IndexMap<String, Value>) -> Result<Expr, String> {
        let mut parsed = IndexMap::with_capacity(map.len());
        for (key, entry) in map {
            parsed.insert(key.clone(), Expr::parse(entry)?);
        }
        Ok(Expr::Map(parsed))
    }

    fn parse_get_input(arg: &Value) -> Result<Expr, String> {
        match arg.as_str() {
            Some(name) => Ok(Expr::GetInput(name.to_string())),
            None => Err("get_input expects an input name".to_string()),
        }
    }

    fn parse_get_property(arg: &Value) -> Result<Expr, String> {
        let items = arg
            .as_list()
            .filter(|l| l.len() >= 2)
            .ok_or_else(|| "get_property expects [node, property, ...]".to_string())?;
        let mut names = items.iter().map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| "get_property arguments must be strings".to_string())
        });
        let node = names.next().expect("len checked above")?;
        let path = names.collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::GetProperty { node, path })
    }

    fn parse_get_attribute(arg: &Value) -> Result<Expr, String> {
        let items = arg
            .as_list()
            .filter(|l| l.len() == 2)
            .ok_or_else(|| "get_attribute expects [node, attribute]".to_string())?;
        let node = items[0]
            .as_str()
            .ok_or_else(|| "get_attribute node must be a string".to_string())?;
        let attribute = items[1]
            .as_str()
            .ok_or_else(|| "get_attribute attribute must be a string".to_string())?;
        Ok(Expr::GetAttribute {
            node: node.to_string(),
            attribute: attribute.to_string(),
        })
    }

    fn parse_concat(arg: &Value) -> Result<Expr, String> {
        let items = arg
            .as_list()
            .ok_or_else(|| "concat expects a list".to_string())?;
        let parsed = items.iter().map(Expr::parse).collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::Concat(parsed))
    }

    /// Reassemble the literal value if no intrinsic appears anywhere in
    /// the tree.
    pub fn as_value(&self) -> Option<Value> {
        match self {
            Expr::Literal(value) => Some(value.clone()),
            Expr::List(items) => items
                .iter()
                .map(Expr::as_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            Expr::Map(map) => {
                let mut literal = IndexMap::with_capacity(map.len());
                for (key, entry) in map {
                    literal.insert(key.clone(), entry.as_value()?);
                }
                Some(Value::Map(literal))
            }
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.as_value().is_some()
    }

    /// Visit every intrinsic call in the tree.
    pub fn visit_intrinsics<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        match self {
            Expr::Literal(_) => {}
            Expr::GetInput(_) | Expr::GetProperty { .. } | Expr::GetAttribute { .. } => {
                visit(self);
            }
            Expr::Concat(items) | Expr::List(items) => {
                for item in items {
                    item.visit_intrinsics(visit);
                }
            }
            Expr::Map(map) => {
                for entry in map.values() {
                    entry.visit_intrinsics(visit);
                }
            }
        }
    }
}
