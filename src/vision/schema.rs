//! Declared output schema for the vision model
//!
//! The same value is sent to the model as its structured-output constraint
//! and used to check the model's answer before it leaves the proxy.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// JSON type of a schema node, in the model API's spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    String,
    Object,
    Array,
}

/// One node of a response schema
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ResponseSchema>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, ResponseSchema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_ordering: Vec<String>,
    /// Checked locally only; not sent to the model
    #[serde(skip)]
    pub min_length: Option<usize>,
}

/// Where and why a value failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl ResponseSchema {
    fn node(kind: SchemaType) -> Self {
        Self {
            kind,
            items: None,
            properties: BTreeMap::new(),
            required: Vec::new(),
            property_ordering: Vec::new(),
            min_length: None,
        }
    }

    /// A string that must not be empty
    pub fn non_empty_string() -> Self {
        Self {
            min_length: Some(1),
            ..Self::node(SchemaType::String)
        }
    }

    /// An array of `items`
    pub fn array_of(items: ResponseSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::node(SchemaType::Array)
        }
    }

    /// An object whose listed fields are all required, in order
    pub fn object(fields: Vec<(&str, ResponseSchema)>) -> Self {
        let names: Vec<String> = fields.iter().map(|(name, _)| name.to_string()).collect();
        Self {
            properties: fields
                .into_iter()
                .map(|(name, schema)| (name.to_string(), schema))
                .collect(),
            required: names.clone(),
            property_ordering: names,
            ..Self::node(SchemaType::Object)
        }
    }

    /// `[{ "shape": string, "description": string }]`
    pub fn cloud_shapes() -> Self {
        Self::array_of(Self::object(vec![
            ("shape", Self::non_empty_string()),
            ("description", Self::non_empty_string()),
        ]))
    }

    /// Check `value` against this schema
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        self.validate_at("$", value)
    }

    fn validate_at(&self, path: &str, value: &Value) -> Result<(), SchemaViolation> {
        let violation = |reason: String| SchemaViolation {
            path: path.to_string(),
            reason,
        };

        match (self.kind, value) {
            (SchemaType::String, Value::String(s)) => {
                if let Some(min) = self.min_length {
                    if s.chars().count() < min {
                        return Err(violation(format!("shorter than {} characters", min)));
                    }
                }
                Ok(())
            }
            (SchemaType::Array, Value::Array(values)) => {
                if let Some(items) = &self.items {
                    for (index, item) in values.iter().enumerate() {
                        items.validate_at(&format!("{}[{}]", path, index), item)?;
                    }
                }
                Ok(())
            }
            (SchemaType::Object, Value::Object(fields)) => {
                for name in &self.required {
                    if !fields.contains_key(name) {
                        return Err(violation(format!("missing required field `{}`", name)));
                    }
                }
                for (name, schema) in &self.properties {
                    if let Some(field) = fields.get(name) {
                        schema.validate_at(&format!("{}.{}", path, name), field)?;
                    }
                }
                Ok(())
            }
            (kind, other) => Err(violation(format!(
                "expected {:?}, found {}",
                kind,
                json_type_name(other)
            ))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
