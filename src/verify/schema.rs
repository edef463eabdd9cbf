//! Typed output-shape specifications for the schema stage.

use serde::{Deserialize, Serialize};

/// Expected JSON type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// JSON string.
    String,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Object => write!(f, "object"),
            FieldType::Array => write!(f, "array"),
        }
    }
}

impl FieldType {
    fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

/// One field expectation within a schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Expected JSON type.
    pub field_type: FieldType,
    /// Whether the field must be present.
    pub required: bool,
}

/// Shape specification a candidate output is validated against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Schema name, used in rationales and prompts.
    pub name: String,
    /// Field expectations.
    pub fields: Vec<FieldSpec>,
}

impl SchemaSpec {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field.
    pub fn require(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            required: true,
        });
        self
    }

    /// Add an optional field.
    pub fn optional(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            required: false,
        });
        self
    }

    /// Validate a candidate output against this schema.
    ///
    /// All violations are collected into one message so the rationale
    /// reports everything wrong with the output, not only the first issue.
    pub fn validate(&self, output: &serde_json::Value) -> Result<(), String> {
        let object = match output.as_object() {
            Some(object) => object,
            None => {
                return Err(format!(
                    "expected a JSON object for schema '{}', got {}",
                    self.name,
                    json_type_name(output)
                ))
            }
        };

        let mut violations = Vec::new();

        for field in &self.fields {
            match object.get(&field.name) {
                None => {
                    if field.required {
                        violations.push(format!("missing required field '{}'", field.name));
                    }
                }
                Some(value) => {
                    // null satisfies an optional field only
                    if value.is_null() {
                        if field.required {
                            violations
                                .push(format!("required field '{}' is null", field.name));
                        }
                    } else if !field.field_type.matches(value) {
                        violations.push(format!(
                            "field '{}' expected {}, got {}",
                            field.name,
                            field.field_type,
                            json_type_name(value)
                        ));
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join("; "))
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
