//! Tool specifications: the schema-described shape of a tool as advertised
//! to the model. Immutable once built.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterField {
    name: String,
    field_type: String,
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    allowed_values: Vec<String>,
}

impl ParameterField {
    /// Creates a parameter with a JSON-schema type name (`string`, `number`,
    /// `integer`, `boolean`, `object`, `array`).
    pub fn new(name: impl Into<String>, field_type: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            required,
            description: None,
            allowed_values: Vec::new(),
        }
    }

    /// Attaches a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restricts the parameter to an enumerated set of values.
    pub fn with_allowed_values(mut self, values: Vec<String>) -> Self {
        self.allowed_values = values;
        self
    }

    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The JSON-schema type name.
    pub fn field_type(&self) -> &str {
        &self.field_type
    }

    /// Whether the model must supply this parameter.
    pub fn required(&self) -> bool {
        self.required
    }
}

/// The ordered set of parameters a tool accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    fields: Vec<ParameterField>,
}

impl ParameterSchema {
    /// An empty schema (tool takes no arguments).
    pub fn empty() -> Self {
        Self::default()
    }

    /// The parameters, in declaration order.
    pub fn fields(&self) -> &[ParameterField] {
        &self.fields
    }

    fn push(&mut self, field: ParameterField) {
        self.fields.push(field);
    }

    /// Renders the schema as a JSON-Schema object suitable for a model
    /// transport's tool declaration.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), json!(field.field_type));
            if let Some(desc) = &field.description {
                prop.insert("description".into(), json!(desc));
            }
            if !field.allowed_values.is_empty() {
                prop.insert("enum".into(), json!(field.allowed_values));
            }
            properties.insert(field.name.clone(), Value::Object(prop));
            if field.required {
                required.push(json!(field.name));
            }
        }

        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required,
        })
    }

    /// Parses a remote tool's `inputSchema` object. Unknown or nested
    /// property shapes degrade to `object`-typed fields; a malformed schema
    /// yields an empty parameter set rather than an error.
    pub fn from_json_schema(schema: &Value) -> Self {
        let mut out = Self::default();

        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return out;
        };

        for (name, prop) in properties {
            let field_type = prop
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("object")
                .to_string();
            let mut field = ParameterField::new(name, field_type, required.contains(&name.as_str()));
            if let Some(desc) = prop.get("description").and_then(Value::as_str) {
                field = field.with_description(desc);
            }
            if let Some(values) = prop.get("enum").and_then(Value::as_array) {
                let values: Vec<String> = values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect();
                if !values.is_empty() {
                    field = field.with_allowed_values(values);
                }
            }
            out.push(field);
        }

        out
    }
}

/// A named, schema-described capability invocable by the model.
///
/// Names are unique within one exchange's candidate set. Specifications are
/// built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpecification {
    name: String,
    description: String,
    parameters: ParameterSchema,
}

impl ToolSpecification {
    /// Creates a specification with no parameters.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::empty(),
        }
    }

    /// Adds a parameter, preserving declaration order.
    pub fn with_parameter(mut self, field: ParameterField) -> Self {
        self.parameters.push(field);
        self
    }

    /// Builds a specification from a remote server's tool listing.
    pub fn from_remote(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: &Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: ParameterSchema::from_json_schema(input_schema),
        }
    }

    /// The tool name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The parameter schema.
    pub fn parameters(&self) -> &ParameterSchema {
        &self.parameters
    }

    /// Renders the parameter schema as JSON Schema.
    pub fn to_json_schema(&self) -> Value {
        self.parameters.to_json_schema()
    }
}
