//! Output schemas: what the model must answer with, and how replies are checked.
//!
//! An [`OutputSchema`] is a plain value (field list with types) rather than
//! something derived from a Rust type, so callers can build schemas at runtime
//! or load them from a JSON file. It serves two purposes:
//!
//! 1. Rendered with [`OutputSchema::to_json_schema`] and embedded in the system
//!    instruction so the model knows the exact shape to produce.
//! 2. Used by [`OutputSchema::validate`] to turn a parsed reply into a
//!    [`SchemaInstance`], rejecting missing fields and wrong types.
//!
//! Unknown keys in a reply are dropped, not rejected: models often add a
//! stray `"notes"` field and that should not cost a retry.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::ops::Deref;

/// The structural description of the object a model must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Schema title, e.g. `"TableCorrection"`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<SchemaField>,
}

/// One named field of an [`OutputSchema`] or nested object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Value types a field may hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<FieldType>),
    Object(Vec<SchemaField>),
}

impl FieldType {
    /// Shorthand for `FieldType::Array(Box::new(item))`.
    pub fn array_of(item: FieldType) -> Self {
        FieldType::Array(Box::new(item))
    }

    fn to_json_schema(&self) -> Value {
        match self {
            FieldType::String => json!({ "type": "string" }),
            FieldType::Integer => json!({ "type": "integer" }),
            FieldType::Number => json!({ "type": "number" }),
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::Array(item) => json!({ "type": "array", "items": item.to_json_schema() }),
            FieldType::Object(fields) => object_schema(fields),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array(_) => "array",
            FieldType::Object(_) => "object",
        }
    }
}

impl SchemaField {
    /// A required field.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            description: None,
            required: true,
        }
    }

    /// An optional field; `null` or absence are both accepted.
    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            required: false,
            ..Self::new(name, ty)
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

impl OutputSchema {
    /// Start an empty schema with the given title.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Append a required field.
    pub fn field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.with_field(SchemaField::new(name, ty))
    }

    /// Append an optional field.
    pub fn optional_field(self, name: impl Into<String>, ty: FieldType) -> Self {
        self.with_field(SchemaField::optional(name, ty))
    }

    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.fields.push(field);
        self
    }

    /// Check the schema itself: non-empty title, at least one field, and
    /// unique non-empty field names at every nesting level.
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("schema name is empty".into());
        }
        if self.fields.is_empty() {
            return Err(format!("schema '{}' has no fields", self.name));
        }
        check_fields(&self.fields, &self.name)
    }

    /// Render as a JSON-Schema object for embedding in the system instruction.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = object_schema(&self.fields);
        if let Value::Object(ref mut obj) = schema {
            obj.insert("title".into(), Value::String(self.name.clone()));
            if let Some(ref d) = self.description {
                obj.insert("description".into(), Value::String(d.clone()));
            }
        }
        schema
    }

    /// Strictly parse `text` as JSON and validate it against this schema.
    pub fn parse(&self, text: &str) -> Result<SchemaInstance, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
        self.validate(value)
    }

    /// Validate an already-parsed value against this schema.
    pub fn validate(&self, value: Value) -> Result<SchemaInstance, String> {
        validate_object(&self.fields, value, "$").map(SchemaInstance)
    }
}

fn check_fields(fields: &[SchemaField], path: &str) -> Result<(), String> {
    let mut seen = HashSet::new();
    for f in fields {
        if f.name.trim().is_empty() {
            return Err(format!("{path}: field with empty name"));
        }
        if !seen.insert(f.name.as_str()) {
            return Err(format!("{path}: duplicate field '{}'", f.name));
        }
        let mut ty = &f.ty;
        while let FieldType::Array(item) = ty {
            ty = item;
        }
        if let FieldType::Object(nested) = ty {
            check_fields(nested, &format!("{path}.{}", f.name))?;
        }
    }
    Ok(())
}

fn object_schema(fields: &[SchemaField]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for f in fields {
        let mut prop = f.ty.to_json_schema();
        if let (Some(d), Value::Object(obj)) = (&f.description, &mut prop) {
            obj.insert("description".into(), Value::String(d.clone()));
        }
        properties.insert(f.name.clone(), prop);
        if f.required {
            required.push(Value::String(f.name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn validate_object(
    fields: &[SchemaField],
    value: Value,
    path: &str,
) -> Result<Map<String, Value>, String> {
    let mut obj = match value {
        Value::Object(obj) => obj,
        other => return Err(format!("{path}: expected object, got {}", kind_of(&other))),
    };
    let mut out = Map::new();
    for f in fields {
        let field_path = format!("{path}.{}", f.name);
        match obj.remove(&f.name) {
            None | Some(Value::Null) if !f.required => {}
            None => return Err(format!("{field_path}: missing required field")),
            Some(v) => {
                out.insert(f.name.clone(), validate_value(&f.ty, v, &field_path)?);
            }
        }
    }
    Ok(out)
}

fn validate_value(ty: &FieldType, value: Value, path: &str) -> Result<Value, String> {
    match (ty, value) {
        (FieldType::String, v @ Value::String(_)) => Ok(v),
        (FieldType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(Value::Number(n)),
        (FieldType::Number, v @ Value::Number(_)) => Ok(v),
        (FieldType::Boolean, v @ Value::Bool(_)) => Ok(v),
        (FieldType::Array(item), Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| validate_value(item, v, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (FieldType::Object(fields), v @ Value::Object(_)) => {
            validate_object(fields, v, path).map(Value::Object)
        }
        (ty, other) => Err(format!(
            "{path}: expected {}, got {}",
            ty.label(),
            kind_of(&other)
        )),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A reply that conforms to its [`OutputSchema`]: field name → value.
///
/// Only fields declared in the schema are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaInstance(Map<String, Value>);

impl SchemaInstance {
    /// The underlying field map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Convert into a caller-defined type.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    /// Convenience accessor for string fields.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }
}

impl Deref for SchemaInstance {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
