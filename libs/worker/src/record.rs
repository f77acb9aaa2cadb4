//! Schema-checked view of an order's payload.
//!
//! The controller fetches the pipeline's input schema at message time, so
//! handler input cannot be a compile-time struct. An [`InputRecord`] is the
//! contract instead: payload data validated against the fetched schema,
//! queryable by field name, and decodable into a typed struct for handlers
//! that declare one.

use jsonschema::JSONSchema;
use schema_vault_client::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    /// The vault returned a schema document the validator cannot compile.
    #[error("failed to compile json schema: {0}")]
    Compile(String),

    /// The payload does not satisfy the schema.
    #[error("data does not match schema: {0}")]
    Validation(String),

    /// The payload is not a JSON object.
    #[error("order data is not a JSON object")]
    NotAnObject,

    #[error("failed to decode record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RecordError {
    /// Whether the error is the sender's fault (reject) rather than a
    /// vault-side problem (leave for redelivery).
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotAnObject)
    }
}

/// Payload of one order, validated against the pipeline's input schema.
#[derive(Clone, Debug, PartialEq)]
pub struct InputRecord {
    fields: Map<String, Value>,
}

impl InputRecord {
    /// Validate `data` against `schema` and wrap it for field access.
    pub fn from_schema(schema: &JsonSchema, data: &Value) -> Result<Self, RecordError> {
        let document = schema.to_value();
        let compiled =
            JSONSchema::compile(&document).map_err(|e| RecordError::Compile(e.to_string()))?;

        if let Err(errors) = compiled.validate(data) {
            let detail = errors
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RecordError::Validation(detail));
        }

        let fields = data.as_object().cloned().ok_or(RecordError::NotAnObject)?;
        Ok(Self { fields })
    }

    /// Generic access: one field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Convenience for string fields.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Typed access: decode the whole record into a struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RecordError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
