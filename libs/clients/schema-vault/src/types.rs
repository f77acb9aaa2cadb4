use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Which side of a pipeline stage a schema constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Input,
    Output,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON Schema document itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Required property names.
    pub required: Vec<String>,
    /// Property definitions keyed by name.
    pub properties: Map<String, Value>,
    /// Top-level schema type (wire key `type`).
    #[serde(rename = "type")]
    pub json_type: String,
}

impl JsonSchema {
    /// Render the document as a plain JSON value for schema compilers.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.json_type,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// A schema document plus its vault identity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Unique identifier of the schema entity.
    #[serde(rename = "_id")]
    pub schema_id: String,
    pub service: String,
    pub source: String,
    pub provider: String,
    pub schema_type: SchemaType,
    pub json_schema: JsonSchema,
    /// Pinned version stamped into feedback metadata.
    pub schema_version_id: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of `POST /schema/validate`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemaData {
    pub service: String,
    pub source: String,
    pub provider: String,
    pub schema_type: SchemaType,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire_schema() -> Value {
        json!({
            "_id": "sch-1",
            "service": "video-downloader",
            "source": "pinkfong",
            "provider": "kids",
            "schema_type": "input",
            "json_schema": {
                "type": "object",
                "properties": {"videoId": {"type": "string"}},
                "required": ["videoId"]
            },
            "schema_version_id": "sv-1",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_decode_from_wire() {
        let schema: Schema = serde_json::from_value(wire_schema()).unwrap();
        assert_eq!(schema.schema_id, "sch-1");
        assert_eq!(schema.schema_type, SchemaType::Input);
        assert_eq!(schema.json_schema.json_type, "object");
        assert_eq!(schema.json_schema.required, vec!["videoId"]);
    }

    #[test]
    fn test_schema_type_wire_values() {
        assert_eq!(serde_json::to_value(SchemaType::Input).unwrap(), "input");
        assert_eq!(serde_json::to_value(SchemaType::Output).unwrap(), "output");
        assert_eq!(SchemaType::Output.to_string(), "output");
    }

    #[test]
    fn test_unknown_schema_type_is_an_error() {
        let mut wire = wire_schema();
        wire["schema_type"] = json!("sideways");
        assert!(serde_json::from_value::<Schema>(wire).is_err());
    }

    #[test]
    fn test_json_schema_to_value_round_trips() {
        let schema: Schema = serde_json::from_value(wire_schema()).unwrap();
        let doc = schema.json_schema.to_value();
        assert_eq!(doc["type"], "object");
        assert_eq!(doc["required"][0], "videoId");
        assert_eq!(doc["properties"]["videoId"]["type"], "string");
    }

    #[test]
    fn test_schema_data_wire_shape() {
        let data = SchemaData {
            service: "video-downloader".to_string(),
            source: "pinkfong".to_string(),
            provider: "kids".to_string(),
            schema_type: SchemaType::Output,
            data: json!({"videoUri": "http://minio/x"}),
        };
        let encoded = serde_json::to_value(&data).unwrap();
        assert_eq!(encoded["schema_type"], "output");
        assert_eq!(encoded["data"]["videoUri"], "http://minio/x");
    }
}
