//! Response schemas for structured generation.
//!
//! Providers accept only an OpenAPI subset: no `$ref`, no `$schema`, and a
//! short list of keywords and formats. Schemas are generated inline and then
//! stripped down to that subset.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::{Map, Value};

use crate::error::LlmResult;

const ALLOWED_KEYS: &[&str] = &[
    "type",
    "format",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
];

const ALLOWED_FORMATS: &[&str] = &["int32", "int64", "float", "double", "date-time", "enum"];

/// Inline, provider-safe schema for `T`.
pub fn response_schema_for<T: JsonSchema>() -> LlmResult<Value> {
    let settings = SchemaSettings::openapi3().with(|s| {
        s.inline_subschemas = true;
        s.meta_schema = None;
    });
    let root = settings.into_generator().into_root_schema_for::<T>();
    let value = serde_json::to_value(root)?;
    Ok(sanitize(&value))
}

/// Keep only keywords the provider understands, recursively.
pub fn sanitize(schema: &Value) -> Value {
    let Value::Object(map) = schema else {
        return schema.clone();
    };

    let mut out = Map::new();
    for (key, value) in map {
        match key.as_str() {
            "properties" => {
                if let Value::Object(props) = value {
                    let cleaned = props.iter().map(|(name, s)| (name.clone(), sanitize(s))).collect();
                    out.insert(key.clone(), Value::Object(cleaned));
                }
            }
            "items" => {
                out.insert(key.clone(), sanitize(value));
            }
            "format" => {
                if value.as_str().is_some_and(|f| ALLOWED_FORMATS.contains(&f)) {
                    out.insert(key.clone(), value.clone());
                }
            }
            k if ALLOWED_KEYS.contains(&k) => {
                out.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Moment {
        hour: u32,
        minute: u32,
    }

    /// A titled list
    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Listing {
        title: String,
        moments: Vec<Moment>,
    }

    #[test]
    fn test_schema_is_inline_and_clean() {
        let schema = response_schema_for::<Listing>().unwrap();
        let text = schema.to_string();
        assert!(!text.contains("$ref"));
        assert!(!text.contains("$schema"));
        assert!(!text.contains("uint32"));
        assert!(schema.get("title").is_none());

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["moments"]["type"], "array");
        assert_eq!(schema["properties"]["moments"]["items"]["properties"]["hour"]["type"], "integer");
    }

    #[test]
    fn test_sanitize_keeps_property_names() {
        let raw = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": { "format": { "type": "string", "maxLength": 5 } },
            "required": ["format"]
        });
        assert_eq!(
            sanitize(&raw),
            json!({
                "type": "object",
                "properties": { "format": { "type": "string" } },
                "required": ["format"]
            })
        );
    }
}
