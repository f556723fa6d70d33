use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types that can be parsed out of a JSON-mode completion.
///
/// Automatically implemented for any `JsonSchema + DeserializeOwned` type.
/// JSON mode guarantees well-formed JSON but not shape, so callers embed
/// `schema_json()` in the prompt and validate by deserializing.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// The JSON schema for this type, for inclusion in a prompt.
    fn schema_json() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();
        if let serde_json::Value::Object(map) = &mut value {
            map.remove("$schema");
        }
        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Verdict {
        #[allow(dead_code)]
        newsworthy: bool,
        #[allow(dead_code)]
        score: i64,
    }

    #[test]
    fn schema_has_properties() {
        let schema = Verdict::schema_json();
        let props = schema.get("properties").and_then(|p| p.as_object()).unwrap();
        assert!(props.contains_key("newsworthy"));
        assert!(props.contains_key("score"));
        assert!(schema.get("$schema").is_none());
    }
}
