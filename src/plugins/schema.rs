//! Node id slugs and config schema normalization.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::types::NodeDef;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w]").expect("valid regex"));

/// Derive a stable node id from a display name.
///
/// Lowercases, turns spaces into underscores and strips every remaining
/// non-word character. `slugify(slugify(x)) == slugify(x)`.
///
/// ```
/// use nodeworks::plugins::slugify;
/// assert_eq!(slugify("My Node!"), "my_node");
/// ```
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase().replace(' ', "_");
    NON_WORD.replace_all(&lowered, "").into_owned()
}

/// Schema used for nodes that declare none.
pub fn default_config_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "description": {
                "type": "string",
                "title": "Description",
                "description": "What this node does in the workflow"
            },
            "custom_name": {
                "type": "string",
                "title": "Custom Name",
                "description": "Display name for this node instance"
            }
        }
    })
}

/// Rebuild a node's config schema for callers.
///
/// An absent, null, non-object, or empty schema is replaced with
/// [`default_config_schema`]. The result always has a `title` naming the node
/// and its id, and an `x-schema-id` of `<plugin>:<node>:<stamp>` so that two
/// nodes with the same name never share a cached schema in a client.
pub fn normalize_config_schema(plugin_id: &str, node: &NodeDef, stamp_millis: i64) -> Value {
    let mut schema: Map<String, Value> = match &node.config_schema {
        Some(Value::Object(map)) if !map.is_empty() => map.clone(),
        _ => match default_config_schema() {
            Value::Object(map) => map,
            _ => Map::new(),
        },
    };

    schema
        .entry("type")
        .or_insert_with(|| Value::String("object".to_string()));
    if !schema.get("properties").is_some_and(Value::is_object) {
        schema.insert("properties".to_string(), json!({}));
    }

    schema.insert(
        "title".to_string(),
        Value::String(format!("{} ({})", node.display_name(), node.id)),
    );
    schema.insert(
        "x-schema-id".to_string(),
        Value::String(format!("{}:{}:{}", plugin_id, node.id, stamp_millis)),
    );

    Value::Object(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, name: &str, schema: Option<Value>) -> NodeDef {
        NodeDef {
            id: id.to_string(),
            name: Some(name.to_string()),
            description: String::new(),
            category: None,
            inputs: vec![],
            outputs: vec![],
            config_schema: schema,
            tags: vec![],
        }
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("My Node!"), "my_node");
        assert_eq!(slugify("My Node!"), slugify("My Node!"));
        assert_eq!(slugify("HTTP Request (v2)"), "http_request_v2");
    }

    #[test]
    fn test_slugify_idempotent() {
        for name in ["My Node!", "a-b c", "Already_slug", "  padded  "] {
            let once = slugify(name);
            assert_eq!(slugify(&once), once);
        }
    }

    #[test]
    fn test_slugify_keeps_unicode_word_chars() {
        assert_eq!(slugify("Café Ölçer"), "café_ölçer");
    }

    #[test]
    fn test_normalize_missing_schema_synthesizes_default() {
        let schema = normalize_config_schema("p", &node("n", "Node", None), 42);
        let props = schema["properties"].as_object().unwrap();
        assert!(props.contains_key("description"));
        assert!(props.contains_key("custom_name"));
        assert_eq!(schema["type"], "object");
    }

    #[test]
    fn test_normalize_empty_and_null_schema_synthesizes_default() {
        for raw in [json!({}), Value::Null, json!("not a schema")] {
            let schema = normalize_config_schema("p", &node("n", "Node", Some(raw)), 1);
            assert!(schema["properties"]["custom_name"].is_object());
        }
    }

    #[test]
    fn test_normalize_keeps_declared_properties() {
        let declared = json!({
            "type": "object",
            "properties": {"threshold": {"type": "number"}},
            "required": ["threshold"]
        });
        let schema = normalize_config_schema("p", &node("n", "Node", Some(declared)), 1);
        assert!(schema["properties"]["threshold"].is_object());
        assert!(schema["properties"].get("custom_name").is_none());
        assert_eq!(schema["required"], json!(["threshold"]));
    }

    #[test]
    fn test_normalize_title_and_uniqueness_token() {
        let a = normalize_config_schema("plugin-a", &node("n1", "Same Name", None), 1000);
        let b = normalize_config_schema("plugin-b", &node("n2", "Same Name", None), 1000);

        let title = a["title"].as_str().unwrap();
        assert!(title.contains("Same Name"));
        assert!(title.contains("n1"));
        assert_eq!(a["x-schema-id"], "plugin-a:n1:1000");
        assert_ne!(a["x-schema-id"], b["x-schema-id"]);
    }

    #[test]
    fn test_normalize_replaces_non_object_properties() {
        let declared = json!({"type": "object", "properties": "oops", "x": 1});
        let schema = normalize_config_schema("p", &node("n", "N", Some(declared)), 1);
        assert!(schema["properties"].is_object());
        assert_eq!(schema["x"], 1);
    }
}
