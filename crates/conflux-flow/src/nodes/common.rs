//! Shared helpers used by several C5 node implementations: tool-name
//! resolution, JSON Schema
//! `required` introspection, and small config-reading conveniences.

use conflux_tools::ToolRegistry;
use serde_json::Value;

pub fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(|v| v.as_str())
}

pub fn config_obj<'a>(config: &'a Value, key: &str) -> Option<&'a serde_json::Map<String, Value>> {
    config.get(key).and_then(|v| v.as_object())
}

/// Resolves a tool's registry name from a node config, following
/// ToolNode's documented order: explicit `tool_type = mcp` builds
/// `mcp_{server}_{tool}`; else `tool_name` directly; else `{server}_{tool}`;
/// else a registry suffix search.
pub fn resolve_tool_name(config: &Value, tools: &ToolRegistry) -> Option<String> {
    let tool_type = config_str(config, "tool_type");
    let server = config_str(config, "server");
    let tool = config_str(config, "tool");

    if tool_type == Some("mcp") {
        if let (Some(server), Some(tool)) = (server, tool) {
            return Some(format!("mcp_{server}_{tool}"));
        }
    }
    if let Some(name) = config_str(config, "tool_name") {
        return Some(name.to_string());
    }
    if let (Some(server), Some(tool)) = (server, tool) {
        let candidate = format!("{server}_{tool}");
        if tools.get(&candidate).is_some() {
            return Some(candidate);
        }
    }
    if let Some(tool) = tool {
        let suffix = format!("_{tool}");
        if let Some(found) = tools
            .list(None)
            .into_iter()
            .find(|info| info.name.ends_with(&suffix) || info.name == tool)
        {
            return Some(found.name);
        }
    }
    None
}

/// The `required` array of a JSON Schema object, as plain strings.
pub fn required_fields(schema: &Value) -> Vec<String> {
    schema
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Heuristic for "value looks like an unfilled schema placeholder rather
/// than a real argument".
pub fn looks_like_schema_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.contains_key("type") || map.contains_key("properties"))
}

/// Whether a tool's name/description suggests it's a search tool (used by
/// ToolNode's search-result persistence rule and GeneralAgent's default
/// tool inference).
pub fn looks_like_search_tool(name: &str, description: &str) -> bool {
    const KEYWORDS: &[&str] = &["search", "lookup", "find", "query"];
    let lowered_name = name.to_lowercase();
    let lowered_desc = description.to_lowercase();
    KEYWORDS
        .iter()
        .any(|kw| lowered_name.contains(kw) || lowered_desc.contains(kw))
}

/// A filesystem-safe slug for the search-results filename rule.
pub fn slugify(text: &str) -> String {
    let mut slug: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    slug.truncate(40);
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        "query".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Sun Tzu's Art of War!"), "sun_tzu_s_art_of_war");
    }

    #[test]
    fn schema_object_is_detected() {
        assert!(looks_like_schema_object(&serde_json::json!({"type": "string"})));
        assert!(!looks_like_schema_object(&serde_json::json!("a plain string")));
    }
}
