//! 3-D dimension extraction, grounded on
//! `Pipeline._get_dimensions_from_context` in
//! the original implementation: callers pass a loose
//! context map and the store derives `(user_id, topic_id, agent_id)` from
//! documented key aliases, falling back to fixed defaults.

use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_USER_ID: &str = "default_user";
pub const DEFAULT_TOPIC_ID: &str = "default_topic";
pub const DEFAULT_AGENT_ID: &str = "default_agent";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub user_id: String,
    pub topic_id: String,
    pub agent_id: String,
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            topic_id: DEFAULT_TOPIC_ID.to_string(),
            agent_id: DEFAULT_AGENT_ID.to_string(),
        }
    }
}

/// A loose key/value context bag, as passed around flow/agent call sites
/// (`user_id`/`topic_id`/`session_id`/`agent_name` are read, ).
pub type Context = HashMap<String, Value>;

fn string_field(context: &Context, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        context.get(*key).and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(_) | Value::Bool(_) => Some(v.to_string()),
            _ => None,
        })
    })
}

impl Dimensions {
    pub fn from_context(context: Option<&Context>) -> Self {
        let Some(context) = context else {
            return Self::default();
        };
        Self {
            user_id: string_field(context, &["user_id", "user"]).unwrap_or_else(|| DEFAULT_USER_ID.into()),
            topic_id: string_field(context, &["topic_id", "topic", "session_id"])
                .unwrap_or_else(|| DEFAULT_TOPIC_ID.into()),
            agent_id: string_field(context, &["agent_id", "agent_name", "agent"])
                .unwrap_or_else(|| DEFAULT_AGENT_ID.into()),
        }
    }

    /// Merges explicit overrides over whatever the context would have
    /// produced, per `put`'s "if any of user/topic/agent is None, fill from
    /// context" behavior.
    pub fn resolve(
        user_id: Option<String>,
        topic_id: Option<String>,
        agent_id: Option<String>,
        context: Option<&Context>,
    ) -> Self {
        let fallback = Self::from_context(context);
        Self {
            user_id: user_id.unwrap_or(fallback.user_id),
            topic_id: topic_id.unwrap_or(fallback.topic_id),
            agent_id: agent_id.unwrap_or(fallback.agent_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_context_uses_defaults() {
        let dims = Dimensions::from_context(None);
        assert_eq!(dims.user_id, DEFAULT_USER_ID);
    }

    #[test]
    fn session_id_aliases_topic_id() {
        let mut ctx = Context::new();
        ctx.insert("session_id".to_string(), Value::String("sess-1".into()));
        let dims = Dimensions::from_context(Some(&ctx));
        assert_eq!(dims.topic_id, "sess-1");
    }

    #[test]
    fn explicit_override_wins_over_context() {
        let mut ctx = Context::new();
        ctx.insert("user_id".to_string(), Value::String("ctx-user".into()));
        let dims = Dimensions::resolve(Some("explicit-user".into()), None, None, Some(&ctx));
        assert_eq!(dims.user_id, "explicit-user");
    }
}
