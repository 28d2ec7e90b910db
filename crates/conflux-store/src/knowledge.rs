//! LLM-driven knowledge extraction: compresses a user's/agent's raw 3-D data
//! into dense, reusable summaries. Grounded
//! on `extract_user_knowledge`/`extract_topic_knowledge`/
//! `extract_agent_knowledge`/`extract_all_dimensions`/
//! `extract_and_store_dimensions` in
//! the original implementation.

use crate::pipeline::{Pipeline, Target};
use conflux_model::history::HistoryMessage;
use conflux_model::llm::{CompletionRequest, LlmProvider};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const USER_KNOWLEDGE_SYSTEM_PROMPT: &str = "You are a knowledge-compression expert. Extract only reusable, \
cross-topic traits, preferences, and habits from interaction data (e.g. prefers concise answers, likes \
technical depth, writes in English). Use terse keywords and phrases, semicolon-separated, maximizing \
information density per token. Output only the distilled knowledge, nothing else; output an empty string \
if there isn't enough signal.";

const TOPIC_SYSTEM_PROMPT: &str = "You are a topic-recognition expert. Identify the main topics discussed \
in the conversation content, merging near-duplicates (e.g. \"Python programming\" and \"programming\" \
become \"programming\"). Ignore small talk. Keep topic names short (one to a few words), ordered by \
frequency or importance. Respond with JSON: {\"topics\": [\"topic1\", \"topic2\", ...]}. Output only the \
JSON.";

const AGENT_KNOWLEDGE_SYSTEM_PROMPT: &str = "You are a knowledge-compression expert. Extract an agent's \
key replies, important information, and valuable conclusions from interaction data, discarding filler and \
repetition. Use the most concise language possible, maximizing information density. Output only the \
distilled knowledge, nothing else; output an empty string if there isn't enough signal.";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DimensionKnowledge {
    pub user: String,
    pub topics: Vec<String>,
    pub agents: HashMap<String, String>,
}

fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

impl Pipeline {
    /// Dense, cross-topic summary of everything known about a user,
    /// compressed by `llm` to roughly `max_tokens` worth of content.
    pub async fn extract_user_knowledge(&self, user_id: &str, max_tokens: u32, llm: &dyn LlmProvider) -> conflux_types::Result<String> {
        let mut lines = Vec::new();
        for topic in self.list_topics(Some(user_id)) {
            for agent in self.list_agents(Some(user_id), Some(&topic)) {
                let dims = crate::dimensions::Dimensions {
                    user_id: user_id.to_string(),
                    topic_id: topic.clone(),
                    agent_id: agent,
                };
                for (key, value) in self.get_3d_data(&dims) {
                    if key.ends_with("_metadata") {
                        continue;
                    }
                    lines.push(format!("{key}: {}", stringify(&value)));
                }
            }
        }
        if lines.is_empty() {
            return Ok(String::new());
        }
        let raw_content = lines.join("\n");

        let user_prompt = format!(
            "Extract reusable, cross-topic user traits and preferences from the following data:\n\n\
            {raw_content}\n\nRespond as concisely as possible (target: under {max_tokens} tokens)."
        );
        let request = CompletionRequest {
            temperature: Some(0.3),
            max_tokens: Some(max_tokens.saturating_mul(2)),
            ..CompletionRequest::new(vec![
                HistoryMessage::system(USER_KNOWLEDGE_SYSTEM_PROMPT),
                HistoryMessage::user(user_prompt),
            ])
        };
        match llm.complete(request).await {
            Ok(knowledge) => Ok(knowledge.trim().to_string()),
            Err(_) => {
                let cap = (max_tokens as usize).saturating_mul(3);
                Ok(if raw_content.len() > cap { raw_content[..cap].to_string() } else { raw_content })
            }
        }
    }

    /// Topic list mined from a user's conversational content across all
    /// topics/agents, deduplicated and capped at `max_topics`.
    pub async fn extract_topic_knowledge(&self, user_id: &str, max_topics: usize, llm: &dyn LlmProvider) -> conflux_types::Result<Vec<String>> {
        const CONVERSATION_MARKERS: [&str; 5] = ["user", "assistant", "message", "reply", "dialog"];
        const MAX_CONTENT_LENGTH: usize = 5000;

        let mut conversations = Vec::new();
        for topic in self.list_topics(Some(user_id)) {
            for agent in self.list_agents(Some(user_id), Some(&topic)) {
                let dims = crate::dimensions::Dimensions {
                    user_id: user_id.to_string(),
                    topic_id: topic.clone(),
                    agent_id: agent,
                };
                for (key, value) in self.get_3d_data(&dims) {
                    if key.ends_with("_metadata") {
                        continue;
                    }
                    let text = stringify(&value);
                    if text.len() <= 10 {
                        continue;
                    }
                    let lower = text.to_lowercase();
                    if CONVERSATION_MARKERS.iter().any(|marker| lower.contains(marker)) || text.len() > 50 {
                        conversations.push(text);
                    }
                }
            }
        }
        if conversations.is_empty() {
            return Ok(Vec::new());
        }

        let mut raw_content = conversations.join("\n");
        if raw_content.len() > MAX_CONTENT_LENGTH {
            raw_content.truncate(MAX_CONTENT_LENGTH);
            raw_content.push_str("...");
        }

        let user_prompt = format!(
            "Identify and extract the topics discussed below, merging similar ones, as JSON \
            (at most {max_topics}):\n\n{raw_content}"
        );
        let request = CompletionRequest {
            temperature: Some(0.3),
            max_tokens: Some(500),
            ..CompletionRequest::new(vec![
                HistoryMessage::system(TOPIC_SYSTEM_PROMPT),
                HistoryMessage::user(user_prompt),
            ])
        };
        let response = match llm.complete(request).await {
            Ok(response) => response,
            Err(_) => return Ok(Vec::new()),
        };

        let Some(json_str) = extract_json_object(&response) else {
            return Ok(Vec::new());
        };
        let parsed: serde_json::Value = match serde_json::from_str(json_str) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(Vec::new()),
        };
        let topics = parsed
            .get("topics")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .take(max_topics)
                    .collect()
            })
            .unwrap_or_default();
        Ok(topics)
    }

    /// Dense summary of one agent's data within one topic for one user.
    pub async fn extract_agent_knowledge(
        &self,
        user_id: &str,
        topic_id: &str,
        agent_id: &str,
        max_tokens: u32,
        llm: &dyn LlmProvider,
    ) -> conflux_types::Result<String> {
        let dims = crate::dimensions::Dimensions {
            user_id: user_id.to_string(),
            topic_id: topic_id.to_string(),
            agent_id: agent_id.to_string(),
        };
        let lines: Vec<String> = self
            .get_3d_data(&dims)
            .into_iter()
            .filter(|(key, _)| !key.ends_with("_metadata"))
            .map(|(key, value)| format!("{key}: {}", stringify(&value)))
            .collect();
        if lines.is_empty() {
            return Ok(String::new());
        }
        let raw_content = lines.join("\n");

        let user_prompt = format!(
            "Extract agent \"{agent_id}\"'s key content from the following data (target: under \
            {max_tokens} tokens):\n\n{raw_content}"
        );
        let request = CompletionRequest {
            temperature: Some(0.3),
            max_tokens: Some(max_tokens.saturating_mul(2)),
            ..CompletionRequest::new(vec![
                HistoryMessage::system(AGENT_KNOWLEDGE_SYSTEM_PROMPT),
                HistoryMessage::user(user_prompt),
            ])
        };
        match llm.complete(request).await {
            Ok(knowledge) => Ok(knowledge.trim().to_string()),
            Err(_) => {
                let cap = (max_tokens as usize).saturating_mul(3);
                Ok(if raw_content.len() > cap { raw_content[..cap].to_string() } else { raw_content })
            }
        }
    }

    /// Extracts user knowledge, the user's topic list, and every
    /// (topic, agent) pair's knowledge in one pass.
    pub async fn extract_all_dimensions(
        &self,
        user_id: &str,
        topic_id: Option<&str>,
        agent_id: Option<&str>,
        llm: &dyn LlmProvider,
    ) -> conflux_types::Result<DimensionKnowledge> {
        let user = self.extract_user_knowledge(user_id, 200, llm).await?;
        let topics = self.extract_topic_knowledge(user_id, 10, llm).await?;

        let actual_topics = self.list_topics(Some(user_id));
        let pairs: Vec<(String, String)> = match topic_id {
            Some(topic_id) if actual_topics.iter().any(|t| t == topic_id) => match agent_id {
                Some(agent_id) => vec![(topic_id.to_string(), agent_id.to_string())],
                None => self
                    .list_agents(Some(user_id), Some(topic_id))
                    .into_iter()
                    .map(|a| (topic_id.to_string(), a))
                    .collect(),
            },
            _ => actual_topics
                .into_iter()
                .flat_map(|t| {
                    self.list_agents(Some(user_id), Some(&t))
                        .into_iter()
                        .map(move |a| (t.clone(), a))
                })
                .collect(),
        };

        let mut agents = HashMap::new();
        for (t_id, a_id) in pairs {
            let knowledge = self.extract_agent_knowledge(user_id, &t_id, &a_id, 300, llm).await?;
            agents.insert(format!("{t_id}.{a_id}"), knowledge);
        }

        Ok(DimensionKnowledge { user, topics, agents })
    }

    /// Extracts knowledge and, unless `auto_store` is false, writes it back
    /// into the 3-D store under well-known keys (`user_knowledge`,
    /// `topics_list`, `agent_knowledge`).
    pub async fn extract_and_store_dimensions(
        &mut self,
        user_id: &str,
        topic_id: Option<&str>,
        agent_id: Option<&str>,
        llm: &dyn LlmProvider,
        auto_store: bool,
    ) -> conflux_types::Result<DimensionKnowledge> {
        let knowledge = self.extract_all_dimensions(user_id, topic_id, agent_id, llm).await?;

        if auto_store {
            if !knowledge.user.is_empty() {
                self.put(
                    "user_knowledge",
                    serde_json::Value::String(knowledge.user.clone()),
                    Target::three_d(Some(user_id.to_string()), None, None, None),
                );
            }
            if !knowledge.topics.is_empty() {
                self.put(
                    "topics_list",
                    serde_json::to_value(&knowledge.topics).unwrap_or(serde_json::Value::Null),
                    Target::three_d(Some(user_id.to_string()), None, None, None),
                );
            }
            for (agent_key, agent_knowledge) in &knowledge.agents {
                if agent_knowledge.is_empty() {
                    continue;
                }
                if let Some((t_id, a_id)) = agent_key.split_once('.') {
                    self.put(
                        "agent_knowledge",
                        serde_json::Value::String(agent_knowledge.clone()),
                        Target::three_d(Some(user_id.to_string()), Some(t_id.to_string()), Some(a_id.to_string()), None),
                    );
                }
            }
        }

        Ok(knowledge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use conflux_model::mock::MockLlmProvider;

    #[tokio::test]
    async fn extract_user_knowledge_is_empty_when_no_data() {
        let pipeline = Pipeline::new("p1");
        let llm = MockLlmProvider::new();
        let knowledge = pipeline.extract_user_knowledge("nobody", 200, &llm).await.unwrap();
        assert!(knowledge.is_empty());
    }

    #[tokio::test]
    async fn extract_and_store_dimensions_writes_user_knowledge_key() {
        let mut pipeline = Pipeline::new("p1");
        pipeline.put(
            "likes",
            serde_json::json!("terse answers"),
            Target::three_d(Some("u1".into()), Some("t1".into()), Some("a1".into()), None),
        );
        let llm = MockLlmProvider::with_response("prefers terse answers");
        let knowledge = pipeline
            .extract_and_store_dimensions("u1", None, None, &llm, true)
            .await
            .unwrap();
        assert_eq!(knowledge.user, "prefers terse answers");
        assert_eq!(
            pipeline.get(
                "user_knowledge",
                Target::three_d(Some("u1".into()), None, None, None)
            ),
            Some(serde_json::json!("prefers terse answers"))
        );
    }
}
