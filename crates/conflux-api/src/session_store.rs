//! Persistence of `Session`/`Message`/`MessageNode`, grounded
//! on the same `object_store` + JSON-blob pattern `conflux-storage` uses for
//! pipeline snapshots — one blob per entity, listed by prefix rather than
//! queried, since a real deployment would back this with a database and the
//! spec treats SQL schema/migrations as an external collaborator.

use conflux_storage::{ConfluxStore, Path};
use conflux_types::ids::{MessageId, SessionId, UserId};
use conflux_types::model::{Message, MessageNode, Session};
use conflux_types::Result;

#[derive(Clone)]
pub struct SessionStore {
    store: ConfluxStore,
}

fn session_path(user_id: &str, session_id: &str) -> Path {
    Path::from(format!("sessions/{}/{}.json", urlencode(user_id), urlencode(session_id)))
}

fn message_path(session_id: &str, message_id: &str) -> Path {
    Path::from(format!("messages/{}/{}.json", urlencode(session_id), urlencode(message_id)))
}

fn message_node_path(message_id: &str, node_id: &str) -> Path {
    Path::from(format!("message_nodes/{}/{}.json", urlencode(message_id), urlencode(node_id)))
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c.to_string() } else { format!("%{:02X}", c as u32) })
        .collect()
}

impl SessionStore {
    pub fn new(store: ConfluxStore) -> Self {
        Self { store }
    }

    pub async fn create_session(&self, user_id: UserId, agent_id: Option<conflux_types::ids::AgentName>) -> Result<Session> {
        let session = Session::new(user_id, agent_id);
        self.store.put_json(&session_path(session.user_id.as_str(), session.session_id.as_str()), &session).await?;
        Ok(session)
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        let prefix = Path::from(format!("sessions/{}/", urlencode(user_id)));
        let mut sessions = Vec::new();
        for path in self.store.list_prefix(&prefix).await? {
            if let Some(session) = self.store.get_json::<Session>(&path).await? {
                sessions.push(session);
            }
        }
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    pub async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<Session>> {
        self.store.get_json(&session_path(user_id, session_id)).await
    }

    pub async fn append_message(&self, message: &Message) -> Result<()> {
        self.store.put_json(&message_path(message.session_id.as_str(), message.message_id.as_str()), message).await
    }

    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let prefix = Path::from(format!("messages/{}/", urlencode(session_id)));
        let mut messages = Vec::new();
        for path in self.store.list_prefix(&prefix).await? {
            if let Some(message) = self.store.get_json::<Message>(&path).await? {
                messages.push(message);
            }
        }
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    pub async fn append_message_node(&self, node: &MessageNode) -> Result<()> {
        self.store.put_json(&message_node_path(node.message_id.as_str(), node.node_id.as_str()), node).await
    }

    pub async fn list_message_nodes(&self, message_id: &MessageId) -> Result<Vec<MessageNode>> {
        let prefix = Path::from(format!("message_nodes/{}/", urlencode(message_id.as_str())));
        let mut nodes = Vec::new();
        for path in self.store.list_prefix(&prefix).await? {
            if let Some(node) = self.store.get_json::<MessageNode>(&path).await? {
                nodes.push(node);
            }
        }
        nodes.sort_by_key(|n| n.created_at);
        Ok(nodes)
    }

    /// Finds or creates the session for a chat request.
    pub async fn find_or_create(&self, user_id: &UserId, session_id: Option<SessionId>, agent_id: Option<conflux_types::ids::AgentName>) -> Result<Session> {
        if let Some(session_id) = session_id {
            if let Some(session) = self.get_session(user_id.as_str(), session_id.as_str()).await? {
                return Ok(session);
            }
            let mut session = Session::new(user_id.clone(), agent_id);
            session.session_id = session_id;
            self.store.put_json(&session_path(session.user_id.as_str(), session.session_id.as_str()), &session).await?;
            return Ok(session);
        }
        self.create_session(user_id.clone(), agent_id).await
    }
}

/// Bridges this crate's message persistence into the
/// `conflux_agents::SessionHistorySource` seam `GeneralAgent` calls to
/// rebuild a cold-process conversation window from durably stored messages
/// (spec §4.6 step 1).
#[async_trait::async_trait]
impl conflux_agents::SessionHistorySource for SessionStore {
    async fn list_session_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.list_messages(session_id).await
    }
}
