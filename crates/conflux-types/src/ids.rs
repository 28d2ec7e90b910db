//! Typed id wrappers.
//!
//! The Python original passes raw strings for `session_id`, `user_id`, and
//! friends, treating them as opaque tokens. We keep them as
//! newtype wrappers around `String` so the compiler catches a `SessionId`
//! handed to a function expecting a `UserId`, while `Display`/`Deserialize`
//! still read as a plain string on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn generate() -> Self {
                Self(crate::create_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(SessionId, "A conversation session id, stable across turns.");
opaque_id!(UserId, "An end-user id, scopes pipeline snapshots and memory.");
opaque_id!(MessageId, "A single stored chat message id.");
opaque_id!(AgentName, "The unique name of an agent config, used as a routing key.");
opaque_id!(TopicId, "A topic dimension key in the 3-D pipeline store.");
opaque_id!(KnowledgeBaseId, "A knowledge base id, scopes documents/chunks/triples.");
opaque_id!(DocumentId, "A document id within a knowledge base.");
opaque_id!(ChunkId, "A chunk id within a document.");
opaque_id!(NodeId, "A node id, unique within one flow graph.");
opaque_id!(RunId, "A single flow execution run id.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let id = SessionId::new("abc123");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc123\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn generate_produces_nonempty_unique_ids() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }
}
