//! Bounded mutation history. Every `put`/`delete` appends one entry; the
//! Python list is unbounded, but the snapshot's history field is documented
//! as bounded, so entries beyond the cap are dropped oldest-first.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAP: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HistoryScope {
    Namespace { namespace: String },
    ThreeD {
        user_id: String,
        topic_id: String,
        agent_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub action: String,
    pub scope: HistoryScope,
    pub key: String,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    #[serde(skip, default = "default_cap")]
    cap: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

fn default_cap() -> usize {
    DEFAULT_HISTORY_CAP
}

impl History {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() >= self.cap.max(1) {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn recent(&self, limit: Option<usize>) -> Vec<HistoryEntry> {
        match limit {
            Some(limit) => {
                let start = self.entries.len().saturating_sub(limit);
                self.entries.iter().skip(start).cloned().collect()
            }
            None => self.entries.iter().cloned().collect(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
