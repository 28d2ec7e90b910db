//! Shared vocabulary for the conflux workspace: error taxonomy, id
//! generation, and small json helpers re-exported so every crate agrees on
//! the same `serde_json::Value` and the same `Result` alias.

pub mod error;
pub mod ids;
pub mod model;

pub use error::{Error, Result};
pub use serde_json::{Value, json};

/// Generate a collision-resistant opaque id, used for session/message/run ids.
pub fn create_id() -> String {
    cuid2::create_id()
}

/// Current unix-epoch milliseconds, the timestamp unit used across
/// `Message`, `Pipeline` history entries, and chunk metadata.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
