//! History codec
//!
//! Imports the plain `{role, content}` record a caller keeps between
//! invocations into internal turn form. Decoding never fails: malformed
//! entries are skipped with a warning and the rest of the history survives.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::turn::{ConversationTurn, Role, Transcript, TurnContent};

/// One entry of caller-held history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainEntry {
    pub role: String,
    pub content: String,
}

impl PlainEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

fn parse_role(role: &str) -> Option<Role> {
    match role {
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}

/// Decode plain history into turns, preserving order
pub fn decode(plain: &[PlainEntry]) -> Vec<ConversationTurn> {
    decode_into_transcript(plain).turns().to_vec()
}

/// Decode plain history straight into a fresh transcript
pub fn decode_into_transcript(plain: &[PlainEntry]) -> Transcript {
    let mut transcript = Transcript::new();
    for (index, entry) in plain.iter().enumerate() {
        match parse_role(&entry.role) {
            Some(role) => {
                transcript.push(role, TurnContent::Text { text: entry.content.clone() });
            }
            None => warn!(index, role = %entry.role, "Skipping history entry with unknown role"),
        }
    }
    transcript
}

/// Parse the serialized form passed across invocations (a JSON array)
///
/// Absent, blank or unparseable input yields no entries. Malformed entries
/// are dropped one at a time.
pub fn parse_json(serialized: Option<&str>) -> Vec<PlainEntry> {
    let Some(text) = serialized.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Could not parse conversation history, starting fresh");
            return Vec::new();
        }
    };

    let Value::Array(items) = value else {
        warn!("Conversation history is not a JSON array, starting fresh");
        return Vec::new();
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<PlainEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed history entry");
                None
            }
        })
        .collect()
}

/// Parse and decode serialized history into a fresh transcript
pub fn decode_json(serialized: Option<&str>) -> Transcript {
    decode_into_transcript(&parse_json(serialized))
}

/// Serialize plain history for the next invocation
pub fn to_json(plain: &[PlainEntry]) -> serde_json::Result<String> {
    serde_json::to_string(plain)
}
