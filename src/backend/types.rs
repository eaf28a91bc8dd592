// src/backend/types.rs — Wire types for the chat backend's HTTP API

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Characters escaped inside a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Opaque conversation identifier, kept exactly as the backend sent it
/// (a JSON number today, but strings are accepted too).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(serde_json::Value);

impl ConversationId {
    pub fn from_value(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Parse user input: integers stay numeric so the backend sees the same
    /// type it issued.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.parse::<i64>() {
            Ok(n) => Self(serde_json::Value::from(n)),
            Err(_) => Self(serde_json::Value::String(s.to_string())),
        }
    }

    /// Percent-encoded form for use inside a URL path.
    pub fn path_segment(&self) -> String {
        utf8_percent_encode(&self.to_string(), PATH_SEGMENT).to_string()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Body of `POST /api/chat` on the streaming path.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<ConversationId>,
    pub model: String,
}

/// Body of `POST /api/chat` on the non-streaming path.
#[derive(Debug, Clone, Serialize)]
pub struct LegacyChatRequest {
    pub message: String,
    pub user_id: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyChatResponse {
    pub success: bool,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ConversationList {
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct MessageList {
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RenameResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderModels {
    pub display_name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelsResponse {
    pub success: bool,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderModels>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub display_name: String,
    #[serde(default)]
    pub icon: String,
    pub used: u64,
    pub limit: u64,
    pub remaining: u64,
    pub percent_used: f64,
    #[serde(default)]
    pub reset_in_seconds: u64,
    #[serde(default)]
    pub reset_countdown: String,
    #[serde(default)]
    pub reset_time_local: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct UsageResponse {
    #[serde(default)]
    pub stats: BTreeMap<String, ProviderUsage>,
}
