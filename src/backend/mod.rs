// src/backend/mod.rs — Chat backend layer

pub mod http;
pub mod retry;
pub mod types;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::catalog::ModelCatalog;
use crate::infra::errors::XeerError;
use types::{
    ChatRequest, ConversationId, ConversationSummary, LegacyChatRequest, LegacyChatResponse,
    ProviderUsage, StoredMessage,
};

pub use http::HttpBackend;

/// Raw response body of a streaming chat request, chunked however the
/// transport delivers it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, XeerError>> + Send>>;

/// Everything the client needs from the chat server.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `POST /api/chat` expecting an SSE body. Errors if the connection
    /// fails or the status is not 2xx.
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, XeerError>;

    /// `POST /api/chat` expecting a single JSON reply.
    async fn chat_once(&self, request: &LegacyChatRequest)
        -> Result<LegacyChatResponse, XeerError>;

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, XeerError>;

    async fn conversation_messages(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<StoredMessage>, XeerError>;

    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), XeerError>;

    /// Returns the title the server stored.
    async fn rename_conversation(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<String, XeerError>;

    async fn clear_conversations(&self) -> Result<(), XeerError>;

    async fn models(&self) -> Result<ModelCatalog, XeerError>;

    async fn usage(
        &self,
    ) -> Result<std::collections::BTreeMap<String, ProviderUsage>, XeerError>;
}
