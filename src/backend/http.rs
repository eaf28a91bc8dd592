// src/backend/http.rs — reqwest implementation of ChatBackend

use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

use super::types::{
    ChatRequest, ConversationId, ConversationList, ConversationSummary, LegacyChatRequest,
    LegacyChatResponse, MessageList, ModelsResponse, ProviderUsage, RenameResponse, StoredMessage,
    UsageResponse,
};
use super::{ByteStream, ChatBackend};
use crate::catalog::ModelCatalog;
use crate::infra::errors::XeerError;

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    legacy_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            legacy_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_legacy_timeout(mut self, timeout: Duration) -> Self {
        self.legacy_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, XeerError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(XeerError::from_reqwest)?;
        decode_json(check_status(response).await?).await
    }
}

/// Turn a non-2xx response into an error carrying its body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, XeerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.as_u16() == 429 {
        return Err(XeerError::RateLimited);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), "backend returned error status");
    Err(XeerError::HttpStatus {
        status: status.as_u16(),
        body,
    })
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, XeerError> {
    let bytes = response.bytes().await.map_err(XeerError::from_reqwest)?;
    serde_json::from_slice(&bytes).map_err(|e| XeerError::Decode(e.to_string()))
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, XeerError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(XeerError::from_reqwest)?;

        let response = check_status(response).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(XeerError::from_reqwest));
        Ok(Box::pin(stream))
    }

    async fn chat_once(
        &self,
        request: &LegacyChatRequest,
    ) -> Result<LegacyChatResponse, XeerError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .timeout(self.legacy_timeout)
            .json(request)
            .send()
            .await
            .map_err(XeerError::from_reqwest)?;

        let reply: LegacyChatResponse = decode_json(check_status(response).await?).await?;
        if !reply.success {
            return Err(XeerError::Backend(
                reply
                    .error
                    .unwrap_or_else(|| "Failed to get response".to_string()),
            ));
        }
        Ok(reply)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, XeerError> {
        let list: ConversationList = self.get_json("/api/conversations").await?;
        Ok(list.conversations)
    }

    async fn conversation_messages(
        &self,
        id: &ConversationId,
    ) -> Result<Vec<StoredMessage>, XeerError> {
        let path = format!("/api/conversations/{}/messages", id.path_segment());
        let list: MessageList = self.get_json(&path).await?;
        Ok(list.messages)
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), XeerError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/conversations/{}", id.path_segment())))
            .send()
            .await
            .map_err(XeerError::from_reqwest)?;
        check_status(response).await?;
        Ok(())
    }

    async fn rename_conversation(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<String, XeerError> {
        let response = self
            .client
            .put(self.url(&format!(
                "/api/conversations/{}/rename",
                id.path_segment()
            )))
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await
            .map_err(XeerError::from_reqwest)?;

        let reply: RenameResponse = decode_json(check_status(response).await?).await?;
        if !reply.success {
            return Err(XeerError::Backend(
                reply.error.unwrap_or_else(|| "Rename failed".to_string()),
            ));
        }
        Ok(reply.title.unwrap_or_else(|| title.to_string()))
    }

    async fn clear_conversations(&self) -> Result<(), XeerError> {
        let response = self
            .client
            .post(self.url("/api/clear"))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(XeerError::from_reqwest)?;
        check_status(response).await?;
        Ok(())
    }

    async fn models(&self) -> Result<ModelCatalog, XeerError> {
        let reply: ModelsResponse = self.get_json("/api/models").await?;
        if !reply.success {
            return Err(XeerError::Backend(
                reply
                    .error
                    .unwrap_or_else(|| "Failed to load models".to_string()),
            ));
        }
        Ok(ModelCatalog::new(reply.providers))
    }

    async fn usage(&self) -> Result<BTreeMap<String, ProviderUsage>, XeerError> {
        let reply: UsageResponse = self.get_json("/api/usage").await?;
        Ok(reply.stats)
    }
}
