// src/session/mod.rs — Streaming chat session
//
// One exchange at a time: the outgoing payload is posted, the SSE body is
// decoded chunk by chunk and every change is pushed into the transcript.
// Cancellation is cooperative through a token checked at the initial request,
// before each chunk read and while the sidebar refreshes.

pub mod cancel;

use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::attachments::AttachmentBuffer;
use crate::backend::types::{ChatRequest, ConversationId};
use crate::backend::{ByteStream, ChatBackend};
use crate::catalog::ModelCatalog;
use crate::infra::errors::XeerError;
use crate::stream::{DecodedEvent, SseDecoder, StreamEvent};
use crate::view::{EntryId, Sidebar, Transcript, CONNECTION_ERROR, PASTED_PLACEHOLDER};

pub use cancel::CancelHandle;

/// Visual "working" hook, started when a request goes out and stopped on
/// every terminal state.
pub trait StreamIndicator: Send {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Indicator that does nothing.
pub struct NoIndicator;

impl StreamIndicator for NoIndicator {
    fn start(&mut self) {}
    fn stop(&mut self) {}
}

type SharedIndicator = Arc<Mutex<Box<dyn StreamIndicator>>>;

/// Starts the indicator and stops it on drop, including when the `send`
/// future is dropped mid-exchange.
struct IndicatorGuard(SharedIndicator);

impl IndicatorGuard {
    fn start(indicator: &SharedIndicator) -> Self {
        lock_indicator(indicator).start();
        Self(Arc::clone(indicator))
    }
}

impl Drop for IndicatorGuard {
    fn drop(&mut self) {
        lock_indicator(&self.0).stop();
    }
}

fn lock_indicator(
    indicator: &SharedIndicator,
) -> std::sync::MutexGuard<'_, Box<dyn StreamIndicator>> {
    indicator.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Streaming,
    Completed,
    Errored,
    Cancelled,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Errored | StreamState::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub state: StreamState,
    /// The assistant entry, unless it was discarded.
    pub entry: Option<EntryId>,
    /// Everything the server streamed for this exchange.
    pub text: String,
}

/// Join the typed message and serialized attachments into one payload.
pub fn merge_outgoing(message: &str, pasted: &str) -> String {
    match (message.is_empty(), pasted.is_empty()) {
        (_, true) => message.to_string(),
        (true, false) => pasted.to_string(),
        (false, false) => format!("{message}\n\n{pasted}"),
    }
}

pub struct ChatSession {
    backend: Arc<dyn ChatBackend>,
    conversation_id: Option<ConversationId>,
    selected_model: String,
    streamed_text: String,
    cancel: CancelHandle,
    indicator: SharedIndicator,
    state: Option<StreamState>,
    sidebar: Sidebar,
    catalog: Option<ModelCatalog>,
    /// Display text and payload of the last exchange, for regenerate.
    last_exchange: Option<(String, String)>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            conversation_id: None,
            selected_model: model.into(),
            streamed_text: String::new(),
            cancel: CancelHandle::default(),
            indicator: Arc::new(Mutex::new(Box::new(NoIndicator) as Box<dyn StreamIndicator>)),
            state: None,
            sidebar: Sidebar::default(),
            catalog: None,
            last_exchange: None,
        }
    }

    pub fn with_indicator(mut self, indicator: Box<dyn StreamIndicator>) -> Self {
        self.indicator = Arc::new(Mutex::new(indicator));
        self
    }

    /// Continue an existing conversation without loading its messages.
    pub fn with_conversation(mut self, id: ConversationId) -> Self {
        self.sidebar.set_active(Some(id.clone()));
        self.conversation_id = Some(id);
        self
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn streamed_text(&self) -> &str {
        &self.streamed_text
    }

    /// State of the current or most recent exchange.
    pub fn state(&self) -> Option<StreamState> {
        self.state
    }

    pub fn sidebar(&self) -> &Sidebar {
        &self.sidebar
    }

    pub fn catalog(&self) -> Option<&ModelCatalog> {
        self.catalog.as_ref()
    }

    /// True while an exchange is in flight. Callers check this before
    /// sending; a session never queues.
    pub fn is_busy(&self) -> bool {
        self.cancel.is_active()
    }

    /// Handle that can cancel the live exchange from elsewhere (e.g. a
    /// Ctrl-C listener) while `send` holds the session.
    pub fn canceller(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Send `message` plus any pending attachments. Attachments are consumed
    /// whether or not the exchange succeeds. Transport failures end up in
    /// the transcript; only an empty send is an error.
    pub async fn send(
        &mut self,
        message: &str,
        attachments: &mut AttachmentBuffer,
        transcript: &mut Transcript,
    ) -> Result<StreamOutcome, XeerError> {
        let message = message.trim();
        let pasted = attachments.take_serialized();
        let payload = merge_outgoing(message, &pasted);
        if payload.trim().is_empty() {
            return Err(XeerError::EmptyMessage);
        }

        let display = if message.is_empty() {
            PASTED_PLACEHOLDER.to_string()
        } else {
            message.to_string()
        };
        self.last_exchange = Some((display.clone(), payload.clone()));
        Ok(self.run_exchange(&display, payload, transcript).await)
    }

    /// Resend the previous payload.
    pub async fn regenerate(
        &mut self,
        transcript: &mut Transcript,
    ) -> Result<StreamOutcome, XeerError> {
        let (display, payload) = self.last_exchange.clone().ok_or(XeerError::EmptyMessage)?;
        Ok(self.run_exchange(&display, payload, transcript).await)
    }

    async fn run_exchange(
        &mut self,
        display: &str,
        payload: String,
        transcript: &mut Transcript,
    ) -> StreamOutcome {
        transcript.push_user(display);

        let guard = self.cancel.install();
        let token = guard.token();
        self.streamed_text.clear();
        let busy = IndicatorGuard::start(&self.indicator);
        let entry = transcript.begin_assistant();

        let request = ChatRequest {
            message: payload,
            conversation_id: self.conversation_id.clone(),
            model: self.selected_model.clone(),
        };
        let state = self.drive(&request, &token, entry, transcript).await;
        self.state = Some(state);

        drop(busy);
        drop(guard);
        tracing::debug!(?state, chars = self.streamed_text.len(), "exchange finished");

        StreamOutcome {
            state,
            entry: transcript.get(entry).map(|e| e.id),
            text: self.streamed_text.clone(),
        }
    }

    /// Connecting → Streaming → terminal.
    async fn drive(
        &mut self,
        request: &ChatRequest,
        token: &CancellationToken,
        entry: EntryId,
        transcript: &mut Transcript,
    ) -> StreamState {
        self.state = Some(StreamState::Connecting);
        let backend = Arc::clone(&self.backend);
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = backend.open_chat_stream(request) => Some(result),
        };

        let body = match opened {
            None => return self.finish_cancelled(entry, transcript),
            Some(Err(e)) => {
                tracing::warn!("chat request failed: {}", e);
                transcript.remove(entry);
                transcript.push_error(CONNECTION_ERROR);
                return StreamState::Errored;
            }
            Some(Ok(body)) => body,
        };

        self.state = Some(StreamState::Streaming);
        self.read_stream(body, token, entry, transcript).await
    }

    async fn read_stream(
        &mut self,
        mut body: ByteStream,
        token: &CancellationToken,
        entry: EntryId,
        transcript: &mut Transcript,
    ) -> StreamState {
        let mut decoder = SseDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return self.finish_cancelled(entry, transcript),
                next = body.next() => next,
            };

            let (events, at_end) = match next {
                Some(Ok(chunk)) => (decoder.push(&chunk), false),
                Some(Err(e)) => {
                    tracing::warn!("stream read failed: {}", e);
                    return self.finish_read_error(entry, transcript);
                }
                None => (decoder.finish(), true),
            };

            for event in events {
                if token.is_cancelled() {
                    return self.finish_cancelled(entry, transcript);
                }
                if let Some(state) = self.apply_event(event, token, entry, transcript).await {
                    return state;
                }
            }

            if at_end {
                tracing::warn!("stream ended without a done event");
                transcript.complete(entry, &self.streamed_text);
                return StreamState::Completed;
            }
        }
    }

    /// Apply one decoded event; returns the terminal state if it ends the
    /// exchange.
    async fn apply_event(
        &mut self,
        event: DecodedEvent,
        token: &CancellationToken,
        entry: EntryId,
        transcript: &mut Transcript,
    ) -> Option<StreamState> {
        match event {
            Ok(StreamEvent::ConversationId(id)) => {
                let first = self.conversation_id.is_none();
                self.conversation_id = Some(id.clone());
                self.sidebar.set_active(Some(id));
                if first {
                    // The refresh is a suspension point like any chunk read.
                    let backend = Arc::clone(&self.backend);
                    let listed = tokio::select! {
                        biased;
                        _ = token.cancelled() => return Some(self.finish_cancelled(entry, transcript)),
                        listed = backend.list_conversations() => listed,
                    };
                    match listed {
                        Ok(conversations) => self.sidebar.set_conversations(conversations),
                        Err(e) => tracing::warn!("conversation list refresh failed: {}", e),
                    }
                }
                None
            }
            Ok(StreamEvent::Content(delta)) => {
                self.streamed_text.push_str(&delta);
                transcript.update_streaming(entry, &self.streamed_text);
                None
            }
            Ok(StreamEvent::Done) => {
                transcript.complete(entry, &self.streamed_text);
                Some(StreamState::Completed)
            }
            Ok(StreamEvent::Error(message)) => {
                transcript.fail_reply(entry, &message);
                Some(StreamState::Errored)
            }
            Ok(StreamEvent::Unknown(kind)) => {
                tracing::debug!(kind = %kind, "ignoring unknown stream event");
                None
            }
            Err(e) => {
                tracing::warn!("skipping malformed stream event: {}", e);
                None
            }
        }
    }

    fn finish_cancelled(&mut self, entry: EntryId, transcript: &mut Transcript) -> StreamState {
        if self.streamed_text.is_empty() {
            transcript.remove(entry);
        } else {
            transcript.stop(entry, &self.streamed_text);
        }
        StreamState::Cancelled
    }

    /// A read error keeps whatever arrived and adds a connection notice.
    fn finish_read_error(&mut self, entry: EntryId, transcript: &mut Transcript) -> StreamState {
        if self.streamed_text.is_empty() {
            transcript.fail(entry, CONNECTION_ERROR);
        } else {
            transcript.fail(entry, &self.streamed_text);
            transcript.push_error(CONNECTION_ERROR);
        }
        StreamState::Errored
    }

    pub async fn refresh_conversations(&mut self) -> Result<(), XeerError> {
        let conversations = self.backend.list_conversations().await?;
        self.sidebar.set_conversations(conversations);
        Ok(())
    }

    /// Forget the active conversation; the next send starts a new one.
    pub fn new_conversation(&mut self, transcript: &mut Transcript) {
        self.conversation_id = None;
        self.last_exchange = None;
        self.sidebar.set_active(None);
        transcript.clear();
    }

    pub async fn load_conversation(
        &mut self,
        id: ConversationId,
        transcript: &mut Transcript,
    ) -> Result<(), XeerError> {
        let messages = self.backend.conversation_messages(&id).await?;
        transcript.load(&messages);
        self.sidebar.set_active(Some(id.clone()));
        self.conversation_id = Some(id);
        self.last_exchange = None;
        Ok(())
    }

    /// Delete on the server; deleting the open conversation also resets the
    /// transcript.
    pub async fn delete_conversation(
        &mut self,
        id: &ConversationId,
        transcript: &mut Transcript,
    ) -> Result<(), XeerError> {
        self.backend.delete_conversation(id).await?;
        self.sidebar.remove(id);
        if self.conversation_id.as_ref() == Some(id) {
            self.new_conversation(transcript);
        }
        if let Err(e) = self.refresh_conversations().await {
            tracing::warn!("conversation list refresh failed: {}", e);
        }
        Ok(())
    }

    pub async fn rename_conversation(
        &mut self,
        id: &ConversationId,
        title: &str,
    ) -> Result<String, XeerError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(XeerError::InvalidTitle);
        }
        let stored = self.backend.rename_conversation(id, title).await?;
        self.sidebar.rename(id, &stored);
        Ok(stored)
    }

    pub async fn clear_all(&mut self, transcript: &mut Transcript) -> Result<(), XeerError> {
        self.backend.clear_conversations().await?;
        self.sidebar.clear();
        self.new_conversation(transcript);
        Ok(())
    }

    pub async fn load_models(&mut self) -> Result<&ModelCatalog, XeerError> {
        let catalog = self.backend.models().await?;
        let catalog = self.catalog.insert(catalog);
        Ok(&*catalog)
    }

    /// Switch models. Keys are checked against the catalog when one has
    /// been loaded.
    pub fn select_model(&mut self, key: &str) -> Result<(), XeerError> {
        let key = key.trim();
        if let Some(catalog) = &self.catalog {
            if !catalog.contains(key) {
                return Err(XeerError::UnknownModel {
                    key: key.to_string(),
                });
            }
        }
        self.selected_model = key.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_outgoing() {
        assert_eq!(merge_outgoing("hi", ""), "hi");
        assert_eq!(merge_outgoing("", "```\nx\n```"), "```\nx\n```");
        assert_eq!(merge_outgoing("look", "```\nx\n```"), "look\n\n```\nx\n```");
        assert_eq!(merge_outgoing("", ""), "");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!StreamState::Connecting.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
        assert!(StreamState::Completed.is_terminal());
        assert!(StreamState::Errored.is_terminal());
        assert!(StreamState::Cancelled.is_terminal());
    }
}
