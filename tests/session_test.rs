// tests/session_test.rs — Integration test: streaming chat session with a mock backend

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;

use xeerchat::attachments::AttachmentBuffer;
use xeerchat::backend::types::{
    ChatRequest, ConversationId, ConversationSummary, LegacyChatRequest, LegacyChatResponse,
    ModelEntry, ProviderModels, ProviderUsage, StoredMessage,
};
use xeerchat::backend::{ByteStream, ChatBackend};
use xeerchat::catalog::ModelCatalog;
use xeerchat::infra::errors::XeerError;
use xeerchat::session::{CancelHandle, ChatSession, StreamIndicator, StreamState};
use xeerchat::view::{
    render_entry, Entry, EntryStatus, MessageAction, Transcript, TranscriptRenderer,
    BUSY_CURSOR, CONNECTION_ERROR, PASTED_PLACEHOLDER, STOPPED_MARKER,
};

/// What the next `open_chat_stream` call does.
enum Script {
    /// Deliver these chunks, then end the body.
    Chunks(Vec<Result<Vec<u8>, XeerError>>),
    /// Deliver these chunks, then never finish.
    ChunksThenHang(Vec<&'static str>),
    /// Never answer the request.
    Hang,
    /// Fail to connect.
    Refuse,
}

fn chunks(parts: &[&str]) -> Script {
    Script::Chunks(parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect())
}

/// A mock backend that replays scripted SSE bodies without any network.
#[derive(Default)]
struct MockBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatRequest>>,
    list_calls: AtomicU32,
    /// When set, `list_conversations` never answers.
    stall_listing: bool,
    deleted: Mutex<Vec<ConversationId>>,
}

impl MockBackend {
    fn with_scripts(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, XeerError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| chunks(&["data: {\"type\":\"done\"}\n\n"]));
        match script {
            Script::Chunks(items) => Ok(futures::stream::iter(items).boxed()),
            Script::ChunksThenHang(parts) => {
                let items: Vec<Result<Vec<u8>, XeerError>> =
                    parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
                Ok(futures::stream::iter(items)
                    .chain(futures::stream::pending())
                    .boxed())
            }
            Script::Hang => futures::future::pending().await,
            Script::Refuse => Err(XeerError::Connection {
                message: "connection refused".into(),
                retriable: true,
            }),
        }
    }

    async fn chat_once(
        &self,
        _request: &LegacyChatRequest,
    ) -> Result<LegacyChatResponse, XeerError> {
        Err(XeerError::Backend("not used".into()))
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, XeerError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_listing {
            futures::future::pending::<()>().await;
        }
        Ok(vec![ConversationSummary {
            id: ConversationId::parse("7"),
            title: "Hello".into(),
            created_at: None,
            updated_at: None,
            message_count: 2,
        }])
    }

    async fn conversation_messages(
        &self,
        _id: &ConversationId,
    ) -> Result<Vec<StoredMessage>, XeerError> {
        Ok(vec![
            StoredMessage {
                role: xeerchat::backend::types::Role::User,
                content: "hi".into(),
                timestamp: None,
            },
            StoredMessage {
                role: xeerchat::backend::types::Role::Assistant,
                content: "hello!".into(),
                timestamp: None,
            },
        ])
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), XeerError> {
        self.deleted.lock().unwrap().push(id.clone());
        Ok(())
    }

    async fn rename_conversation(
        &self,
        _id: &ConversationId,
        title: &str,
    ) -> Result<String, XeerError> {
        Ok(title.to_string())
    }

    async fn clear_conversations(&self) -> Result<(), XeerError> {
        Ok(())
    }

    async fn models(&self) -> Result<ModelCatalog, XeerError> {
        let mut models = BTreeMap::new();
        models.insert(
            "gemini-1.5-flash".to_string(),
            ModelEntry {
                name: "Gemini 1.5 Flash".into(),
                description: String::new(),
                icon: None,
            },
        );
        let mut providers = BTreeMap::new();
        providers.insert(
            "gemini".to_string(),
            ProviderModels {
                display_name: "Google Gemini".into(),
                icon: "✨".into(),
                models,
            },
        );
        Ok(ModelCatalog::new(providers))
    }

    async fn usage(&self) -> Result<BTreeMap<String, ProviderUsage>, XeerError> {
        Ok(BTreeMap::new())
    }
}

/// Records every renderer notification and, optionally, cancels the live
/// exchange as soon as streamed content shows up.
#[derive(Clone, Default)]
struct Recorder {
    changes: Arc<Mutex<Vec<Entry>>>,
    removed: Arc<Mutex<Vec<Entry>>>,
    handle_seen: Arc<Mutex<Vec<bool>>>,
    watch: Option<CancelHandle>,
    cancel_on_content: bool,
}

impl TranscriptRenderer for Recorder {
    fn entry_changed(&mut self, entry: &Entry) {
        self.changes.lock().unwrap().push(entry.clone());
        if let Some(handle) = &self.watch {
            self.handle_seen.lock().unwrap().push(handle.is_active());
            if self.cancel_on_content
                && entry.status == EntryStatus::Streaming
                && !entry.raw.is_empty()
            {
                handle.cancel();
            }
        }
    }

    fn entry_removed(&mut self, entry: &Entry) {
        self.removed.lock().unwrap().push(entry.clone());
    }
}

#[derive(Clone, Default)]
struct CountingIndicator {
    starts: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
}

impl StreamIndicator for CountingIndicator {
    fn start(&mut self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn session_for(backend: &Arc<MockBackend>) -> ChatSession {
    ChatSession::new(backend.clone() as Arc<dyn ChatBackend>, "gemini-1.5-flash")
}

async fn send_plain(
    session: &mut ChatSession,
    transcript: &mut Transcript,
    message: &str,
) -> xeerchat::session::StreamOutcome {
    let mut attachments = AttachmentBuffer::new();
    session
        .send(message, &mut attachments, transcript)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_content_then_done_completes() {
    let backend = MockBackend::with_scripts(vec![chunks(&[
        "data: {\"type\":\"content\",\"content\":\"Hi\"}\n\n",
        "data: {\"type\":\"done\"}\n\n",
    ])]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();

    let outcome = send_plain(&mut session, &mut transcript, "hello").await;

    assert_eq!(outcome.state, StreamState::Completed);
    assert_eq!(outcome.text, "Hi");
    assert_eq!(session.streamed_text(), "Hi");
    assert!(!session.is_busy());

    let reply = transcript.last_assistant().unwrap();
    assert_eq!(reply.raw, "Hi");
    assert_eq!(reply.status, EntryStatus::Complete);
    assert_eq!(
        reply.actions,
        vec![MessageAction::Copy, MessageAction::Regenerate]
    );
    assert!(!render_entry(reply).contains(BUSY_CURSOR));
    assert_eq!(transcript.entries()[0].raw, "hello");

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "hello");
    assert_eq!(requests[0].model, "gemini-1.5-flash");
    assert!(requests[0].conversation_id.is_none());
}

#[tokio::test]
async fn test_events_split_across_chunks() {
    // The event boundary and a multi-byte character both straddle chunks.
    let body = "data: {\"type\":\"content\",\"content\":\"caf\u{e9} \"}\n\ndata: {\"type\":\"content\",\"content\":\"ok\"}\n\ndata: {\"type\":\"done\"}\n\n";
    let bytes = body.as_bytes();
    let split_a = body.find('\u{e9}').unwrap() + 1;
    let split_b = body.find("\n\ndata").unwrap() + 1;
    let backend = MockBackend::with_scripts(vec![Script::Chunks(vec![
        Ok(bytes[..split_a].to_vec()),
        Ok(bytes[split_a..split_b].to_vec()),
        Ok(bytes[split_b..].to_vec()),
    ])]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();

    let outcome = send_plain(&mut session, &mut transcript, "hi").await;

    assert_eq!(outcome.state, StreamState::Completed);
    assert_eq!(outcome.text, "caf\u{e9} ok");
}

#[tokio::test]
async fn test_conversation_id_adopted_and_sidebar_refreshed_once() {
    let backend = MockBackend::with_scripts(vec![
        chunks(&[
            "data: {\"type\":\"conversation_id\",\"conversation_id\":7}\n\n",
            "data: {\"type\":\"content\",\"content\":\"A\"}\n\ndata: {\"type\":\"done\"}\n\n",
        ]),
        chunks(&[
            "data: {\"type\":\"conversation_id\",\"conversation_id\":7}\n\n",
            "data: {\"type\":\"done\"}\n\n",
        ]),
    ]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();

    send_plain(&mut session, &mut transcript, "first").await;
    assert_eq!(session.conversation_id(), Some(&ConversationId::parse("7")));
    assert_eq!(session.sidebar().conversations().len(), 1);
    assert_eq!(session.sidebar().active(), Some(&ConversationId::parse("7")));

    send_plain(&mut session, &mut transcript, "second").await;
    assert_eq!(backend.list_calls.load(Ordering::SeqCst), 1);

    let requests = backend.requests();
    assert_eq!(
        requests[1].conversation_id,
        Some(ConversationId::parse("7"))
    );
}

#[tokio::test]
async fn test_error_event_fails_entry() {
    let backend = MockBackend::with_scripts(vec![chunks(&[
        "data: {\"type\":\"error\",\"message\":\"Model overloaded\"}\n\n",
    ])]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();

    let outcome = send_plain(&mut session, &mut transcript, "hi").await;

    assert_eq!(outcome.state, StreamState::Errored);
    let reply = transcript.last_assistant().unwrap();
    assert_eq!(reply.raw, "Model overloaded");
    assert_eq!(reply.status, EntryStatus::Failed);
    assert_eq!(
        reply.actions,
        vec![MessageAction::Copy, MessageAction::Regenerate]
    );
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_connect_failure_replaces_placeholder() {
    let backend = MockBackend::with_scripts(vec![Script::Refuse]);
    let mut session = session_for(&backend);
    let recorder = Recorder::default();
    let mut transcript = Transcript::with_renderer(Box::new(recorder.clone()));

    let outcome = send_plain(&mut session, &mut transcript, "hi").await;

    assert_eq!(outcome.state, StreamState::Errored);
    assert!(outcome.entry.is_none());
    assert_eq!(recorder.removed.lock().unwrap().len(), 1);

    let entries = transcript.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].raw, CONNECTION_ERROR);
    assert_eq!(entries[1].status, EntryStatus::Failed);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_read_error_keeps_partial_reply() {
    let backend = MockBackend::with_scripts(vec![Script::Chunks(vec![
        Ok(b"data: {\"type\":\"content\",\"content\":\"Partial\"}\n\n".to_vec()),
        Err(XeerError::Connection {
            message: "reset".into(),
            retriable: true,
        }),
    ])]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();

    let outcome = send_plain(&mut session, &mut transcript, "hi").await;

    assert_eq!(outcome.state, StreamState::Errored);
    let entries = transcript.entries();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1].raw, "Partial");
    assert_eq!(entries[1].status, EntryStatus::Failed);
    assert_eq!(entries[2].raw, CONNECTION_ERROR);
}

#[tokio::test]
async fn test_cancel_after_content_marks_stopped() {
    let backend = MockBackend::with_scripts(vec![Script::ChunksThenHang(vec![
        "data: {\"type\":\"content\",\"content\":\"Half an ans\"}\n\n",
    ])]);
    let mut session = session_for(&backend);
    let recorder = Recorder {
        watch: Some(session.canceller()),
        cancel_on_content: true,
        ..Recorder::default()
    };
    let mut transcript = Transcript::with_renderer(Box::new(recorder.clone()));

    let outcome = send_plain(&mut session, &mut transcript, "hi").await;

    assert_eq!(outcome.state, StreamState::Cancelled);
    assert_eq!(session.state(), Some(StreamState::Cancelled));
    let reply = transcript.last_assistant().unwrap();
    assert_eq!(reply.status, EntryStatus::Stopped);
    assert_eq!(reply.raw, "Half an ans");
    assert!(render_entry(reply).contains(STOPPED_MARKER));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_cancel_while_connecting_discards_placeholder() {
    let backend = MockBackend::with_scripts(vec![Script::Hang]);
    let mut session = session_for(&backend);
    let canceller = session.canceller();
    let mut transcript = Transcript::new();

    let cancel_task = tokio::spawn(async move {
        while !canceller.cancel() {
            tokio::task::yield_now().await;
        }
    });
    let outcome = send_plain(&mut session, &mut transcript, "hi").await;
    cancel_task.await.unwrap();

    assert_eq!(outcome.state, StreamState::Cancelled);
    assert!(outcome.entry.is_none());
    assert_eq!(outcome.text, "");
    assert_eq!(transcript.entries().len(), 1);
    assert!(transcript.last_assistant().is_none());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_single_cancel_handle_while_in_flight() {
    let backend = MockBackend::with_scripts(vec![chunks(&[
        "data: {\"type\":\"content\",\"content\":\"a\"}\n\n",
        "data: {\"type\":\"content\",\"content\":\"b\"}\n\ndata: {\"type\":\"done\"}\n\n",
    ])]);
    let mut session = session_for(&backend);
    let recorder = Recorder {
        watch: Some(session.canceller()),
        ..Recorder::default()
    };
    let mut transcript = Transcript::with_renderer(Box::new(recorder.clone()));

    send_plain(&mut session, &mut transcript, "hi").await;

    // The user entry is pushed before the token is installed.
    let seen = recorder.handle_seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&false));
    assert!(seen[1..].iter().all(|active| *active));
    assert!(!session.canceller().is_active());

    let changes = recorder.changes.lock().unwrap().clone();
    let last = changes.last().unwrap();
    assert_eq!(last.raw, "ab");
    assert_eq!(last.status, EntryStatus::Complete);
}

#[tokio::test]
async fn test_indicator_stopped_on_every_terminal_state() {
    let backend = MockBackend::with_scripts(vec![
        chunks(&["data: {\"type\":\"done\"}\n\n"]),
        chunks(&["data: {\"type\":\"error\",\"message\":\"x\"}\n\n"]),
        Script::Refuse,
    ]);
    let indicator = CountingIndicator::default();
    let mut session = session_for(&backend).with_indicator(Box::new(indicator.clone()));
    let mut transcript = Transcript::new();

    for message in ["one", "two", "three"] {
        send_plain(&mut session, &mut transcript, message).await;
    }

    assert_eq!(indicator.starts.load(Ordering::SeqCst), 3);
    assert_eq!(indicator.stops.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_stream_without_done_completes() {
    let backend = MockBackend::with_scripts(vec![chunks(&[
        "data: {\"type\":\"content\",\"content\":\"tail\"}",
    ])]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();

    let outcome = send_plain(&mut session, &mut transcript, "hi").await;

    assert_eq!(outcome.state, StreamState::Completed);
    assert_eq!(transcript.last_assistant().unwrap().raw, "tail");
}

#[tokio::test]
async fn test_malformed_and_unknown_events_are_skipped() {
    let backend = MockBackend::with_scripts(vec![chunks(&[
        "data: {not json\n\n",
        "data: {\"type\":\"thinking\"}\n\n",
        ": keep-alive\n\n",
        "data: {\"type\":\"content\",\"content\":\"fine\"}\n\ndata: {\"type\":\"done\"}\n\n",
    ])]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();

    let outcome = send_plain(&mut session, &mut transcript, "hi").await;

    assert_eq!(outcome.state, StreamState::Completed);
    assert_eq!(outcome.text, "fine");
}

#[tokio::test]
async fn test_empty_send_is_rejected_without_request() {
    let backend = MockBackend::with_scripts(vec![]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();
    let mut attachments = AttachmentBuffer::new();

    let result = session.send("   ", &mut attachments, &mut transcript).await;

    assert!(matches!(result, Err(XeerError::EmptyMessage)));
    assert!(backend.requests().is_empty());
    assert!(transcript.is_empty());
}

#[tokio::test]
async fn test_attachments_are_merged_and_consumed() {
    let backend = MockBackend::with_scripts(vec![]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();
    let mut attachments = AttachmentBuffer::new();
    let code = "def foo():\n    return 1\n".repeat(80);
    attachments.attach(code.clone());

    session
        .send("review this", &mut attachments, &mut transcript)
        .await
        .unwrap();

    assert!(attachments.is_empty());
    let request = &backend.requests()[0];
    assert!(request.message.starts_with("review this\n\n```python\n"));
    assert!(request.message.ends_with("\n```"));
    assert_eq!(transcript.entries()[0].raw, "review this");

    // Attachments alone are sent under a placeholder.
    attachments.attach(code);
    session
        .send("", &mut attachments, &mut transcript)
        .await
        .unwrap();
    let user_entries: Vec<_> = transcript
        .entries()
        .iter()
        .filter(|e| e.role == xeerchat::backend::types::Role::User)
        .collect();
    assert_eq!(user_entries[1].raw, PASTED_PLACEHOLDER);
    assert!(backend.requests()[1].message.starts_with("```python\n"));
}

#[tokio::test]
async fn test_regenerate_resends_last_payload() {
    let backend = MockBackend::with_scripts(vec![]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();

    assert!(matches!(
        session.regenerate(&mut transcript).await,
        Err(XeerError::EmptyMessage)
    ));

    send_plain(&mut session, &mut transcript, "again please").await;
    session.regenerate(&mut transcript).await.unwrap();

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].message, requests[1].message);
}

#[tokio::test]
async fn test_conversation_management() {
    let backend = MockBackend::with_scripts(vec![]);
    let mut session = session_for(&backend);
    let mut transcript = Transcript::new();
    let id = ConversationId::parse("7");

    session.load_conversation(id.clone(), &mut transcript).await.unwrap();
    assert_eq!(transcript.entries().len(), 2);
    assert_eq!(session.conversation_id(), Some(&id));

    assert!(matches!(
        session.rename_conversation(&id, "  ").await,
        Err(XeerError::InvalidTitle)
    ));
    assert_eq!(
        session.rename_conversation(&id, " Trip plans ").await.unwrap(),
        "Trip plans"
    );

    session.delete_conversation(&id, &mut transcript).await.unwrap();
    assert_eq!(backend.deleted.lock().unwrap().clone(), vec![id]);
    assert!(session.conversation_id().is_none());
    assert!(transcript.is_empty());
}

#[tokio::test]
async fn test_select_model_checks_catalog() {
    let backend = MockBackend::with_scripts(vec![]);
    let mut session = session_for(&backend);

    // Without a catalog any key is accepted.
    session.select_model("anything").unwrap();
    assert_eq!(session.selected_model(), "anything");

    session.load_models().await.unwrap();
    assert!(matches!(
        session.select_model("gpt-9"),
        Err(XeerError::UnknownModel { .. })
    ));
    session.select_model("gemini-1.5-flash").unwrap();

    let mut transcript = Transcript::new();
    send_plain(&mut session, &mut transcript, "hi").await;
    assert_eq!(backend.requests()[0].model, "gemini-1.5-flash");
}

#[tokio::test]
async fn test_cancel_during_sidebar_refresh() {
    let backend = Arc::new(MockBackend {
        scripts: Mutex::new(
            vec![Script::ChunksThenHang(vec![
                "data: {\"type\":\"content\",\"content\":\"Hi\"}\n\n",
                "data: {\"type\":\"conversation_id\",\"conversation_id\":5}\n\n",
            ])]
            .into(),
        ),
        stall_listing: true,
        ..MockBackend::default()
    });
    let mut session = session_for(&backend);
    let canceller = session.canceller();
    let mut transcript = Transcript::new();

    let watcher = backend.clone();
    let cancel_task = tokio::spawn(async move {
        while watcher.list_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(canceller.cancel());
    });

    let mut attachments = AttachmentBuffer::new();
    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        session.send("hi", &mut attachments, &mut transcript),
    )
    .await
    .expect("cancel must end the exchange while the list request is stalled")
    .unwrap();
    cancel_task.await.unwrap();

    assert_eq!(outcome.state, StreamState::Cancelled);
    let reply = transcript.last_assistant().unwrap();
    assert_eq!(reply.status, EntryStatus::Stopped);
    assert_eq!(reply.raw, "Hi");
    assert_eq!(session.conversation_id(), Some(&ConversationId::parse("5")));
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_dropped_send_stops_indicator_and_clears_handle() {
    let backend = MockBackend::with_scripts(vec![Script::Hang]);
    let indicator = CountingIndicator::default();
    let mut session = session_for(&backend).with_indicator(Box::new(indicator.clone()));
    let mut transcript = Transcript::new();
    let mut attachments = AttachmentBuffer::new();

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        session.send("hi", &mut attachments, &mut transcript),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(indicator.starts.load(Ordering::SeqCst), 1);
    assert_eq!(indicator.stops.load(Ordering::SeqCst), 1);
    assert!(!session.is_busy());
}
