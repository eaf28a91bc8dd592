// tests/http_backend_test.rs — Integration test: HttpBackend against a local axum server

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use xeerchat::attachments::AttachmentBuffer;
use xeerchat::backend::types::{ChatRequest, ConversationId, LegacyChatRequest, Role};
use xeerchat::backend::{ChatBackend, HttpBackend};
use xeerchat::infra::errors::XeerError;
use xeerchat::session::{ChatSession, StreamState};
use xeerchat::stream::{SseDecoder, StreamEvent};
use xeerchat::view::Transcript;

const SSE_BODY: &str = "data: {\"type\":\"conversation_id\",\"conversation_id\":3}\n\n\
data: {\"type\":\"content\",\"content\":\"Hello\"}\n\n\
data: {\"type\":\"content\",\"content\":\" world\"}\n\n\
data: {\"type\":\"done\"}\n\n";

/// Request bodies and paths the fake server has seen.
#[derive(Clone, Default)]
struct Seen {
    bodies: Arc<Mutex<Vec<Value>>>,
    paths: Arc<Mutex<Vec<String>>>,
}

async fn chat(State(seen): State<Seen>, Json(body): Json<Value>) -> axum::response::Response {
    seen.bodies.lock().unwrap().push(body.clone());
    if body.get("user_id").is_some() {
        return Json(json!({
            "success": true,
            "response": "Plain hello",
            "conversation_id": 3,
            "timestamp": "2024-05-01T10:00:00"
        }))
        .into_response();
    }
    ([(header::CONTENT_TYPE, "text/event-stream")], SSE_BODY).into_response()
}

async fn conversations() -> Json<Value> {
    Json(json!({
        "conversations": [
            {"id": 3, "title": "Greeting", "created_at": "2024-05-01T10:00:00",
             "updated_at": "2024-05-01T10:05:00", "message_count": 2}
        ]
    }))
}

async fn messages(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "messages": [
            {"role": "user", "content": format!("hi from {id}"), "timestamp": null},
            {"role": "assistant", "content": "Hello world"}
        ]
    }))
}

async fn remove(State(seen): State<Seen>, Path(id): Path<String>) -> Json<Value> {
    seen.paths.lock().unwrap().push(format!("delete {id}"));
    Json(json!({"success": true}))
}

async fn rename(Path(_id): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    let title = body["title"].as_str().unwrap_or_default().to_uppercase();
    Json(json!({"success": true, "title": title}))
}

async fn clear(State(seen): State<Seen>) -> Json<Value> {
    seen.paths.lock().unwrap().push("clear".to_string());
    Json(json!({"success": true}))
}

async fn models() -> Json<Value> {
    Json(json!({
        "success": true,
        "providers": {
            "groq": {
                "display_name": "Groq",
                "icon": "⚡",
                "models": {
                    "llama-3.3-70b": {"name": "Llama 3.3 70B", "description": "Fast"}
                }
            }
        }
    }))
}

async fn usage() -> Json<Value> {
    Json(json!({
        "stats": {
            "groq": {
                "display_name": "Groq", "icon": "⚡", "used": 100, "limit": 14400,
                "remaining": 14300, "percent_used": 0.7, "reset_in_seconds": 3600,
                "reset_countdown": "1h 0m", "reset_time_local": "11:00", "status": "good"
            }
        }
    }))
}

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn fake_server() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/conversations", get(conversations))
        .route("/api/conversations/{id}/messages", get(messages))
        .route("/api/conversations/{id}", delete(remove))
        .route("/api/conversations/{id}/rename", put(rename))
        .route("/api/clear", post(clear))
        .route("/api/models", get(models))
        .route("/api/usage", get(usage))
        .with_state(seen.clone());
    (spawn_server(app).await, seen)
}

#[tokio::test]
async fn test_stream_decodes_server_events() {
    let (url, seen) = fake_server().await;
    let backend = HttpBackend::new(url);

    let request = ChatRequest {
        message: "hi".into(),
        conversation_id: None,
        model: "llama-3.3-70b".into(),
    };
    let mut body = backend.open_chat_stream(&request).await.unwrap();
    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();
    while let Some(chunk) = body.next().await {
        events.extend(decoder.push(&chunk.unwrap()));
    }
    events.extend(decoder.finish());
    let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();

    assert_eq!(
        events,
        vec![
            StreamEvent::ConversationId(ConversationId::parse("3")),
            StreamEvent::Content("Hello".into()),
            StreamEvent::Content(" world".into()),
            StreamEvent::Done,
        ]
    );
    let bodies = seen.bodies.lock().unwrap().clone();
    assert_eq!(
        bodies[0],
        json!({"message": "hi", "conversation_id": null, "model": "llama-3.3-70b"})
    );
}

#[tokio::test]
async fn test_session_end_to_end() {
    let (url, _seen) = fake_server().await;
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpBackend::new(url));
    let mut session = ChatSession::new(backend, "llama-3.3-70b");
    let mut transcript = Transcript::new();
    let mut attachments = AttachmentBuffer::new();

    let outcome = session
        .send("hi", &mut attachments, &mut transcript)
        .await
        .unwrap();

    assert_eq!(outcome.state, StreamState::Completed);
    assert_eq!(outcome.text, "Hello world");
    assert_eq!(session.conversation_id(), Some(&ConversationId::parse("3")));
    assert_eq!(session.sidebar().conversations()[0].title, "Greeting");
}

#[tokio::test]
async fn test_legacy_chat_once() {
    let (url, seen) = fake_server().await;
    let backend = HttpBackend::new(url);

    let reply = backend
        .chat_once(&LegacyChatRequest {
            message: "hello".into(),
            user_id: "user_abc".into(),
            session_id: "session_1_xyz".into(),
        })
        .await
        .unwrap();

    assert!(reply.success);
    assert_eq!(reply.response, "Plain hello");
    assert_eq!(reply.conversation_id, Some(ConversationId::parse("3")));
    assert_eq!(seen.bodies.lock().unwrap()[0]["session_id"], "session_1_xyz");
}

#[tokio::test]
async fn test_conversation_endpoints() {
    let (url, seen) = fake_server().await;
    let backend = HttpBackend::new(format!("{url}/"));
    let id = ConversationId::parse("3");

    let list = backend.list_conversations().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, id);
    assert_eq!(list[0].message_count, 2);

    let messages = backend.conversation_messages(&id).await.unwrap();
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "hi from 3");
    assert_eq!(messages[1].role, Role::Assistant);

    assert_eq!(
        backend.rename_conversation(&id, "greeting").await.unwrap(),
        "GREETING"
    );

    backend.delete_conversation(&id).await.unwrap();
    backend.clear_conversations().await.unwrap();
    assert_eq!(
        seen.paths.lock().unwrap().clone(),
        vec!["delete 3".to_string(), "clear".to_string()]
    );
}

#[tokio::test]
async fn test_models_and_usage() {
    let (url, _seen) = fake_server().await;
    let backend = HttpBackend::new(url);

    let catalog = backend.models().await.unwrap();
    assert!(catalog.contains("llama-3.3-70b"));
    assert_eq!(catalog.label_for("llama-3.3-70b"), "3.3 70B");

    let usage = backend.usage().await.unwrap();
    let groq = &usage["groq"];
    assert_eq!(groq.remaining, 14_300);
    assert_eq!(groq.reset_in_seconds, 3600);
}

#[tokio::test]
async fn test_error_statuses() {
    let app = Router::new()
        .route(
            "/api/models",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        )
        .route(
            "/api/usage",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/api/conversations",
            get(|| async { "not json" }),
        )
        .route(
            "/api/chat",
            post(|| async { Json(json!({"success": false, "error": "quota exceeded"})) }),
        );
    let backend = HttpBackend::new(spawn_server(app).await);

    assert!(matches!(backend.models().await, Err(XeerError::RateLimited)));
    match backend.usage().await {
        Err(XeerError::HttpStatus { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected HTTP 500, got {other:?}"),
    }
    assert!(matches!(
        backend.list_conversations().await,
        Err(XeerError::Decode(_))
    ));

    let legacy = backend
        .chat_once(&LegacyChatRequest {
            message: "hi".into(),
            user_id: "u".into(),
            session_id: "s".into(),
        })
        .await;
    match legacy {
        Err(XeerError::Backend(message)) => assert_eq!(message, "quota exceeded"),
        other => panic!("expected backend error, got {other:?}"),
    }
}
