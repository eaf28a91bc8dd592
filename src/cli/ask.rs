// src/cli/ask.rs — One-shot message, streamed or plain request/response

use crate::attachments::AttachmentBuffer;
use crate::backend::retry::{with_retry, RetryPolicy};
use crate::backend::types::{ConversationId, LegacyChatRequest, Role};
use crate::cli::terminal::{spawn_interrupt_listener, TerminalIndicator, TerminalRenderer, TypingLine};
use crate::cli::AppContext;
use crate::infra::errors::XeerError;
use crate::infra::session::ClientIdentity;
use crate::infra::state::HistoryEntry;
use crate::session::{ChatSession, StreamState};
use crate::view::{render_markdown, Transcript};

/// Shown instead of a reply once every retry has failed.
pub const FALLBACK_REPLY: &str = "I'm having trouble connecting right now. Please check your \
internet connection and try again in a moment.";

pub async fn run_ask(
    ctx: &mut AppContext,
    message: &str,
    no_stream: bool,
    conversation: Option<String>,
) -> anyhow::Result<()> {
    if no_stream {
        ask_once(ctx, message).await
    } else {
        ask_streaming(ctx, message, conversation).await
    }
}

async fn ask_streaming(
    ctx: &mut AppContext,
    message: &str,
    conversation: Option<String>,
) -> anyhow::Result<()> {
    let line = TypingLine::new(ctx.quiet);
    let renderer = TerminalRenderer::new(line.clone(), ctx.quiet).without_actions();
    let mut transcript = Transcript::with_renderer(Box::new(renderer));
    let mut session = ChatSession::new(ctx.backend.clone(), ctx.model())
        .with_indicator(Box::new(TerminalIndicator::new(line)));
    if let Some(id) = conversation {
        session = session.with_conversation(ConversationId::parse(&id));
    }
    spawn_interrupt_listener(session.canceller());

    let mut attachments = AttachmentBuffer::new();
    let outcome = session
        .send(message, &mut attachments, &mut transcript)
        .await?;

    match outcome.state {
        StreamState::Completed => {
            ctx.state.mark_chatted()?;
            if let Some(id) = session.conversation_id() {
                tracing::info!("Conversation {}", id);
            }
            Ok(())
        }
        StreamState::Cancelled => Ok(()),
        _ => anyhow::bail!("no reply received"),
    }
}

/// Plain request/response with retries; the local history records both
/// sides of the exchange.
async fn ask_once(ctx: &mut AppContext, message: &str) -> anyhow::Result<()> {
    let message = message.trim();
    if message.is_empty() {
        return Err(XeerError::EmptyMessage.into());
    }
    let max = ctx.config.chat.max_message_chars;
    let len = message.chars().count();
    if len > max {
        return Err(XeerError::MessageTooLong { len, max }.into());
    }

    let identity = ClientIdentity::new(ctx.state.user_id()?);
    let request = LegacyChatRequest {
        message: message.to_string(),
        user_id: identity.user_id,
        session_id: identity.session_id,
    };
    let limit = ctx.config.chat.history_limit;
    ctx.state
        .push_history(HistoryEntry::now(Role::User, message), limit)?;

    let policy = RetryPolicy::new(ctx.config.server.legacy_max_retries);
    let backend = ctx.backend.clone();
    let quiet = ctx.quiet;
    let result = with_retry(
        &policy,
        || backend.chat_once(&request),
        |retry, e| {
            if !quiet {
                eprintln!("  Retrying ({}/{}): {}", retry, policy.max_retries, e);
            }
        },
    )
    .await;

    let reply = match result {
        Ok(response) => {
            ctx.state.mark_chatted()?;
            response.response
        }
        Err(e) => {
            tracing::warn!("Giving up after {} retries: {}", policy.max_retries, e);
            if !quiet {
                eprintln!("[error] {e}");
            }
            FALLBACK_REPLY.to_string()
        }
    };

    println!("{}", render_markdown(&reply));
    ctx.state
        .push_history(HistoryEntry::now(Role::Assistant, reply), limit)?;
    Ok(())
}
