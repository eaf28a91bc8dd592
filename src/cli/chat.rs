// src/cli/chat.rs — Interactive REPL

use std::path::Path;
use std::time::Instant;

use crate::attachments::clipboard::{read_file_payload, read_system_clipboard, write_system_clipboard};
use crate::attachments::{
    render_attachment_body, render_attachments, AttachmentBuffer, AttachmentId, PasteOutcome,
};
use crate::backend::types::ConversationId;
use crate::catalog::render_catalog;
use crate::cli::terminal::{
    notice, spawn_interrupt_listener, TerminalIndicator, TerminalRenderer, TypingLine,
};
use crate::cli::AppContext;
use crate::infra::errors::XeerError;
use crate::session::{ChatSession, StreamState};
use crate::usage::{render_usage, UsagePoller};
use crate::view::{render_sidebar, Transcript};

/// Mutable session state that slash commands can modify.
struct ChatState<'a> {
    ctx: &'a mut AppContext,
    session: ChatSession,
    transcript: Transcript,
    attachments: AttachmentBuffer,
    /// Short pastes waiting to be prefixed to the next typed message.
    draft: String,
    poller: UsagePoller,
}

enum Flow {
    Continue,
    Quit,
}

/// Run the interactive chat REPL.
pub async fn run_chat(ctx: &mut AppContext) -> anyhow::Result<()> {
    let quiet = ctx.quiet;
    let line = TypingLine::new(quiet);
    let transcript = Transcript::with_renderer(Box::new(TerminalRenderer::new(line.clone(), quiet)));
    let session = ChatSession::new(ctx.backend.clone(), ctx.model())
        .with_indicator(Box::new(TerminalIndicator::new(line)));
    let attachments = AttachmentBuffer::with_threshold(ctx.config.chat.paste_line_threshold);
    let poller = UsagePoller::start(ctx.backend.clone(), ctx.config.usage.poll_interval());

    spawn_interrupt_listener(session.canceller());

    let mut state = ChatState {
        ctx,
        session,
        transcript,
        attachments,
        draft: String::new(),
        poller,
    };
    state.startup().await;

    while let Some(input) = read_message() {
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        if trimmed.starts_with('/') && !trimmed.contains('\n') {
            match state.handle_slash_command(trimmed).await {
                Flow::Continue => continue,
                Flow::Quit => break,
            }
        }

        if trimmed.is_empty() && state.draft.is_empty() && state.attachments.is_empty() {
            continue;
        }
        state.send(trimmed).await;
    }

    state.poller.stop();
    Ok(())
}

impl ChatState<'_> {
    async fn startup(&mut self) {
        if let Err(e) = self.session.load_models().await {
            tracing::warn!("Model catalog unavailable: {}", e);
        }
        if let Err(e) = self.session.refresh_conversations().await {
            tracing::warn!("Conversation list unavailable: {}", e);
        }

        if self.ctx.quiet {
            return;
        }
        let model = self.model_label();
        eprintln!(
            "xeerchat v{} | {} | {}\n",
            env!("CARGO_PKG_VERSION"),
            model,
            self.ctx.config.server.base_url,
        );
        if !self.ctx.state.has_chatted() {
            eprintln!("  Type a message and press Enter. End a line with \\ to continue it.");
            eprintln!("  /paste attaches the clipboard, /help lists every command.\n");
        }
    }

    fn model_label(&self) -> String {
        let key = self.session.selected_model();
        match self.session.catalog() {
            Some(catalog) => catalog.label_for(key),
            None => key.to_string(),
        }
    }

    async fn send(&mut self, text: &str) {
        if self.session.is_busy() {
            notice(self.ctx.quiet, "Still answering. Press Ctrl+C to stop it first.");
            return;
        }

        let mut message = std::mem::take(&mut self.draft);
        if !text.is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(text);
        }

        let result = self
            .session
            .send(&message, &mut self.attachments, &mut self.transcript)
            .await;
        self.after_exchange(result);
    }

    fn after_exchange(&mut self, result: Result<crate::session::StreamOutcome, XeerError>) {
        match result {
            Ok(outcome) => {
                if outcome.state == StreamState::Completed {
                    if let Err(e) = self.ctx.state.mark_chatted() {
                        tracing::warn!("Cannot save state: {}", e);
                    }
                }
                self.poller.refresh();
            }
            Err(XeerError::EmptyMessage) => {}
            Err(e) => eprintln!("[error] {e}"),
        }
    }

    async fn handle_slash_command(&mut self, input: &str) -> Flow {
        let parts: Vec<&str> = input.splitn(2, ' ').collect();
        let cmd = parts[0];
        let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");
        let quiet = self.ctx.quiet;

        match cmd {
            "/quit" | "/exit" => return Flow::Quit,

            "/new" => {
                self.session.new_conversation(&mut self.transcript);
                notice(quiet, "Started a new conversation.");
            }

            "/history" => {
                if let Err(e) = self.session.refresh_conversations().await {
                    eprintln!("[error] {e}");
                }
                eprintln!("{}", render_sidebar(self.session.sidebar()));
            }

            "/load" => match parse_conversation_id(arg) {
                Some(id) => {
                    if let Err(e) = self.session.load_conversation(id, &mut self.transcript).await {
                        eprintln!("[error] {e}");
                    }
                }
                None => eprintln!("  Usage: /load <id>"),
            },

            "/delete" => match parse_conversation_id(arg) {
                Some(id) => {
                    match self
                        .session
                        .delete_conversation(&id, &mut self.transcript)
                        .await
                    {
                        Ok(()) => notice(quiet, &format!("Deleted conversation {id}.")),
                        Err(e) => eprintln!("[error] {e}"),
                    }
                }
                None => eprintln!("  Usage: /delete <id>"),
            },

            "/rename" => {
                let mut split = arg.splitn(2, ' ');
                let id = split.next().and_then(parse_conversation_id);
                let title = split.next().unwrap_or("");
                match id {
                    Some(id) => match self.session.rename_conversation(&id, title).await {
                        Ok(stored) => notice(quiet, &format!("Renamed to \"{stored}\".")),
                        Err(e) => eprintln!("[error] {e}"),
                    },
                    None => eprintln!("  Usage: /rename <id> <title>"),
                }
            }

            "/model" => self.switch_model(arg).await,

            "/models" => {
                let selected = self.session.selected_model().to_string();
                match self.session.load_models().await {
                    Ok(catalog) => eprint!("{}", render_catalog(catalog, &selected)),
                    Err(e) => eprintln!("[error] {e}"),
                }
            }

            "/paste" => self.paste(arg),

            "/attachments" => {
                if arg.is_empty() {
                    eprintln!("{}", render_attachments(&self.attachments));
                } else {
                    match arg.parse::<u64>().ok().map(AttachmentId::from) {
                        Some(id) => match self.attachments.get(id) {
                            Some(attachment) => {
                                eprintln!("{}", render_attachment_body(attachment))
                            }
                            None => eprintln!("  No attachment {id}."),
                        },
                        None => eprintln!("  Usage: /attachments [id]"),
                    }
                }
            }

            "/undo" => match self.attachments.undo() {
                Some(id) => notice(quiet, &format!("Removed attachment {id} (/redo restores it).")),
                None => notice(quiet, "Nothing to undo."),
            },

            "/redo" => match self.attachments.redo() {
                Some(id) => notice(quiet, &format!("Restored attachment {id}.")),
                None => notice(quiet, "Nothing to redo."),
            },

            "/remove" => match arg.parse::<u64>().ok().map(AttachmentId::from) {
                Some(id) => {
                    if self.attachments.remove(id) {
                        notice(quiet, &format!("Removed attachment {id} (/undo restores it)."));
                    } else {
                        eprintln!("  No attachment {id}.");
                    }
                }
                None => eprintln!("  Usage: /remove <id>"),
            },

            "/clear-attachments" => {
                self.attachments.clear();
                self.draft.clear();
                notice(quiet, "Attachments cleared.");
            }

            "/copy" => match self.transcript.last_assistant() {
                Some(entry) if !entry.raw.is_empty() => match write_system_clipboard(&entry.raw) {
                    Ok(()) => notice(quiet, "Copied to clipboard."),
                    Err(e) => eprintln!("[error] {e}"),
                },
                _ => notice(quiet, "No reply to copy yet."),
            },

            "/regenerate" => {
                if self.session.is_busy() {
                    notice(quiet, "Still answering. Press Ctrl+C to stop it first.");
                } else {
                    let result = self.session.regenerate(&mut self.transcript).await;
                    if matches!(result, Err(XeerError::EmptyMessage)) {
                        notice(quiet, "Nothing to regenerate yet.");
                    }
                    self.after_exchange(result);
                }
            }

            "/usage" => {
                eprintln!("{}", render_usage(&self.poller.state(), Instant::now()));
                self.poller.refresh();
            }

            "/clear-all" => {
                let confirmed = inquire::Confirm::new("Delete every conversation?")
                    .with_default(false)
                    .prompt()
                    .unwrap_or(false);
                if confirmed {
                    match self.session.clear_all(&mut self.transcript).await {
                        Ok(()) => notice(quiet, "All conversations deleted."),
                        Err(e) => eprintln!("[error] {e}"),
                    }
                }
            }

            "/help" => print_help(),

            _ => {
                eprintln!("Unknown command: {}. Type /help for commands.", cmd);
            }
        }
        Flow::Continue
    }

    async fn switch_model(&mut self, arg: &str) {
        if self.session.catalog().is_none() {
            if let Err(e) = self.session.load_models().await {
                eprintln!("[error] {e}");
                return;
            }
        }

        let key = if arg.is_empty() {
            match self.pick_model() {
                Some(key) => key,
                None => return,
            }
        } else {
            arg.to_string()
        };

        match self.session.select_model(&key) {
            Ok(()) => {
                if let Err(e) = self.ctx.state.set_selected_model(&key) {
                    tracing::warn!("Cannot save model selection: {}", e);
                }
                let label = self.model_label();
                notice(self.ctx.quiet, &format!("Model switched to {label}"));
            }
            Err(e) => eprintln!("[error] {e}"),
        }
    }

    fn pick_model(&self) -> Option<String> {
        let choices = self.session.catalog()?.choices();
        if choices.is_empty() {
            eprintln!("  No models available.");
            return None;
        }
        let current = self.session.selected_model();
        let start = choices.iter().position(|c| c.key == current).unwrap_or(0);
        inquire::Select::new("Model:", choices)
            .with_starting_cursor(start)
            .with_help_message("↑↓ to move, enter to select, esc to cancel")
            .prompt()
            .ok()
            .map(|choice| choice.key)
    }

    fn paste(&mut self, arg: &str) {
        let payload = if arg.is_empty() {
            read_system_clipboard()
        } else {
            read_file_payload(Path::new(arg))
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                eprintln!("[error] {e}");
                return;
            }
        };

        let quiet = self.ctx.quiet;
        match self.attachments.handle_paste(payload) {
            PasteOutcome::Deferred(_) => {
                notice(quiet, "Clipboard holds file or image data; only text can be pasted.")
            }
            PasteOutcome::Empty => notice(quiet, "Clipboard is empty."),
            PasteOutcome::Inline { text, line_count } => {
                if !self.draft.is_empty() {
                    self.draft.push('\n');
                }
                self.draft.push_str(&text);
                notice(
                    quiet,
                    &format!("Added {line_count} line(s) to your message. Press Enter to send."),
                );
            }
            PasteOutcome::Attached(id) => {
                if let Some(attachment) = self.attachments.get(id) {
                    notice(
                        quiet,
                        &format!(
                            "Attached {} {} ({} lines) as [{id}].",
                            attachment.kind().icon(),
                            attachment.kind().title(),
                            attachment.line_count()
                        ),
                    );
                }
            }
        }
    }
}

fn parse_conversation_id(arg: &str) -> Option<ConversationId> {
    let arg = arg.trim();
    if arg.is_empty() {
        None
    } else {
        Some(ConversationId::parse(arg))
    }
}

fn print_help() {
    eprintln!("Slash commands:");
    eprintln!("  /new                  Start a new conversation");
    eprintln!("  /history              List conversations");
    eprintln!("  /load <id>            Open a conversation");
    eprintln!("  /delete <id>          Delete a conversation");
    eprintln!("  /rename <id> <title>  Rename a conversation");
    eprintln!("  /clear-all            Delete every conversation");
    eprintln!("  /model [key]          Switch model (picker when no key)");
    eprintln!("  /models               Show the model catalog");
    eprintln!("  /paste [path]         Paste the clipboard or a file");
    eprintln!("  /attachments [id]     List attachments or show one");
    eprintln!("  /undo, /redo          Undo or redo the last attachment change");
    eprintln!("  /remove <id>          Remove one attachment");
    eprintln!("  /clear-attachments    Drop all pending attachments");
    eprintln!("  /copy                 Copy the last reply");
    eprintln!("  /regenerate           Ask again with the last message");
    eprintln!("  /usage                Show provider quota usage");
    eprintln!("  /help                 Show this help");
    eprintln!("  /quit, quit, exit     End session");
    eprintln!();
    eprintln!("End a line with \\ to continue the message. Ctrl+C stops a reply.");
}

/// Read one message, joining lines that end in a backslash.
fn read_message() -> Option<String> {
    let mut message = String::new();
    let mut prompt = "> ";
    loop {
        let line = read_input(prompt)?;
        let line = line.trim_end_matches(['\n', '\r']);
        match line.strip_suffix('\\') {
            Some(head) => {
                message.push_str(head);
                message.push('\n');
                prompt = ". ";
            }
            None => {
                message.push_str(line);
                return Some(message);
            }
        }
    }
}

fn read_input(prompt: &str) -> Option<String> {
    use std::io::{self, BufRead, Write};

    print!("{prompt}");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line),
        Err(_) => None,
    }
}
