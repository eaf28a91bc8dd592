// src/view/mod.rs — Transcript and sidebar state with pure renderers

pub mod markdown;

use crate::backend::types::{ConversationId, ConversationSummary, Role, StoredMessage};
use crate::util::ellipsize;

pub use markdown::render_markdown;

/// Appended to an assistant entry while it is still streaming.
pub const BUSY_CURSOR: &str = "▋";
pub const STOPPED_MARKER: &str = "⏹ Generation stopped";
pub const CONNECTION_ERROR: &str = "Connection error. Please try again.";
/// Shown for a user turn that consisted only of pasted attachments.
pub const PASTED_PLACEHOLDER: &str = "[Pasted Code]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Streaming,
    Complete,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAction {
    Copy,
    Regenerate,
}

impl MessageAction {
    pub fn command(&self) -> &'static str {
        match self {
            MessageAction::Copy => "/copy",
            MessageAction::Regenerate => "/regenerate",
        }
    }
}

const REPLY_ACTIONS: [MessageAction; 2] = [MessageAction::Copy, MessageAction::Regenerate];

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    pub role: Role,
    /// Raw markdown as received.
    pub raw: String,
    pub status: EntryStatus,
    pub actions: Vec<MessageAction>,
}

/// Receives every transcript change so a front end can redraw incrementally.
pub trait TranscriptRenderer: Send {
    fn entry_changed(&mut self, entry: &Entry);

    fn entry_removed(&mut self, _entry: &Entry) {}

    fn cleared(&mut self) {}

    /// A whole conversation was loaded at once.
    fn history_loaded(&mut self, entries: &[Entry]) {
        for entry in entries {
            self.entry_changed(entry);
        }
    }
}

/// Ordered list of rendered turns in the active conversation.
#[derive(Default)]
pub struct Transcript {
    entries: Vec<Entry>,
    next_id: u64,
    renderer: Option<Box<dyn TranscriptRenderer>>,
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_renderer(renderer: Box<dyn TranscriptRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn last_assistant(&self) -> Option<&Entry> {
        self.entries.iter().rev().find(|e| e.role == Role::Assistant)
    }

    pub fn push_user(&mut self, text: &str) -> EntryId {
        self.push(Role::User, text, EntryStatus::Complete, Vec::new())
    }

    /// Empty assistant entry that will receive streamed content.
    pub fn begin_assistant(&mut self) -> EntryId {
        self.push(Role::Assistant, "", EntryStatus::Streaming, Vec::new())
    }

    /// Standalone failed assistant entry (e.g. a connection error notice).
    pub fn push_error(&mut self, text: &str) -> EntryId {
        self.push(Role::Assistant, text, EntryStatus::Failed, Vec::new())
    }

    /// Replace the raw text of a streaming entry with the accumulated reply.
    pub fn update_streaming(&mut self, id: EntryId, text: &str) {
        self.update(id, |entry| {
            entry.raw.clear();
            entry.raw.push_str(text);
        });
    }

    pub fn complete(&mut self, id: EntryId, text: &str) {
        self.finalize(id, text, EntryStatus::Complete, REPLY_ACTIONS.to_vec());
    }

    pub fn fail(&mut self, id: EntryId, text: &str) {
        self.finalize(id, text, EntryStatus::Failed, Vec::new());
    }

    /// Failed reply that can still be copied or regenerated (server-side
    /// errors reported inside the stream).
    pub fn fail_reply(&mut self, id: EntryId, text: &str) {
        self.finalize(id, text, EntryStatus::Failed, REPLY_ACTIONS.to_vec());
    }

    /// Mark a partially streamed entry as stopped by the user.
    pub fn stop(&mut self, id: EntryId, text: &str) {
        self.finalize(id, text, EntryStatus::Stopped, REPLY_ACTIONS.to_vec());
    }

    pub fn remove(&mut self, id: EntryId) -> Option<Entry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        let entry = self.entries.remove(pos);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.entry_removed(&entry);
        }
        Some(entry)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.cleared();
        }
    }

    /// Replace the transcript with a stored conversation.
    pub fn load(&mut self, messages: &[StoredMessage]) {
        self.entries.clear();
        for message in messages {
            let (status, actions) = match message.role {
                Role::Assistant => (EntryStatus::Complete, REPLY_ACTIONS.to_vec()),
                _ => (EntryStatus::Complete, Vec::new()),
            };
            let id = self.allocate_id();
            self.entries.push(Entry {
                id,
                role: message.role,
                raw: message.content.clone(),
                status,
                actions,
            });
        }
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.cleared();
            renderer.history_loaded(&self.entries);
        }
    }

    fn allocate_id(&mut self) -> EntryId {
        self.next_id += 1;
        EntryId(self.next_id)
    }

    fn push(
        &mut self,
        role: Role,
        text: &str,
        status: EntryStatus,
        actions: Vec<MessageAction>,
    ) -> EntryId {
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            role,
            raw: text.to_string(),
            status,
            actions,
        });
        self.notify(id);
        id
    }

    fn finalize(
        &mut self,
        id: EntryId,
        text: &str,
        status: EntryStatus,
        actions: Vec<MessageAction>,
    ) {
        self.update(id, |entry| {
            entry.raw = text.to_string();
            entry.status = status;
            entry.actions = actions;
        });
    }

    fn update(&mut self, id: EntryId, apply: impl FnOnce(&mut Entry)) {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            tracing::debug!(?id, "update for an entry that no longer exists");
            return;
        };
        apply(entry);
        self.notify(id);
    }

    fn notify(&mut self, id: EntryId) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if let Some(entry) = self.entries.iter().find(|e| e.id == id) {
            renderer.entry_changed(entry);
        }
    }
}

/// Full text of one entry as it should appear on screen.
pub fn render_entry(entry: &Entry) -> String {
    match entry.role {
        Role::User => format!("you › {}", entry.raw),
        Role::System => entry.raw.clone(),
        Role::Assistant => {
            let mut out = render_markdown(&entry.raw);
            match entry.status {
                EntryStatus::Streaming => out.push_str(BUSY_CURSOR),
                EntryStatus::Stopped => {
                    if !out.is_empty() {
                        out.push_str("\n\n");
                    }
                    out.push_str(STOPPED_MARKER);
                }
                EntryStatus::Complete | EntryStatus::Failed => {}
            }
            let bar = render_actions(&entry.actions);
            if !bar.is_empty() {
                out.push('\n');
                out.push_str(&bar);
            }
            out
        }
    }
}

/// One-line hint listing the commands for an entry's actions.
pub fn render_actions(actions: &[MessageAction]) -> String {
    actions
        .iter()
        .map(|a| a.command())
        .collect::<Vec<_>>()
        .join("  ")
}

/// Conversation list shown beside (here: above) the transcript.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sidebar {
    conversations: Vec<ConversationSummary>,
    active: Option<ConversationId>,
}

impl Sidebar {
    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn set_conversations(&mut self, conversations: Vec<ConversationSummary>) {
        self.conversations = conversations;
    }

    pub fn active(&self) -> Option<&ConversationId> {
        self.active.as_ref()
    }

    pub fn set_active(&mut self, id: Option<ConversationId>) {
        self.active = id;
    }

    pub fn remove(&mut self, id: &ConversationId) {
        self.conversations.retain(|c| &c.id != id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
    }

    pub fn rename(&mut self, id: &ConversationId, title: &str) {
        if let Some(c) = self.conversations.iter_mut().find(|c| &c.id == id) {
            c.title = title.to_string();
        }
    }

    pub fn clear(&mut self) {
        self.conversations.clear();
        self.active = None;
    }
}

/// First row of the sidebar.
pub const NEW_CONVERSATION_ROW: &str = "+ New Conversation (/new)";

pub fn render_sidebar(sidebar: &Sidebar) -> String {
    let new_marker = if sidebar.active.is_none() { "●" } else { " " };
    let mut rows = vec![format!("{new_marker} {NEW_CONVERSATION_ROW}")];
    if sidebar.conversations.is_empty() {
        rows.push("  No conversations yet.".to_string());
        return rows.join("\n");
    }
    let width = sidebar
        .conversations
        .iter()
        .map(|c| c.id.to_string().len())
        .max()
        .unwrap_or(1);
    rows.extend(sidebar.conversations.iter().map(|c| {
        let marker = if sidebar.active.as_ref() == Some(&c.id) {
            "●"
        } else {
            " "
        };
        let mut line = format!(
            "{marker} {:>width$}  {}  ({} msgs",
            c.id.to_string(),
            ellipsize(&c.title, 48),
            c.message_count,
            width = width
        );
        if let Some(updated) = c.updated_at.as_deref() {
            line.push_str(&format!(", {}", format_timestamp(updated)));
        }
        line.push(')');
        line
    }));
    rows.join("\n")
}

/// Shorten the backend's ISO timestamps to `YYYY-MM-DD HH:MM`.
pub fn format_timestamp(raw: &str) -> String {
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .or_else(|_| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        })
        .unwrap_or_else(|_| raw.to_string())
}
