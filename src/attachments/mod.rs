// src/attachments/mod.rs — Paste attachment buffer
//
// Large pastes are held as numbered snippets outside the composed message.
// Removed snippets go to an undo stack and can be restored until the next
// paste. The active list and the undo stack never share an attachment.

pub mod classify;
pub mod clipboard;

use std::fmt;

use crate::util::group_thousands;

pub use classify::{detect_content_kind, ContentKind};
pub use clipboard::ClipboardPayload;

/// Pastes with at least this many lines become attachments.
pub const DEFAULT_LINE_THRESHOLD: usize = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentId(u64);

impl AttachmentId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AttachmentId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One pasted snippet. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    id: AttachmentId,
    raw_text: String,
    line_count: usize,
    kind: ContentKind,
}

impl Attachment {
    pub fn id(&self) -> AttachmentId {
        self.id
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }
}

/// Number of newline-separated lines; a trailing newline starts a new
/// (empty) line.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

#[derive(Debug, Clone, PartialEq)]
pub enum PasteOutcome {
    /// File data: belongs to an upload flow, nothing was stored.
    Deferred(ClipboardPayload),
    Empty,
    /// Small paste: goes into the composed message unchanged.
    Inline { text: String, line_count: usize },
    Attached(AttachmentId),
}

#[derive(Debug, Clone)]
pub struct AttachmentBuffer {
    active: Vec<Attachment>,
    undone: Vec<Attachment>,
    next_id: u64,
    threshold: usize,
}

impl Default for AttachmentBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentBuffer {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_LINE_THRESHOLD)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            active: Vec::new(),
            undone: Vec::new(),
            next_id: 1,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn handle_paste(&mut self, payload: ClipboardPayload) -> PasteOutcome {
        let text = match payload {
            ClipboardPayload::Text(text) => text,
            other => return PasteOutcome::Deferred(other),
        };
        if text.is_empty() {
            return PasteOutcome::Empty;
        }

        let lines = line_count(&text);
        if lines < self.threshold {
            return PasteOutcome::Inline {
                text,
                line_count: lines,
            };
        }
        PasteOutcome::Attached(self.attach(text))
    }

    /// Store `text` as a new attachment regardless of its size. Clears the
    /// undo stack.
    pub fn attach(&mut self, text: String) -> AttachmentId {
        let id = AttachmentId(self.next_id);
        self.next_id += 1;
        let attachment = Attachment {
            id,
            line_count: line_count(&text),
            kind: detect_content_kind(&text),
            raw_text: text,
        };
        tracing::debug!(
            id = id.get(),
            lines = attachment.line_count,
            kind = attachment.kind.title(),
            "attached paste"
        );
        self.active.push(attachment);
        self.undone.clear();
        id
    }

    /// Move the newest active attachment to the undo stack.
    pub fn undo(&mut self) -> Option<AttachmentId> {
        let attachment = self.active.pop()?;
        let id = attachment.id;
        self.undone.push(attachment);
        Some(id)
    }

    /// Restore the most recently removed attachment.
    pub fn redo(&mut self) -> Option<AttachmentId> {
        let attachment = self.undone.pop()?;
        let id = attachment.id;
        self.active.push(attachment);
        Some(id)
    }

    /// Remove one attachment from anywhere in the active list.
    pub fn remove(&mut self, id: AttachmentId) -> bool {
        let Some(pos) = self.active.iter().position(|a| a.id == id) else {
            return false;
        };
        let attachment = self.active.remove(pos);
        self.undone.push(attachment);
        true
    }

    /// Drop everything, including undo history.
    pub fn clear(&mut self) {
        self.active.clear();
        self.undone.clear();
    }

    pub fn active(&self) -> &[Attachment] {
        &self.active
    }

    pub fn undone(&self) -> &[Attachment] {
        &self.undone
    }

    pub fn get(&self, id: AttachmentId) -> Option<&Attachment> {
        self.active.iter().find(|a| a.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Fenced blocks for every active attachment, oldest first. With more
    /// than one, each block starts with an ordinal label.
    pub fn serialize(&self) -> String {
        let labelled = self.active.len() > 1;
        self.active
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let lang = a.kind.language().unwrap_or("");
                let label = if labelled {
                    format!("// Snippet {}: {}\n", i + 1, a.kind.title())
                } else {
                    String::new()
                };
                format!("```{lang}\n{label}{}\n```", a.raw_text)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Serialize and consume: the buffer is empty afterwards.
    pub fn take_serialized(&mut self) -> String {
        let text = self.serialize();
        self.clear();
        text
    }
}

/// Attachment list, newest first.
pub fn render_attachments(buffer: &AttachmentBuffer) -> String {
    let active = buffer.active();
    if active.is_empty() {
        return "No attachments.".to_string();
    }
    let mut out = String::new();
    if active.len() > 1 {
        out.push_str(&format!("{} snippets attached\n", active.len()));
    }
    let newest = active.last().map(|a| a.id);
    for a in active.iter().rev() {
        out.push_str(&format!(
            "  [{}] {} {} · {} lines",
            a.id,
            a.kind.icon(),
            a.kind.title(),
            group_thousands(a.line_count as u64)
        ));
        if let Some(lang) = a.kind.language() {
            out.push_str(&format!(" · {}", lang.to_uppercase()));
        }
        if active.len() > 1 && newest == Some(a.id) {
            out.push_str("  NEW");
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// Full snippet with line numbers.
pub fn render_attachment_body(attachment: &Attachment) -> String {
    let width = attachment.line_count.to_string().len();
    attachment
        .raw_text
        .split('\n')
        .enumerate()
        .map(|(i, line)| format!("{:>width$} │ {line}", i + 1, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}
