// src/attachments/clipboard.rs — System clipboard access

use std::path::{Path, PathBuf};

use crate::infra::errors::XeerError;

/// What a paste delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardPayload {
    Text(String),
    /// File references; handled by an upload flow, never as text.
    Files(Vec<PathBuf>),
    Image { width: usize, height: usize },
}

impl ClipboardPayload {
    /// Classify raw clipboard text: a `file://` URL or a single absolute
    /// path to an existing file counts as file data. A bare relative name
    /// like `Cargo.toml` is ordinary text.
    pub fn from_text(text: String) -> Self {
        if let Some(path) = normalize_pasted_path(&text) {
            if path.is_absolute() && path.is_file() {
                return ClipboardPayload::Files(vec![path]);
            }
        }
        ClipboardPayload::Text(text)
    }

    pub fn carries_file_data(&self) -> bool {
        !matches!(self, ClipboardPayload::Text(_))
    }
}

/// Turn a pasted `file://` URL or a single shell-quoted path into a path.
/// Multi-line text and text that splits into several words is not a path.
pub fn normalize_pasted_path(pasted: &str) -> Option<PathBuf> {
    let pasted = pasted.trim();
    if pasted.is_empty() || pasted.contains('\n') {
        return None;
    }

    if let Ok(url) = url::Url::parse(pasted) {
        if url.scheme() == "file" {
            return url.to_file_path().ok();
        }
    }

    let parts: Vec<String> = shlex::Shlex::new(pasted).collect();
    if parts.len() == 1 {
        return parts.into_iter().next().map(PathBuf::from);
    }
    None
}

/// Read whatever the system clipboard currently holds.
pub fn read_system_clipboard() -> Result<ClipboardPayload, XeerError> {
    let mut clipboard = arboard::Clipboard::new().map_err(clipboard_error)?;

    match clipboard.get_text() {
        Ok(text) => return Ok(ClipboardPayload::from_text(text)),
        Err(arboard::Error::ContentNotAvailable) => {}
        Err(e) => return Err(clipboard_error(e)),
    }

    match clipboard.get_image() {
        Ok(image) => Ok(ClipboardPayload::Image {
            width: image.width,
            height: image.height,
        }),
        Err(arboard::Error::ContentNotAvailable) => Ok(ClipboardPayload::Text(String::new())),
        Err(e) => Err(clipboard_error(e)),
    }
}

/// Contents of a file as a text paste.
pub fn read_file_payload(path: &Path) -> Result<ClipboardPayload, XeerError> {
    let text = std::fs::read_to_string(path)?;
    Ok(ClipboardPayload::Text(text))
}

pub fn write_system_clipboard(text: &str) -> Result<(), XeerError> {
    let mut clipboard = arboard::Clipboard::new().map_err(clipboard_error)?;
    clipboard.set_text(text.to_string()).map_err(clipboard_error)
}

fn clipboard_error(e: arboard::Error) -> XeerError {
    XeerError::Clipboard(e.to_string())
}
