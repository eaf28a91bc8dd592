// src/cli/terminal.rs — Terminal front end for the transcript
//
// Streaming replies are printed as raw deltas (a terminal cannot re-render
// earlier lines); finished entries that were never streamed are printed in
// full through the markdown renderer.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::types::Role;
use crate::session::{CancelHandle, StreamIndicator};
use crate::view::{
    render_actions, render_entry, render_markdown, Entry, EntryId, EntryStatus,
    TranscriptRenderer, STOPPED_MARKER,
};

const ASSISTANT_PREFIX: &str = "xeer › ";
const CLEAR_LINE: &str = "\r\x1b[2K";

/// The transient "typing" line on stderr, shared by the indicator (which
/// shows it) and the renderer (which clears it before printing).
#[derive(Clone, Default)]
pub struct TypingLine {
    visible: Arc<AtomicBool>,
    enabled: bool,
}

impl TypingLine {
    pub fn new(quiet: bool) -> Self {
        Self {
            visible: Arc::new(AtomicBool::new(false)),
            enabled: !quiet && std::io::stderr().is_terminal(),
        }
    }

    fn show(&self, text: &str) {
        if !self.enabled {
            return;
        }
        eprint!("{text}");
        let _ = std::io::stderr().flush();
        self.visible.store(true, Ordering::SeqCst);
    }

    fn clear(&self) {
        if self.visible.swap(false, Ordering::SeqCst) {
            eprint!("{CLEAR_LINE}");
            let _ = std::io::stderr().flush();
        }
    }
}

/// Shows "xeer is typing…" while a request is outstanding.
pub struct TerminalIndicator {
    line: TypingLine,
}

impl TerminalIndicator {
    pub fn new(line: TypingLine) -> Self {
        Self { line }
    }
}

impl StreamIndicator for TerminalIndicator {
    fn start(&mut self) {
        self.line.show("xeer is typing…");
    }

    fn stop(&mut self) {
        self.line.clear();
    }
}

pub struct TerminalRenderer {
    line: TypingLine,
    /// Entry currently being streamed and the text already printed for it.
    live: Option<(EntryId, String)>,
    show_actions: bool,
}

impl TerminalRenderer {
    pub fn new(line: TypingLine, quiet: bool) -> Self {
        Self {
            line,
            live: None,
            show_actions: !quiet,
        }
    }

    /// One-shot output has no follow-up commands to hint at.
    pub fn without_actions(mut self) -> Self {
        self.show_actions = false;
        self
    }

    fn take_printed(&mut self, id: EntryId) -> Option<String> {
        match self.live.take() {
            Some((live_id, printed)) if live_id == id => Some(printed),
            other => {
                self.live = other;
                None
            }
        }
    }

    fn finish(&mut self, entry: &Entry) {
        let mut out = std::io::stdout().lock();
        match self.take_printed(entry.id) {
            Some(printed) => match entry.raw.strip_prefix(printed.as_str()) {
                Some(rest) => {
                    let _ = write!(out, "{rest}");
                }
                None => {
                    let _ = write!(out, "\n{}", entry.raw);
                }
            },
            None => {
                let _ = write!(out, "{ASSISTANT_PREFIX}{}", render_markdown(&entry.raw));
            }
        }
        if entry.status == EntryStatus::Stopped {
            let _ = write!(out, "\n\n{STOPPED_MARKER}");
        }
        let _ = writeln!(out);
        let _ = out.flush();
        drop(out);

        if self.show_actions && !entry.actions.is_empty() {
            eprintln!("  {}", render_actions(&entry.actions));
        }
        println!();
    }
}

impl TranscriptRenderer for TerminalRenderer {
    fn entry_changed(&mut self, entry: &Entry) {
        // The user typed their own turn; it is already on screen.
        if entry.role != Role::Assistant {
            return;
        }
        match entry.status {
            EntryStatus::Streaming => {
                if entry.raw.is_empty() {
                    return;
                }
                self.line.clear();
                let mut out = std::io::stdout().lock();
                let printed = match self.live.take() {
                    Some((id, printed)) if id == entry.id => printed,
                    _ => {
                        let _ = write!(out, "{ASSISTANT_PREFIX}");
                        String::new()
                    }
                };
                if let Some(delta) = entry.raw.strip_prefix(printed.as_str()) {
                    let _ = write!(out, "{delta}");
                }
                let _ = out.flush();
                self.live = Some((entry.id, entry.raw.clone()));
            }
            EntryStatus::Complete | EntryStatus::Failed | EntryStatus::Stopped => {
                self.line.clear();
                self.finish(entry);
            }
        }
    }

    fn entry_removed(&mut self, entry: &Entry) {
        self.line.clear();
        self.take_printed(entry.id);
    }

    fn history_loaded(&mut self, entries: &[Entry]) {
        for entry in entries {
            println!("{}\n", render_entry(entry));
        }
    }
}

/// Ctrl+C cancels a live stream; with nothing in flight it exits.
pub fn spawn_interrupt_listener(canceller: CancelHandle) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("Cannot listen for Ctrl+C");
                return;
            }
            if !canceller.cancel() {
                eprintln!();
                std::process::exit(130);
            }
        }
    });
}

/// Transient notice on stderr (suppressed with --quiet).
pub fn notice(quiet: bool, message: &str) {
    if !quiet {
        eprintln!("  {message}");
    }
}
