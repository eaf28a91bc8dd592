// src/view/markdown.rs — Markdown to plain terminal text

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Render markdown as readable plain text: bullets for lists, fenced code
/// kept as fences, links followed by their URL. Emphasis markers are dropped.
pub fn render_markdown(text: &str) -> String {
    let mut writer = TextWriter::default();
    for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS) {
        writer.event(event);
    }
    writer.finish()
}

#[derive(Default)]
struct TextWriter {
    out: String,
    /// Next number for each open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
    item_fresh: bool,
    /// Open links: destination and where the link text starts in `out`.
    links: Vec<(String, usize)>,
}

impl TextWriter {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.text(&format!("`{code}`")),
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak | Event::HardBreak => self.out.push('\n'),
            Event::Rule => {
                self.block_break();
                self.text("────────");
            }
            Event::TaskListMarker(done) => self.text(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if !self.item_fresh {
                    self.block_break();
                }
            }
            Tag::Heading { level, .. } => {
                self.block_break();
                let hashes = "#".repeat(level as usize);
                self.text(&format!("{hashes} "));
            }
            Tag::CodeBlock(kind) => {
                self.block_break();
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.text(&format!("```{lang}"));
                self.out.push('\n');
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_break();
                } else {
                    self.newline();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.newline();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.text(&format!("{indent}{marker}"));
                self.item_fresh = true;
            }
            Tag::BlockQuote(_) => {
                self.block_break();
                self.quote_depth += 1;
            }
            Tag::Link { dest_url, .. } => {
                self.links.push((dest_url.to_string(), self.out.len()));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::CodeBlock { .. } => {
                self.newline();
                self.text("```");
                self.in_code_block = false;
            }
            TagEnd::List { .. } => {
                self.lists.pop();
            }
            TagEnd::Item { .. } => {
                self.item_fresh = false;
            }
            TagEnd::BlockQuote { .. } => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::Link { .. } => {
                if let Some((url, start)) = self.links.pop() {
                    let label = self.out.get(start..).unwrap_or_default();
                    if !url.is_empty() && label != url {
                        self.text(&format!(" ({url})"));
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if !self.in_code_block {
            self.item_fresh = false;
        }
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.out.push('\n');
            }
            if !line.is_empty() {
                self.line_prefix();
                self.out.push_str(line);
            }
        }
    }

    fn line_prefix(&mut self) {
        if self.out.is_empty() || self.out.ends_with('\n') {
            for _ in 0..self.quote_depth {
                self.out.push_str("│ ");
            }
        }
    }

    fn newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    /// Separate blocks by one blank line.
    fn block_break(&mut self) {
        if self.out.is_empty() || self.out.ends_with("\n\n") {
            return;
        }
        self.newline();
        self.out.push('\n');
    }

    fn finish(self) -> String {
        self.out.trim_end().to_string()
    }
}
