// src/stream/mod.rs — Incremental decoder for the chat SSE body
//
// The body is a sequence of blocks separated by a blank line. Each block
// carries one or more `data:` lines whose joined payload is a JSON object
// tagged by `type`. Chunks may split a block (or a UTF-8 sequence) at any
// byte; incomplete input stays buffered until the next chunk.

use crate::backend::types::ConversationId;
use crate::infra::errors::XeerError;

pub const EVENT_DELIMITER: &str = "\n\n";
const DATA_FIELD: &str = "data:";

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    ConversationId(ConversationId),
    /// A text delta to append to the reply.
    Content(String),
    Done,
    Error(String),
    /// Well-formed event of a type this client does not handle.
    Unknown(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}

/// Decoded result for one block: malformed blocks come back as errors so
/// the caller can log and skip them.
pub type DecodedEvent = Result<StreamEvent, XeerError>;

#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every event completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedEvent> {
        self.decode_utf8(chunk);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find(EVENT_DELIMITER) {
            let block: String = self.buffer.drain(..pos + EVENT_DELIMITER.len()).collect();
            if let Some(event) = parse_block(&block[..pos]) {
                events.push(event);
            }
        }
        events
    }

    /// End of body: whatever is still buffered is treated as a final block.
    pub fn finish(&mut self) -> Vec<DecodedEvent> {
        if !self.pending.is_empty() {
            self.pending.clear();
            self.buffer.push(char::REPLACEMENT_CHARACTER);
        }
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.replace("\r\n", "\n");
        rest.split(EVENT_DELIMITER)
            .filter_map(|block| parse_block(block.trim_end_matches('\r')))
            .collect()
    }

    /// True when nothing is buffered.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.buffer.trim().is_empty()
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&rest[..valid]) {
                        self.buffer.push_str(text);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + bad;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

/// Parse one block. Blocks without any `data:` line (comments, keep-alives,
/// stray blank lines) yield nothing.
pub fn parse_block(block: &str) -> Option<DecodedEvent> {
    let mut data: Option<String> = None;
    for line in block.lines() {
        let Some(value) = line.strip_prefix(DATA_FIELD) else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(joined) => {
                joined.push('\n');
                joined.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }
    data.map(|payload| parse_payload(&payload))
}

pub fn parse_payload(payload: &str) -> DecodedEvent {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| XeerError::Decode(format!("invalid event payload: {e}")))?;

    let kind = value["type"]
        .as_str()
        .ok_or_else(|| XeerError::Decode("event has no type".into()))?;

    match kind {
        "conversation_id" => match value.get("conversation_id") {
            Some(id) if !id.is_null() => Ok(StreamEvent::ConversationId(
                ConversationId::from_value(id.clone()),
            )),
            _ => Err(XeerError::Decode(
                "conversation_id event without an id".into(),
            )),
        },
        "content" => value["content"]
            .as_str()
            .map(|s| StreamEvent::Content(s.to_string()))
            .ok_or_else(|| XeerError::Decode("content event without text".into())),
        "done" => Ok(StreamEvent::Done),
        "error" => {
            let message = value["message"]
                .as_str()
                .or_else(|| value["content"].as_str())
                .or_else(|| value["error"].as_str())
                .unwrap_or("Something went wrong. Please try again.");
            Ok(StreamEvent::Error(message.to_string()))
        }
        other => Ok(StreamEvent::Unknown(other.to_string())),
    }
}
