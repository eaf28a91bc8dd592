// src/infra/errors.rs — Error types for xeerchat

use thiserror::Error;

#[derive(Error, Debug)]
pub enum XeerError {
    // Transport errors (retriable on the legacy path)
    #[error("Connection error: {message}")]
    Connection { message: String, retriable: bool },

    #[error("Server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limit exceeded. Please wait a moment.")]
    RateLimited,

    #[error("Request timed out. Please try again.")]
    Timeout,

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    // User errors
    #[error("Nothing to send")]
    EmptyMessage,

    #[error("Message too long ({len} characters). Maximum {max} characters.")]
    MessageTooLong { len: usize, max: usize },

    #[error("Unknown model '{key}'. Run `/models` to list available models.")]
    UnknownModel { key: String },

    #[error("Title cannot be empty")]
    InvalidTitle,

    // Infra
    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl XeerError {
    pub fn is_retriable(&self) -> bool {
        match self {
            XeerError::Connection { retriable, .. } => *retriable,
            XeerError::HttpStatus { status, .. } => *status >= 500,
            XeerError::RateLimited | XeerError::Timeout => true,
            _ => false,
        }
    }

    /// Map a reqwest transport error into the client's taxonomy.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return XeerError::Timeout;
        }
        if e.is_decode() {
            return XeerError::Decode(e.to_string());
        }
        XeerError::Connection {
            retriable: e.is_connect() || e.is_request(),
            message: e.to_string(),
        }
    }
}
