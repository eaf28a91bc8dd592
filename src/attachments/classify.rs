// src/attachments/classify.rs — Content sniffing for pasted snippets
//
// Ordered marker checks; the first match wins and anything else is plain
// text. The result only drives labels and the fence language.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Php,
    JavaScript,
    Python,
    Html,
    Json,
    Sql,
    Csv,
    Text,
}

impl ContentKind {
    pub fn title(&self) -> &'static str {
        match self {
            ContentKind::Php => "PHP Code",
            ContentKind::JavaScript => "JavaScript Code",
            ContentKind::Python => "Python Code",
            ContentKind::Html => "HTML Document",
            ContentKind::Json => "JSON Data",
            ContentKind::Sql => "SQL Query",
            ContentKind::Csv => "CSV Data",
            ContentKind::Text => "Text Document",
        }
    }

    /// Fence language tag; plain text has none.
    pub fn language(&self) -> Option<&'static str> {
        match self {
            ContentKind::Php => Some("php"),
            ContentKind::JavaScript => Some("javascript"),
            ContentKind::Python => Some("python"),
            ContentKind::Html => Some("html"),
            ContentKind::Json => Some("json"),
            ContentKind::Sql => Some("sql"),
            ContentKind::Csv => Some("csv"),
            ContentKind::Text => None,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ContentKind::Json => "{}",
            ContentKind::Sql => "⛁",
            ContentKind::Csv => "▦",
            ContentKind::Text => "¶",
            _ => "</>",
        }
    }
}

pub fn detect_content_kind(content: &str) -> ContentKind {
    if content.contains("<?php") {
        return ContentKind::Php;
    }
    if content.contains("function") && content.contains('{') && content.contains('}') {
        return ContentKind::JavaScript;
    }
    if content.contains("def ") || content.contains("import ") || content.contains("class ") {
        return ContentKind::Python;
    }
    if content.contains("<html") || content.contains("<!DOCTYPE") {
        return ContentKind::Html;
    }
    if content.contains('{')
        && content.contains('}')
        && content.contains(':')
        && serde_json::from_str::<serde_json::Value>(content).is_ok()
    {
        return ContentKind::Json;
    }
    if content.contains("SELECT") || content.contains("INSERT") || content.contains("UPDATE") {
        return ContentKind::Sql;
    }
    let mut lines = content.split('\n');
    if let (Some(first), Some(second)) = (lines.next(), lines.next()) {
        if first.contains(',') && second.contains(',') {
            return ContentKind::Csv;
        }
    }
    ContentKind::Text
}
