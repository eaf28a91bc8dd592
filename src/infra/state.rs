// src/infra/state.rs — Persisted client state (state.json)
//
// Holds what a browser would keep in local storage: the selected model, the
// anonymous user id, whether the user has chatted before, and the capped
// history of the non-streaming path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::types::Role;
use crate::infra::errors::XeerError;
use crate::infra::paths;
use crate::infra::session;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientState {
    pub selected_model: Option<String>,
    pub user_id: Option<String>,
    pub has_chatted: bool,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

pub struct StateStore {
    path: PathBuf,
    state: ClientState,
}

impl StateStore {
    /// Open the store at the default location.
    pub fn open_default() -> Self {
        Self::open(paths::state_file_path())
    }

    /// A missing or unreadable file yields the defaults; it is rewritten on
    /// the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt state file {}: {}", path.display(), e);
                ClientState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ClientState::default(),
            Err(e) => {
                tracing::warn!("Cannot read state file {}: {}", path.display(), e);
                ClientState::default()
            }
        };
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.state.selected_model.as_deref()
    }

    pub fn set_selected_model(&mut self, key: &str) -> Result<(), XeerError> {
        self.state.selected_model = Some(key.to_string());
        self.save()
    }

    /// The persisted user id, generated and saved on first use.
    pub fn user_id(&mut self) -> Result<String, XeerError> {
        if let Some(id) = &self.state.user_id {
            return Ok(id.clone());
        }
        let id = session::new_user_id();
        self.state.user_id = Some(id.clone());
        self.save()?;
        Ok(id)
    }

    pub fn has_chatted(&self) -> bool {
        self.state.has_chatted
    }

    pub fn mark_chatted(&mut self) -> Result<(), XeerError> {
        if self.state.has_chatted {
            return Ok(());
        }
        self.state.has_chatted = true;
        self.save()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    /// Append to the local history, keeping only the newest `limit` entries.
    pub fn push_history(&mut self, entry: HistoryEntry, limit: usize) -> Result<(), XeerError> {
        self.state.history.push(entry);
        let len = self.state.history.len();
        if len > limit {
            self.state.history.drain(..len - limit);
        }
        self.save()
    }

    pub fn clear_history(&mut self) -> Result<(), XeerError> {
        self.state.history.clear();
        self.save()
    }

    fn save(&self) -> Result<(), XeerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
