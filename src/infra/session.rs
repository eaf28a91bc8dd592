// src/infra/session.rs — Client identity for the non-streaming request path

use chrono::Utc;
use uuid::Uuid;

/// Identifiers sent with every non-streaming request. The user id is
/// persisted; the session id is fresh per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_id: String,
    pub session_id: String,
}

impl ClientIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: new_session_id(),
        }
    }
}

fn random_token() -> String {
    Uuid::new_v4().simple().to_string()[..9].to_string()
}

/// `user_<random><millis>`
pub fn new_user_id() -> String {
    format!("user_{}{}", random_token(), Utc::now().timestamp_millis())
}

/// `session_<millis>_<random>`
pub fn new_session_id() -> String {
    format!("session_{}_{}", Utc::now().timestamp_millis(), random_token())
}
