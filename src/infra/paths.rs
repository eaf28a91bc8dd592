// src/infra/paths.rs — XDG-compliant path management
//
// All paths respect the XEERCHAT_HOME environment variable for isolation.
// When XEERCHAT_HOME is set, config and data live under that directory.
// When unset, config uses ~/.xeerchat/ and data uses XDG_DATA_HOME/xeerchat.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

pub const HOME_ENV: &str = "XEERCHAT_HOME";

/// Returns the XEERCHAT_HOME override, if set.
fn xeerchat_home() -> Option<PathBuf> {
    std::env::var_os(HOME_ENV).map(PathBuf::from)
}

/// Home directory, or the working directory when no home can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $XEERCHAT_HOME/ or ~/.xeerchat/
pub fn config_dir() -> PathBuf {
    if let Some(home) = xeerchat_home() {
        return home;
    }
    dirs_home().join(".xeerchat")
}

/// Data directory: $XEERCHAT_HOME/data/ or ~/.local/share/xeerchat/
pub fn data_dir() -> PathBuf {
    if let Some(home) = xeerchat_home() {
        return home.join("data");
    }
    ProjectDirs::from("", "", "xeerchat")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| config_dir().join("data"))
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Persisted client state (selected model, user id, local history)
pub fn state_file_path() -> PathBuf {
    data_dir().join("state.json")
}
