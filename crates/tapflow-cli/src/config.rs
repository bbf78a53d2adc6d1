//! Configuration file loading.
//!
//! `tapflow.toml` is optional. A missing file yields defaults; a malformed
//! one warns and yields defaults rather than refusing to start.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use tapflow_types::config::AppConfig;

/// Load configuration from `explicit`, the working directory, or the user
/// config directory, in that order.
pub fn load(explicit: Option<&Path>) -> AppConfig {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(discover) else {
        debug!("no tapflow.toml found, using defaults");
        return AppConfig::default();
    };

    match std::fs::read_to_string(&path) {
        Ok(text) => match toml::from_str(&text) {
            Ok(config) => {
                debug!(path = %path.display(), "configuration loaded");
                config
            }
            Err(error) => {
                warn!(%error, path = %path.display(), "malformed tapflow.toml, using defaults");
                AppConfig::default()
            }
        },
        Err(error) => {
            warn!(%error, path = %path.display(), "unreadable tapflow.toml, using defaults");
            AppConfig::default()
        }
    }
}

fn discover() -> Option<PathBuf> {
    let local = PathBuf::from("tapflow.toml");
    if local.is_file() {
        return Some(local);
    }
    let user = dirs::config_dir()?.join("tapflow").join("tapflow.toml");
    user.is_file().then_some(user)
}
