//! Path helpers for config file lookup

use std::path::PathBuf;

/// Expand a leading `~` to the home directory. Other paths are returned as given.
pub fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

    if path == "~" {
        home()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(path)
    }
}
