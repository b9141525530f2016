//! XDG Base Directory lookup for the default configuration file.

use std::path::PathBuf;

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_home() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg_config_home.is_empty() {
            return Some(PathBuf::from(xdg_config_home));
        }
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config"))
}

/// Default configuration file: `$XDG_CONFIG_HOME/goaledp/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    config_home().map(|dir| dir.join("goaledp").join("config.toml"))
}
