//! Filesystem locations used by jobterm.
//!
//! | Purpose | Location |
//! |---------|----------|
//! | Config  | `$XDG_CONFIG_HOME/jobterm/config.toml` |
//! | History | `.jobterm_history.txt` in the starting directory (configurable) |
//! | Watch capture files | `$TMPDIR/.temp_mw_<ppid>_<pid>.txt` |

use std::path::{Path, PathBuf};

use directories::BaseDirs;

/// Get the user's home directory.
///
/// Returns `$HOME` or falls back to `/` if not set.
pub fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Get XDG config home directory.
///
/// Returns `$XDG_CONFIG_HOME` or falls back to `~/.config`.
pub fn xdg_config_home() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".config"))
}

/// The jobterm config directory.
pub fn config_dir() -> PathBuf {
    xdg_config_home().join("jobterm")
}

/// The jobterm config file.
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Capture file for one multiWatch child, keyed by parent and child pid.
pub fn watch_capture_file(dir: &Path, parent: u32, child: u32) -> PathBuf {
    dir.join(format!(".temp_mw_{}_{}.txt", parent, child))
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
