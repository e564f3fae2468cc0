use std::env;
use std::path::{Path, PathBuf};

/// Directory name used under the XDG config base.
const APP_DIR: &str = "app-inventory";

/// Resolve an XDG base directory from environment or default to `$HOME` + segments.
///
/// Inputs:
/// - `var`: Environment variable to check (e.g., `XDG_CONFIG_HOME`).
/// - `home_default`: Fallback path segments relative to `$HOME` if `var` is unset/empty.
///
/// Output: Resolved base directory path.
fn xdg_base_dir(var: &str, home_default: &[&str]) -> PathBuf {
    if let Ok(p) = env::var(var)
        && !p.trim().is_empty()
    {
        return PathBuf::from(p);
    }
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let mut base = PathBuf::from(home);
    for seg in home_default {
        base = base.join(seg);
    }
    base
}

/// Return `$HOME/.config/app-inventory`, ensuring it exists.
///
/// Output: `Some(PathBuf)` when HOME is set and directory can be created; `None` otherwise.
fn home_config_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        let dir = Path::new(&home).join(".config").join(APP_DIR);
        if std::fs::create_dir_all(&dir).is_ok() {
            return Some(dir);
        }
    }
    None
}

/// XDG config directory for app-inventory (ensured to exist)
pub fn config_dir() -> PathBuf {
    // Prefer HOME ~/.config/app-inventory first
    if let Some(dir) = home_config_dir() {
        return dir;
    }
    let base = xdg_base_dir("XDG_CONFIG_HOME", &[".config"]);
    let dir = base.join(APP_DIR);
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Logs directory under `config_dir` (ensured to exist)
pub fn logs_dir(config_dir: &Path) -> PathBuf {
    let dir = config_dir.join("logs");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Default directory for the persisted collections: `<config_dir>/state`.
pub fn default_state_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("state")
}

/// What: Application directories to scan for desktop entries, highest priority first.
///
/// Output:
/// - `$XDG_DATA_HOME/applications` (default `~/.local/share/applications`) followed by
///   `<dir>/applications` for each entry of `$XDG_DATA_DIRS`
///   (default `/usr/local/share:/usr/share`).
///
/// Details:
/// - Duplicate directories are dropped, keeping the first occurrence.
pub fn default_application_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![xdg_base_dir("XDG_DATA_HOME", &[".local", "share"]).join("applications")];
    let data_dirs = env::var("XDG_DATA_DIRS")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "/usr/local/share:/usr/share".to_string());
    for d in split_dir_list(&data_dirs) {
        let dir = d.join("applications");
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

/// Split a `:`-separated directory list, skipping empty segments.
pub fn split_dir_list(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
