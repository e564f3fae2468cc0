//! Runtime settings loaded from `settings.conf`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::DEFAULT_ENUMERATION_TIMEOUT;
use crate::util::config::{parse_bool, parse_key_value, skip_comment_or_empty, strip_inline_comment};

pub mod paths;

/// Settings file name inside the config directory.
pub const SETTINGS_FILE: &str = "settings.conf";

/// Commented skeleton written when no settings file exists.
const SETTINGS_SKELETON: &str = "\
# app-inventory settings
#
# Colon-separated directories scanned for .desktop entries, highest priority first.
# Defaults to $XDG_DATA_HOME/applications followed by $XDG_DATA_DIRS/*/applications.
# application_dirs = ~/.local/share/applications:/usr/share/applications

# Seconds before a package enumeration is abandoned.
enumeration_timeout_secs = 30

# Directory holding inventory.json, favorites.json and hidden.json.
# state_dir = ~/.config/app-inventory/state

# Remove favorites/hidden entries whose package is gone before running a command.
repair_on_start = true
";

/// What: Settings consumed by the CLI adapter.
///
/// Details:
/// - Missing or malformed keys keep their defaults; unknown keys are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Desktop-entry directories, highest priority first.
    pub application_dirs: Vec<PathBuf>,
    /// Bound on one enumeration call.
    pub enumeration_timeout: Duration,
    /// Where the persisted collections live.
    pub state_dir: PathBuf,
    /// Run a repair pass before each command.
    pub repair_on_start: bool,
}

impl Settings {
    /// Defaults rooted at `config_dir`.
    #[must_use]
    pub fn defaults_for(config_dir: &Path) -> Self {
        Self {
            application_dirs: paths::default_application_dirs(),
            enumeration_timeout: DEFAULT_ENUMERATION_TIMEOUT,
            state_dir: paths::default_state_dir(config_dir),
            repair_on_start: true,
        }
    }

    /// Inventory file path.
    #[must_use]
    pub fn inventory_path(&self) -> PathBuf {
        self.state_dir.join("inventory.json")
    }

    /// Favorites file path.
    #[must_use]
    pub fn favorites_path(&self) -> PathBuf {
        self.state_dir.join("favorites.json")
    }

    /// Hidden-apps file path.
    #[must_use]
    pub fn hidden_path(&self) -> PathBuf {
        self.state_dir.join("hidden.json")
    }
}

/// What: Load settings from `<config_dir>/settings.conf`.
///
/// Inputs:
/// - `config_dir`: Configuration directory.
///
/// Output:
/// - Parsed settings; defaults when the file is missing or unreadable.
///
/// Details:
/// - Writes a commented skeleton when the file does not exist yet.
pub fn load_settings(config_dir: &Path) -> Settings {
    let mut settings = Settings::defaults_for(config_dir);
    let path = config_dir.join(SETTINGS_FILE);
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_settings(&content, &mut settings),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if let Err(e) = std::fs::write(&path, SETTINGS_SKELETON) {
                tracing::debug!(path = %path.display(), error = %e, "could not write settings skeleton");
            } else {
                tracing::info!(path = %path.display(), "wrote default settings");
            }
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read settings; using defaults");
        }
    }
    settings
}

/// What: Apply `key = value` lines from `content` onto `settings`.
///
/// Inputs:
/// - `content`: Settings file content.
/// - `settings`: Settings to update in place.
///
/// Details:
/// - Keys are case-insensitive; `-`, `.` and spaces in keys are treated as `_`.
/// - `~/` at the start of a path expands to `$HOME`.
pub fn parse_settings(content: &str, settings: &mut Settings) {
    for line in content.lines() {
        if skip_comment_or_empty(line) {
            continue;
        }
        let Some((raw_key, raw_val)) = parse_key_value(line) else {
            continue;
        };
        let key = raw_key.to_lowercase().replace(['.', '-', ' '], "_");
        let val = strip_inline_comment(&raw_val);
        match key.as_str() {
            "application_dirs" | "app_dirs" => {
                let dirs: Vec<PathBuf> = paths::split_dir_list(val)
                    .into_iter()
                    .map(|p| expand_home(&p))
                    .collect();
                if !dirs.is_empty() {
                    settings.application_dirs = dirs;
                }
            }
            "enumeration_timeout_secs" | "enumeration_timeout" => match val.parse::<u64>() {
                Ok(secs) if secs > 0 => settings.enumeration_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "ignoring invalid enumeration_timeout_secs"),
            },
            "state_dir" => {
                if !val.is_empty() {
                    settings.state_dir = expand_home(Path::new(val));
                }
            }
            "repair_on_start" => settings.repair_on_start = parse_bool(val),
            _ => tracing::debug!(key = %key, "ignoring unknown settings key"),
        }
    }
}

/// Expand a leading `~/` using `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Ok(home) = std::env::var("HOME")
    {
        return Path::new(&home).join(rest);
    }
    path.to_path_buf()
}
