use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::PackageSource;
use crate::error::EnumerationError;
use crate::model::App;
use crate::util::config::{parse_bool, parse_key_value, skip_comment_or_empty};

/// Group header holding the keys we read.
const DESKTOP_ENTRY_GROUP: &str = "[Desktop Entry]";

/// What: Enumerate installed applications from freedesktop `.desktop` files.
///
/// Inputs:
/// - `dirs`: Application directories in priority order (first match wins).
///
/// Output:
/// - Implements [`PackageSource`].
///
/// Details:
/// - The scan is blocking filesystem work and runs on tokio's blocking pool.
/// - Missing directories are skipped; an unreadable existing directory fails the whole call.
#[derive(Clone, Debug)]
pub struct DesktopEntrySource {
    /// Directories scanned, highest priority first.
    dirs: Vec<PathBuf>,
}

impl DesktopEntrySource {
    /// Create a source scanning `dirs` in order.
    #[must_use]
    pub const fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Directories this source scans.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

#[async_trait]
impl PackageSource for DesktopEntrySource {
    async fn list_installed_apps(&self) -> Result<Vec<App>, EnumerationError> {
        let dirs = self.dirs.clone();
        match tokio::task::spawn_blocking(move || scan_dirs(&dirs)).await {
            Ok(result) => result,
            Err(e) => Err(EnumerationError::Failed(format!(
                "desktop entry scan aborted: {e}"
            ))),
        }
    }
}

/// What: Walk every directory and collect displayable applications.
///
/// Inputs:
/// - `dirs`: Application directories in priority order.
///
/// Output:
/// - Apps sorted by package id, at most one per id.
///
/// Details:
/// - An id claimed by a higher-priority directory masks later ones even when that entry is
///   not displayable (`Hidden=true` is how users delete system entries).
fn scan_dirs(dirs: &[PathBuf]) -> Result<Vec<App>, EnumerationError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut apps = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "application dir missing; skipping");
            continue;
        }
        let mut files = Vec::new();
        collect_desktop_files(dir, dir, &mut files)?;
        files.sort();
        for (id, path) in files {
            if !seen.insert(id.clone()) {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    if let Some(app) = parse_desktop_entry(&id, &content) {
                        apps.push(app);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "unreadable desktop entry");
                }
            }
        }
    }
    apps.sort_by(|a, b| a.package_id.cmp(&b.package_id));
    tracing::debug!(count = apps.len(), "desktop entry scan finished");
    Ok(apps)
}

/// Recursively gather `(desktop-file id, path)` pairs below `dir`.
fn collect_desktop_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<(String, PathBuf)>,
) -> Result<(), EnumerationError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| EnumerationError::Failed(format!("{}: {e}", dir.display())))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_desktop_files(root, &path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "desktop")
            && let Some(id) = desktop_file_id(root, &path)
        {
            out.push((id, path));
        }
    }
    Ok(())
}

/// What: Derive the desktop-file id from its path relative to the application dir.
///
/// Inputs:
/// - `root`: Application directory.
/// - `path`: `.desktop` file under `root`.
///
/// Output:
/// - `Some(id)` such as `kde-konsole` for `root/kde/konsole.desktop`.
///
/// Details:
/// - Subdirectory separators become `-`, per the freedesktop desktop-entry naming rules.
fn desktop_file_id(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("-"))
}

/// What: Parse the `[Desktop Entry]` group of a desktop file into an `App`.
///
/// Inputs:
/// - `package_id`: Identifier to assign.
/// - `content`: Full file content.
///
/// Output:
/// - `Some(App)` for displayable applications; `None` for links, directories,
///   `NoDisplay`/`Hidden` entries, or entries without a `Name`.
///
/// Details:
/// - Localized keys (`Name[de]`) and other groups (desktop actions) are ignored.
#[must_use]
pub fn parse_desktop_entry(package_id: &str, content: &str) -> Option<App> {
    let mut in_entry = false;
    let mut name: Option<String> = None;
    let mut exec = String::new();
    let mut icon = String::new();
    let mut is_application = true;
    let mut displayable = true;

    for line in content.lines() {
        if skip_comment_or_empty(line) {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_entry = trimmed == DESKTOP_ENTRY_GROUP;
            continue;
        }
        if !in_entry {
            continue;
        }
        let Some((key, value)) = parse_key_value(trimmed) else {
            continue;
        };
        match key.as_str() {
            "Name" => name = Some(value),
            "Exec" => exec = value,
            "Icon" => icon = value,
            "Type" => is_application = value == "Application",
            "NoDisplay" | "Hidden" => {
                if parse_bool(&value) {
                    displayable = false;
                }
            }
            _ => {}
        }
    }

    if !is_application || !displayable {
        return None;
    }
    let label = name.filter(|n| !n.is_empty())?;
    Some(App::new(package_id, label).with_launch(exec).with_icon(icon))
}

/// What: Read and parse a single desktop file, deriving the id from its file stem.
///
/// Inputs:
/// - `path`: `.desktop` file.
///
/// Output:
/// - `Ok(Some(App))` when displayable, `Ok(None)` when the entry is not an application.
///
/// # Errors
/// - Returns `EnumerationError::Failed` when the file cannot be read or has no usable stem.
pub async fn read_desktop_file(path: &Path) -> Result<Option<App>, EnumerationError> {
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EnumerationError::Failed(format!("{}: no file name", path.display())))?;
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| EnumerationError::Failed(format!("{}: {e}", path.display())))?;
    Ok(parse_desktop_entry(&id, &content))
}
