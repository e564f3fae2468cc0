//! Command handlers: translate CLI commands into synchronizer intents.

use std::sync::Arc;

use crate::args::Command;
use crate::config::Settings;
use crate::error::{EnumerationError, SyncResult};
use crate::source::{DesktopEntrySource, read_desktop_file};
use crate::store::{MemoryInventory, MemorySet};
use crate::sync::{InventorySynchronizer, PopulateOutcome, Repositories, SyncOptions};

/// What: Open the persisted collections named by `settings` and build the synchronizer.
///
/// Inputs:
/// - `settings`: Loaded settings (state dir, application dirs, timeout).
///
/// Output:
/// - Synchronizer over JSON-backed collections, enumerating desktop entries.
///
/// # Errors
/// - Returns `SyncError::Storage` when a persisted collection cannot be loaded.
pub async fn open_synchronizer(settings: &Settings) -> SyncResult<InventorySynchronizer> {
    let inventory = MemoryInventory::open(settings.inventory_path()).await?;
    let favorites = MemorySet::open(settings.favorites_path()).await?;
    let hidden = MemorySet::open(settings.hidden_path()).await?;
    let source = DesktopEntrySource::new(settings.application_dirs.clone());
    tracing::debug!(
        dirs = ?source.dirs(),
        inventory = %settings.inventory_path().display(),
        "opened collections"
    );
    Ok(InventorySynchronizer::new(
        Repositories {
            inventory: Arc::new(inventory),
            favorites: Arc::new(favorites),
            hidden: Arc::new(hidden),
        },
        Arc::new(source),
        SyncOptions {
            enumeration_timeout: settings.enumeration_timeout,
        },
    ))
}

/// What: Execute one CLI command against the synchronizer.
///
/// Inputs:
/// - `sync`: Synchronizer over the persisted collections.
/// - `command`: Parsed command.
///
/// Output:
/// - Lines to print on stdout.
///
/// # Errors
/// - Returns the `SyncError` reported by the underlying operation.
/// - `install` reports `SyncError::Enumeration` when the desktop file is unreadable or
///   does not describe a displayable application.
///
/// Details:
/// - Each command awaits its completion so the process exits only after the write is durable.
pub async fn run_command(sync: &InventorySynchronizer, command: &Command) -> SyncResult<Vec<String>> {
    match command {
        Command::Populate { force } => {
            let line = match sync.ensure_populated(*force).await? {
                PopulateOutcome::Skipped => "inventory already populated".to_string(),
                PopulateOutcome::Populated {
                    written,
                    skipped_stale,
                } => format!("populated {written} apps ({skipped_stale} skipped as stale)"),
            };
            Ok(vec![line])
        }
        Command::Install { desktop_file } => {
            let app = read_desktop_file(desktop_file).await?.ok_or_else(|| {
                EnumerationError::Failed(format!(
                    "{}: not a displayable application",
                    desktop_file.display()
                ))
            })?;
            let line = format!("installed {} ({})", app.package_id, app.label);
            sync.on_installed(app).await?;
            Ok(vec![line])
        }
        Command::Uninstall { package_id } => {
            let removed = sync.on_uninstalled(package_id.clone()).await?;
            Ok(vec![outcome_line(removed, "uninstalled", "not installed", package_id)])
        }
        Command::Favorite { package_id } => {
            let ok = sync.add_favorite(package_id.clone()).await?;
            Ok(vec![outcome_line(ok, "favorited", "not installed", package_id)])
        }
        Command::Unfavorite { package_id } => {
            let ok = sync.remove_favorite(package_id.clone()).await?;
            Ok(vec![outcome_line(ok, "unfavorited", "not a favorite", package_id)])
        }
        Command::Hide { package_id } => {
            let ok = sync.hide(package_id.clone()).await?;
            Ok(vec![outcome_line(ok, "hidden", "not installed", package_id)])
        }
        Command::Unhide { package_id } => {
            let ok = sync.unhide(package_id.clone()).await?;
            Ok(vec![outcome_line(ok, "unhidden", "not hidden", package_id)])
        }
        Command::List { favorites, hidden } => {
            sync.ensure_populated(false).await?;
            Ok(list_lines(sync, *favorites, *hidden))
        }
        Command::Repair => {
            let report = sync.repair().await?;
            Ok(vec![format!(
                "removed {} dangling favorites, {} dangling hidden entries",
                report.favorites_removed, report.hidden_removed
            )])
        }
    }
}

fn outcome_line(ok: bool, done: &str, skipped: &str, package_id: &str) -> String {
    if ok {
        format!("{done} {package_id}")
    } else {
        format!("{package_id}: {skipped}")
    }
}

/// Render the inventory as `id<TAB>label` lines with `[favorite]`/`[hidden]` markers.
fn list_lines(sync: &InventorySynchronizer, only_favorites: bool, only_hidden: bool) -> Vec<String> {
    let inventory = sync.inventory().borrow().clone();
    let favorites = sync.favorites().borrow().clone();
    let hidden = sync.hidden().borrow().clone();
    inventory
        .values()
        .filter(|app| !only_favorites || favorites.contains(&app.package_id))
        .filter(|app| !only_hidden || hidden.contains(&app.package_id))
        .map(|app| {
            let mut line = format!("{}\t{}", app.package_id, app.label);
            if favorites.contains(&app.package_id) {
                line.push_str("\t[favorite]");
            }
            if hidden.contains(&app.package_id) {
                line.push_str("\t[hidden]");
            }
            line
        })
        .collect()
}
