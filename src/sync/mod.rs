//! Inventory synchronization: keeps the installed-apps cache, favorites and hidden apps
//! consistent with install/uninstall notifications and cold-start enumeration.
//!
//! Every identifier present in favorites or hidden has a matching inventory entry whenever
//! no operation is in flight for it. The synchronizer is the only writer of the three
//! collections; adapters submit intents and observe results through the snapshot channels.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinError;

use crate::error::{SyncError, SyncResult};
use crate::model::{App, PackageId};
use crate::serializer::{KeyedSerializer, SerialKey, Ticket};
use crate::source::PackageSource;
use crate::store::{InventorySnapshot, InventoryStore, PackageSet, SetSnapshot};

mod populate;
mod repair;

pub use populate::{PopulateCompletion, PopulateOutcome};
pub use repair::RepairReport;

use populate::PopulationState;

/// What: Completion of a submitted operation.
///
/// Details:
/// - The operation runs in the background whether or not this future is polled; await it
///   only to learn the outcome.
pub type Completion<T> = BoxFuture<'static, SyncResult<T>>;

/// Default bound on a single enumeration call.
pub const DEFAULT_ENUMERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// The three collections the synchronizer owns.
#[derive(Clone)]
pub struct Repositories {
    /// Installed-apps cache.
    pub inventory: Arc<dyn InventoryStore>,
    /// Favorite package ids.
    pub favorites: Arc<dyn PackageSet>,
    /// Hidden package ids.
    pub hidden: Arc<dyn PackageSet>,
}

/// Tunables for [`InventorySynchronizer`].
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Upper bound for one package-enumeration call.
    pub enumeration_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            enumeration_timeout: DEFAULT_ENUMERATION_TIMEOUT,
        }
    }
}

/// Which reference set an intent targets.
#[derive(Clone, Copy, Debug)]
enum Membership {
    /// Favorites set.
    Favorites,
    /// Hidden set.
    Hidden,
}

impl Membership {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::Hidden => "hidden",
        }
    }
}

/// State shared by every background operation.
struct Inner {
    /// Owned collections.
    repos: Repositories,
    /// Enumeration collaborator.
    source: Arc<dyn PackageSource>,
    /// Per-key ordering.
    serializer: KeyedSerializer<SerialKey>,
    /// Tunables.
    options: SyncOptions,
    /// In-flight population bookkeeping.
    population: Mutex<PopulationState>,
    /// Held shared by per-package inventory writers and exclusively by the population
    /// batch write, so the stale check and the batch see no half-applied event.
    write_gate: RwLock<()>,
}

/// What: Orchestrates all writes to the inventory, favorites and hidden collections.
///
/// Inputs:
/// - [`Repositories`], a [`PackageSource`], and [`SyncOptions`].
///
/// Output:
/// - Fire-and-forget intents returning [`Completion`]s, plus snapshot subscriptions.
///
/// Details:
/// - Operations for one package id run in submission order and never overlap.
/// - Population runs on the reserved bulk lane. Enumeration overlaps per-package work; the
///   resulting batch is written while no install or uninstall is mid-flight.
/// - Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct InventorySynchronizer {
    /// Shared state.
    inner: Arc<Inner>,
}

impl InventorySynchronizer {
    /// Create a synchronizer over `repos`, enumerating through `source`.
    #[must_use]
    pub fn new(repos: Repositories, source: Arc<dyn PackageSource>, options: SyncOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                repos,
                source,
                serializer: KeyedSerializer::new(),
                options,
                population: Mutex::new(PopulationState::default()),
                write_gate: RwLock::new(()),
            }),
        }
    }

    /// What: Record that `app` was installed (or reinstalled).
    ///
    /// Inputs:
    /// - `app`: New value for `app.package_id`.
    ///
    /// Output:
    /// - Completion resolving once the inventory holds `app`.
    ///
    /// Details:
    /// - Idempotent; a second install of the same id replaces the stored value.
    pub fn on_installed(&self, app: App) -> Completion<()> {
        let inner = Arc::clone(&self.inner);
        let key = SerialKey::package(app.package_id.clone());
        settle(self.inner.serializer.submit(key, async move {
            inner.install(app).await
        }))
    }

    /// What: Record that `package_id` was uninstalled.
    ///
    /// Inputs:
    /// - `package_id`: Removed package.
    ///
    /// Output:
    /// - `true` once the package was removed from all collections, `false` when it was
    ///   not in the inventory (duplicate or late notification).
    ///
    /// Details:
    /// - Removes from favorites, then hidden, then inventory. Each step is idempotent, so a
    ///   notification that failed midway can simply be delivered again.
    pub fn on_uninstalled(&self, package_id: impl Into<PackageId>) -> Completion<bool> {
        let package_id = package_id.into();
        let inner = Arc::clone(&self.inner);
        let key = SerialKey::package(package_id.clone());
        settle(self.inner.serializer.submit(key, async move {
            inner.uninstall(&package_id).await
        }))
    }

    /// What: Mark `package_id` as a favorite.
    ///
    /// Output:
    /// - `true` when the id is (now) a favorite; `false` when the package is not installed,
    ///   in which case nothing is written.
    pub fn add_favorite(&self, package_id: impl Into<PackageId>) -> Completion<bool> {
        self.set_membership(Membership::Favorites, package_id.into(), true)
    }

    /// Remove `package_id` from favorites; `false` when it was not a favorite.
    pub fn remove_favorite(&self, package_id: impl Into<PackageId>) -> Completion<bool> {
        self.set_membership(Membership::Favorites, package_id.into(), false)
    }

    /// Hide `package_id`; `false` when the package is not installed.
    pub fn hide(&self, package_id: impl Into<PackageId>) -> Completion<bool> {
        self.set_membership(Membership::Hidden, package_id.into(), true)
    }

    /// Unhide `package_id`; `false` when it was not hidden.
    pub fn unhide(&self, package_id: impl Into<PackageId>) -> Completion<bool> {
        self.set_membership(Membership::Hidden, package_id.into(), false)
    }

    /// Subscribe to inventory snapshots.
    #[must_use]
    pub fn inventory(&self) -> watch::Receiver<InventorySnapshot> {
        self.inner.repos.inventory.subscribe()
    }

    /// Subscribe to favorites snapshots.
    #[must_use]
    pub fn favorites(&self) -> watch::Receiver<SetSnapshot> {
        self.inner.repos.favorites.subscribe()
    }

    /// Subscribe to hidden-apps snapshots.
    #[must_use]
    pub fn hidden(&self) -> watch::Receiver<SetSnapshot> {
        self.inner.repos.hidden.subscribe()
    }

    /// Package ids referenced by favorites or hidden but missing from the inventory.
    ///
    /// # Errors
    /// - Returns `SyncError::Storage` when any collection cannot be read.
    pub async fn dangling_references(&self) -> SyncResult<BTreeSet<PackageId>> {
        self.inner.dangling_references().await
    }

    fn set_membership(&self, which: Membership, package_id: PackageId, add: bool) -> Completion<bool> {
        let inner = Arc::clone(&self.inner);
        let key = SerialKey::package(package_id.clone());
        settle(self.inner.serializer.submit(key, async move {
            inner.set_membership(which, &package_id, add).await
        }))
    }
}

impl Inner {
    fn population(&self) -> MutexGuard<'_, PopulationState> {
        self.population.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, which: Membership) -> &dyn PackageSet {
        match which {
            Membership::Favorites => self.repos.favorites.as_ref(),
            Membership::Hidden => self.repos.hidden.as_ref(),
        }
    }

    async fn install(&self, app: App) -> SyncResult<()> {
        let _gate = self.write_gate.read().await;
        self.note_package_event(&app.package_id);
        let package_id = app.package_id.clone();
        self.repos.inventory.upsert(app).await.map_err(|e| {
            tracing::warn!(package = %package_id, error = %e, "install: inventory upsert failed");
            e
        })?;
        tracing::debug!(package = %package_id, "install: inventory updated");
        Ok(())
    }

    async fn uninstall(&self, package_id: &str) -> SyncResult<bool> {
        let _gate = self.write_gate.read().await;
        self.note_package_event(package_id);
        if self.repos.inventory.get(package_id).await?.is_none() {
            tracing::debug!(package = %package_id, "uninstall: not in inventory; nothing to do");
            return Ok(false);
        }
        // Reference sets first so the inventory never lags behind them.
        self.repos.favorites.remove(package_id).await.map_err(|e| {
            tracing::warn!(package = %package_id, error = %e, "uninstall: favorites removal failed");
            e
        })?;
        self.repos.hidden.remove(package_id).await.map_err(|e| {
            tracing::warn!(package = %package_id, error = %e, "uninstall: hidden removal failed");
            e
        })?;
        self.repos.inventory.remove(package_id).await.map_err(|e| {
            tracing::warn!(package = %package_id, error = %e, "uninstall: inventory removal failed");
            e
        })?;
        tracing::debug!(package = %package_id, "uninstall: removed from all collections");
        Ok(true)
    }

    async fn set_membership(&self, which: Membership, package_id: &str, add: bool) -> SyncResult<bool> {
        let set = self.set(which);
        if !add {
            let removed = set.remove(package_id).await?;
            tracing::debug!(package = %package_id, set = which.as_str(), removed, "membership removed");
            return Ok(removed);
        }
        if self.repos.inventory.get(package_id).await?.is_none() {
            tracing::debug!(
                package = %package_id,
                set = which.as_str(),
                "refusing to reference a package missing from the inventory"
            );
            return Ok(false);
        }
        set.insert(package_id).await?;
        tracing::debug!(package = %package_id, set = which.as_str(), "membership added");
        Ok(true)
    }

    async fn dangling_references(&self) -> SyncResult<BTreeSet<PackageId>> {
        let installed = self.repos.inventory.ids().await?;
        let favorites = self.repos.favorites.members().await?;
        let hidden = self.repos.hidden.members().await?;
        Ok(favorites
            .into_iter()
            .chain(hidden)
            .filter(|id| !installed.contains(id))
            .collect())
    }
}

/// Map a task failure to the caller-facing error.
fn interrupted(err: JoinError) -> SyncError {
    tracing::error!(error = %err, "synchronizer task did not complete");
    SyncError::Interrupted(err.to_string())
}

/// Turn a serializer ticket into a [`Completion`].
fn settle<T: Send + 'static>(ticket: Ticket<SyncResult<T>>) -> Completion<T> {
    async move {
        match ticket.await {
            Ok(result) => result,
            Err(e) => Err(interrupted(e)),
        }
    }
    .boxed()
}
