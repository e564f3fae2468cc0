//! Storage-engine seam for the inventory, favorites and hidden collections.
//!
//! The synchronizer only relies on point operations that are individually atomic;
//! there is no transaction spanning collections. Readers subscribe to snapshot
//! channels and never block writers.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::StoreResult;
use crate::model::{App, PackageId};

mod memory;
mod persist;

pub use memory::{MemoryInventory, MemorySet};
pub use persist::{load_json, save_json};

/// Immutable view of the inventory handed to readers.
pub type InventorySnapshot = Arc<BTreeMap<PackageId, App>>;
/// Immutable view of a package-id set handed to readers.
pub type SetSnapshot = Arc<BTreeSet<PackageId>>;

/// What: Durable keyed collection of `App` records.
///
/// Details:
/// - At most one entry per package id; `upsert` replaces, never merges.
/// - Every method is individually atomic and durable once it returns `Ok`.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Point lookup.
    async fn get(&self, package_id: &str) -> StoreResult<Option<App>>;
    /// Insert or replace the entry for `app.package_id`.
    async fn upsert(&self, app: App) -> StoreResult<()>;
    /// Delete the entry; `Ok(false)` when it was already absent.
    async fn remove(&self, package_id: &str) -> StoreResult<bool>;
    /// Whether the collection holds no entries.
    async fn is_empty(&self) -> StoreResult<bool>;
    /// All package ids currently stored.
    async fn ids(&self) -> StoreResult<HashSet<PackageId>>;
    /// Whether a population pass has ever written its full enumeration to this store.
    async fn is_populated(&self) -> StoreResult<bool>;
    /// Record that a population pass finished writing. Durable like any other write.
    async fn mark_populated(&self) -> StoreResult<()>;
    /// Subscribe to eventually-consistent snapshots.
    fn subscribe(&self) -> watch::Receiver<InventorySnapshot>;

    /// What: Insert or replace every app in `apps`.
    ///
    /// Output:
    /// - Number of apps written.
    ///
    /// # Errors
    /// - Returns the first `StoreError`; apps before it may already be stored.
    ///
    /// Details:
    /// - The default upserts one by one. Engines that can commit the whole batch in one
    ///   write should override it.
    async fn upsert_batch(&self, apps: Vec<App>) -> StoreResult<usize> {
        let count = apps.len();
        for app in apps {
            self.upsert(app).await?;
        }
        Ok(count)
    }
}

/// What: Durable set of package ids (used for favorites and hidden apps).
///
/// Details:
/// - `insert`/`remove` report whether membership changed, so repeated calls are harmless.
#[async_trait]
pub trait PackageSet: Send + Sync {
    /// Membership test.
    async fn contains(&self, package_id: &str) -> StoreResult<bool>;
    /// Add `package_id`; `Ok(false)` when it was already present.
    async fn insert(&self, package_id: &str) -> StoreResult<bool>;
    /// Remove `package_id`; `Ok(false)` when it was already absent.
    async fn remove(&self, package_id: &str) -> StoreResult<bool>;
    /// All members.
    async fn members(&self) -> StoreResult<BTreeSet<PackageId>>;
    /// Subscribe to eventually-consistent snapshots.
    fn subscribe(&self) -> watch::Receiver<SetSnapshot>;
}
