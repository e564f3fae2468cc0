use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, watch};

use super::persist::{load_json, save_json};
use super::{InventorySnapshot, InventoryStore, PackageSet, SetSnapshot};
use crate::error::StoreResult;
use crate::model::{App, PackageId};

/// What: Snapshot-published collection with optional JSON persistence.
///
/// Details:
/// - The current value lives in a `watch` channel: readers clone an `Arc` and never wait.
/// - Writers serialize on `write`, build the next value, persist it, then publish. A failed
///   persist leaves the published value untouched.
struct Collection<T> {
    /// Published state.
    state: watch::Sender<Arc<T>>,
    /// Backing file, if durable.
    path: Option<PathBuf>,
    /// Writer exclusion.
    write: Mutex<()>,
}

impl<T> Collection<T>
where
    T: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn in_memory() -> Self {
        Self::with_value(T::default(), None)
    }

    async fn open(path: PathBuf) -> StoreResult<Self> {
        let value = load_json::<T>(&path).await?;
        Ok(Self::with_value(value, Some(path)))
    }

    fn with_value(value: T, path: Option<PathBuf>) -> Self {
        let (state, _rx) = watch::channel(Arc::new(value));
        Self {
            state,
            path,
            write: Mutex::new(()),
        }
    }

    fn current(&self) -> Arc<T> {
        Arc::clone(&self.state.borrow())
    }

    /// Apply `f` to a copy of the current value; `f` returns its result and whether it changed anything.
    async fn mutate<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut T) -> (R, bool) + Send,
        R: Send,
    {
        let _guard = self.write.lock().await;
        let mut next = (*self.current()).clone();
        let (out, changed) = f(&mut next);
        if !changed {
            return Ok(out);
        }
        if let Some(path) = &self.path {
            save_json(path, &next).await?;
        }
        self.state.send_replace(Arc::new(next));
        Ok(out)
    }
}

/// What: In-process inventory engine, optionally backed by a JSON file.
///
/// Inputs:
/// - Built with [`MemoryInventory::new`] (volatile) or [`MemoryInventory::open`] (durable).
///
/// Output:
/// - Implements [`InventoryStore`].
///
/// Details:
/// - The population marker lives in a sibling file (`inventory.json` pairs with
///   `inventory.populated.json`), so a process killed mid-population leaves it unset.
pub struct MemoryInventory {
    /// Entries keyed by package id.
    inner: Collection<BTreeMap<PackageId, App>>,
    /// Whether a population pass completed.
    populated: Collection<bool>,
}

/// Marker file paired with an inventory file.
fn marker_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(|| "inventory".to_string(), |s| s.to_string_lossy().into_owned());
    path.with_file_name(format!("{stem}.populated.json"))
}

impl MemoryInventory {
    /// Volatile, empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Collection::in_memory(),
            populated: Collection::in_memory(),
        }
    }

    /// What: Open a durable inventory persisted at `path`.
    ///
    /// Inputs:
    /// - `path`: JSON file; created on first write.
    ///
    /// Output:
    /// - Inventory seeded with the file's entries (empty if absent) and the population
    ///   marker from the sibling `<stem>.populated.json` (unset if absent).
    ///
    /// # Errors
    /// - Returns `StoreError` when an existing file cannot be read or decoded.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let marker = marker_path(&path);
        Ok(Self {
            inner: Collection::open(path).await?,
            populated: Collection::open(marker).await?,
        })
    }

    /// Current snapshot without subscribing.
    #[must_use]
    pub fn snapshot(&self) -> InventorySnapshot {
        self.inner.current()
    }
}

impl Default for MemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryStore for MemoryInventory {
    async fn get(&self, package_id: &str) -> StoreResult<Option<App>> {
        Ok(self.inner.current().get(package_id).cloned())
    }

    async fn upsert(&self, app: App) -> StoreResult<()> {
        self.inner
            .mutate(move |map| {
                let changed = map.get(&app.package_id) != Some(&app);
                if changed {
                    map.insert(app.package_id.clone(), app);
                }
                ((), changed)
            })
            .await
    }

    async fn remove(&self, package_id: &str) -> StoreResult<bool> {
        self.inner
            .mutate(|map| {
                let removed = map.remove(package_id).is_some();
                (removed, removed)
            })
            .await
    }

    async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.inner.current().is_empty())
    }

    async fn ids(&self) -> StoreResult<HashSet<PackageId>> {
        Ok(self.inner.current().keys().cloned().collect())
    }

    async fn is_populated(&self) -> StoreResult<bool> {
        Ok(*self.populated.current())
    }

    async fn mark_populated(&self) -> StoreResult<()> {
        self.populated
            .mutate(|flag| {
                let changed = !*flag;
                *flag = true;
                ((), changed)
            })
            .await
    }

    fn subscribe(&self) -> watch::Receiver<InventorySnapshot> {
        self.inner.state.subscribe()
    }

    /// One persisted write for the whole batch.
    async fn upsert_batch(&self, apps: Vec<App>) -> StoreResult<usize> {
        let count = apps.len();
        self.inner
            .mutate(move |map| {
                let mut changed = false;
                for app in apps {
                    if map.get(&app.package_id) != Some(&app) {
                        map.insert(app.package_id.clone(), app);
                        changed = true;
                    }
                }
                (count, changed)
            })
            .await
    }
}

/// In-process package-id set, optionally backed by a JSON file.
pub struct MemorySet {
    /// Members.
    inner: Collection<BTreeSet<PackageId>>,
}

impl MemorySet {
    /// Volatile, empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Collection::in_memory(),
        }
    }

    /// What: Open a durable set persisted at `path`.
    ///
    /// # Errors
    /// - Returns `StoreError` when an existing file cannot be read or decoded.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        Ok(Self {
            inner: Collection::open(path.into()).await?,
        })
    }

    /// Current snapshot without subscribing.
    #[must_use]
    pub fn snapshot(&self) -> SetSnapshot {
        self.inner.current()
    }
}

impl Default for MemorySet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageSet for MemorySet {
    async fn contains(&self, package_id: &str) -> StoreResult<bool> {
        Ok(self.inner.current().contains(package_id))
    }

    async fn insert(&self, package_id: &str) -> StoreResult<bool> {
        let id = package_id.to_string();
        self.inner
            .mutate(move |set| {
                let added = set.insert(id);
                (added, added)
            })
            .await
    }

    async fn remove(&self, package_id: &str) -> StoreResult<bool> {
        self.inner
            .mutate(|set| {
                let removed = set.remove(package_id);
                (removed, removed)
            })
            .await
    }

    async fn members(&self) -> StoreResult<BTreeSet<PackageId>> {
        Ok((*self.inner.current()).clone())
    }

    fn subscribe(&self) -> watch::Receiver<SetSnapshot> {
        self.inner.state.subscribe()
    }
}
