//! Test doubles and harness for synchronizer integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use app_inventory as crate_root;
use async_trait::async_trait;
use crate_root::error::StoreResult;
use crate_root::source::PackageSource;
use crate_root::store::{
    InventorySnapshot, InventoryStore, MemoryInventory, MemorySet, PackageSet, SetSnapshot,
};
use crate_root::{App, EnumerationError, InventorySynchronizer, Repositories, StoreError, SyncOptions};
use tokio::sync::{Notify, Semaphore, watch};

/// What an enumeration call does once its gate opens.
#[derive(Clone, Debug)]
pub enum Behaviour {
    /// Return these apps.
    Apps(Vec<App>),
    /// Fail with this message.
    Fail(String),
    /// Panic inside the enumeration.
    Panic,
}

/// What: Package source whose calls block until released, counting each call.
///
/// Details:
/// - `entered` is notified as soon as a call starts, before it waits on the gate.
pub struct GatedSource {
    behaviour: Mutex<Behaviour>,
    gate: Semaphore,
    pub entered: Notify,
    calls: AtomicUsize,
}

impl GatedSource {
    /// Source that answers immediately.
    pub fn open(apps: Vec<App>) -> Arc<Self> {
        let source = Self::closed(apps);
        source.release();
        source
    }

    /// Source that blocks until [`GatedSource::release`] is called.
    pub fn closed(apps: Vec<App>) -> Arc<Self> {
        Arc::new(Self {
            behaviour: Mutex::new(Behaviour::Apps(apps)),
            gate: Semaphore::new(0),
            entered: Notify::new(),
            calls: AtomicUsize::new(0),
        })
    }

    /// Let every current and future call proceed.
    pub fn release(&self) {
        self.gate.close();
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().expect("behaviour lock") = behaviour;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wait until a call has entered the source.
    pub async fn wait_entered(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.entered.notified())
            .await
            .expect("enumeration never started");
    }
}

#[async_trait]
impl PackageSource for GatedSource {
    async fn list_installed_apps(&self) -> Result<Vec<App>, EnumerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        // A closed semaphore is the "released" state.
        let _ = self.gate.acquire().await;
        let behaviour = self.behaviour.lock().expect("behaviour lock").clone();
        match behaviour {
            Behaviour::Apps(apps) => Ok(apps),
            Behaviour::Fail(msg) => Err(EnumerationError::Failed(msg)),
            Behaviour::Panic => panic!("enumeration exploded"),
        }
    }
}

/// What: Inventory that records committed writes and delays "slow" apps.
///
/// Details:
/// - An app whose label contains `slow` takes 50ms to upsert.
/// - `fail_upserts` makes every upsert fail with an injected storage error;
///   [`RecordingInventory::fail_nth_upsert`] fails a single one.
/// - Batches use the trait's one-by-one default, so a batch can fail partway.
pub struct RecordingInventory {
    inner: MemoryInventory,
    log: Mutex<Vec<String>>,
    pub fail_upserts: AtomicBool,
    upserts: AtomicUsize,
    fail_at: AtomicUsize,
}

impl RecordingInventory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryInventory::new(),
            log: Mutex::new(Vec::new()),
            fail_upserts: AtomicBool::new(false),
            upserts: AtomicUsize::new(0),
            fail_at: AtomicUsize::new(0),
        })
    }

    /// Fail only the `n`-th upsert attempt from now on (1-based).
    pub fn fail_nth_upsert(&self, n: usize) {
        let seen = self.upserts.load(Ordering::SeqCst);
        self.fail_at.store(seen + n, Ordering::SeqCst);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().expect("log lock").clone()
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        self.inner.snapshot()
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn label(&self, package_id: &str) -> Option<String> {
        self.snapshot().get(package_id).map(|a| a.label.clone())
    }
}

#[async_trait]
impl InventoryStore for RecordingInventory {
    async fn get(&self, package_id: &str) -> StoreResult<Option<App>> {
        self.inner.get(package_id).await
    }

    async fn upsert(&self, app: App) -> StoreResult<()> {
        let attempt = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_upserts.load(Ordering::SeqCst)
            || attempt == self.fail_at.load(Ordering::SeqCst)
        {
            return Err(StoreError::unavailable("injected upsert failure"));
        }
        if app.label.contains("slow") {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let entry = format!("upsert {} {}", app.package_id, app.label);
        self.inner.upsert(app).await?;
        self.log.lock().expect("log lock").push(entry);
        Ok(())
    }

    async fn remove(&self, package_id: &str) -> StoreResult<bool> {
        let removed = self.inner.remove(package_id).await?;
        if removed {
            self.log
                .lock()
                .expect("log lock")
                .push(format!("remove {package_id}"));
        }
        Ok(removed)
    }

    async fn is_empty(&self) -> StoreResult<bool> {
        self.inner.is_empty().await
    }

    async fn ids(&self) -> StoreResult<HashSet<String>> {
        self.inner.ids().await
    }

    async fn is_populated(&self) -> StoreResult<bool> {
        self.inner.is_populated().await
    }

    async fn mark_populated(&self) -> StoreResult<()> {
        self.inner.mark_populated().await
    }

    fn subscribe(&self) -> watch::Receiver<InventorySnapshot> {
        self.inner.subscribe()
    }
}

/// Package set whose removals can be made to fail.
pub struct FlakySet {
    inner: MemorySet,
    pub fail_removes: AtomicBool,
}

impl FlakySet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemorySet::new(),
            fail_removes: AtomicBool::new(false),
        })
    }

    pub fn snapshot(&self) -> SetSnapshot {
        self.inner.snapshot()
    }

    /// Insert directly, bypassing the synchronizer (simulates state left by a crash).
    pub async fn seed(&self, package_id: &str) {
        self.inner.insert(package_id).await.expect("seed set");
    }
}

#[async_trait]
impl PackageSet for FlakySet {
    async fn contains(&self, package_id: &str) -> StoreResult<bool> {
        self.inner.contains(package_id).await
    }

    async fn insert(&self, package_id: &str) -> StoreResult<bool> {
        self.inner.insert(package_id).await
    }

    async fn remove(&self, package_id: &str) -> StoreResult<bool> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("injected remove failure"));
        }
        self.inner.remove(package_id).await
    }

    async fn members(&self) -> StoreResult<BTreeSet<String>> {
        self.inner.members().await
    }

    fn subscribe(&self) -> watch::Receiver<SetSnapshot> {
        self.inner.subscribe()
    }
}

/// Synchronizer wired to test doubles, with handles kept for assertions.
pub struct Harness {
    pub sync: InventorySynchronizer,
    pub inventory: Arc<RecordingInventory>,
    pub favorites: Arc<FlakySet>,
    pub hidden: Arc<FlakySet>,
    pub source: Arc<GatedSource>,
}

pub fn harness(source: Arc<GatedSource>) -> Harness {
    harness_with(source, SyncOptions::default())
}

pub fn harness_with(source: Arc<GatedSource>, options: SyncOptions) -> Harness {
    let inventory = RecordingInventory::new();
    let favorites = FlakySet::new();
    let hidden = FlakySet::new();
    let sync = InventorySynchronizer::new(
        Repositories {
            inventory: inventory.clone(),
            favorites: favorites.clone(),
            hidden: hidden.clone(),
        },
        source.clone(),
        options,
    );
    Harness {
        sync,
        inventory,
        favorites,
        hidden,
        source,
    }
}

impl Harness {
    /// Install `ids` through the synchronizer, labelling each with its id.
    pub async fn install_all(&self, ids: &[&str]) {
        for id in ids {
            self.sync
                .on_installed(App::new(*id, *id))
                .await
                .expect("install");
        }
    }

    /// Assert the reference invariant at quiescence.
    pub async fn assert_no_dangling(&self) {
        let dangling = self.sync.dangling_references().await.expect("read collections");
        assert!(dangling.is_empty(), "dangling references: {dangling:?}");
    }
}

/// Shorthand for a two-app enumeration result.
pub fn two_apps() -> Vec<App> {
    vec![App::new("com.a", "A"), App::new("com.b", "B")]
}
