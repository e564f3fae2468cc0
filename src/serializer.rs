//! Per-key FIFO execution of background operations.
//!
//! Each key owns a lane. An operation submitted to an idle lane starts right away; a later
//! submission for the same key is chained behind the previous one and starts only after it
//! finished, whether it returned, failed, or panicked. Lanes with no pending work are
//! dropped from the map. Distinct keys run concurrently with no relative ordering.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};

use crate::model::PackageId;

/// What: Serialization key used by the synchronizer.
///
/// Details:
/// - `Bulk` and `Repair` are reserved lanes for whole-collection passes; being enum variants
///   they can never collide with a package identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SerialKey {
    /// Work on a single package.
    Package(PackageId),
    /// Cold-start / forced population.
    Bulk,
    /// Dangling-reference repair.
    Repair,
}

impl SerialKey {
    /// Key for `package_id`.
    pub fn package(package_id: impl Into<PackageId>) -> Self {
        Self::Package(package_id.into())
    }
}

impl fmt::Display for SerialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package(id) => write!(f, "package:{id}"),
            Self::Bulk => f.write_str("bulk"),
            Self::Repair => f.write_str("repair"),
        }
    }
}

/// Bookkeeping for one key.
#[derive(Default)]
struct Lane {
    /// Completion signal of the most recently submitted operation.
    tail: Option<oneshot::Receiver<()>>,
    /// Submitted operations that have not finished yet.
    pending: usize,
}

/// Shared lane table.
type Lanes<K> = Arc<Mutex<HashMap<K, Lane>>>;

/// Lock the lane table, recovering from poisoning (the table stays consistent across panics).
fn lock<K>(lanes: &Mutex<HashMap<K, Lane>>) -> MutexGuard<'_, HashMap<K, Lane>> {
    lanes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What: Runs futures so that those sharing a key never overlap and finish in submission order.
///
/// Inputs:
/// - Generic over the key type; the synchronizer uses [`SerialKey`].
///
/// Output:
/// - [`Ticket`]s resolving to each operation's output.
///
/// Details:
/// - Must be used from within a tokio runtime; operations are spawned onto it.
/// - Queueing happens synchronously inside [`KeyedSerializer::submit`], so the order of
///   `submit` calls is the execution order, independent of how tasks get scheduled.
pub struct KeyedSerializer<K> {
    /// Lanes with outstanding work.
    lanes: Lanes<K>,
}

impl<K> KeyedSerializer<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
{
    /// Create a serializer with no lanes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lanes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// What: Queue `op` on `key`'s lane and spawn it.
    ///
    /// Inputs:
    /// - `key`: Lane to join.
    /// - `op`: Operation to run once every earlier submission for `key` has finished.
    ///
    /// Output:
    /// - [`Ticket`] for the operation's output. Dropping it does not cancel the operation.
    pub fn submit<F, T>(&self, key: K, op: F) -> Ticket<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let prev = {
            let mut lanes = lock(&self.lanes);
            let lane = lanes.entry(key.clone()).or_default();
            lane.pending += 1;
            lane.tail.replace(done_rx)
        };
        if prev.is_some() {
            tracing::trace!(key = %key, "queued behind in-flight operation");
        }
        let release = Release {
            lanes: Arc::clone(&self.lanes),
            key,
            done: Some(done_tx),
        };
        Ticket(tokio::spawn(async move {
            let _release = release;
            if let Some(prev) = prev {
                // A closed channel means the predecessor is gone as well.
                let _ = prev.await;
            }
            op.await
        }))
    }

    /// What: Submit `op` on `key` and wait for it.
    ///
    /// # Errors
    /// - Returns the `JoinError` when the operation panicked or the runtime shut down.
    pub async fn run<F, T>(&self, key: K, op: F) -> Result<T, JoinError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(key, op).await
    }

    /// Number of keys with pending work.
    #[must_use]
    pub fn active_lanes(&self) -> usize {
        lock(&self.lanes).len()
    }
}

impl<K> Default for KeyedSerializer<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the lane slot when an operation's task finishes or is dropped.
struct Release<K: Eq + Hash> {
    /// Lane table.
    lanes: Lanes<K>,
    /// Lane owned by the operation.
    key: K,
    /// Signal for the next operation in the lane.
    done: Option<oneshot::Sender<()>>,
}

impl<K: Eq + Hash> Drop for Release<K> {
    fn drop(&mut self) {
        {
            let mut lanes = lock(&self.lanes);
            if let Some(lane) = lanes.get_mut(&self.key) {
                lane.pending = lane.pending.saturating_sub(1);
                if lane.pending == 0 {
                    lanes.remove(&self.key);
                }
            }
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// What: Handle to a submitted operation.
///
/// Details:
/// - Resolves to `Err(JoinError)` if the operation panicked.
/// - Deliberately exposes no abort: operations always run to completion once submitted.
pub struct Ticket<T>(JoinHandle<T>);

impl<T> Future for Ticket<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}
