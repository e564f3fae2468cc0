//! Reference invariant under a burst of interleaved intents.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};

use app_inventory::{App, SyncResult};

use super::helpers::{GatedSource, Harness, harness};

const PACKAGES: usize = 5;

/// Submit a deterministic mix of every intent kind without awaiting any of them.
fn submit_burst(h: &Harness, rounds: usize) -> Vec<BoxFuture<'static, SyncResult<()>>> {
    let mut ops: Vec<BoxFuture<'static, SyncResult<()>>> = Vec::with_capacity(rounds);
    for i in 0..rounds {
        let id = format!("pkg.{}", (i * 7) % PACKAGES);
        let op = match i % 6 {
            0 => {
                let label = if i % 4 == 0 { "slow" } else { "fast" };
                h.sync.on_installed(App::new(id, label))
            }
            1 => h.sync.add_favorite(id).map(|r| r.map(|_| ())).boxed(),
            2 => h.sync.hide(id).map(|r| r.map(|_| ())).boxed(),
            3 => h.sync.on_uninstalled(id).map(|r| r.map(|_| ())).boxed(),
            4 => h.sync.remove_favorite(id).map(|r| r.map(|_| ())).boxed(),
            _ => h
                .sync
                .ensure_populated(i % 12 == 5)
                .map(|r| r.map(|_| ()))
                .boxed(),
        };
        ops.push(op);
    }
    ops
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
/// What: No favorite or hidden entry dangles once a burst of intents has settled.
///
/// Inputs:
/// - 240 interleaved installs, uninstalls, membership changes and population passes over
///   five packages, with an enumeration that lists some of them.
///
/// Output:
/// - Every operation succeeds; no dangling references; every member is installed.
async fn burst_leaves_no_dangling_references() {
    let source = GatedSource::open(vec![App::new("pkg.0", "zero"), App::new("pkg.3", "three")]);
    let h = harness(source);

    let results = join_all(submit_burst(&h, 240)).await;
    for (i, result) in results.into_iter().enumerate() {
        result.unwrap_or_else(|e| panic!("operation {i} failed: {e}"));
    }

    h.assert_no_dangling().await;
    let installed = h.inventory.ids();
    for id in h.favorites.snapshot().iter().chain(h.hidden.snapshot().iter()) {
        assert!(installed.contains(id), "{id} referenced but not installed");
    }
}

#[tokio::test]
/// What: Repeating the burst after a repair still keeps the invariant.
///
/// Inputs:
/// - Two bursts separated by a repair on a single-threaded runtime.
///
/// Output:
/// - Repair finds nothing to fix; state stays consistent.
async fn repair_after_burst_is_clean() {
    let h = harness(GatedSource::open(Vec::new()));
    for result in join_all(submit_burst(&h, 60)).await {
        result.expect("first burst");
    }
    assert!(h.sync.repair().await.expect("repair").is_clean());

    for result in join_all(submit_burst(&h, 60)).await {
        result.expect("second burst");
    }
    h.assert_no_dangling().await;
}
