//! Failure handling: enumeration errors, timeouts, storage faults and panics.

use std::sync::atomic::Ordering;
use std::time::Duration;

use app_inventory::{
    App, EnumerationError, PopulateOutcome, StoreErrorKind, SyncError, SyncOptions,
};

use super::helpers::{Behaviour, GatedSource, harness, harness_with, two_apps};

#[tokio::test]
/// What: A failed enumeration leaves the inventory untouched and can be retried.
///
/// Inputs:
/// - Source failing with `disk gone`, then succeeding.
///
/// Output:
/// - First call reports the enumeration error; the retry populates.
async fn enumeration_failure_is_reported_and_retryable() {
    let h = harness(GatedSource::open(two_apps()));
    h.source.set_behaviour(Behaviour::Fail("disk gone".into()));

    let err = h.sync.ensure_populated(false).await.expect_err("enumeration fails");
    assert!(
        matches!(&err, SyncError::Enumeration(EnumerationError::Failed(m)) if m == "disk gone"),
        "unexpected error: {err:?}"
    );
    assert!(h.inventory.ids().is_empty());

    h.source.set_behaviour(Behaviour::Apps(two_apps()));
    assert_eq!(
        h.sync.ensure_populated(false).await.expect("retry"),
        PopulateOutcome::Populated {
            written: 2,
            skipped_stale: 0
        }
    );
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test]
/// What: An enumeration that exceeds the timeout fails with `TimedOut`.
///
/// Inputs:
/// - Source that never answers until released; 50ms timeout.
///
/// Output:
/// - `TimedOut(50ms)`; inventory empty; a later call enumerates again.
async fn slow_enumeration_times_out() {
    let timeout = Duration::from_millis(50);
    let h = harness_with(
        GatedSource::closed(two_apps()),
        SyncOptions {
            enumeration_timeout: timeout,
        },
    );

    let err = h.sync.ensure_populated(false).await.expect_err("times out");
    assert!(
        matches!(err, SyncError::Enumeration(EnumerationError::TimedOut(d)) if d == timeout),
        "unexpected error: {err:?}"
    );
    assert!(h.inventory.ids().is_empty());

    h.source.release();
    h.sync.ensure_populated(false).await.expect("second pass");
    assert_eq!(h.source.calls(), 2);
    assert_eq!(h.inventory.ids().len(), 2);
}

#[tokio::test]
/// What: An uninstall interrupted after removing the favorite is completed by re-delivery.
///
/// Inputs:
/// - `com.a` installed, favorited and hidden; hidden removals fail once.
///
/// Output:
/// - First delivery reports a storage error with no dangling reference left behind;
///   the second removes everything.
async fn interrupted_uninstall_completes_on_redelivery() {
    let h = harness(GatedSource::open(Vec::new()));
    h.install_all(&["com.a"]).await;
    assert!(h.sync.add_favorite("com.a").await.expect("favorite"));
    assert!(h.sync.hide("com.a").await.expect("hide"));

    h.hidden.fail_removes.store(true, Ordering::SeqCst);
    let err = h.sync.on_uninstalled("com.a").await.expect_err("hidden removal fails");
    assert!(
        matches!(&err, SyncError::Storage(e) if e.kind == StoreErrorKind::Unavailable),
        "unexpected error: {err:?}"
    );
    assert!(!h.favorites.snapshot().contains("com.a"));
    assert!(h.hidden.snapshot().contains("com.a"));
    assert!(h.inventory.label("com.a").is_some());
    h.assert_no_dangling().await;

    h.hidden.fail_removes.store(false, Ordering::SeqCst);
    assert!(h.sync.on_uninstalled("com.a").await.expect("redelivery"));
    assert!(h.hidden.snapshot().is_empty());
    assert!(h.inventory.ids().is_empty());
}

#[tokio::test]
/// What: A storage failure during install surfaces as `Storage` and leaves the lane usable.
///
/// Inputs:
/// - Inventory rejecting upserts, then accepting them.
///
/// Output:
/// - First install fails; the next one for the same id succeeds.
async fn install_storage_failure_is_reported() {
    let h = harness(GatedSource::open(Vec::new()));
    h.inventory.fail_upserts.store(true, Ordering::SeqCst);
    let err = h
        .sync
        .on_installed(App::new("com.a", "A"))
        .await
        .expect_err("upsert fails");
    assert!(matches!(err, SyncError::Storage(_)), "unexpected error: {err:?}");
    assert!(h.inventory.ids().is_empty());

    h.inventory.fail_upserts.store(false, Ordering::SeqCst);
    h.sync
        .on_installed(App::new("com.a", "A"))
        .await
        .expect("install after recovery");
    assert_eq!(h.inventory.label("com.a").as_deref(), Some("A"));
}

#[tokio::test]
/// What: A panicking source fails the pass without wedging later passes.
///
/// Inputs:
/// - Source that panics, then returns apps.
///
/// Output:
/// - `Interrupted` for the first call; the next call runs a fresh pass.
async fn panicking_source_reports_interrupted() {
    let h = harness(GatedSource::open(two_apps()));
    h.source.set_behaviour(Behaviour::Panic);

    let err = h.sync.ensure_populated(false).await.expect_err("pass panics");
    assert!(matches!(err, SyncError::Interrupted(_)), "unexpected error: {err:?}");

    h.source.set_behaviour(Behaviour::Apps(two_apps()));
    assert_eq!(
        h.sync.ensure_populated(false).await.expect("fresh pass"),
        PopulateOutcome::Populated {
            written: 2,
            skipped_stale: 0
        }
    );
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test]
/// What: A pass whose inventory write fails partway is retried in full by the next plain call.
///
/// Inputs:
/// - Source listing three apps; the second upsert of the batch fails once.
///
/// Output:
/// - First call reports `Storage` with only the first app stored; the next non-forced call
///   enumerates again and stores all three; a third call skips.
async fn partial_population_write_is_retried() {
    let apps = vec![
        App::new("com.a", "A"),
        App::new("com.b", "B"),
        App::new("com.c", "C"),
    ];
    let h = harness(GatedSource::open(apps));
    h.inventory.fail_nth_upsert(2);

    let err = h.sync.ensure_populated(false).await.expect_err("second upsert fails");
    assert!(matches!(err, SyncError::Storage(_)), "unexpected error: {err:?}");
    assert_eq!(h.inventory.ids().into_iter().collect::<Vec<_>>(), vec!["com.a".to_string()]);

    assert_eq!(
        h.sync.ensure_populated(false).await.expect("retry"),
        PopulateOutcome::Populated {
            written: 3,
            skipped_stale: 0
        }
    );
    assert_eq!(h.inventory.ids().len(), 3);
    assert_eq!(h.source.calls(), 2);

    assert_eq!(
        h.sync.ensure_populated(false).await.expect("third call"),
        PopulateOutcome::Skipped
    );
    assert_eq!(h.source.calls(), 2);
}
