use std::collections::HashSet;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use super::{InventorySynchronizer, Inner, interrupted};
use crate::error::{EnumerationError, SyncResult};
use crate::model::{App, PackageId};
use crate::serializer::SerialKey;

/// What: Result of a population pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopulateOutcome {
    /// The inventory already had entries and no refresh was requested.
    Skipped,
    /// Enumeration ran and its apps were written.
    Populated {
        /// Apps upserted into the inventory.
        written: usize,
        /// Apps left alone because a newer install/uninstall for them arrived mid-pass.
        skipped_stale: usize,
    },
}

/// Completion shared by every caller coalesced onto one population pass.
pub type PopulateCompletion = Shared<BoxFuture<'static, SyncResult<PopulateOutcome>>>;

/// Pass that new callers may join.
struct InFlight {
    /// Identifies the pass so a finished pass never clears its successor.
    generation: u64,
    /// Whether the pass enumerates unconditionally.
    forced: bool,
    /// Shared completion handed to joiners.
    completion: PopulateCompletion,
}

/// What: Bookkeeping for population passes.
///
/// Details:
/// - `touched` is `Some` only while a pass runs on the bulk lane; per-package operations
///   add their id so the pass knows its enumeration snapshot is stale for that id.
#[derive(Default)]
pub(super) struct PopulationState {
    /// Most recent pass not yet finished.
    in_flight: Option<InFlight>,
    /// Monotonic pass counter.
    generation: u64,
    /// Package ids that received an event since the running pass started.
    touched: Option<HashSet<PackageId>>,
}

impl InventorySynchronizer {
    /// What: Make sure the inventory is populated from the package source.
    ///
    /// Inputs:
    /// - `force_refresh`: Enumerate even when the inventory already has entries.
    ///
    /// Output:
    /// - Shared completion yielding the pass outcome.
    ///
    /// Details:
    /// - A call made while a pass is in flight joins it instead of enumerating again,
    ///   except that a forced call never joins a non-forced pass (that pass may skip); it
    ///   is queued behind it on the bulk lane instead.
    /// - A non-forced call enumerates when the inventory is empty or no earlier pass has
    ///   finished writing (a failed or interrupted pass is retried in full).
    /// - Enumerated apps are written as one batch, then the store is marked populated;
    ///   entries absent from the enumeration are kept, since only uninstall notifications
    ///   remove packages.
    /// - A failed enumeration leaves the inventory untouched.
    pub fn ensure_populated(&self, force_refresh: bool) -> PopulateCompletion {
        let mut state = self.inner.population();
        if let Some(flight) = &state.in_flight
            && (flight.forced || !force_refresh)
        {
            tracing::debug!(
                generation = flight.generation,
                force_refresh,
                "joining in-flight population pass"
            );
            return flight.completion.clone();
        }
        state.generation += 1;
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        let ticket = self.inner.serializer.submit(SerialKey::Bulk, async move {
            let _finish = FinishFlight {
                inner: Arc::clone(&inner),
                generation,
            };
            inner.populate(force_refresh).await
        });
        let completion = async move {
            match ticket.await {
                Ok(result) => result,
                Err(e) => Err(interrupted(e)),
            }
        }
        .boxed()
        .shared();
        state.in_flight = Some(InFlight {
            generation,
            forced: force_refresh,
            completion: completion.clone(),
        });
        tracing::debug!(generation, force_refresh, "population pass submitted");
        completion
    }
}

/// Clears the in-flight slot when its pass ends, including on panic.
struct FinishFlight {
    /// Shared state.
    inner: Arc<Inner>,
    /// Pass that owns the slot.
    generation: u64,
}

impl Drop for FinishFlight {
    fn drop(&mut self) {
        let mut state = self.inner.population();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == self.generation)
        {
            state.in_flight = None;
        }
        state.touched = None;
    }
}

impl Inner {
    /// Remember that `package_id` received an event while a pass may be running.
    pub(super) fn note_package_event(&self, package_id: &str) {
        if let Some(touched) = self.population().touched.as_mut() {
            touched.insert(package_id.to_string());
        }
    }

    /// Body of a pass; runs on the bulk lane.
    async fn populate(&self, force_refresh: bool) -> SyncResult<PopulateOutcome> {
        if !force_refresh
            && !self.repos.inventory.is_empty().await?
            && self.repos.inventory.is_populated().await?
        {
            tracing::debug!("inventory already populated; skipping enumeration");
            return Ok(PopulateOutcome::Skipped);
        }
        self.population().touched = Some(HashSet::new());

        let timeout = self.options.enumeration_timeout;
        let started = std::time::Instant::now();
        let apps = match tokio::time::timeout(timeout, self.source.list_installed_apps()).await {
            Ok(Ok(apps)) => apps,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "package enumeration failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(timeout = ?timeout, "package enumeration timed out");
                return Err(EnumerationError::TimedOut(timeout).into());
            }
        };
        tracing::debug!(
            count = apps.len(),
            elapsed = ?started.elapsed(),
            "package enumeration finished"
        );

        // Exclusive: running events have finished and recorded their ids; later ones wait
        // for the batch.
        let _gate = self.write_gate.write().await;
        let (fresh, stale): (Vec<App>, Vec<App>) = {
            let state = self.population();
            apps.into_iter().partition(|app| {
                !state
                    .touched
                    .as_ref()
                    .is_some_and(|t| t.contains(&app.package_id))
            })
        };
        for app in &stale {
            tracing::debug!(package = %app.package_id, "population: newer event seen; keeping stored state");
        }
        let written = self.repos.inventory.upsert_batch(fresh).await.map_err(|e| {
            tracing::warn!(error = %e, "population: inventory write failed; pass left incomplete");
            e
        })?;
        self.repos.inventory.mark_populated().await?;
        let skipped_stale = stale.len();
        tracing::info!(written, skipped_stale, force_refresh, "inventory populated");
        Ok(PopulateOutcome::Populated {
            written,
            skipped_stale,
        })
    }
}
