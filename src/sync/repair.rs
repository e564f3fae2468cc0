use std::sync::Arc;

use super::{Completion, InventorySynchronizer, Inner, interrupted, settle};
use crate::error::SyncResult;
use crate::serializer::SerialKey;

/// What: Counts of dangling references removed by [`InventorySynchronizer::repair`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Favorites removed because their package is not in the inventory.
    pub favorites_removed: usize,
    /// Hidden entries removed because their package is not in the inventory.
    pub hidden_removed: usize,
}

impl RepairReport {
    /// Whether nothing needed repairing.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.favorites_removed == 0 && self.hidden_removed == 0
    }
}

impl InventorySynchronizer {
    /// What: Remove favorites and hidden entries whose package is missing from the inventory.
    ///
    /// Output:
    /// - [`RepairReport`] with the number of removed references.
    ///
    /// Details:
    /// - Restores the reference invariant after an interrupted process; a no-op on
    ///   consistent state.
    /// - Candidates are computed once, then each is re-checked and cleaned on its own
    ///   package lane, so a concurrent reinstall keeps its references.
    pub fn repair(&self) -> Completion<RepairReport> {
        let inner = Arc::clone(&self.inner);
        settle(
            self.inner
                .serializer
                .submit(SerialKey::Repair, async move { inner.repair().await }),
        )
    }
}

impl Inner {
    async fn repair(self: &Arc<Self>) -> SyncResult<RepairReport> {
        let candidates = self.dangling_references().await?;
        let mut report = RepairReport::default();
        for package_id in candidates {
            let inner = Arc::clone(self);
            let key = SerialKey::package(package_id.clone());
            let (fav, hid) = self
                .serializer
                .run(key, async move { inner.drop_dangling(&package_id).await })
                .await
                .map_err(interrupted)??;
            report.favorites_removed += usize::from(fav);
            report.hidden_removed += usize::from(hid);
        }
        if report.is_clean() {
            tracing::debug!("repair: no dangling references");
        } else {
            tracing::info!(
                favorites_removed = report.favorites_removed,
                hidden_removed = report.hidden_removed,
                "repair: dangling references removed"
            );
        }
        Ok(report)
    }

    /// Remove `package_id` from both sets if it is still missing from the inventory.
    async fn drop_dangling(&self, package_id: &str) -> SyncResult<(bool, bool)> {
        if self.repos.inventory.get(package_id).await?.is_some() {
            return Ok((false, false));
        }
        let fav = self.repos.favorites.remove(package_id).await?;
        let hid = self.repos.hidden.remove(package_id).await?;
        tracing::debug!(package = %package_id, favorites = fav, hidden = hid, "repair: reference dropped");
        Ok((fav, hid))
    }
}
