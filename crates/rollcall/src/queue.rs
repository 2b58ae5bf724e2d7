//! Read and manage the offline queue from a user-facing surface.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::scan::OfflineScan;
use crate::storage::OfflineStore;
use crate::sync::SyncScheduler;

/// What a queue viewer shows and the actions it offers.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    store: OfflineStore,
    scheduler: Arc<SyncScheduler>,
}

impl OfflineQueue {
    /// Create a viewer over `store`, retrying through `scheduler`.
    #[must_use]
    pub fn new(store: OfflineStore, scheduler: Arc<SyncScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// All pending scans, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub async fn get_pending_scans(&self) -> Result<Vec<OfflineScan>> {
        self.store.get_pending_scans().await
    }

    /// Number of pending scans.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub async fn get_pending_count(&self) -> Result<usize> {
        self.store.get_pending_count().await
    }

    /// Look up one pending scan by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub async fn find(&self, id: i64) -> Result<Option<OfflineScan>> {
        Ok(self
            .store
            .get_pending_scans()
            .await?
            .into_iter()
            .find(|scan| scan.id == id))
    }

    /// Retry one scan now. `true` when it was confirmed and removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the confirmed scan cannot be removed.
    pub async fn sync_item(&self, scan: &OfflineScan) -> Result<bool> {
        self.scheduler.sync_item(scan).await
    }

    /// Discard one scan. Removing an id that is not queued is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub async fn remove_scan_offline(&self, id: i64) -> Result<()> {
        self.store.remove_scan_offline(id).await?;
        self.scheduler.refresh_pending_count().await?;
        Ok(())
    }

    /// Discard every pending scan and return how many there were.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be written.
    pub async fn clear_all_offline_scans(&self) -> Result<usize> {
        let removed = self.store.clear_all_offline_scans().await?;
        self.scheduler.refresh_pending_count().await?;
        info!(removed, "Offline queue cleared");
        Ok(removed)
    }
}
