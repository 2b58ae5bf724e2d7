//! Durable offline queue for scans awaiting remote confirmation.
//!
//! The queue logic talks to a [`ScanStore`], a small capability trait with a
//! `SQLite` engine for real use and an in-memory engine for tests. Callers use
//! [`OfflineStore`], which stamps new records and exposes the queue
//! operations by name.

mod memory;
pub mod migrations;
pub mod schema;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::error::Result;
use crate::scan::{redact_token, OfflineScan};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage engine behind the offline queue.
///
/// Implementations must hand out strictly increasing ids that are never
/// reused, list in ascending id order, and treat removal of an unknown id as
/// a no-op.
#[async_trait]
pub trait ScanStore: Send + Sync + std::fmt::Debug {
    /// Persist a new record and return it with its assigned id.
    async fn put(&self, vtoken: &str, scan_input: &str, timestamp: i64) -> Result<OfflineScan>;

    /// All stored records, oldest id first.
    async fn list(&self) -> Result<Vec<OfflineScan>>;

    /// Number of stored records, without loading their payloads.
    async fn count(&self) -> Result<usize>;

    /// Delete a record. Returns `false` if it was not present.
    async fn remove(&self, id: i64) -> Result<bool>;

    /// Delete every record. Returns how many were removed.
    async fn clear(&self) -> Result<usize>;
}

/// The offline queue shared by the orchestrator, the scheduler and the
/// queue viewer.
#[derive(Debug, Clone)]
pub struct OfflineStore {
    engine: Arc<dyn ScanStore>,
}

impl OfflineStore {
    /// Wrap a storage engine.
    #[must_use]
    pub fn new(engine: Arc<dyn ScanStore>) -> Self {
        Self { engine }
    }

    /// Open the `SQLite`-backed queue at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(SqliteStore::open(path)?)))
    }

    /// An in-memory queue that lives as long as this value.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Queue a scan, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record could not be persisted. The
    /// scan is not queued in that case.
    pub async fn save_scan_offline(&self, vtoken: &str, scan_input: &str) -> Result<OfflineScan> {
        let timestamp = Utc::now().timestamp_millis();
        let scan = self.engine.put(vtoken, scan_input, timestamp).await?;
        info!(
            id = scan.id,
            vtoken = %redact_token(vtoken),
            "Scan saved to offline queue"
        );
        Ok(scan)
    }

    /// All queued scans in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage engine cannot be read.
    pub async fn get_pending_scans(&self) -> Result<Vec<OfflineScan>> {
        self.engine.list().await
    }

    /// Number of queued scans.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage engine cannot be read.
    pub async fn get_pending_count(&self) -> Result<usize> {
        self.engine.count().await
    }

    /// Remove a scan from the queue. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage engine fails the delete.
    pub async fn remove_scan_offline(&self, id: i64) -> Result<()> {
        if self.engine.remove(id).await? {
            debug!(id, "Removed scan from offline queue");
        } else {
            debug!(id, "Scan already absent from offline queue");
        }
        Ok(())
    }

    /// Empty the queue. Only for explicit user action.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage engine fails the delete.
    pub async fn clear_all_offline_scans(&self) -> Result<usize> {
        let removed = self.engine.clear().await?;
        info!(removed, "Cleared offline queue");
        Ok(removed)
    }
}
