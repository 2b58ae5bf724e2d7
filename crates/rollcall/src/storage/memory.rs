//! In-memory storage engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::ScanStore;
use crate::error::{Error, Result};
use crate::scan::OfflineScan;

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    scans: BTreeMap<i64, OfflineScan>,
}

/// A [`ScanStore`] kept in process memory.
///
/// Nothing survives a restart. Writes and removals can be made to fail on
/// demand to exercise the storage-failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `put` calls fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `remove` and `clear` calls fail.
    pub fn set_fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::storage("memory store lock poisoned"))
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn put(&self, vtoken: &str, scan_input: &str, timestamp: i64) -> Result<OfflineScan> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage("write rejected"));
        }
        let mut inner = self.lock()?;
        inner.last_id += 1;
        let scan = OfflineScan {
            id: inner.last_id,
            vtoken: vtoken.to_string(),
            scan_input: scan_input.to_string(),
            timestamp,
        };
        inner.scans.insert(scan.id, scan.clone());
        Ok(scan)
    }

    async fn list(&self) -> Result<Vec<OfflineScan>> {
        Ok(self.lock()?.scans.values().cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.scans.len())
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(Error::storage("remove rejected"));
        }
        Ok(self.lock()?.scans.remove(&id).is_some())
    }

    async fn clear(&self) -> Result<usize> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(Error::storage("clear rejected"));
        }
        let mut inner = self.lock()?;
        let removed = inner.scans.len();
        inner.scans.clear();
        Ok(removed)
    }
}
