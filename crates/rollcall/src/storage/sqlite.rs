//! `SQLite` storage engine for the offline queue.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::{migrations, ScanStore};
use crate::error::{Error, Result};
use crate::scan::OfflineScan;

/// Offline queue persisted in a `SQLite` database file.
///
/// The connection sits behind a mutex and is only touched from the
/// blocking pool, one short statement per operation.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the queue database at the given path.
    ///
    /// Creates parent directories as needed and migrates the schema. This
    /// does blocking I/O; call it before the store is shared.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening queue database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // FULL so an acknowledged enqueue survives power loss
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Queue database opened at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` against the connection on the blocking pool.
    ///
    /// Statements may fsync, so they never run on an async worker.
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::storage("queue database lock poisoned"))?;
            op(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("queue database task failed: {e}")))?
    }

    fn row_to_scan(row: &rusqlite::Row) -> rusqlite::Result<OfflineScan> {
        Ok(OfflineScan {
            id: row.get(0)?,
            vtoken: row.get(1)?,
            scan_input: row.get(2)?,
            timestamp: row.get(3)?,
        })
    }
}

#[async_trait]
impl ScanStore for SqliteStore {
    async fn put(&self, vtoken: &str, scan_input: &str, timestamp: i64) -> Result<OfflineScan> {
        let vtoken = vtoken.to_string();
        let scan_input = scan_input.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO offline_scans (vtoken, scan_input, timestamp) VALUES (?1, ?2, ?3)",
                params![vtoken, scan_input, timestamp],
            )?;
            let id = conn.last_insert_rowid();
            debug!(id, "Inserted offline scan");

            Ok(OfflineScan {
                id,
                vtoken,
                scan_input,
                timestamp,
            })
        })
        .await
    }

    async fn list(&self) -> Result<Vec<OfflineScan>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, vtoken, scan_input, timestamp FROM offline_scans ORDER BY id ASC",
            )?;
            let scans = stmt
                .query_map([], Self::row_to_scan)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(scans)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM offline_scans", [], |row| row.get(0))?;
            usize::try_from(count)
                .map_err(|_| Error::internal(format!("negative row count {count}")))
        })
        .await
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        self.with_conn(move |conn| {
            let affected = conn.execute("DELETE FROM offline_scans WHERE id = ?1", [id])?;
            Ok(affected > 0)
        })
        .await
    }

    async fn clear(&self) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM offline_scans", [])?))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test storage")
    }

    #[tokio::test]
    async fn test_put_and_list() {
        let store = create_test_storage();
        let scan = store.put("tok", "https://host/exec?id=1", 1_000).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![scan]);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let store = create_test_storage();
        // Timestamps deliberately out of order; ids decide.
        store.put("tok", "a", 3_000).await.unwrap();
        store.put("tok", "b", 1_000).await.unwrap();
        store.put("tok", "c", 2_000).await.unwrap();

        let inputs: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.scan_input)
            .collect();
        assert_eq!(inputs, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_count() {
        let store = create_test_storage();
        assert_eq!(store.count().await.unwrap(), 0);

        store.put("tok", "a", 1).await.unwrap();
        store.put("tok", "b", 2).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = create_test_storage();
        let scan = store.put("tok", "a", 1).await.unwrap();

        assert!(store.remove(scan.id).await.unwrap());
        assert!(!store.remove(scan.id).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_never_reused() {
        let store = create_test_storage();
        let first = store.put("tok", "a", 1).await.unwrap();
        store.remove(first.id).await.unwrap();
        let second = store.put("tok", "b", 2).await.unwrap();
        assert!(second.id > first.id);

        store.clear().await.unwrap();
        let third = store.put("tok", "c", 3).await.unwrap();
        assert!(third.id > second.id);
    }

    #[tokio::test]
    async fn test_clear_reports_removed() {
        let store = create_test_storage();
        store.put("tok", "a", 1).await.unwrap();
        store.put("tok", "b", 2).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.db");

        let saved = {
            let store = SqliteStore::open(&path).unwrap();
            store.put("tok", "persisted", 42).await.unwrap()
        };

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.path(), path.as_path());
        assert_eq!(reopened.list().await.unwrap(), vec![saved.clone()]);

        let next = reopened.put("tok", "after", 43).await.unwrap();
        assert!(next.id > saved.id);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_statements_run_off_the_async_thread() {
        let store = create_test_storage();
        let worker = std::thread::current().id();

        let statement_thread = store
            .with_conn(|_| Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(statement_thread, worker);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_puts_get_distinct_ids() {
        let store = Arc::new(create_test_storage());

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.put("tok", &format!("scan-{i}"), i).await })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap().id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16);
        assert_eq!(store.count().await.unwrap(), 16);
    }

    #[test]
    fn test_in_memory_path() {
        let store = create_test_storage();
        assert_eq!(store.path().to_string_lossy(), ":memory:");
    }
}
