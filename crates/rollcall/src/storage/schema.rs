//! `SQLite` schema for the offline scan queue.

/// SQL statement to create the offline scan queue.
///
/// `AUTOINCREMENT` keeps ids strictly increasing across deletes, so a removed
/// scan's id is never handed out again.
pub const CREATE_OFFLINE_SCANS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS offline_scans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    vtoken TEXT NOT NULL,
    scan_input TEXT NOT NULL,
    timestamp INTEGER NOT NULL
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_OFFLINE_SCANS_TABLE, CREATE_METADATA_TABLE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_scans_table_columns() {
        assert!(CREATE_OFFLINE_SCANS_TABLE.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(CREATE_OFFLINE_SCANS_TABLE.contains("vtoken TEXT NOT NULL"));
        assert!(CREATE_OFFLINE_SCANS_TABLE.contains("scan_input TEXT NOT NULL"));
        assert!(CREATE_OFFLINE_SCANS_TABLE.contains("timestamp INTEGER NOT NULL"));
    }

    #[test]
    fn test_schema_statements_order() {
        assert_eq!(SCHEMA_STATEMENTS.len(), 2);
        assert!(SCHEMA_STATEMENTS[0].contains("offline_scans"));
        assert!(SCHEMA_STATEMENTS[1].contains("metadata"));
    }
}
