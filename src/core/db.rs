//! Graph database connection and initialization utilities.
//!
//! The database is derived state: the node store can rebuild it at any
//! time, so a schema-version mismatch at open time triggers a full
//! drop-and-recreate instead of an in-place migration.
//!
//! # For AI Agents
//!
//! - **WAL mode enabled**: readers may run while the synchroniser writes
//! - **Foreign keys enforced**: edge endpoints must exist in `nodes`
//! - **One writer**: mutations go through `with_write_lock`; everything
//!   else opens read-only connections
//! - **Safe to delete**: removing the database file loses nothing

use crate::core::error::SpecGraphError;
use crate::core::schemas;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Establish a SQLite connection with SpecGraph's standard configuration.
///
/// Enables:
/// - WAL (Write-Ahead Logging) mode for concurrent readers
/// - Foreign key constraints
/// - 5-second busy timeout for lock contention
pub fn db_connect(db_path: &Path) -> Result<Connection, SpecGraphError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(SpecGraphError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(SpecGraphError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(SpecGraphError::RusqliteError)?;
    Ok(conn)
}

/// Open a read-only connection for query surfaces.
pub fn db_connect_read_only(db_path: &Path) -> Result<Connection, SpecGraphError> {
    if !db_path.exists() {
        return Err(SpecGraphError::NotFound(format!(
            "graph database {} (run `specgraph sync` first)",
            db_path.display()
        )));
    }
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(SpecGraphError::RusqliteError)?;
    Ok(conn)
}

/// Open (creating if needed) the graph database and bring its schema to
/// the current generation. Returns a writable connection.
pub fn initialize_graph_db(db_path: &Path) -> Result<Connection, SpecGraphError> {
    let parent = db_path.parent().ok_or_else(|| {
        SpecGraphError::PathError(format!("database path {} has no parent", db_path.display()))
    })?;
    fs::create_dir_all(parent).map_err(SpecGraphError::IoError)?;

    let conn = db_connect(db_path)?;

    if stored_schema_version(&conn) != Some(schemas::GRAPH_SCHEMA_VERSION) {
        // Derived state: rebuild rather than migrate.
        for table in schemas::GRAPH_DB_TABLES {
            conn.execute(&format!("DROP TABLE IF EXISTS {}", table), [])
                .map_err(|e| SpecGraphError::DatabaseInitializationError(e.to_string()))?;
        }
    }

    for ddl in schemas::GRAPH_DB_DDL {
        conn.execute(ddl, [])
            .map_err(|e| SpecGraphError::DatabaseInitializationError(e.to_string()))?;
    }
    conn.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        [schemas::GRAPH_SCHEMA_VERSION.to_string()],
    )
    .map_err(|e| SpecGraphError::DatabaseInitializationError(e.to_string()))?;

    Ok(conn)
}

fn stored_schema_version(conn: &Connection) -> Option<u32> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = 'schema_version'",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|v| v.parse().ok())
}

/// Execute a closure while holding the in-process writer lock for a
/// database path. Serializes same-database writers while allowing
/// different databases to proceed in parallel.
pub fn with_write_lock<F, R>(db_path: &Path, f: F) -> Result<R, SpecGraphError>
where
    F: FnOnce() -> Result<R, SpecGraphError>,
{
    let lock = get_db_lock(db_path)?;
    let _guard = lock
        .lock()
        .map_err(|_| SpecGraphError::ValidationError("writer lock poisoned".into()))?;
    f()
}

fn db_lock_map() -> &'static Mutex<HashMap<PathBuf, Arc<Mutex<()>>>> {
    static DB_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    DB_LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn get_db_lock(db_path: &Path) -> Result<Arc<Mutex<()>>, SpecGraphError> {
    let key = db_path.to_path_buf();
    let mut map = db_lock_map()
        .lock()
        .map_err(|_| SpecGraphError::ValidationError("db lock map poisoned".into()))?;
    Ok(map
        .entry(key)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_initialize_creates_schema_and_version() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join(".runtime").join("specgraph.db");
        let conn = initialize_graph_db(&db_path).unwrap();

        let fk_on: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_on, 1);
        assert_eq!(
            stored_schema_version(&conn),
            Some(schemas::GRAPH_SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_version_mismatch_rebuilds() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("specgraph.db");
        {
            let conn = initialize_graph_db(&db_path).unwrap();
            conn.execute(
                "INSERT INTO nodes(id, kind, created_at, updated_at) VALUES('feat_x', 'feature', '0Z', '0Z')",
                [],
            )
            .unwrap();
            conn.execute(
                "UPDATE meta SET value = '0' WHERE key = 'schema_version'",
                [],
            )
            .unwrap();
        }
        let conn = initialize_graph_db(&db_path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_read_only_missing_db_is_not_found() {
        let tmp = tempdir().unwrap();
        let err = db_connect_read_only(&tmp.path().join("absent.db")).unwrap_err();
        assert!(matches!(err, SpecGraphError::NotFound(_)));
    }
}
