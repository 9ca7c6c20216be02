//! SQLite-backed record table.

use crate::error::{Result, StoreError};
use crate::types::{Record, RecordId};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,

    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./names.db"),
            create_if_missing: true,
        }
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS names (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
);";

// Tables created by older deployments allow NULL names and store
// `created_at` as `YYYY-MM-DD HH:MM:SS`; both are normalized on the way out.
const INSERT_RECORD: &str = "INSERT INTO names (name) VALUES (?1) RETURNING id, \
    COALESCE(name, ''), \
    COALESCE(strftime('%Y-%m-%dT%H:%M:%SZ', created_at), CAST(created_at AS TEXT), '')";

const SELECT_RECORDS: &str = "SELECT id, \
    COALESCE(name, ''), \
    COALESCE(strftime('%Y-%m-%dT%H:%M:%SZ', created_at), CAST(created_at AS TEXT), '') \
    FROM names ORDER BY id";

/// Operations the API layer needs from persistence.
///
/// Implementations serialize their own access; callers may share one
/// instance across threads.
pub trait RecordStore: Send + Sync {
    /// Insert a name. The store assigns `id` and `created_at`.
    fn insert(&self, name: &str) -> Result<Record>;

    /// Every record, ordered by id.
    fn list(&self) -> Result<Vec<Record>>;

    /// Rename every record whose name equals `old_name`. Returns the number
    /// of rows changed.
    fn rename(&self, old_name: &str, new_name: &str) -> Result<usize>;

    /// Delete every record. Returns the number of rows removed.
    fn clear(&self) -> Result<usize>;
}

/// The names table.
pub struct Store {
    /// Where the database lives (`None` for in-memory stores).
    path: Option<PathBuf>,

    /// Single connection; the mutex serializes every statement.
    conn: Mutex<Connection>,
}

impl Store {
    /// Open an existing database or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new database file (parent directories included).
    pub fn create(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.path)?;
        Self::init(conn, Some(config.path))
    }

    /// Open an existing database file.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::init(conn, Some(config.path))
    }

    /// Throwaway store for tests and demos.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = ?path, "Record store ready");

        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Database path, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Record> {
        Ok(Record {
            id: RecordId(row.get(0)?),
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

impl RecordStore for Store {
    fn insert(&self, name: &str) -> Result<Record> {
        let conn = self.conn.lock();
        let record = conn.query_row(INSERT_RECORD, params![name], Self::map_row)?;
        Ok(record)
    }

    fn list(&self) -> Result<Vec<Record>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(SELECT_RECORDS)?;
        let records = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn rename(&self, old_name: &str, new_name: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE names SET name = ?1 WHERE name = ?2",
            params![new_name, old_name],
        )?;
        Ok(changed)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM names", [])?;
        Ok(removed)
    }
}
