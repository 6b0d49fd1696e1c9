//! High-level database interface.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use safeguard_core::policy::{PolicySnapshot, PolicyUpdate};

use crate::error::{Result, StorageError};
use crate::schema::run_migrations;

const ALLOW_KEY: &str = "allow";
const REDIRECT_KEY: &str = "redirect";

/// SQLite-backed store for the policy snapshot.
///
/// Holds a single Mutex-protected connection; for a local-only service
/// with one writer this is sufficient and simpler than a pool.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Opens the database at a specific path.
    pub fn with_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Creates an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Returns the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "safeguard", "safeguard")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("safeguard.db"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Config("Connection lock poisoned".to_string()))
    }

    /// Reads the persisted policy sets. Absent keys read as empty.
    pub fn load_policy(&self) -> Result<PolicySnapshot> {
        let conn = self.lock()?;

        Ok(PolicySnapshot {
            allow: read_hostnames(&conn, ALLOW_KEY)?,
            redirect: read_hostnames(&conn, REDIRECT_KEY)?,
        })
    }

    /// Writes back the sets present in the update, leaving the rest alone.
    pub fn save_policy(&self, update: &PolicyUpdate) -> Result<()> {
        let conn = self.lock()?;

        if let Some(allow) = &update.allow {
            write_hostnames(&conn, ALLOW_KEY, allow)?;
        }
        if let Some(redirect) = &update.redirect {
            write_hostnames(&conn, REDIRECT_KEY, redirect)?;
        }
        Ok(())
    }
}

fn read_hostnames(conn: &Connection, key: &str) -> Result<Vec<String>> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM snapshot WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;

    match value {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

fn write_hostnames(conn: &Connection, key: &str, hostnames: &[String]) -> Result<()> {
    let json = serde_json::to_string(hostnames)?;

    conn.execute(
        "INSERT INTO snapshot (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = ?2",
        params![key, json],
    )?;
    Ok(())
}
