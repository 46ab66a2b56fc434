use crate::error::Error;
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{Connection, Result};
use tracing::debug;

lazy_static! {
    static ref TABLE_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,127}$").unwrap();
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA mmap_size = 268435456;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, 64MB cache, 256MB mmap)");
        Ok(())
    }

    /// Create the run log if missing. Media tables belong to the scanner and are
    /// never touched here.
    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < 1 {
            debug!("Schema version {} < 1, creating run log", version);
            self.conn.execute_batch(include_str!("schema.sql"))?;
        }

        debug!("SQLite schema at version 1");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Quote a user-supplied table name for interpolation into SQL.
///
/// Only plain identifiers are accepted.
pub fn quote_table(name: &str) -> std::result::Result<String, Error> {
    if TABLE_NAME.is_match(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(Error::InvalidTableName(name.to_string()))
    }
}
