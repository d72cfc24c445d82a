//! Refcount index: tracks how many live file chunk lists reference each
//! chunk id, backed by SQLite and migrated via `rusqlite_migration`, mirroring
//! the teacher's `db/sqlite` migration harness.

use std::path::Path;

use rusqlite::{params, Connection};
use rusqlite_migration::{Migrations, M};

use crate::checksum::ChunkId;
use crate::error::{Error, Result};

const MIGRATIONS: &[&str] = &[include_str!("migrations/00001.sql")];

/// Tracks `instance_count` per chunk id.
pub trait RefcountIndex {
    fn exists(&self, id: ChunkId) -> Result<bool>;
    /// Insert a fresh row with `instance_count = 1`. Caller must ensure the
    /// row does not already exist.
    fn insert(&self, id: ChunkId) -> Result<()>;
    fn get(&self, id: ChunkId) -> Result<u64>;
    fn inc(&self, id: ChunkId) -> Result<()>;
    fn dec(&self, id: ChunkId) -> Result<()>;
    fn delete(&self, id: ChunkId) -> Result<()>;
}

/// SQLite-backed `RefcountIndex`, opened and migrated on construction.
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path.as_ref())?;
        Self::migrate(&mut conn)?;
        Ok(SqliteIndex { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        Self::migrate(&mut conn)?;
        Ok(SqliteIndex { conn })
    }

    fn migrate(conn: &mut Connection) -> Result<()> {
        let migrations = Migrations::new(MIGRATIONS.iter().copied().map(M::up).collect());
        migrations.to_latest(conn)?;
        Ok(())
    }
}

impl RefcountIndex for SqliteIndex {
    fn exists(&self, id: ChunkId) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE checksum = ?1",
            params![id.to_hex()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn insert(&self, id: ChunkId) -> Result<()> {
        self.conn.execute(
            "INSERT INTO chunks (checksum, instance_count) VALUES (?1, 1)",
            params![id.to_hex()],
        )?;
        Ok(())
    }

    fn get(&self, id: ChunkId) -> Result<u64> {
        let result: rusqlite::Result<i64> = self.conn.query_row(
            "SELECT instance_count FROM chunks WHERE checksum = ?1",
            params![id.to_hex()],
            |row| row.get(0),
        );
        match result {
            Ok(count) => Ok(count as u64),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(Error::Db(e)),
        }
    }

    fn inc(&self, id: ChunkId) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE chunks SET instance_count = instance_count + 1 WHERE checksum = ?1",
            params![id.to_hex()],
        )?;
        if updated == 0 {
            return Err(Error::Invariant(format!(
                "inc() called for chunk {id} with no existing row"
            )));
        }
        Ok(())
    }

    fn dec(&self, id: ChunkId) -> Result<()> {
        let current = self.get(id)?;
        if current == 0 {
            return Err(Error::Invariant(format!(
                "dec() called for chunk {id} which is already at zero or absent"
            )));
        }
        self.conn.execute(
            "UPDATE chunks SET instance_count = instance_count - 1 WHERE checksum = ?1",
            params![id.to_hex()],
        )?;
        Ok(())
    }

    fn delete(&self, id: ChunkId) -> Result<()> {
        self.conn
            .execute("DELETE FROM chunks WHERE checksum = ?1", params![id.to_hex()])?;
        Ok(())
    }
}
