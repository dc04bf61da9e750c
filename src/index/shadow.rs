//! Tombstones for files that disappeared from disk.
//!
//! When a live row's path vanishes and no rename claims it, the row moves here
//! with its id. A later file with the same name and modification time takes
//! the id back.

use rusqlite::{Connection, OptionalExtension, params};

/// A removed file's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub id: i64,
    /// Last known location.
    pub path: String,
    pub file_name: String,
    /// Source modification time, epoch milliseconds.
    pub file_date: i64,
}

pub fn insert(conn: &Connection, tombstone: &Tombstone, deleted_at: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO shadow.tombstones (id, path, file_name, file_date, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            tombstone.id,
            tombstone.path,
            tombstone.file_name,
            tombstone.file_date,
            deleted_at
        ],
    )?;
    Ok(())
}

/// Remove and return the lowest-id tombstone matching the identity key.
pub fn take(conn: &Connection, file_name: &str, file_date: i64) -> rusqlite::Result<Option<Tombstone>> {
    let found = conn
        .query_row(
            "SELECT id, path, file_name, file_date FROM shadow.tombstones
             WHERE file_name = ?1 AND file_date = ?2
             ORDER BY id LIMIT 1",
            params![file_name, file_date],
            |row| {
                Ok(Tombstone {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    file_name: row.get(2)?,
                    file_date: row.get(3)?,
                })
            },
        )
        .optional()?;
    if let Some(tombstone) = &found {
        conn.execute(
            "DELETE FROM shadow.tombstones WHERE id = ?1",
            params![tombstone.id],
        )?;
    }
    Ok(found)
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Tombstone>> {
    let mut stmt = conn.prepare(
        "SELECT id, path, file_name, file_date FROM shadow.tombstones ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Tombstone {
            id: row.get(0)?,
            path: row.get(1)?,
            file_name: row.get(2)?,
            file_date: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub fn count(conn: &Connection) -> rusqlite::Result<usize> {
    conn.query_row("SELECT COUNT(*) FROM shadow.tombstones", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as usize)
}
