//! SQL schema for the index and its shadow database.
//!
//! The shadow database is attached to the same connection under the schema
//! name `shadow`, so one transaction covers both files.

use rusqlite::Connection;

pub const SCHEMA: &str = r#"
-- Live files: one row per source file on disk
CREATE TABLE IF NOT EXISTS main.files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    file_name TEXT NOT NULL,
    file_date INTEGER NOT NULL,
    date INTEGER NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,

    -- Produced artifact paths, relative to the output root
    thumbnail TEXT,
    small TEXT,
    large TEXT,
    original TEXT,
    conversion TEXT
);

CREATE INDEX IF NOT EXISTS main.idx_files_identity ON files(file_name, file_date);

-- Tombstones: identities of files that left the disk
CREATE TABLE IF NOT EXISTS shadow.tombstones (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_date INTEGER NOT NULL,
    deleted_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS shadow.idx_tombstones_identity ON tombstones(file_name, file_date);
"#;

pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
