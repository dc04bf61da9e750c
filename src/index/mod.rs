//! Persistent file index.
//!
//! The index remembers every source file seen in previous runs: its stable id,
//! path, identity key (`file_name`, `file_date`), logical date, raw metadata
//! and the artifact paths produced for it. Files that disappear are moved to a
//! shadow database of tombstones so their id can be restored if they come back.
//!
//! ## Files
//!
//! ```text
//! <output>/index.db            # live rows (table `files`)
//! <output>/index-deleted.db    # tombstones (table `tombstones`)
//! ```
//!
//! Both are opened on one connection (the shadow file is `ATTACH`ed), so a
//! run's write-back commits or rolls back as a unit.
//!
//! ## Update
//!
//! [`Index::update`] scans the disk, computes the [`DeltaResult`], extracts
//! metadata for added and modified paths, writes everything back, and returns
//! the run as a sequence of [`FileEvent`]s. Entries are applied in path order
//! and each one is matched, in turn, against:
//!
//! 1. a live row at the same path (updated in place),
//! 2. a live row with the same identity key whose path vanished this run
//!    (a rename: the row is repointed and keeps its id),
//! 3. a tombstone with the same identity key (the id is restored),
//! 4. nothing (a fresh id from the AUTOINCREMENT allocator).
//!
//! Rows whose path vanished and were not claimed become tombstones.

pub mod delta;
pub mod schema;
pub mod shadow;

pub use delta::{DeltaResult, calculate};
pub use shadow::Tombstone;

use crate::artifacts::ArtifactKind;
use crate::metadata::{MediaEntry, MetadataExtractor, extract_all, logical_date};
use crate::scan::{DiskMap, ScanError, ScanOptions, scan};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid metadata in index: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("failed to start metadata workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counts reported at the start of an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaStats {
    pub unchanged: usize,
    pub added: usize,
    pub modified: usize,
    pub deleted: usize,
    /// Files currently on disk.
    pub total: usize,
}

impl DeltaStats {
    fn new(delta: &DeltaResult, total: usize) -> Self {
        Self {
            unchanged: delta.unchanged.len(),
            added: delta.added.len(),
            modified: delta.modified.len(),
            deleted: delta.deleted.len(),
            total,
        }
    }
}

/// A live index row, as emitted after an update.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedFile {
    pub id: i64,
    pub path: String,
    pub file_name: String,
    pub file_date: i64,
    pub date: i64,
    pub size: u64,
    pub metadata: MediaEntry,
    pub processed: bool,
    /// Artifact paths recorded by previous builds.
    pub artifacts: BTreeMap<ArtifactKind, String>,
    /// New at this path in this run.
    pub added: bool,
    /// Content changed since the previous run.
    pub modified: bool,
}

/// One step of an index update.
#[derive(Debug, Clone, PartialEq)]
pub enum FileEvent {
    Stats(DeltaStats),
    Progress {
        path: String,
        processed: usize,
        total: usize,
    },
    /// Metadata extraction failed; the file is left out of this run.
    Skipped { path: String, error: String },
    File(IndexedFile),
    Deleted(Tombstone),
    Done { count: usize },
}

/// The events of one update, in order. Consumed once.
#[derive(Debug)]
pub struct IndexEvents {
    inner: std::vec::IntoIter<FileEvent>,
}

impl Iterator for IndexEvents {
    type Item = FileEvent;

    fn next(&mut self) -> Option<FileEvent> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// How an entry found its row.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Upserted {
    Updated(i64),
    Moved { id: i64, from: String },
    Recovered(i64),
    Inserted(i64),
}

pub struct Index {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Index {
    /// Open (or create) the index at `path` and its shadow file next to it.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let shadow = shadow_path(path);
        conn.execute(
            "ATTACH DATABASE ?1 AS shadow",
            params![shadow.to_string_lossy()],
        )?;
        schema::initialize(&conn)?;
        tracing::debug!(index = %path.display(), shadow = %shadow.display(), "index opened");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// An index that lives only as long as this value (for tests).
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        conn.execute("ATTACH DATABASE ':memory:' AS shadow", [])?;
        schema::initialize(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Location of the primary index file, if on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Last-seen modification time of every live path.
    pub fn known_paths(&self) -> Result<BTreeMap<String, i64>, IndexError> {
        let mut stmt = self.conn.prepare("SELECT path, file_date FROM files")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let map = rows.collect::<rusqlite::Result<BTreeMap<String, i64>>>()?;
        Ok(map)
    }

    /// Compare the index with the disk without writing anything.
    pub fn diff(&self, root: &Path, options: &ScanOptions) -> Result<DeltaStats, IndexError> {
        let disk = scan(root, options)?;
        let delta = calculate(&self.known_paths()?, &disk_times(&disk));
        Ok(DeltaStats::new(&delta, disk.len()))
    }

    /// Bring the index in line with the disk under `root`.
    ///
    /// Database errors abort the update and leave both files untouched.
    /// Extraction failures are reported as [`FileEvent::Skipped`], and the
    /// file is left out of this run's [`FileEvent::File`] events even when an
    /// older row for it exists. The row keeps its previous `file_date`, so
    /// the next run tries the extraction again.
    pub fn update(
        &mut self,
        root: &Path,
        options: &ScanOptions,
        extractor: &dyn MetadataExtractor,
        concurrency: usize,
    ) -> Result<IndexEvents, IndexError> {
        let disk = scan(root, options)?;
        let delta = calculate(&self.known_paths()?, &disk_times(&disk));
        let stats = DeltaStats::new(&delta, disk.len());
        tracing::info!(
            unchanged = stats.unchanged,
            added = stats.added,
            modified = stats.modified,
            deleted = stats.deleted,
            "index delta"
        );

        let mut events = vec![FileEvent::Stats(stats)];
        let to_process = delta.to_process();
        let extracted = extract_all(extractor, root, &to_process, concurrency)?;

        let tx = self.conn.transaction()?;
        let total = extracted.len();
        let mut skipped = BTreeSet::new();
        for (processed, (path, result)) in extracted.into_iter().enumerate() {
            match result {
                Ok(entry) => {
                    let size = disk.get(&path).map(|d| d.size).unwrap_or(0);
                    let outcome = upsert(&tx, &entry, size, &delta)?;
                    tracing::debug!(path = %path, ?outcome, "indexed");
                }
                Err(err) => {
                    tracing::warn!("skipping {path}: {err}");
                    skipped.insert(path.clone());
                    events.push(FileEvent::Skipped {
                        path: path.clone(),
                        error: err.to_string(),
                    });
                }
            }
            events.push(FileEvent::Progress {
                path,
                processed: processed + 1,
                total,
            });
        }
        let tombstoned = finalize(&tx, &delta)?;
        tx.commit()?;

        for row in self.rows()? {
            if skipped.contains(&row.path) {
                continue;
            }
            let mut file = row;
            file.added = delta.is_added(&file.path);
            file.modified = delta.is_modified(&file.path);
            events.push(FileEvent::File(file));
        }
        events.extend(tombstoned.into_iter().map(FileEvent::Deleted));
        events.push(FileEvent::Done {
            count: self.count()?,
        });
        Ok(IndexEvents {
            inner: events.into_iter(),
        })
    }

    /// All live rows, ordered by path. Run flags are left unset.
    pub fn rows(&self) -> Result<Vec<IndexedFile>, IndexError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, file_name, file_date, date, size, metadata, processed,
                    thumbnail, small, large, original, conversion
             FROM files ORDER BY path",
        )?;
        let raw = stmt.query_map([], |row| {
            let mut artifacts = BTreeMap::new();
            for (offset, kind) in ArtifactKind::ALL.iter().enumerate() {
                if let Some(path) = row.get::<_, Option<String>>(8 + offset)? {
                    artifacts.insert(*kind, path);
                }
            }
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, bool>(7)?,
                artifacts,
            ))
        })?;
        let mut files = Vec::new();
        for row in raw {
            let (id, path, file_name, file_date, date, size, metadata, processed, artifacts) = row?;
            files.push(IndexedFile {
                id,
                path,
                file_name,
                file_date,
                date,
                size: size.max(0) as u64,
                metadata: serde_json::from_str(&metadata)?,
                processed,
                artifacts,
                added: false,
                modified: false,
            });
        }
        Ok(files)
    }

    pub fn count(&self) -> Result<usize, IndexError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn tombstones(&self) -> Result<Vec<Tombstone>, IndexError> {
        Ok(shadow::list(&self.conn)?)
    }

    pub fn tombstone_count(&self) -> Result<usize, IndexError> {
        Ok(shadow::count(&self.conn)?)
    }

    /// Id of the live row at `path`.
    pub fn id_of(&self, path: &str) -> Result<Option<i64>, IndexError> {
        Ok(self
            .conn
            .query_row("SELECT id FROM files WHERE path = ?1", [path], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Record where an artifact of `file_path` was produced, relative to the
    /// output root.
    pub fn add_processed_path(
        &self,
        file_path: &str,
        artifact: ArtifactKind,
        produced_path: &str,
    ) -> Result<(), IndexError> {
        let sql = format!("UPDATE files SET {} = ?1 WHERE path = ?2", artifact.column());
        self.conn.execute(&sql, params![produced_path, file_path])?;
        Ok(())
    }

    /// Set the `processed` flag of the given paths in one transaction.
    pub fn set_processed(&mut self, paths: &[String], processed: bool) -> Result<(), IndexError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE files SET processed = ?1 WHERE path = ?2")?;
            for path in paths {
                stmt.execute(params![processed, path])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Recompute logical dates from the stored metadata. Returns the paths
    /// whose date changed.
    pub fn refresh_dates(&mut self) -> Result<Vec<String>, IndexError> {
        let rows = self.rows()?;
        let tx = self.conn.transaction()?;
        let mut changed = Vec::new();
        {
            let mut stmt = tx.prepare("UPDATE files SET date = ?1 WHERE id = ?2")?;
            for row in rows {
                let date = logical_date(&row.metadata);
                if date != row.date {
                    tracing::info!("updating date of {}", row.path);
                    stmt.execute(params![date, row.id])?;
                    changed.push(row.path);
                }
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Rebuild both database files to reclaim space.
    pub fn vacuum(&self) -> Result<(), IndexError> {
        self.conn.execute_batch("VACUUM main; VACUUM shadow;")?;
        Ok(())
    }
}

/// `index.db` → `index-deleted.db`, in the same directory.
pub fn shadow_path(index: &Path) -> PathBuf {
    let stem = index
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    let name = match index.extension() {
        Some(ext) => format!("{stem}-deleted.{}", ext.to_string_lossy()),
        None => format!("{stem}-deleted"),
    };
    index.with_file_name(name)
}

fn disk_times(disk: &DiskMap) -> BTreeMap<String, i64> {
    disk.iter()
        .map(|(path, entry)| (path.clone(), entry.mod_time))
        .collect()
}

fn file_name_of(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn upsert(
    tx: &Transaction<'_>,
    entry: &MediaEntry,
    size: u64,
    delta: &DeltaResult,
) -> Result<Upserted, IndexError> {
    let path = entry.source_file.as_str();
    let file_name = file_name_of(path);
    let file_date = entry.file_modify_time;
    let date = logical_date(entry);
    let metadata = serde_json::to_string(entry)?;
    let size = size as i64;

    let existing: Option<i64> = tx
        .query_row("SELECT id FROM files WHERE path = ?1", [path], |row| row.get(0))
        .optional()?;
    if let Some(id) = existing {
        tx.execute(
            "UPDATE files SET file_name = ?1, file_date = ?2, date = ?3, size = ?4,
                              metadata = ?5, processed = 0
             WHERE id = ?6",
            params![file_name, file_date, date, size, metadata, id],
        )?;
        return Ok(Upserted::Updated(id));
    }

    let candidates: Vec<(i64, String)> = {
        let mut stmt = tx.prepare(
            "SELECT id, path FROM files WHERE file_name = ?1 AND file_date = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![file_name, file_date], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<rusqlite::Result<_>>()?
    };
    if let Some((id, from)) = candidates
        .into_iter()
        .find(|(_, candidate)| !delta.is_live(candidate))
    {
        tx.execute(
            "UPDATE files SET path = ?1, file_name = ?2, file_date = ?3, date = ?4, size = ?5,
                              metadata = ?6, processed = 0,
                              thumbnail = NULL, small = NULL, large = NULL,
                              original = NULL, conversion = NULL
             WHERE id = ?7",
            params![path, file_name, file_date, date, size, metadata, id],
        )?;
        return Ok(Upserted::Moved { id, from });
    }

    if let Some(tombstone) = shadow::take(tx, &file_name, file_date)? {
        tx.execute(
            "INSERT INTO files (id, path, file_name, file_date, date, size, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![tombstone.id, path, file_name, file_date, date, size, metadata],
        )?;
        return Ok(Upserted::Recovered(tombstone.id));
    }

    tx.execute(
        "INSERT INTO files (path, file_name, file_date, date, size, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![path, file_name, file_date, date, size, metadata],
    )?;
    Ok(Upserted::Inserted(tx.last_insert_rowid()))
}

/// Tombstone every row whose path vanished and was not claimed by a rename.
fn finalize(tx: &Transaction<'_>, delta: &DeltaResult) -> Result<Vec<Tombstone>, IndexError> {
    let deleted_at = chrono::Utc::now().timestamp_millis();
    let mut tombstoned = Vec::new();
    for path in &delta.deleted {
        let row = tx
            .query_row(
                "SELECT id, file_name, file_date FROM files WHERE path = ?1",
                [path],
                |row| {
                    Ok(Tombstone {
                        id: row.get(0)?,
                        path: path.clone(),
                        file_name: row.get(1)?,
                        file_date: row.get(2)?,
                    })
                },
            )
            .optional()?;
        let Some(tombstone) = row else {
            continue;
        };
        shadow::insert(tx, &tombstone, deleted_at)?;
        tx.execute("DELETE FROM files WHERE id = ?1", [tombstone.id])?;
        tracing::debug!(path = %path, id = tombstone.id, "tombstoned");
        tombstoned.push(tombstone);
    }
    Ok(tombstoned)
}
