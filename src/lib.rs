//! # mediaforge
//!
//! An incremental thumbnail and preview builder for photo and video folders.
//! The input folder is the source of truth. A SQLite index in the output
//! folder remembers every file it has seen, so repeated builds only touch
//! what changed on disk.
//!
//! # Architecture
//!
//! A build runs five steps, strictly in order:
//!
//! ```text
//! 1. Index      disk + index.db  →  FileEvents      (identity, delta, tombstones)
//! 2. Filter     files            →  kept + cleanup  (duplicates, Live Photo videos)
//! 3. Phase one  kept             →  conversions, originals
//! 4. Phase two  kept             →  thumbnails, small and large previews
//! 5. Mark       kept             →  processed = 1
//! ```
//!
//! Each step returns a value the next one consumes. Only the orchestrating
//! thread in [`pipeline`] writes to the index.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Walks the input folder into a map of relative path → size and mtime |
//! | [`metadata`] | Metadata extraction: MIME type, dimensions, sidecar tags, logical date |
//! | [`index`] | Persistent index: delta computation, identity recovery, tombstones |
//! | [`model`] | `MediaFile`, the per-build view of one indexed file |
//! | [`artifacts`] | Artifact kinds, relationships, and output path derivation |
//! | [`filter`] | Duplicate and Live Photo detection |
//! | [`actions`] | The `Action` enum and the `Transcoder` that carries actions out |
//! | [`plan`] | Staleness checks and job planning per phase |
//! | [`queue`] | Bounded concurrent job execution |
//! | [`pipeline`] | The build orchestrator and `status` |
//! | [`imaging`] | Pure-Rust image operations: identify, resize, thumbnail |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`problems`] | Per-file failures collected for the build summary |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Identity Survives Renames
//!
//! A file's identity is its file name plus its logical date, not its path.
//! Moving `2021/a.jpg` to `archive/a.jpg` keeps the same id, so artifacts
//! keyed by id stay valid. A file that disappears is tombstoned in a shadow
//! database rather than deleted; if it comes back later it gets its old id.
//!
//! ## Staleness by Modification Time
//!
//! An artifact is rebuilt when the source is newer than it, or when the
//! index reports the source as added or modified. No content hashing.
//!
//! ## No Global Thread Pool
//!
//! Extraction and job execution each build a dedicated rayon pool sized by
//! `processing.concurrency`, so the library never touches rayon's global
//! pool and callers can embed it freely.

pub mod actions;
pub mod artifacts;
pub mod config;
pub mod filter;
pub mod imaging;
pub mod index;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod problems;
pub mod queue;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
