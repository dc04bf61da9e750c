//! The build: index, filter, plan, execute, mark.
//!
//! ```text
//! 1. Index      disk + index.db  →  FileEvents      (identity, delta, tombstones)
//! 2. Filter     files            →  kept + cleanup  (duplicates, Live Photo videos)
//! 3. Phase one  kept             →  conversions, originals
//! 4. Phase two  kept             →  thumbnails, small and large previews
//! 5. Mark       kept             →  processed = 1
//! ```
//!
//! Phases are strictly sequential. Inside a phase, jobs run on the bounded
//! [`queue`](crate::queue); this thread receives their outcomes and is the
//! only one that writes to the index.

use crate::actions::Transcoder;
use crate::artifacts::OutputOptions;
use crate::config::{BuildConfig, ConfigError, effective_threads};
use crate::filter;
use crate::index::{DeltaStats, FileEvent, Index, IndexError};
use crate::metadata::{Metadata, MetadataExtractor};
use crate::model::{MediaFile, RunState};
use crate::plan::{JobPlanner, Plan};
use crate::problems::Problems;
use crate::queue;
use crate::scan::ScanOptions;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("failed to start job workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Convert,
    Resize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Convert => f.write_str("Converting and linking originals"),
            Phase::Resize => f.write_str("Resizing images, generating video covers"),
        }
    }
}

/// Progress reported while a build runs.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Indexing {
        path: String,
        processed: usize,
        total: usize,
    },
    PhaseStarted {
        phase: Phase,
        jobs: usize,
        source_files: usize,
    },
    JobFinished {
        completed: usize,
        total: usize,
        /// Artifact path relative to the output root.
        dest: String,
        error: Option<String>,
    },
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub stats: DeltaStats,
    /// Live files in the index after the update.
    pub indexed: usize,
    /// Rows tombstoned in this run.
    pub tombstoned: usize,
    pub duplicates: Vec<String>,
    pub live_photos: usize,
    pub jobs_planned: usize,
    pub jobs_succeeded: usize,
    pub dry_run: bool,
    pub problems: Problems,
}

/// Index state without building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub stats: DeltaStats,
    pub indexed: usize,
    pub tombstones: usize,
}

/// Open the index for an output directory.
pub fn open_index(output: &Path, config: &BuildConfig) -> Result<Index, BuildError> {
    Ok(Index::open(&config.index_path(output))?)
}

/// Compare the index with the disk.
pub fn status(
    input: &Path,
    output: &Path,
    config: &BuildConfig,
) -> Result<StatusReport, BuildError> {
    let index = open_index(output, config)?;
    Ok(StatusReport {
        stats: index.diff(input, &ScanOptions::from(&config.scan))?,
        indexed: index.count()?,
        tombstones: index.tombstone_count()?,
    })
}

/// Run a full incremental build of `input` into `output`.
pub fn build(
    input: &Path,
    output: &Path,
    config: &BuildConfig,
    extractor: &dyn MetadataExtractor,
    transcoder: &dyn Transcoder,
    on_event: &mut dyn FnMut(&BuildEvent),
) -> Result<BuildSummary, BuildError> {
    config.validate()?;
    std::fs::create_dir_all(output)?;
    let concurrency = effective_threads(&config.processing);
    let mut summary = BuildSummary {
        dry_run: config.output.dry_run,
        ..BuildSummary::default()
    };

    // 1. Index
    let mut index = open_index(output, config)?;
    let options = OutputOptions::from(&config.output);
    let mut files = Vec::new();
    let scan_options = ScanOptions::from(&config.scan);
    for event in index.update(input, &scan_options, extractor, concurrency)? {
        match event {
            FileEvent::Stats(stats) => summary.stats = stats,
            FileEvent::Progress {
                path,
                processed,
                total,
            } => on_event(&BuildEvent::Indexing {
                path,
                processed,
                total,
            }),
            FileEvent::Skipped { path, error } => summary.problems.add(path, error),
            FileEvent::File(row) => files.push(MediaFile::new(
                row.id,
                &row.path,
                // The stored date is authoritative; `refresh-dates` rewrites it.
                Metadata {
                    date: row.date,
                    ..Metadata::from_entry(&row.metadata)
                },
                row.size,
                RunState {
                    added: row.added,
                    modified: row.modified,
                    processed: row.processed,
                },
                &options,
            )),
            FileEvent::Deleted(_) => summary.tombstoned += 1,
            FileEvent::Done { count } => summary.indexed = count,
        }
    }

    // 2. Filter
    let filtered = filter::run(files);
    summary.live_photos = filtered.cleanup.len() - filtered.duplicates.len();
    summary.duplicates = filtered.duplicates.into_iter().collect();
    let cleanup: Vec<String> = filtered.cleanup.iter().map(|f| f.path.clone()).collect();
    index.set_processed(&cleanup, false)?;
    let kept = filtered.files;

    // 3-4. Plan and execute
    let mut planner = JobPlanner::new(input, output, config);
    let phase_one = planner.phase_one(&kept);
    let mut ctx = PhaseContext {
        index: &index,
        transcoder,
        concurrency,
        summary: &mut summary,
        on_event,
    };
    ctx.run(Phase::Convert, phase_one)?;
    let phase_two = planner.phase_two(&kept);
    ctx.run(Phase::Resize, phase_two)?;

    // 5. Mark: files with a failed job stay unprocessed and are retried.
    if !summary.dry_run {
        let failed: BTreeSet<&str> = summary.problems.paths().into_iter().collect();
        let (done, retry): (Vec<String>, Vec<String>) = kept
            .iter()
            .map(|f| f.path.clone())
            .partition(|p| !failed.contains(p.as_str()));
        index.set_processed(&done, true)?;
        index.set_processed(&retry, false)?;
    }

    tracing::info!(
        indexed = summary.indexed,
        jobs = summary.jobs_planned,
        succeeded = summary.jobs_succeeded,
        problems = summary.problems.len(),
        "build finished"
    );
    Ok(summary)
}

/// What every phase needs; lives for the duration of one build.
struct PhaseContext<'a, 'e> {
    index: &'a Index,
    transcoder: &'a dyn Transcoder,
    concurrency: usize,
    summary: &'a mut BuildSummary,
    on_event: &'a mut (dyn FnMut(&BuildEvent) + 'e),
}

impl PhaseContext<'_, '_> {
    fn run(&mut self, phase: Phase, plan: Plan) -> Result<(), BuildError> {
        self.summary.jobs_planned += plan.jobs.len();
        (self.on_event)(&BuildEvent::PhaseStarted {
            phase,
            jobs: plan.jobs.len(),
            source_files: plan.source_files.len(),
        });
        if self.summary.dry_run {
            return Ok(());
        }

        for existing in &plan.existing {
            self.index
                .add_processed_path(&existing.file_path, existing.artifact, &existing.path)?;
        }

        let index = self.index;
        let on_event = &mut *self.on_event;
        let mut write_error = None;
        let report = queue::run(&plan.jobs, self.transcoder, self.concurrency, |done| {
            let wb = &done.job.write_back;
            if done.error.is_none()
                && write_error.is_none()
                && let Err(e) = index.add_processed_path(&wb.file_path, wb.artifact, &wb.path)
            {
                write_error = Some(e);
            }
            on_event(&BuildEvent::JobFinished {
                completed: done.completed,
                total: done.total,
                dest: wb.path.clone(),
                error: done.error.map(|e| e.to_string()),
            });
        })?;
        if let Some(e) = write_error {
            return Err(e.into());
        }

        self.summary.jobs_succeeded += report.succeeded;
        self.summary.problems.extend(report.problems);
        Ok(())
    }
}
