//! Bounded concurrent job execution.
//!
//! Jobs run on a dedicated rayon pool of `concurrency` workers, so at most
//! that many are in flight. Each worker sends its outcome over an `mpsc`
//! channel; the calling thread receives them in completion order and hands
//! each one to the caller's callback. That keeps every index write on the
//! thread that owns the connection.
//!
//! A failed job becomes a [`Problem`](crate::problems::Problem) and never
//! stops its siblings. There is no cancellation: the run returns once every
//! job has succeeded or failed.

use crate::actions::{TranscodeError, Transcoder, relocate_converted};
use crate::plan::Job;
use crate::problems::Problems;
use std::path::PathBuf;
use std::sync::mpsc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("cannot create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
    #[error("relocating converted file failed: {0}")]
    Relocate(#[source] TranscodeError),
}

/// One finished job, as seen by the caller.
#[derive(Debug)]
pub struct Completion<'a> {
    pub job: &'a Job,
    /// Jobs finished so far, including this one.
    pub completed: usize,
    pub total: usize,
    pub error: Option<&'a JobError>,
}

#[derive(Debug, Default)]
pub struct QueueReport {
    pub total: usize,
    pub succeeded: usize,
    pub problems: Problems,
}

impl QueueReport {
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

/// Run `jobs` with at most `concurrency` in flight.
///
/// `on_complete` runs on the calling thread once per job, with a
/// monotonically increasing `completed` count.
pub fn run(
    jobs: &[Job],
    transcoder: &dyn Transcoder,
    concurrency: usize,
    mut on_complete: impl FnMut(&Completion<'_>),
) -> Result<QueueReport, rayon::ThreadPoolBuildError> {
    let total = jobs.len();
    let mut report = QueueReport {
        total,
        ..QueueReport::default()
    };
    if jobs.is_empty() {
        return Ok(report);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()?;
    let (tx, rx) = mpsc::channel::<(usize, Result<(), JobError>)>();

    pool.in_place_scope(|scope| {
        for (i, job) in jobs.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let _ = tx.send((i, execute(job, transcoder)));
            });
        }
        drop(tx);

        for (completed, (i, result)) in rx.iter().enumerate() {
            let job = &jobs[i];
            match &result {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    tracing::error!(
                        "error processing {} -> {}: {}",
                        job.file_path(),
                        job.write_back.path,
                        e
                    );
                    report.problems.add(job.file_path(), e);
                }
            }
            on_complete(&Completion {
                job,
                completed: completed + 1,
                total,
                error: result.as_ref().err(),
            });
        }
    });

    Ok(report)
}

fn execute(job: &Job, transcoder: &dyn Transcoder) -> Result<(), JobError> {
    if let Some(parent) = job.dest.parent() {
        std::fs::create_dir_all(parent).map_err(|source| JobError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    tracing::debug!(
        "{} from {} to {}",
        job.rel,
        job.source.display(),
        job.dest.display()
    );
    transcoder.produce(&job.action, &job.source, &job.dest)?;
    if let Some(target) = &job.relocate {
        relocate_converted(&job.dest, target).map_err(JobError::Relocate)?;
    }
    Ok(())
}
