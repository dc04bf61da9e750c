//! Output job planning.
//!
//! For every kept file and every artifact it needs, the planner decides
//! between three outcomes:
//!
//! - **job**: the relationship has an action and the artifact is stale
//!   (`file.date` newer than the destination mtime, the file is new or
//!   modified in this run, or an earlier build failed on it). A missing
//!   destination has mtime 0.
//! - **existing**: no job, but the destination exists. Its path is handed
//!   back so the index records it.
//! - **nothing**: no action (`fs:link`, web-safe conversions) or nothing on
//!   disk.
//!
//! Planning runs in two phases. Conversions and originals come first; resizes
//! come second because they read from the converted file when the source is
//! not web-safe. One [`JobPlanner`] spans both phases and drops any job whose
//! destination was already planned in this run.

use crate::actions::{Action, action_for};
use crate::artifacts::{ArtifactKind, Relationship};
use crate::config::{BuildConfig, SizesConfig};
use crate::model::MediaFile;
use crate::scan::epoch_millis;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// An artifact path to store in the index once it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBack {
    /// Source path relative to the input root.
    pub file_path: String,
    pub artifact: ArtifactKind,
    /// Artifact path relative to the output root.
    pub path: String,
}

/// One unit of work for the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub action: Action,
    pub rel: Relationship,
    /// Applied only when the job succeeds.
    pub write_back: WriteBack,
    /// Move the result here and leave a symlink at `dest`.
    pub relocate: Option<PathBuf>,
}

impl Job {
    pub fn file_path(&self) -> &str {
        &self.write_back.file_path
    }
}

#[derive(Debug, Default)]
pub struct Plan {
    pub jobs: Vec<Job>,
    /// Distinct source files with at least one job.
    pub source_files: BTreeSet<String>,
    /// Artifacts that are up to date and only need recording.
    pub existing: Vec<WriteBack>,
}

impl Plan {
    pub fn merge(&mut self, other: Plan) {
        self.jobs.extend(other.jobs);
        self.source_files.extend(other.source_files);
        self.existing.extend(other.existing);
    }
}

pub struct JobPlanner<'a> {
    input: &'a Path,
    output: &'a Path,
    sizes: &'a SizesConfig,
    relocate: Option<&'a Path>,
    planned: HashSet<PathBuf>,
}

impl<'a> JobPlanner<'a> {
    pub fn new(input: &'a Path, output: &'a Path, config: &'a BuildConfig) -> Self {
        Self {
            input,
            output,
            sizes: &config.sizes,
            relocate: config.output.relocate_converted.as_deref(),
            planned: HashSet::new(),
        }
    }

    /// Phase one: conversions and originals.
    pub fn phase_one(&mut self, files: &[MediaFile]) -> Plan {
        let mut plan = self.plan_conversions(files);
        plan.merge(self.plan_originals(files));
        log_plan("conversions and originals", &plan);
        plan
    }

    /// Phase two: thumbnails and previews.
    pub fn phase_two(&mut self, files: &[MediaFile]) -> Plan {
        let plan = self.plan_resizes(files);
        log_plan("resizes", &plan);
        plan
    }

    /// Web-safe conversions of files browsers cannot show.
    pub fn plan_conversions(&mut self, files: &[MediaFile]) -> Plan {
        let mut plan = Plan::default();
        for file in files.iter().filter(|f| !f.is_web_supported()) {
            let source = self.input.join(&file.path);
            self.plan_artifact(&mut plan, file, ArtifactKind::Conversion, &source);
        }
        plan
    }

    pub fn plan_originals(&mut self, files: &[MediaFile]) -> Plan {
        let mut plan = Plan::default();
        for file in files {
            let source = self.input.join(&file.path);
            self.plan_artifact(&mut plan, file, ArtifactKind::Original, &source);
        }
        plan
    }

    /// Thumbnail, small and large, rendered from the conversion when the
    /// source is not web-safe.
    pub fn plan_resizes(&mut self, files: &[MediaFile]) -> Plan {
        let mut plan = Plan::default();
        for file in files {
            let source = file.render_source(self.input, self.output);
            for kind in [ArtifactKind::Small, ArtifactKind::Large, ArtifactKind::Thumbnail] {
                self.plan_artifact(&mut plan, file, kind, &source);
            }
        }
        plan
    }

    fn plan_artifact(
        &mut self,
        plan: &mut Plan,
        file: &MediaFile,
        kind: ArtifactKind,
        source: &Path,
    ) {
        let Some(artifact) = file.output.get(&kind) else {
            return;
        };
        // No action means nothing to produce or record.
        let Some(action) = action_for(artifact.rel, file, self.sizes) else {
            return;
        };
        let dest = self.output.join(&artifact.path);
        let dest_date = modified_date(&dest);
        let write_back = WriteBack {
            file_path: file.path.clone(),
            artifact: kind,
            path: artifact.path.clone(),
        };
        tracing::debug!(
            "comparing {} ({}) and {} ({})",
            file.path,
            file.date,
            artifact.path,
            dest_date
        );
        if file.date > dest_date || file.modified || file.added || !file.processed {
            if !self.planned.insert(dest.clone()) {
                tracing::debug!("{} already planned, dropping duplicate", artifact.path);
                return;
            }
            let relocate = match (kind, self.relocate) {
                (ArtifactKind::Conversion, Some(root)) => Some(root.join(&artifact.path)),
                _ => None,
            };
            plan.source_files.insert(file.path.clone());
            plan.jobs.push(Job {
                source: source.to_path_buf(),
                dest,
                action,
                rel: artifact.rel,
                write_back,
                relocate,
            });
        } else if dest_date != 0 {
            plan.existing.push(write_back);
        }
    }
}

fn log_plan(phase: &str, plan: &Plan) {
    tracing::info!(
        source_files = plan.source_files.len(),
        jobs = plan.jobs.len(),
        existing = plan.existing.len(),
        "calculated {phase}"
    );
}

/// Destination mtime in epoch milliseconds, 0 when missing.
fn modified_date(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(epoch_millis)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::OutputOptions;
    use crate::config::{OriginalMode, PreviewMode};
    use crate::model::RunState;
    use crate::test_helpers::{media_file, set_mtime};
    use std::fs;
    use tempfile::TempDir;

    /// A file that is neither new nor modified in this run.
    fn settled(path: &str, date: i64) -> MediaFile {
        let mut file = media_file(path, 10, date);
        file.added = false;
        file.modified = false;
        file.processed = true;
        file
    }

    fn touch(root: &Path, rel: &str, mtime_ms: i64) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"x").unwrap();
        set_mtime(&path, mtime_ms);
    }

    fn dests(plan: &Plan, output: &Path) -> Vec<String> {
        plan.jobs
            .iter()
            .map(|j| j.dest.strip_prefix(output).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    // =========================================================================
    // Staleness
    // =========================================================================

    #[test]
    fn new_files_always_get_jobs() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        let config = BuildConfig::default();
        let mut planner = JobPlanner::new(&input, &output, &config);

        let plan = planner.phase_two(&[media_file("2020/a.jpg", 10, 5)]);
        assert_eq!(
            dests(&plan, &output),
            vec![
                "media/small/2020/a.jpg",
                "media/large/2020/a.jpg",
                "media/thumb/2020/a.jpg"
            ]
        );
        assert_eq!(plan.source_files.len(), 1);
        assert!(plan.existing.is_empty());
    }

    #[test]
    fn newer_artifact_means_no_job_and_path_is_recorded() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        touch(&output, "media/small/a.jpg", 2_000_000);
        let config = BuildConfig::default();
        let mut planner = JobPlanner::new(&input, &output, &config);

        let plan = planner.plan_resizes(&[settled("a.jpg", 1_000_000)]);
        assert!(!dests(&plan, &output).contains(&"media/small/a.jpg".to_string()));
        assert_eq!(
            plan.existing,
            vec![WriteBack {
                file_path: "a.jpg".into(),
                artifact: ArtifactKind::Small,
                path: "media/small/a.jpg".into(),
            }]
        );
    }

    #[test]
    fn older_artifact_means_exactly_one_job() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        for dir in ["small", "large", "thumb"] {
            touch(&output, &format!("media/{dir}/a.jpg"), 3_000_000);
        }
        touch(&output, "media/small/a.jpg", 1_000_000);
        let config = BuildConfig::default();
        let mut planner = JobPlanner::new(&input, &output, &config);

        let plan = planner.plan_resizes(&[settled("a.jpg", 2_000_000)]);
        assert_eq!(dests(&plan, &output), vec!["media/small/a.jpg"]);
        assert_eq!(plan.existing.len(), 2);
    }

    #[test]
    fn modified_flag_forces_a_job() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        touch(&output, "media/thumb/a.jpg", 9_000_000);
        let config = BuildConfig::default();
        let mut planner = JobPlanner::new(&input, &output, &config);

        let mut file = settled("a.jpg", 1_000_000);
        file.modified = true;
        let plan = planner.plan_resizes(&[file]);
        assert!(dests(&plan, &output).contains(&"media/thumb/a.jpg".to_string()));
    }

    #[test]
    fn unprocessed_file_is_retried_even_with_fresh_artifacts() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        touch(&output, "media/thumb/a.jpg", 9_000_000);
        let config = BuildConfig::default();
        let mut planner = JobPlanner::new(&input, &output, &config);

        let mut file = settled("a.jpg", 1_000_000);
        file.processed = false;
        let plan = planner.plan_resizes(&[file]);
        assert!(dests(&plan, &output).contains(&"media/thumb/a.jpg".to_string()));
        assert!(plan.existing.is_empty());
    }

    // =========================================================================
    // Phases and sources
    // =========================================================================

    #[test]
    fn resizes_read_from_conversion_when_not_web_safe() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        let config = BuildConfig::default();
        let mut planner = JobPlanner::new(&input, &output, &config);

        let heic = media_file("trip/b.heic", 10, 5);
        let first = planner.phase_one(std::slice::from_ref(&heic));
        assert_eq!(
            dests(&first, &output),
            vec!["media/converted/trip/b.jpg", "media/original/trip/b.heic"]
        );
        assert_eq!(first.jobs[0].source, input.join("trip/b.heic"));

        let second = planner.phase_two(&[heic]);
        assert!(
            second
                .jobs
                .iter()
                .all(|j| j.source == output.join("media/converted/trip/b.jpg"))
        );
    }

    #[test]
    fn web_safe_files_have_no_conversion_job() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        let config = BuildConfig::default();
        let mut planner = JobPlanner::new(&input, &output, &config);

        let plan = planner.plan_conversions(&[media_file("a.jpg", 10, 5)]);
        assert!(plan.jobs.is_empty());
    }

    #[test]
    fn link_relationships_plan_nothing() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        let mut config = BuildConfig::default();
        config.output.original = OriginalMode::Link;
        config.output.link_prefix = Some("https://cdn.example.com".into());
        let mut planner = JobPlanner::new(&input, &output, &config);

        let file = MediaFile::new(
            1,
            "a.jpg",
            media_file("a.jpg", 10, 5).meta,
            10,
            RunState {
                added: true,
                ..RunState::default()
            },
            &OutputOptions::from(&config.output),
        );
        let plan = planner.plan_originals(&[file]);
        assert!(plan.jobs.is_empty());
        assert!(plan.existing.is_empty());
    }

    #[test]
    fn relocation_only_applies_to_conversions() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        let archive = tmp.path().join("archive");
        let mut config = BuildConfig::default();
        config.output.relocate_converted = Some(archive.clone());
        let mut planner = JobPlanner::new(&input, &output, &config);

        let plan = planner.phase_one(&[media_file("b.heic", 10, 5)]);
        assert_eq!(
            plan.jobs[0].relocate,
            Some(archive.join("media/converted/b.jpg"))
        );
        assert_eq!(plan.jobs[1].relocate, None);
    }

    // =========================================================================
    // De-duplication
    // =========================================================================

    #[test]
    fn duplicate_destinations_keep_the_first_job() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        let config = BuildConfig::default();
        let mut planner = JobPlanner::new(&input, &output, &config);

        // Both convert to media/converted/b.jpg.
        let plan = planner.plan_conversions(&[
            media_file("b.heic", 10, 5),
            media_file("b.tif", 20, 5),
        ]);
        assert_eq!(plan.jobs.len(), 1);
        assert_eq!(plan.jobs[0].source, input.join("b.heic"));
        assert_eq!(plan.source_files.len(), 1);
    }

    #[test]
    fn de_duplication_spans_phases() {
        let tmp = TempDir::new().unwrap();
        let (input, output) = (tmp.path().join("in"), tmp.path().join("out"));
        let mut config = BuildConfig::default();
        config.output.photo_preview = PreviewMode::Copy;
        let mut planner = JobPlanner::new(&input, &output, &config);

        let file = MediaFile::new(
            1,
            "a.jpg",
            media_file("a.jpg", 10, 5).meta,
            10,
            RunState {
                added: true,
                ..RunState::default()
            },
            &OutputOptions::from(&config.output),
        );
        // The copied large preview and the symlinked original share a path.
        let first = planner.phase_one(std::slice::from_ref(&file));
        assert_eq!(dests(&first, &output), vec!["media/original/a.jpg"]);
        assert_eq!(first.jobs[0].action, Action::Symlink);

        let second = planner.phase_two(&[file]);
        assert_eq!(
            dests(&second, &output),
            vec!["media/small/a.jpg", "media/thumb/a.jpg"]
        );
    }
}
