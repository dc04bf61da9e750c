//! Build filter: drops likely copies and Live Photo companion videos.
//!
//! Copies are found without reading file contents. Within a group of files of
//! identical byte size, sorted by extension-stripped path, a later file is a
//! copy of an earlier one when its extension-stripped path contains the
//! earlier one's, and both share the extension and the logical date:
//!
//! ```text
//! 2020/photo.jpg            kept
//! 2020/photo.jpg__copy.jpg  duplicate
//! 2020/photo (1).jpg        duplicate
//! ```
//!
//! Each earlier file claims at most one unclaimed later file. A claimed file
//! can still claim files after it, so chains of copies collapse to the first.
//! Distinct photos that happen to be prefixes of each other (`IMG_1` and
//! `IMG_10`) with the same size and date are misclassified; this is accepted.
//!
//! The filter never touches the index. Callers mark [`FilterResult::cleanup`]
//! unprocessed.

use crate::model::MediaFile;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
pub struct FilterResult {
    /// Files that go on to planning.
    pub files: Vec<MediaFile>,
    /// Files left out of this build: duplicates and Live Photo videos.
    pub cleanup: Vec<MediaFile>,
    /// Paths detected as copies of another file.
    pub duplicates: BTreeSet<String>,
}

pub fn run(files: Vec<MediaFile>) -> FilterResult {
    let duplicates = find_duplicates(&files);
    let mut result = FilterResult {
        duplicates,
        ..FilterResult::default()
    };
    for file in files {
        if file.meta.live_photo || result.duplicates.contains(&file.path) {
            result.cleanup.push(file);
        } else {
            result.files.push(file);
        }
    }
    tracing::info!(
        kept = result.files.len(),
        duplicates = result.duplicates.len(),
        dropped = result.cleanup.len(),
        "filtered files"
    );
    result
}

/// Paths of files that look like copies of another file in `files`.
pub fn find_duplicates(files: &[MediaFile]) -> BTreeSet<String> {
    let mut by_size: BTreeMap<u64, Vec<&MediaFile>> = BTreeMap::new();
    for file in files {
        by_size.entry(file.size).or_default().push(file);
    }

    let mut duplicates = BTreeSet::new();
    for (size, mut group) in by_size {
        if size == 0 || group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| {
            a.path_no_extension()
                .cmp(b.path_no_extension())
                .then_with(|| a.path.cmp(&b.path))
        });
        let mut claimed = vec![false; group.len()];
        for i in 0..group.len() {
            let earlier = group[i];
            let found = (i + 1..group.len())
                .find(|&j| !claimed[j] && is_copy_of(group[j], earlier));
            if let Some(j) = found {
                claimed[j] = true;
                tracing::debug!("{} looks like a copy of {}", group[j].path, earlier.path);
                duplicates.insert(group[j].path.clone());
            }
        }
    }
    duplicates
}

fn is_copy_of(later: &MediaFile, earlier: &MediaFile) -> bool {
    later.path_no_extension().contains(earlier.path_no_extension())
        && later.extension == earlier.extension
        && later.date == earlier.date
}
