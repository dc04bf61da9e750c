//! Index vs. disk comparison.

use std::collections::BTreeMap;

/// Classification of every path seen in the index or on disk.
///
/// Each list is sorted, and the four lists are pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaResult {
    pub unchanged: Vec<String>,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub deleted: Vec<String>,
}

impl DeltaResult {
    /// Whether `path` still exists on disk this run.
    pub fn is_live(&self, path: &str) -> bool {
        [&self.unchanged, &self.added, &self.modified]
            .iter()
            .any(|set| contains(set, path))
    }

    pub fn is_added(&self, path: &str) -> bool {
        contains(&self.added, path)
    }

    pub fn is_modified(&self, path: &str) -> bool {
        contains(&self.modified, path)
    }

    /// Paths that need fresh metadata: added then modified, merged in order.
    pub fn to_process(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .added
            .iter()
            .chain(self.modified.iter())
            .cloned()
            .collect();
        paths.sort();
        paths
    }
}

fn contains(sorted: &[String], path: &str) -> bool {
    sorted
        .binary_search_by(|probe| probe.as_str().cmp(path))
        .is_ok()
}

/// Compare last-seen timestamps from the index with the current disk scan.
pub fn calculate(index: &BTreeMap<String, i64>, disk: &BTreeMap<String, i64>) -> DeltaResult {
    let mut delta = DeltaResult::default();
    for (path, disk_time) in disk {
        match index.get(path) {
            Some(index_time) if index_time == disk_time => delta.unchanged.push(path.clone()),
            Some(_) => delta.modified.push(path.clone()),
            None => delta.added.push(path.clone()),
        }
    }
    delta.deleted = index
        .keys()
        .filter(|path| !disk.contains_key(*path))
        .cloned()
        .collect();
    delta
}
