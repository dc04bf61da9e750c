//! Per-file failures collected during a build.
//!
//! Nothing in here aborts a run: extraction failures and failed jobs are
//! recorded with the path they concern and shown in the build summary.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    /// Source path relative to the input root, or an output path.
    pub path: String,
    pub error: String,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Problems {
    items: Vec<Problem>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, error: impl fmt::Display) {
        self.items.push(Problem {
            path: path.into(),
            error: error.to_string(),
        });
    }

    pub fn extend(&mut self, other: Problems) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.items.iter()
    }

    /// Distinct paths with at least one problem, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.items.iter().map(|p| p.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_iterate_in_order() {
        let mut problems = Problems::new();
        problems.add("b.jpg", "decode failed");
        problems.add("a.heic", std::io::Error::other("boom"));

        let listed: Vec<String> = problems.iter().map(|p| p.to_string()).collect();
        assert_eq!(listed, vec!["b.jpg: decode failed", "a.heic: boom"]);
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn paths_are_sorted_and_distinct() {
        let mut problems = Problems::new();
        problems.add("b.jpg", "thumbnail");
        problems.add("a.jpg", "small");
        problems.add("b.jpg", "large");
        assert_eq!(problems.paths(), vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn extend_merges() {
        let mut first = Problems::new();
        first.add("a.jpg", "x");
        let mut second = Problems::new();
        second.add("b.jpg", "y");
        first.extend(second);
        assert_eq!(first.len(), 2);
        assert!(!first.is_empty());
    }
}
