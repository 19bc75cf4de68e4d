//! Ordered dependency accumulation
//!
//! Lists keep discovery order and never re-sort: a human reading DIRDEPS can
//! map each entry back to the point in the capture that produced it.

use std::collections::HashSet;

/// Deduplicated list of tokens in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyList {
    items: Vec<String>,
    index: HashSet<String>,
}

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `token` unless already present; returns true if it was added
    pub fn add(&mut self, token: &str) -> bool {
        if self.index.contains(token) {
            return false;
        }
        self.index.insert(token.to_string());
        self.items.push(token.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }
}

/// Raw or resolved paths that need no further classification
#[derive(Debug, Clone, Default)]
pub struct SeenSet(HashSet<String>);

impl SeenSet {
    pub fn insert(&mut self, path: &str) {
        if !self.0.contains(path) {
            self.0.insert(path.to_string());
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Everything discovered so far
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    /// Object-tree tokens (DIRDEPS)
    pub obj_deps: DependencyList,
    /// Source-tree directories (SRC_DIRDEPS)
    pub src_deps: DependencyList,
    /// Individual files, when per-file tracking is on
    pub file_deps: DependencyList,
    pub seen: SeenSet,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.obj_deps.clear();
        self.src_deps.clear();
        self.file_deps.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_keeps_first_seen_order() {
        let mut list = DependencyList::new();
        assert!(list.add("lib/libc"));
        assert!(list.add("include"));
        assert!(!list.add("lib/libc"));
        assert!(list.add("bin/sh"));
        assert_eq!(list.as_slice(), ["lib/libc", "include", "bin/sh"]);
    }

    #[test]
    fn test_clear_empties_list_and_index() {
        let mut list = DependencyList::new();
        list.add("z");
        list.add("a");
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["z", "a"]);
        list.clear();
        assert!(list.is_empty());
        assert!(list.add("z"));
    }

    #[test]
    fn test_seen_set_membership() {
        let mut seen = SeenSet::default();
        seen.insert("/src/foo");
        seen.insert("/src/foo");
        assert!(seen.contains("/src/foo"));
        assert!(!seen.contains("/src"));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_dependencies_clear() {
        let mut deps = Dependencies::new();
        deps.obj_deps.add("lib/libc");
        deps.src_deps.add("bin/cat");
        deps.file_deps.add("include/stdio.h");
        deps.seen.insert("/x");
        deps.clear();
        assert!(deps.obj_deps.is_empty());
        assert!(deps.src_deps.is_empty());
        assert!(deps.file_deps.is_empty());
        assert!(deps.seen.is_empty());
    }
}
