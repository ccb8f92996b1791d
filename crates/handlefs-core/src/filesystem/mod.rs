pub mod mutation;
pub mod query;
pub mod resolver;
pub mod search;
pub mod stats;
pub mod tree;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::ignore::IgnoreFilter;

/// Boxed future for the recursive walks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One directory level: entry name → subtree or leaf path.
///
/// Serializes as a plain JSON object, e.g. `{"a": {"b.txt": "a/b.txt"}}`.
/// Keys are kept in byte order, so two builds of the same directory
/// always serialize identically regardless of host enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeNode {
    entries: BTreeMap<String, TreeEntry>,
}

/// A tree entry: a leaf holding the file's full relative path, or a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeEntry {
    File(String),
    Directory(TreeNode),
}

impl TreeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: TreeEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TreeEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every file leaf path, depth-first in name order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<String>) {
        for entry in self.entries.values() {
            match entry {
                TreeEntry::File(path) => out.push(path.clone()),
                TreeEntry::Directory(sub) => sub.collect_leaves(out),
            }
        }
    }

    /// Whether a file leaf with this path exists anywhere in the tree.
    pub fn contains_leaf(&self, path: &str) -> bool {
        let mut node = self;
        let mut parts = path.split('/').filter(|s| !s.is_empty()).peekable();
        while let Some(part) = parts.next() {
            match (node.entries.get(part), parts.peek()) {
                (Some(TreeEntry::File(leaf)), None) => return leaf == path,
                (Some(TreeEntry::Directory(sub)), Some(_)) => node = sub,
                _ => return false,
            }
        }
        false
    }

    /// Canonical serialized form used for change comparison.
    pub fn canonical(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Per-file metadata, keyed by relative path in a [`StatsMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub last_modified: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

pub type StatsMap = BTreeMap<String, FileStat>;

/// Shared knobs for the recursive walks.
#[derive(Clone, Copy)]
pub struct WalkOptions<'a> {
    pub ignore: &'a IgnoreFilter,
    pub max_depth: usize,
    pub default_content_type: &'a str,
}

/// Join a parent path and an entry name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Final segment of a path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeNode {
        let mut a = TreeNode::new();
        a.insert("b.txt", TreeEntry::File("a/b.txt".into()));
        let mut root = TreeNode::new();
        root.insert("z.md", TreeEntry::File("z.md".into()));
        root.insert("a", TreeEntry::Directory(a));
        root
    }

    #[test]
    fn serializes_as_nested_object() {
        let json = sample().canonical().unwrap();
        assert_eq!(json, r#"{"a":{"b.txt":"a/b.txt"},"z.md":"z.md"}"#);

        let back: TreeNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn leaves_and_lookup() {
        let tree = sample();
        assert_eq!(tree.leaf_paths(), vec!["a/b.txt", "z.md"]);
        assert!(tree.contains_leaf("a/b.txt"));
        assert!(!tree.contains_leaf("a"));
        assert!(!tree.contains_leaf("a/b.txt/c"));
        assert!(!tree.contains_leaf("b.txt"));
    }

    #[test]
    fn stat_field_names() {
        let stat = FileStat {
            size: 2,
            last_modified: 7,
            content_type: "text/plain".into(),
        };
        let v = serde_json::to_value(&stat).unwrap();
        assert_eq!(v["lastModified"], 7);
        assert_eq!(v["type"], "text/plain");
    }

    #[test]
    fn path_helpers() {
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a/b", "c"), "a/b/c");
        assert_eq!(base_name("a/b/c.txt"), "c.txt");
        assert_eq!(base_name("c.txt"), "c.txt");
    }
}
