//! Prefix index from URI paths to the actions reachable under them.
//!
//! Keys are stored in a sorted map; a lookup walks the query from the
//! longest candidate down, so `longest_prefix` matches the longest
//! indexed key that is a string prefix of the query.

use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Identifies an action within a blueprint: group key, resource id,
/// action id. Stable across deep copies, unlike a pointer.
pub(crate) type ActionKey = (Option<String>, String, String);

/// Method buckets of one indexed path prefix, in declaration order.
pub(crate) type MethodBuckets = IndexMap<String, Vec<ActionKey>>;

#[derive(Clone, Debug, Default)]
pub(crate) struct PathTrie {
    paths: BTreeMap<String, MethodBuckets>,
}

impl PathTrie {
    pub(crate) fn insert(&mut self, path: &str, method: &str, key: ActionKey) {
        self.paths
            .entry(path.to_string())
            .or_default()
            .entry(method.to_string())
            .or_default()
            .push(key);
    }

    /// Index every `/`-separated prefix of `uri` (plus the root) under
    /// the given method.
    pub(crate) fn insert_uri(&mut self, uri: &str, method: &str, key: ActionKey) {
        self.insert("/", method, key.clone());
        let mut path = String::new();
        for segment in uri.split('/').filter(|segment| !segment.is_empty()) {
            path.push('/');
            path.push_str(segment);
            self.insert(&path, method, key.clone());
        }
    }

    pub(crate) fn longest_prefix(&self, query: &str) -> Option<&MethodBuckets> {
        let mut boundaries: Vec<usize> = query
            .char_indices()
            .map(|(index, c)| index + c.len_utf8())
            .collect();
        boundaries.reverse();
        boundaries
            .into_iter()
            .find_map(|end| self.paths.get(&query[..end]))
    }

    pub(crate) fn clear(&mut self) {
        self.paths.clear();
    }
}
