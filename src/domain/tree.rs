use std::collections::{HashMap, HashSet};

use crate::domain::Item;

/// In-memory materialized content tree, keyed by item id.
///
/// Nodes are created as empty placeholders when a parent references them and
/// filled in by [`ItemTree::merge`]. Kids that drop out of a parent's kid
/// list are evicted together with their own subtrees.
#[derive(Debug, Default)]
pub struct ItemTree {
    nodes: HashMap<String, Item>,
}

impl ItemTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get a node, creating an empty placeholder at `level` if missing.
    pub fn get_or_insert(&mut self, id: &str, level: usize) -> &mut Item {
        self.nodes.entry(id.to_string()).or_insert_with(|| {
            let mut item = Item::new(id);
            item.level = level;
            item
        })
    }

    /// Merge a fetched copy of `source` into the tree at `level`.
    ///
    /// Returns the number of kids this node now has.
    pub fn merge(&mut self, source: &Item, level: usize) -> usize {
        let previous_kids: Vec<String> = self
            .nodes
            .get(source.id())
            .map(|item| item.kids().to_vec())
            .unwrap_or_default();

        let node = self.get_or_insert(source.id(), level);
        node.populate_from(source);
        node.level = level;
        let kids = node.kids().to_vec();

        let current: HashSet<&str> = kids.iter().map(String::as_str).collect();
        for gone in previous_kids.iter().filter(|k| !current.contains(k.as_str())) {
            self.evict(gone);
        }
        for kid in &kids {
            self.get_or_insert(kid, level + 1);
        }

        kids.len()
    }

    /// Flag a node whose fetch failed so it is retried on next view.
    pub fn mark_error(&mut self, id: &str, level: usize, message: impl Into<String>) {
        let node = self.get_or_insert(id, level);
        node.fetch_error = Some(message.into());
    }

    /// Remove a node and everything below it.
    pub fn evict(&mut self, id: &str) -> usize {
        let mut removed = 0;
        let mut pending = vec![id.to_string()];
        while let Some(next) = pending.pop() {
            if let Some(item) = self.nodes.remove(&next) {
                removed += 1;
                pending.extend(item.kids().iter().cloned());
            }
        }
        removed
    }

    /// Direct kids of `id` that are present in the tree, in API order.
    pub fn kids_of(&self, id: &str) -> Vec<&Item> {
        self.nodes
            .get(id)
            .map(|item| {
                item.kids()
                    .iter()
                    .filter_map(|kid| self.nodes.get(kid))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Depth-first listing of the subtree under `root`, skipping the
    /// descendants of collapsed nodes.
    pub fn flatten(&self, root: &str) -> Vec<&Item> {
        let mut out = Vec::new();
        let mut stack: Vec<&Item> = self.kids_of(root).into_iter().rev().collect();
        while let Some(item) = stack.pop() {
            out.push(item);
            if !item.local().collapsed {
                stack.extend(self.kids_of(item.id()).into_iter().rev());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RemoteFields;

    fn fetched(id: &str, kids: &[&str]) -> Item {
        let mut item = Item::new(id);
        item.populate(RemoteFields {
            kids: kids.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        });
        item
    }

    #[test]
    fn test_merge_creates_kid_placeholders() {
        let mut tree = ItemTree::new();
        let count = tree.merge(&fetched("1", &["2", "3"]), 0);

        assert_eq!(count, 2);
        assert_eq!(tree.len(), 3);
        let kid = tree.get("2").unwrap();
        assert!(!kid.is_populated());
        assert_eq!(kid.level, 1);
    }

    #[test]
    fn test_merge_is_idempotent_on_structure() {
        let mut tree = ItemTree::new();
        tree.merge(&fetched("1", &["2"]), 0);
        tree.merge(&fetched("1", &["2"]), 0);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get("1").unwrap().revision(), 2);
    }

    #[test]
    fn test_merge_evicts_removed_subtrees() {
        let mut tree = ItemTree::new();
        tree.merge(&fetched("1", &["2", "3"]), 0);
        tree.merge(&fetched("2", &["4"]), 1);
        assert!(tree.contains("4"));

        tree.merge(&fetched("1", &["3"]), 0);
        assert!(!tree.contains("2"));
        assert!(!tree.contains("4"));
        assert!(tree.contains("3"));
    }

    #[test]
    fn test_merge_keeps_local_state_in_tree() {
        let mut tree = ItemTree::new();
        tree.merge(&fetched("1", &[]), 0);
        tree.get_mut("1").unwrap().set_favorite(true);

        tree.merge(&fetched("1", &["2"]), 0);
        assert!(tree.get("1").unwrap().local().favorite);
    }

    #[test]
    fn test_flatten_respects_collapse() {
        let mut tree = ItemTree::new();
        tree.merge(&fetched("1", &["2", "5"]), 0);
        tree.merge(&fetched("2", &["3"]), 1);
        tree.merge(&fetched("3", &[]), 2);
        tree.merge(&fetched("5", &[]), 1);

        let ids: Vec<&str> = tree.flatten("1").iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["2", "3", "5"]);

        tree.get_mut("2").unwrap().set_collapsed(true);
        let ids: Vec<&str> = tree.flatten("1").iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["2", "5"]);
    }

    #[test]
    fn test_mark_error_flags_placeholder() {
        let mut tree = ItemTree::new();
        tree.mark_error("9", 2, "timed out");
        let node = tree.get("9").unwrap();
        assert_eq!(node.fetch_error.as_deref(), Some("timed out"));
        assert!(node.needs_fetch());
    }
}
