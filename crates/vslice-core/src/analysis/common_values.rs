/// Distinct text values of a column, used as filter suggestions.
use crate::model::{ItemTree, NodeIndex};
use std::collections::{HashSet, VecDeque};

/// Distinct non-blank values of `column` across the subtree of `start`.
///
/// Values are de-duplicated ignoring case (the first spelling seen wins) and
/// sorted ignoring case. A column with more than `limit` distinct values is
/// not a useful suggestion list, so an empty list is returned instead.
pub fn common_values(tree: &ItemTree, start: NodeIndex, column: &str, limit: usize) -> Vec<String> {
    if tree.get(start).is_none() {
        return Vec::new();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut values: Vec<String> = Vec::new();
    let mut queue = VecDeque::from([start]);

    while let Some(idx) = queue.pop_front() {
        queue.extend(tree.children(idx).iter().copied());
        for item in tree.node(idx).content.values() {
            let Some(text) = item.text(column) else {
                continue;
            };
            if text.trim().is_empty() || !seen.insert(text.to_lowercase()) {
                continue;
            }
            values.push(text.into_owned());
            if values.len() > limit {
                return Vec::new();
            }
        }
    }

    values.sort_by_cached_key(|v| (v.to_lowercase(), v.clone()));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnLayout, ItemRecord};
    use std::sync::Arc;

    fn tree_with(kinds: &[&str]) -> ItemTree {
        let layout = Arc::new(ColumnLayout::new(["Size"], ["Kind"]));
        let mut tree = ItemTree::new("root", "root");
        let child = tree.add_child(tree.root(), "sub", "root/sub");
        for (i, kind) in kinds.iter().enumerate() {
            let node = if i % 2 == 0 { tree.root() } else { child };
            let mut r = ItemRecord::new(format!("f{i}"), format!("root/f{i}"), layout.clone());
            r.set_value("Kind", *kind).unwrap();
            tree.add_content(node, format!("f{i}"), r).unwrap();
        }
        tree
    }

    #[test]
    fn distinct_sorted_ignoring_case() {
        let tree = tree_with(&["beta", "Alpha", "BETA", " ", "gamma", "alpha"]);
        let values = common_values(&tree, tree.root(), "Kind", 50);
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].to_lowercase(), "alpha");
        assert_eq!(values[1].to_lowercase(), "beta");
        assert_eq!(values[2], "gamma");
    }

    #[test]
    fn too_many_values_yield_nothing() {
        let kinds: Vec<String> = (0..10).map(|i| format!("k{i}")).collect();
        let refs: Vec<&str> = kinds.iter().map(String::as_str).collect();
        let tree = tree_with(&refs);
        assert!(common_values(&tree, tree.root(), "Kind", 5).is_empty());
        assert_eq!(common_values(&tree, tree.root(), "Kind", 10).len(), 10);
    }

    #[test]
    fn unknown_column_or_node_is_empty() {
        let tree = tree_with(&["a"]);
        assert!(common_values(&tree, tree.root(), "Nope", 50).is_empty());
        assert!(common_values(&tree, NodeIndex(9), "Kind", 50).is_empty());
    }
}
