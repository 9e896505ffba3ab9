/// Filtered, value-sorted item listings for a selected node.
///
/// Backs the detail table: the items of one node (or its whole subtree)
/// that pass the active filters, largest first.
use crate::filter::FilterSet;
use crate::model::{ItemRecord, ItemTree, NodeIndex};
use std::collections::VecDeque;

/// One row of a detail listing.
#[derive(Debug, Clone)]
pub struct DetailItem<'a> {
    /// Node holding the item.
    pub node: NodeIndex,
    pub record: &'a ItemRecord,
    /// Magnitude of the value column.
    pub value: f64,
    /// Path relative to the listed node.
    pub relative_name: String,
}

/// Result of [`detail_items`].
#[derive(Debug, Clone, Default)]
pub struct NodeDetails<'a> {
    /// At most `max_items` rows, largest value first.
    pub items: Vec<DetailItem<'a>>,
    /// Rows that passed the filters before capping.
    pub matched: usize,
    /// `true` when the listing does not show every counted item of the
    /// subtree, so asking for descendants (or a larger cap) shows more.
    pub has_more: bool,
}

/// List the items of `node` that pass `filters`, largest first.
///
/// With `include_descendants` the whole subtree is visited breadth first.
/// Returns an empty listing for an unknown node or a node whose total value
/// is zero.
pub fn detail_items<'a>(
    tree: &'a ItemTree,
    node: NodeIndex,
    value_column: &str,
    filters: &FilterSet,
    include_descendants: bool,
    max_items: usize,
) -> NodeDetails<'a> {
    let Some(start) = tree.get(node) else {
        return NodeDetails::default();
    };
    if start.stats.total_value <= 0.0 {
        return NodeDetails::default();
    }

    let mut items = Vec::new();
    let mut queue = VecDeque::from([node]);
    while let Some(idx) = queue.pop_front() {
        for record in tree.node(idx).content.values() {
            if filters.allows(record) {
                items.push(DetailItem {
                    node: idx,
                    record,
                    value: record.value(value_column),
                    relative_name: relative_name(&start.full_path, record),
                });
            }
        }
        if !include_descendants {
            break;
        }
        queue.extend(tree.children(idx).iter().copied());
    }

    let matched = items.len();
    let by_value_desc = |a: &DetailItem<'_>, b: &DetailItem<'_>| b.value.total_cmp(&a.value);

    // Partial sort: O(n) select + O(k log k) sort of the top k.
    if max_items == 0 {
        items.clear();
    } else if items.len() > max_items {
        items.select_nth_unstable_by(max_items - 1, by_value_desc);
        items.truncate(max_items);
    }
    items.sort_unstable_by(by_value_desc);

    let has_more = (items.len() as u64) < start.stats.total_item_count;
    NodeDetails {
        items,
        matched,
        has_more,
    }
}

fn relative_name(base: &str, record: &ItemRecord) -> String {
    record
        .full_path()
        .strip_prefix(base)
        .map(|rest| rest.trim_start_matches(['/', '\\']))
        .filter(|rest| !rest.is_empty())
        .unwrap_or_else(|| record.name())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{Aggregator, Recalc};
    use crate::filter::{Filter, FilterOperator};
    use crate::model::ColumnLayout;
    use std::sync::Arc;

    fn tree() -> ItemTree {
        let layout = Arc::new(ColumnLayout::new(["Size"], ["Kind"]));
        let mut tree = ItemTree::new("root", "/data");
        let root = tree.root();
        let sub = tree.add_child(root, "sub", "/data/sub");
        for (node, name, size, kind) in [
            (root, "a.txt", 5.0, "text"),
            (root, "b.bin", 50.0, "binary"),
            (sub, "c.txt", 500.0, "text"),
            (sub, "d.txt", 1.0, "text"),
        ] {
            let base = tree.node(node).full_path.clone();
            let mut r = ItemRecord::new(name, format!("{base}/{name}"), layout.clone());
            r.set_value("Size", size).unwrap();
            r.set_value("Kind", kind).unwrap();
            tree.add_content(node, name, r).unwrap();
        }
        let filters = FilterSet::default();
        Aggregator::global().recalculate(&mut tree, root, &Recalc::new("Size", &filters));
        tree
    }

    #[test]
    fn own_items_sorted_descending() {
        let tree = tree();
        let details = detail_items(&tree, tree.root(), "Size", &FilterSet::default(), false, 100);
        let names: Vec<_> = details.items.iter().map(|d| d.relative_name.as_str()).collect();
        assert_eq!(names, vec!["b.bin", "a.txt"]);
        assert!(details.has_more);
    }

    #[test]
    fn descendants_are_included_and_capped() {
        let tree = tree();
        let details = detail_items(&tree, tree.root(), "Size", &FilterSet::default(), true, 2);
        assert_eq!(details.matched, 4);
        let names: Vec<_> = details.items.iter().map(|d| d.relative_name.as_str()).collect();
        assert_eq!(names, vec!["sub/c.txt", "b.bin"]);
    }

    #[test]
    fn filters_apply() {
        let tree = tree();
        let filters = FilterSet::new(vec![Filter::on("Kind", FilterOperator::EqualTo, "text")]);
        let details = detail_items(&tree, tree.root(), "Size", &filters, true, 100);
        assert_eq!(details.matched, 3);
        assert!(details.items.iter().all(|d| d.record.text("Kind").as_deref() == Some("text")));
    }

    #[test]
    fn zero_cap_and_unknown_node() {
        let tree = tree();
        assert!(detail_items(&tree, tree.root(), "Size", &FilterSet::default(), true, 0)
            .items
            .is_empty());
        assert!(detail_items(&tree, NodeIndex(77), "Size", &FilterSet::default(), true, 10)
            .items
            .is_empty());
    }
}
