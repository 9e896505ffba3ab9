/// A single level of the scanned hierarchy.
///
/// Nodes are stored in a flat `Vec<TreeNode>` arena owned by
/// [`ItemTree`](super::ItemTree). Parent-child relationships use indices
/// rather than pointers, so the back-reference to the parent can never form
/// an ownership cycle.
use super::item_record::ItemRecord;
use compact_str::CompactString;
use std::collections::HashMap;

/// Lightweight index into the arena `Vec<TreeNode>`.
///
/// Uses `u32` to keep indices small, up to ~4 billion nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Cached statistics written by a recalculation.
///
/// Only meaningful immediately after
/// [`Aggregator::recalculate`](crate::aggregation::Aggregator::recalculate);
/// the values are stale (or partially summed) while one is running.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeStats {
    /// Sum of the magnitudes of this node's own counted items.
    pub content_value: f64,
    /// `content_value` plus every child's `total_value`.
    pub total_value: f64,
    /// Sum of this node's own items' heatmap column values.
    pub heatmap_content_value: f64,
    /// `heatmap_content_value` plus every child's `heatmap_total_value`.
    pub heatmap_total_value: f64,
    /// Items directly in this node that passed the filters.
    pub local_item_count: u64,
    /// `local_item_count` plus every child's `total_item_count`.
    pub total_item_count: u64,
    /// Relative hotness, 0 (coldest) to 99 (hottest). `None` when no
    /// heatmap column is selected.
    pub heatmap_bucket: Option<u8>,
}

/// One directory, registry key, mail folder or path prefix.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Display name of this level only.
    pub name: CompactString,

    /// Full path as reported by the source.
    pub full_path: String,

    /// Items directly inside this node, keyed by a name unique within the node.
    pub content: HashMap<CompactString, ItemRecord>,

    /// Child nodes in insertion order.
    pub children: Vec<NodeIndex>,

    /// Index of the parent node. `None` for the scan root.
    pub parent: Option<NodeIndex>,

    /// Distance from the scan root (root = 0).
    pub depth: u32,

    /// Aggregates from the last recalculation.
    pub stats: NodeStats,
}

impl TreeNode {
    /// Create an empty node.
    pub fn new(
        name: impl Into<CompactString>,
        full_path: impl Into<String>,
        parent: Option<NodeIndex>,
        depth: u32,
    ) -> Self {
        Self {
            name: name.into(),
            full_path: full_path.into(),
            content: HashMap::new(),
            children: Vec::new(),
            parent,
            depth,
            stats: NodeStats::default(),
        }
    }

    /// Returns `true` if the node holds neither items nor children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.content.is_empty()
    }
}
