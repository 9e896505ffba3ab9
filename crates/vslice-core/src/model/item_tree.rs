/// Arena-backed item tree.
///
/// All nodes live in a single `Vec<TreeNode>`. Node 0 is always the scan
/// root. Because sources build top-down, a child is always inserted after
/// its parent, but nothing relies on that: traversals walk `children`.
use super::item_record::ItemRecord;
use super::tree_node::{NodeIndex, TreeNode};
use crate::error::ModelError;
use compact_str::{format_compact, CompactString};

/// The complete tree produced by a scan.
#[derive(Debug, Clone)]
pub struct ItemTree {
    nodes: Vec<TreeNode>,
}

impl ItemTree {
    /// Create a tree holding only its root.
    pub fn new(root_name: impl Into<CompactString>, root_path: impl Into<String>) -> Self {
        Self::with_capacity(root_name, root_path, 1)
    }

    /// Create a tree with pre-allocated node capacity.
    pub fn with_capacity(
        root_name: impl Into<CompactString>,
        root_path: impl Into<String>,
        estimated_nodes: usize,
    ) -> Self {
        let mut nodes = Vec::with_capacity(estimated_nodes.max(1));
        nodes.push(TreeNode::new(root_name, root_path, None, 0));
        Self { nodes }
    }

    /// Index of the scan root.
    #[inline]
    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    /// Append a child node under `parent` and return its index.
    pub fn add_child(
        &mut self,
        parent: NodeIndex,
        name: impl Into<CompactString>,
        full_path: impl Into<String>,
    ) -> NodeIndex {
        let depth = self.nodes[parent.idx()].depth + 1;
        let idx = NodeIndex::new(self.nodes.len());
        self.nodes
            .push(TreeNode::new(name, full_path, Some(parent), depth));
        self.nodes[parent.idx()].children.push(idx);
        idx
    }

    /// Store `record` in `node` under `key`.
    ///
    /// Keys must be unique within a node; a collision is reported instead of
    /// overwriting. Producers resolve collisions with
    /// [`unique_content_key`](Self::unique_content_key).
    pub fn add_content(
        &mut self,
        node: NodeIndex,
        key: impl Into<CompactString>,
        mut record: ItemRecord,
    ) -> Result<(), ModelError> {
        let key = key.into();
        let target = &mut self.nodes[node.idx()];
        if target.content.contains_key(&key) {
            return Err(ModelError::DuplicateContent {
                node_path: target.full_path.clone(),
                name: key.to_string(),
            });
        }
        record.set_path_depth(target.depth);
        target.content.insert(key, record);
        Ok(())
    }

    /// A key for `name` that is not yet used in `node`: the name itself, or
    /// the name with a ` (n)` suffix.
    pub fn unique_content_key(&self, node: NodeIndex, name: &str) -> CompactString {
        let content = &self.nodes[node.idx()].content;
        if !content.contains_key(name) {
            return CompactString::new(name);
        }
        (2u32..)
            .map(|n| format_compact!("{name} ({n})"))
            .find(|candidate| !content.contains_key(candidate))
            .unwrap_or_else(|| CompactString::new(name))
    }

    /// Get the node at `index`.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &TreeNode {
        &self.nodes[index.idx()]
    }

    /// Get the node at `index`, or `None` if it is out of range.
    #[inline]
    pub fn get(&self, index: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(index.idx())
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, index: NodeIndex) -> &mut TreeNode {
        &mut self.nodes[index.idx()]
    }

    /// All nodes in arena order.
    #[inline]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    #[inline]
    pub(crate) fn nodes_mut(&mut self) -> &mut [TreeNode] {
        &mut self.nodes
    }

    /// Direct children of a node in insertion order.
    #[inline]
    pub fn children(&self, parent: NodeIndex) -> &[NodeIndex] {
        &self.nodes[parent.idx()].children
    }

    /// Direct children sorted by total value, largest first.
    pub fn children_sorted_by_total(&self, parent: NodeIndex) -> Vec<NodeIndex> {
        let mut children = self.children(parent).to_vec();
        children.sort_by(|a, b| {
            self.node(*b)
                .stats
                .total_value
                .total_cmp(&self.node(*a).stats.total_value)
        });
        children
    }

    /// Every node of the subtree rooted at `start`, in depth-first preorder.
    ///
    /// A parent always precedes its descendants, so walking the result in
    /// reverse visits children before parents.
    pub fn collect_subtree(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        if self.get(start).is_none() {
            return out;
        }
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            // Reverse so the first child is visited first.
            stack.extend(self.children(idx).iter().rev().copied());
        }
        out
    }

    /// Total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree holds at least its root.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of records across all nodes, ignoring filters.
    pub fn record_count(&self) -> usize {
        self.nodes.iter().map(|n| n.content.len()).sum()
    }
}
