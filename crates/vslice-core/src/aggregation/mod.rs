/// Recalculation of node statistics.
///
/// A recalculation runs in three passes over the subtree of one node:
///
/// 1. **Per-node stats** (parallel). Every node resets its aggregates and sums
///    the items that pass the filter set. Nodes are independent here, so the
///    pass runs on a rayon pool over disjoint `&mut` nodes.
/// 2. **Coalesce** (sequential). Walking the preorder node list in reverse
///    visits every child before its parent, so each parent adds finished
///    child totals. O(n), no recursion.
/// 3. **Heatmap** (optional). Buckets by rank of each node's own heatmap sum.
///
/// The tree is taken as `&mut`, so two recalculations of the same tree can
/// never overlap.
pub mod heatmap;

use crate::config::EngineConfig;
use crate::error::ScanError;
use crate::filter::FilterSet;
use crate::model::{ItemTree, NodeIndex, NodeStats, SharedTree, TreeNode};
use rayon::prelude::*;
use std::time::Instant;

pub use heatmap::{bucketize, MAX_BUCKET};

/// Inputs to one recalculation.
#[derive(Debug, Clone, Copy)]
pub struct Recalc<'a> {
    /// Column whose magnitudes become node values.
    pub value_column: &'a str,
    /// Column summed for heatmap ranking. `None` or blank skips bucketing.
    pub heatmap_column: Option<&'a str>,
    pub filters: &'a FilterSet,
}

impl<'a> Recalc<'a> {
    pub fn new(value_column: &'a str, filters: &'a FilterSet) -> Self {
        Self {
            value_column,
            heatmap_column: None,
            filters,
        }
    }

    pub fn with_heatmap(mut self, column: Option<&'a str>) -> Self {
        self.heatmap_column = column;
        self
    }

    fn heatmap(&self) -> Option<&'a str> {
        self.heatmap_column.filter(|c| !c.trim().is_empty())
    }
}

/// Runs recalculations on a dedicated (or the global) rayon pool.
pub struct Aggregator {
    pool: Option<rayon::ThreadPool>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::global()
    }
}

impl Aggregator {
    /// Use rayon's global pool.
    pub fn global() -> Self {
        Self { pool: None }
    }

    /// Build a dedicated pool with `threads` workers.
    pub fn with_threads(threads: usize) -> Result<Self, ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("vslice-aggregate-{i}"))
            .build()?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ScanError> {
        Self::with_threads(config.effective_aggregation_threads())
    }

    /// Recompute the statistics of `start` and every node below it.
    ///
    /// Nodes outside the subtree keep their previous stats. An index that is
    /// not in the tree is a no-op.
    pub fn recalculate(&self, tree: &mut ItemTree, start: NodeIndex, recalc: &Recalc<'_>) {
        let started = Instant::now();
        let subtree = tree.collect_subtree(start);
        if subtree.is_empty() {
            return;
        }

        let mut in_subtree = vec![false; tree.len()];
        for idx in &subtree {
            in_subtree[idx.idx()] = true;
        }

        // Pass 1: independent per-node stats.
        let nodes = tree.nodes_mut();
        let count = |nodes: &mut [TreeNode]| {
            nodes
                .par_iter_mut()
                .enumerate()
                .filter(|(i, _)| in_subtree[*i])
                .for_each(|(_, node)| count_stats(node, recalc));
        };
        match &self.pool {
            Some(pool) => pool.install(|| count(nodes)),
            None => count(nodes),
        }

        // Pass 2: children before parents.
        for &idx in subtree.iter().rev() {
            let (total, heat, items) = tree.children(idx).iter().fold(
                (0.0, 0.0, 0u64),
                |(total, heat, items), &child| {
                    let s = &tree.node(child).stats;
                    (
                        total + s.total_value,
                        heat + s.heatmap_total_value,
                        items + s.total_item_count,
                    )
                },
            );
            let stats = &mut tree.node_mut(idx).stats;
            stats.total_value += total;
            stats.heatmap_total_value += heat;
            stats.total_item_count += items;
        }

        // Pass 3: rank buckets.
        if recalc.heatmap().is_some() {
            let values: Vec<f64> = subtree
                .iter()
                .map(|i| tree.node(*i).stats.heatmap_content_value)
                .collect();
            for (idx, bucket) in subtree.iter().zip(bucketize(&values)) {
                tree.node_mut(*idx).stats.heatmap_bucket = bucket;
            }
        }

        tracing::debug!(
            nodes = subtree.len(),
            value_column = recalc.value_column,
            heatmap_column = recalc.heatmap().unwrap_or(""),
            filters = recalc.filters.len(),
            elapsed = ?started.elapsed(),
            "recalculated"
        );
    }

    /// Lock a shared tree and recalculate from its root.
    ///
    /// The lock is held for the whole recalculation, so readers never observe
    /// half-coalesced totals.
    pub fn recalculate_shared(&self, tree: &SharedTree, recalc: &Recalc<'_>) {
        let mut guard = tree.lock();
        let root = guard.root();
        self.recalculate(&mut guard, root, recalc);
    }
}

/// Reset a node and sum its own items that pass the filters.
fn count_stats(node: &mut TreeNode, recalc: &Recalc<'_>) {
    let heatmap_column = recalc.heatmap();
    let mut stats = NodeStats::default();

    for item in node.content.values() {
        if !recalc.filters.allows(item) {
            continue;
        }
        stats.content_value += item.value(recalc.value_column).abs();
        if let Some(column) = heatmap_column {
            stats.heatmap_content_value += item.value(column);
        }
        stats.local_item_count += 1;
    }

    stats.total_value = stats.content_value;
    stats.heatmap_total_value = stats.heatmap_content_value;
    stats.total_item_count = stats.local_item_count;
    node.stats = stats;
}
