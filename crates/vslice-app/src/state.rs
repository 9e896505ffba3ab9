/// Application session state.
///
/// Centralises all mutable state a frontend reads and writes. The scan
/// thread communicates via its progress channel; state updates happen in
/// [`AppState::tick`], which a frontend calls on a fixed interval (the
/// desktop app uses 100 ms). Filter edits do not recalculate immediately:
/// they schedule a recalculation a few ticks later so that typing does not
/// trigger one per keystroke.
use crate::filters::FilterEditor;
use anyhow::{anyhow, bail, Context};
use crossbeam_channel::TryRecvError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use vslice_core::analysis::{common_values, detail_items};
use vslice_core::handlers::DropPayload;
use vslice_core::model::format::format_count;
use vslice_core::model::{ItemTree, NodeIndex, SharedTree};
use vslice_core::{
    Aggregator, EngineConfig, Filter, FilterOperator, FilterSet, HandlerRegistry, ScanHandle, ScanOrchestrator,
    ScanProgress, Seed, TreeHandler,
};

/// The current phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPhase {
    /// No scan has run yet.
    Idle,
    /// A scan is running; progress text is live.
    Scanning,
    /// A tree is available, possibly partial after a cancel.
    Results,
}

/// A row in the flattened outline of the tree.
#[derive(Clone, Debug)]
pub struct VisibleRow {
    pub node_index: NodeIndex,
    /// Nesting depth (0 = root).
    pub depth: u16,
    pub is_expanded: bool,
}

/// One item in the detail listing, detached from the tree lock.
#[derive(Clone, Debug, PartialEq)]
pub struct DetailRow {
    /// Path relative to the listed node.
    pub name: String,
    pub value: f64,
    pub formatted: String,
    /// Heatmap column value, when one is selected.
    pub heatmap_value: Option<f64>,
}

/// Detail listing for one node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetailView {
    pub rows: Vec<DetailRow>,
    pub matched: usize,
    pub has_more: bool,
}

/// Maximum number of scan-progress messages drained per tick.
const MAX_MESSAGES_PER_TICK: usize = 300;

/// Maximum scan errors kept for display.
const MAX_SCAN_ERRORS: usize = 1_000;

/// Ticks between the last filter edit and the recalculation it triggers.
pub const RECALC_DELAY_TICKS: u64 = 5;

/// Maximum entries in the chart back/forward navigation history stacks.
const MAX_NAV_HISTORY: usize = 50;

/// Maximum rows in the outline.
const MAX_VISIBLE_ROWS: usize = 500_000;

const IDLE_STATUS: &str = "Drop a folder or .tsv file, type a location, or pick a seed to scan";

/// All session state.
pub struct AppState {
    config: EngineConfig,
    orchestrators: Vec<ScanOrchestrator>,

    // ── Seeds ──────────────────────────────────────────
    pub seeds: Vec<Seed>,
    pub selected_seed: Option<usize>,
    pub manual_location: String,

    // ── Scan ───────────────────────────────────────────
    pub phase: AppPhase,
    current: Option<usize>,
    scan_handle: Option<ScanHandle>,
    pub scan_location: String,
    pub scan_error_count: u64,
    pub scan_errors: Vec<(String, String)>,
    pub scan_duration: Option<Duration>,
    /// True if the most recent scan was cancelled (partial results).
    pub scan_was_cancelled: bool,
    pub status_text: String,

    // ── Results ────────────────────────────────────────
    tree: Option<SharedTree>,
    pub visible_rows: Vec<VisibleRow>,
    pub selected_node: Option<NodeIndex>,

    // ── Chart navigation ───────────────────────────────
    /// The node currently shown at the centre of the chart.
    pub chart_root: Option<NodeIndex>,
    pub chart_back: Vec<NodeIndex>,
    pub chart_forward: Vec<NodeIndex>,

    // ── Filters ────────────────────────────────────────
    filters: FilterEditor,
    pub suggested_values: Vec<String>,
    tick_count: u64,
    recalc_at: Option<u64>,
}

impl AppState {
    /// Session over the built-in handlers.
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let handlers = HandlerRegistry::with_builtin().instantiate(&config);
        Self::with_handlers(config, handlers)
    }

    /// Session over an explicit handler list, in seed order.
    pub fn with_handlers(config: EngineConfig, handlers: Vec<Arc<dyn TreeHandler>>) -> anyhow::Result<Self> {
        let aggregator = Arc::new(
            Aggregator::from_config(&config).context("failed to build the aggregation thread pool")?,
        );
        let seeds: Vec<Seed> = handlers.iter().flat_map(|h| h.default_seeds()).collect();
        let orchestrators = handlers
            .into_iter()
            .map(|h| ScanOrchestrator::new(h, aggregator.clone(), &config))
            .collect();
        let selected_seed = if seeds.is_empty() { None } else { Some(0) };

        Ok(Self {
            config,
            orchestrators,
            seeds,
            selected_seed,
            manual_location: String::new(),
            phase: AppPhase::Idle,
            current: None,
            scan_handle: None,
            scan_location: String::new(),
            scan_error_count: 0,
            scan_errors: Vec::new(),
            scan_duration: None,
            scan_was_cancelled: false,
            status_text: IDLE_STATUS.to_string(),
            tree: None,
            visible_rows: Vec::new(),
            selected_node: None,
            chart_root: None,
            chart_back: Vec::new(),
            chart_forward: Vec::new(),
            filters: FilterEditor::new(),
            suggested_values: Vec::new(),
            tick_count: 0,
            recalc_at: None,
        })
    }

    /// Orchestrator of the handler in use, if a scan has been started.
    pub fn current_orchestrator(&self) -> Option<&ScanOrchestrator> {
        self.current.map(|i| &self.orchestrators[i])
    }

    /// The finished tree, if any.
    pub fn tree(&self) -> Option<&SharedTree> {
        self.tree.as_ref()
    }

    // ── Scan lifecycle ─────────────────────────────────

    /// Scan `seed`. Returns `Ok(false)` if the handler's pre-scan declined.
    pub fn spawn_scan(&mut self, seed: Seed) -> anyhow::Result<bool> {
        if self.phase == AppPhase::Scanning {
            bail!("Another scan is already in progress");
        }
        let index = self
            .orchestrators
            .iter()
            .position(|o| o.handler().kind() == seed.kind)
            .ok_or_else(|| anyhow!("no handler for {} seeds", seed.kind))?;

        // The displayed tree keeps its handler until the new scan is running.
        let orch = &self.orchestrators[index];
        if !orch.prepare(&seed)? {
            return Ok(false);
        }
        let handle = orch
            .start_scan(&seed, self.filters.snapshot())
            .with_context(|| format!("failed to start scanning {seed}"))?;
        info!(seed = %seed, "scan requested");

        self.current = Some(index);
        self.reset_results();
        self.phase = AppPhase::Scanning;
        self.scan_location = seed.display_name.clone();
        self.scan_handle = Some(handle);
        Ok(true)
    }

    /// Scan the seed picked from [`seeds`](Self::seeds).
    pub fn spawn_selected_scan(&mut self) -> anyhow::Result<bool> {
        let seed = self
            .selected_seed
            .and_then(|i| self.seeds.get(i))
            .cloned()
            .ok_or_else(|| anyhow!("no seed selected"))?;
        self.spawn_scan(seed)
    }

    /// Scan the typed location with the first handler that understands it.
    pub fn spawn_manual_scan(&mut self) -> anyhow::Result<bool> {
        let location = self.manual_location.trim().to_string();
        let seed = self
            .orchestrators
            .iter()
            .find_map(|o| o.handler().try_resolve_location(&location))
            .ok_or_else(|| anyhow!("Could not find a handler for this location: {location}"))?;
        self.spawn_scan(seed)
    }

    /// Scan a drop with the first handler that understands it. A new drop
    /// starts with no filters. Returns `Ok(false)` if nothing handled it.
    pub fn try_drop(&mut self, payload: &DropPayload) -> anyhow::Result<bool> {
        let Some(seed) = self
            .orchestrators
            .iter()
            .find_map(|o| o.handler().try_resolve_drop(payload))
        else {
            return Ok(false);
        };
        self.filters.clear_all();
        self.spawn_scan(seed)
    }

    /// Ask the running scan to stop. Partial results arrive on a later tick.
    pub fn cancel_scan(&mut self) {
        if let Some(handle) = &self.scan_handle {
            handle.cancel();
        }
    }

    fn reset_results(&mut self) {
        self.scan_error_count = 0;
        self.scan_errors.clear();
        self.scan_duration = None;
        self.scan_was_cancelled = false;
        self.tree = None;
        self.visible_rows.clear();
        self.selected_node = None;
        self.chart_root = None;
        self.chart_back.clear();
        self.chart_forward.clear();
        self.suggested_values.clear();
    }

    /// Advance the session clock: drain scan progress, refresh the status
    /// text, and run a due recalculation. Returns `true` if anything a
    /// frontend shows may have changed.
    pub fn tick(&mut self) -> bool {
        self.tick_count += 1;
        let mut changed = self.process_scan_messages();

        if self.recalc_at.is_some_and(|at| self.tick_count >= at) {
            self.recalc_at = None;
            self.recalculate_now();
            changed = true;
        }

        if self.phase == AppPhase::Scanning {
            let progress = self.current_orchestrator().map(|orch| {
                format!(
                    "Scan progress: {}\n{}",
                    format_count(orch.units_scanned_so_far()),
                    orch.current_item_label()
                )
            });
            if let Some(progress) = progress {
                self.status_text = progress;
                changed = true;
            }
        }
        changed
    }

    /// Drain pending scan progress messages.
    ///
    /// Capped at [`MAX_MESSAGES_PER_TICK`] messages per call so a backlog
    /// cannot stall the caller.
    pub fn process_scan_messages(&mut self) -> bool {
        let Some(handle) = &self.scan_handle else {
            return false;
        };

        let mut changed = false;
        let mut finished = false;
        for _ in 0..MAX_MESSAGES_PER_TICK {
            let msg = match handle.progress_rx.try_recv() {
                Ok(msg) => msg,
                Err(TryRecvError::Empty) => break,
                // The worker exited without a final message; join reports why.
                Err(TryRecvError::Disconnected) => {
                    finished = true;
                    break;
                }
            };
            changed = true;
            match msg {
                ScanProgress::Error { path, message } => {
                    self.scan_error_count += 1;
                    if self.scan_errors.len() < MAX_SCAN_ERRORS {
                        self.scan_errors.push((path, message));
                    }
                }
                ScanProgress::Complete { duration, error_count } => {
                    self.scan_error_count = error_count;
                    self.scan_duration = Some(duration);
                    finished = true;
                    break;
                }
                ScanProgress::Cancelled => {
                    self.scan_was_cancelled = true;
                    finished = true;
                    break;
                }
            }
        }

        if finished {
            self.finish_scan();
        }
        changed
    }

    fn finish_scan(&mut self) {
        self.phase = AppPhase::Results;
        let Some(handle) = self.scan_handle.take() else {
            return;
        };
        match handle.join() {
            Ok(outcome) => {
                self.scan_duration.get_or_insert(outcome.duration);
                self.build_initial_visible_rows(&outcome.tree);
                self.chart_root = Some(outcome.tree.root());
                self.tree = Some(Arc::new(Mutex::new(outcome.tree)));
                self.status_text = format!(
                    "{}{}",
                    self.scan_location,
                    if self.scan_was_cancelled { " (cancelled)" } else { "" }
                );
                // Filters may have changed while the scan ran.
                self.request_recalculation();
            }
            Err(err) => {
                self.status_text = format!("Scan failed: {err}");
            }
        }
    }

    // ── Columns ────────────────────────────────────────

    pub fn value_columns(&self) -> Vec<String> {
        self.current_orchestrator()
            .map(|o| o.handler().value_columns())
            .unwrap_or_default()
    }

    /// Columns offered for the heatmap: the value columns except the one
    /// driving sizes.
    pub fn heatmap_columns(&self) -> Vec<String> {
        let selected = self.selected_value_column();
        self.value_columns()
            .into_iter()
            .filter(|c| Some(c) != selected.as_ref())
            .collect()
    }

    pub fn all_columns(&self) -> Vec<String> {
        self.current_orchestrator()
            .map(|o| o.handler().all_columns())
            .unwrap_or_default()
    }

    pub fn selected_value_column(&self) -> Option<String> {
        self.current_orchestrator().map(ScanOrchestrator::size_column)
    }

    pub fn selected_heatmap_column(&self) -> Option<String> {
        self.current_orchestrator().and_then(ScanOrchestrator::heatmap_column)
    }

    /// Change the size column and recalculate right away.
    pub fn set_value_column(&mut self, column: &str) {
        let Some(orch) = self.current_orchestrator() else {
            return;
        };
        orch.set_size_column(column);
        self.recalculate_now();
    }

    /// Change the heatmap column and recalculate right away.
    pub fn set_heatmap_column(&mut self, column: Option<String>) {
        let Some(orch) = self.current_orchestrator() else {
            return;
        };
        orch.set_heatmap_column(column);
        self.recalculate_now();
    }

    // ── Filters ────────────────────────────────────────

    pub fn filters(&self) -> &FilterEditor {
        &self.filters
    }

    /// Every filter in effect, current one first.
    pub fn filter_snapshot(&self) -> FilterSet {
        self.filters.snapshot()
    }

    /// Select the column of the current filter and refresh the value
    /// suggestions for it.
    pub fn set_filter_column(&mut self, column: Option<String>) {
        let is_value = column
            .as_ref()
            .is_some_and(|c| self.value_columns().contains(c));
        self.suggested_values = match (&column, &self.tree) {
            (Some(c), Some(tree)) => {
                let tree = tree.lock();
                common_values(&tree, tree.root(), c, self.config.common_values_limit)
            }
            _ => Vec::new(),
        };
        self.filters.set_column(column, is_value);
        self.request_recalculation();
    }

    pub fn set_filter_operator(&mut self, operator: FilterOperator) {
        self.filters.set_operator(operator);
        self.request_recalculation();
    }

    pub fn set_filter_text(&mut self, text: &str) {
        self.filters.set_text(text);
        self.request_recalculation();
    }

    pub fn set_filter_case_sensitive(&mut self, yes: bool) {
        self.filters.set_case_sensitive(yes);
        self.request_recalculation();
    }

    /// Store the current filter if it is valid.
    pub fn remember_filter(&mut self) -> bool {
        self.filters.remember()
    }

    /// Store a complete filter, such as one parsed from text.
    pub fn add_filter(&mut self, filter: Filter) -> bool {
        let added = self.filters.add(filter);
        if added {
            self.request_recalculation();
        }
        added
    }

    /// Discard the current filter and recalculate right away.
    pub fn clear_current_filter(&mut self) {
        self.filters.reset_current();
        self.recalculate_now();
    }

    pub fn delete_filter(&mut self, id: u32) {
        if self.filters.delete(id) {
            self.request_recalculation();
        }
    }

    /// Hide a node's subtree with a stored path filter.
    pub fn exclude(&mut self, node: NodeIndex) {
        let Some(path) = self
            .tree
            .as_ref()
            .and_then(|t| t.lock().get(node).map(|n| n.full_path.clone()))
        else {
            return;
        };
        self.filters.exclude_path(&path);
        self.request_recalculation();
    }

    // ── Recalculation ──────────────────────────────────

    /// Schedule a recalculation [`RECALC_DELAY_TICKS`] ticks from now. A
    /// later request pushes the deadline back.
    pub fn request_recalculation(&mut self) {
        self.recalc_at = Some(self.tick_count + RECALC_DELAY_TICKS);
    }

    /// Whether a scheduled recalculation has not run yet.
    pub fn recalculation_pending(&self) -> bool {
        self.recalc_at.is_some()
    }

    pub fn recalculate_now(&mut self) {
        let (Some(orch), Some(tree)) = (self.current_orchestrator(), &self.tree) else {
            return;
        };
        debug!("recalculating");
        orch.recalculate(tree, &self.filters.snapshot());
    }

    // ── Display ────────────────────────────────────────

    /// Formatted total and path of `node`, as shown on hover.
    pub fn describe_node(&self, node: NodeIndex) -> Option<(String, String)> {
        let orch = self.current_orchestrator()?;
        let tree = self.tree.as_ref()?.lock();
        let n = tree.get(node)?;
        let root_total = tree.node(tree.root()).stats.total_value;
        Some((orch.format_value(n.stats.total_value, root_total), n.full_path.clone()))
    }

    /// Filtered items of `node`, largest first.
    pub fn details(&self, node: NodeIndex, include_descendants: bool) -> DetailView {
        let (Some(orch), Some(tree)) = (self.current_orchestrator(), &self.tree) else {
            return DetailView::default();
        };
        let tree = tree.lock();
        let value_column = orch.size_column();
        let heatmap_column = orch.heatmap_column();
        let root_total = tree.node(tree.root()).stats.total_value;
        let listing = detail_items(
            &tree,
            node,
            &value_column,
            &self.filters.snapshot(),
            include_descendants,
            self.config.max_detail_items,
        );
        DetailView {
            rows: listing
                .items
                .iter()
                .map(|item| DetailRow {
                    name: item.relative_name.clone(),
                    value: item.value,
                    formatted: orch.format_value(item.value, root_total),
                    heatmap_value: heatmap_column.as_deref().map(|c| item.record.value(c)),
                })
                .collect(),
            matched: listing.matched,
            has_more: listing.has_more,
        }
    }

    // ── Outline ────────────────────────────────────────

    /// Expand the root and list its children, largest first.
    fn build_initial_visible_rows(&mut self, tree: &ItemTree) {
        self.visible_rows.clear();
        let root = tree.root();
        self.visible_rows.push(VisibleRow {
            node_index: root,
            depth: 0,
            is_expanded: true,
        });
        for child in tree.children_sorted_by_total(root) {
            if self.visible_rows.len() >= MAX_VISIBLE_ROWS {
                break;
            }
            self.visible_rows.push(VisibleRow {
                node_index: child,
                depth: 1,
                is_expanded: false,
            });
        }
    }

    /// Toggle expansion of the row at `row_index`.
    pub fn toggle_expand(&mut self, row_index: usize) {
        if let Some(tree) = &self.tree {
            let tree = tree.lock();
            toggle_expand_inner(&mut self.visible_rows, row_index, &tree);
        }
    }

    /// Expand every ancestor of `target` so it appears in the outline.
    pub fn reveal_node(&mut self, target: NodeIndex) {
        let Some(tree) = self.tree.clone() else {
            return;
        };
        let tree = tree.lock();
        if tree.get(target).is_none() || self.visible_rows.iter().any(|r| r.node_index == target) {
            return;
        }

        let mut ancestors = Vec::new();
        let mut cursor = target;
        while let Some(p) = tree.node(cursor).parent {
            ancestors.push(p);
            cursor = p;
        }
        ancestors.reverse();

        for ancestor in ancestors {
            if let Some(row) = self.visible_rows.iter().position(|r| r.node_index == ancestor) {
                if !self.visible_rows[row].is_expanded {
                    toggle_expand_inner(&mut self.visible_rows, row, &tree);
                }
            }
        }
    }

    // ── Chart navigation ───────────────────────────────

    /// Centre the chart on `node`, pushing the current centre onto the back
    /// stack.
    pub fn chart_navigate_to(&mut self, node: NodeIndex) {
        if let Some(cur) = self.chart_root {
            if cur != node {
                push_capped(&mut self.chart_back, cur);
            }
        }
        self.chart_forward.clear();
        self.chart_root = Some(node);
    }

    pub fn chart_go_back(&mut self) {
        if let Some(prev) = self.chart_back.pop() {
            if let Some(cur) = self.chart_root {
                push_capped(&mut self.chart_forward, cur);
            }
            self.chart_root = Some(prev);
        }
    }

    pub fn chart_go_forward(&mut self) {
        if let Some(next) = self.chart_forward.pop() {
            if let Some(cur) = self.chart_root {
                push_capped(&mut self.chart_back, cur);
            }
            self.chart_root = Some(next);
        }
    }

    /// Centre the chart on the parent of the current centre.
    pub fn chart_go_up(&mut self) {
        let Some(root) = self.chart_root else {
            return;
        };
        let parent = self
            .tree
            .as_ref()
            .and_then(|t| t.lock().get(root).and_then(|n| n.parent));
        if let Some(parent) = parent {
            push_capped(&mut self.chart_back, root);
            self.chart_forward.clear();
            self.chart_root = Some(parent);
        }
    }
}

/// Push onto a history stack, evicting the oldest entry at capacity.
fn push_capped(stack: &mut Vec<NodeIndex>, node: NodeIndex) {
    if stack.len() >= MAX_NAV_HISTORY {
        stack.remove(0);
    }
    stack.push(node);
}

/// Toggle-expand implementation operating on the rows directly, so the
/// tree lock and the rows can be borrowed at the same time.
fn toggle_expand_inner(visible_rows: &mut Vec<VisibleRow>, row_index: usize, tree: &ItemTree) {
    let Some(row) = visible_rows.get(row_index) else {
        return;
    };
    if tree.children(row.node_index).is_empty() {
        return;
    }

    if row.is_expanded {
        // Collapse: remove the consecutive deeper rows that follow.
        let parent_depth = row.depth;
        let remove_start = row_index + 1;
        let remove_end = visible_rows[remove_start..]
            .iter()
            .position(|r| r.depth <= parent_depth)
            .map_or(visible_rows.len(), |p| remove_start + p);
        visible_rows.drain(remove_start..remove_end);
        visible_rows[row_index].is_expanded = false;
    } else {
        let child_depth = row.depth + 1;
        let headroom = MAX_VISIBLE_ROWS.saturating_sub(visible_rows.len());
        let new_rows: Vec<VisibleRow> = tree
            .children_sorted_by_total(row.node_index)
            .into_iter()
            .take(headroom)
            .map(|node_index| VisibleRow {
                node_index,
                depth: child_depth,
                is_expanded: false,
            })
            .collect();
        let insert_pos = row_index + 1;
        visible_rows.splice(insert_pos..insert_pos, new_rows);
        visible_rows[row_index].is_expanded = true;
    }
}

/// Nodes currently shown expanded.
pub fn expanded_nodes(rows: &[VisibleRow]) -> HashSet<NodeIndex> {
    rows.iter()
        .filter(|r| r.is_expanded)
        .map(|r| r.node_index)
        .collect()
}
