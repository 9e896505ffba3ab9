/// Scanner module: builds item trees from a handler's sources.
///
/// A [`ScanOrchestrator`] wraps one handler and owns its scan lifecycle:
/// at most one background scan at a time, cooperative cancellation, and
/// progress counters that any thread can poll. The scan thread walks the
/// root [`DirectorySource`] with [`build_tree`], recalculates the finished
/// tree once, and hands it back through the [`ScanHandle`].
pub mod progress;
pub mod source;

pub use progress::{ProgressCounters, ScanProgress};
pub use source::DirectorySource;

use crate::aggregation::{Aggregator, Recalc};
use crate::config::EngineConfig;
use crate::error::{ScanError, SeedError, SourceError};
use crate::filter::FilterSet;
use crate::handlers::{Seed, TreeHandler};
use crate::model::{ItemTree, NodeIndex, SharedTree};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Initial node capacity of a fresh scan tree.
const INITIAL_NODE_CAPACITY: usize = 4_096;

/// Shared cancellation flag, checked after each item and before each
/// container.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Cancellation and progress handed to a handler when it opens a scan root,
/// for sources that do bulk work before their first listing.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    pub cancel: CancelToken,
    pub counters: Arc<ProgressCounters>,
}

/// What a tree build needs besides the tree and the source.
pub struct BuildContext {
    pub cancel: CancelToken,
    pub counters: Arc<ProgressCounters>,
    /// Where skipped containers are reported, if anywhere.
    pub progress: Option<Sender<ScanProgress>>,
    /// Maximum number of error messages to queue. Errors beyond it are
    /// still logged and counted.
    pub error_slots: usize,
}

impl BuildContext {
    /// A context with no progress channel.
    pub fn detached(cancel: CancelToken) -> Self {
        Self {
            cancel,
            counters: Arc::new(ProgressCounters::new()),
            progress: None,
            error_slots: 0,
        }
    }
}

/// Result of [`build_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildSummary {
    pub error_count: u64,
    pub cancelled: bool,
}

struct Pending {
    /// `None` for the source that fills the starting node itself.
    parent: Option<NodeIndex>,
    source: Box<dyn DirectorySource>,
}

/// Fill `root` from `source` and everything below it.
///
/// Containers are visited depth first in the order their parents list them.
/// A container that cannot be listed is reported and skipped; the rest of
/// the tree is still built. On cancellation the partial tree is left as is.
pub fn build_tree(
    tree: &mut ItemTree,
    root: NodeIndex,
    source: Box<dyn DirectorySource>,
    ctx: &BuildContext,
) -> BuildSummary {
    let mut summary = BuildSummary::default();
    let mut sent_errors = 0usize;
    let mut stack = vec![Pending { parent: None, source }];

    'walk: while let Some(Pending { parent, source }) = stack.pop() {
        if ctx.cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let node = match parent {
            Some(p) => tree.add_child(p, source.name(), source.full_path()),
            None => root,
        };
        ctx.counters.set_label(source.full_path());

        match source.list_items() {
            Ok(items) => {
                for item in items {
                    let units = source.units_of(&item);
                    let key = tree.unique_content_key(node, item.name());
                    if key != item.name() {
                        debug!(path = item.full_path(), key = %key, "duplicate item name");
                    }
                    if let Err(err) = tree.add_content(node, key, item) {
                        warn!(error = %err, "item dropped");
                    }
                    ctx.counters.add_units(units);

                    if ctx.cancel.is_cancelled() {
                        summary.cancelled = true;
                        break 'walk;
                    }
                }
            }
            Err(err) => report(ctx, source.as_ref(), &err, &mut summary, &mut sent_errors),
        }

        match source.list_children() {
            Ok(children) => stack.extend(children.into_iter().rev().map(|child| Pending {
                parent: Some(node),
                source: child,
            })),
            Err(err) => report(ctx, source.as_ref(), &err, &mut summary, &mut sent_errors),
        }
    }

    summary
}

fn report(
    ctx: &BuildContext,
    source: &dyn DirectorySource,
    err: &SourceError,
    summary: &mut BuildSummary,
    sent_errors: &mut usize,
) {
    warn!(path = source.full_path(), error = %err, "skipping unreadable container");
    summary.error_count += 1;
    if let Some(tx) = &ctx.progress {
        if *sent_errors < ctx.error_slots
            && tx
                .try_send(ScanProgress::Error {
                    path: source.full_path().to_string(),
                    message: err.to_string(),
                })
                .is_ok()
        {
            *sent_errors += 1;
        }
    }
}

/// The finished (or cancelled) scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub tree: ItemTree,
    pub cancelled: bool,
    pub duration: Duration,
    pub error_count: u64,
    /// Units counted by the time the scan stopped.
    pub units: u64,
}

/// Handle to a running scan.
pub struct ScanHandle {
    /// Skipped containers, then exactly one `Complete` or `Cancelled`.
    pub progress_rx: Receiver<ScanProgress>,
    cancel: CancelToken,
    thread: thread::JoinHandle<ScanOutcome>,
}

impl ScanHandle {
    /// Request the scan to stop as soon as possible.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the scan thread and take its tree.
    pub fn join(self) -> Result<ScanOutcome, ScanError> {
        self.thread.join().map_err(|_| ScanError::WorkerPanicked)
    }
}

/// Clears the active flag when the scan ends, however it ends.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Scan lifecycle for one handler.
pub struct ScanOrchestrator {
    handler: Arc<dyn TreeHandler>,
    aggregator: Arc<Aggregator>,
    channel_capacity: usize,
    counters: Arc<ProgressCounters>,
    cancel: Mutex<CancelToken>,
    active: Arc<AtomicBool>,
    size_column: RwLock<String>,
    heatmap_column: RwLock<Option<String>>,
}

impl ScanOrchestrator {
    pub fn new(handler: Arc<dyn TreeHandler>, aggregator: Arc<Aggregator>, config: &EngineConfig) -> Self {
        let size_column = handler.default_size_column();
        Self {
            handler,
            aggregator,
            channel_capacity: config.progress_channel_capacity.max(1),
            counters: Arc::new(ProgressCounters::new()),
            cancel: Mutex::new(CancelToken::new()),
            active: Arc::new(AtomicBool::new(false)),
            size_column: RwLock::new(size_column),
            heatmap_column: RwLock::new(None),
        }
    }

    pub fn handler(&self) -> &Arc<dyn TreeHandler> {
        &self.handler
    }

    pub fn validate_seed(&self, seed: &Seed) -> Result<(), SeedError> {
        self.handler.validate_seed(seed)
    }

    /// Validate `seed` and run the handler's pre-scan. On success the size
    /// column is reset to the handler's default, which the pre-scan may have
    /// changed.
    pub fn prepare(&self, seed: &Seed) -> Result<bool, SeedError> {
        self.handler.validate_seed(seed)?;
        if !self.handler.handle_pre_scan(seed)? {
            return Ok(false);
        }
        *self.size_column.write() = self.handler.default_size_column();
        let value_columns = self.handler.value_columns();
        let mut heatmap = self.heatmap_column.write();
        if heatmap.as_ref().is_some_and(|c| !value_columns.contains(c)) {
            *heatmap = None;
        }
        Ok(true)
    }

    pub fn size_column(&self) -> String {
        self.size_column.read().clone()
    }

    pub fn set_size_column(&self, column: impl Into<String>) {
        *self.size_column.write() = column.into();
    }

    pub fn heatmap_column(&self) -> Option<String> {
        self.heatmap_column.read().clone()
    }

    pub fn set_heatmap_column(&self, column: Option<String>) {
        *self.heatmap_column.write() = column.filter(|c| !c.trim().is_empty());
    }

    /// Start scanning `seed` on a background thread.
    ///
    /// Fails immediately if a scan is already running for this handler or
    /// the seed does not validate.
    pub fn start_scan(&self, seed: &Seed, filters: FilterSet) -> Result<ScanHandle, ScanError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScanError::AlreadyScanning(self.handler.display_name().to_string()));
        }
        let guard = ActiveGuard(self.active.clone());

        self.handler.validate_seed(seed)?;
        self.counters.reset();
        let cancel = CancelToken::new();
        *self.cancel.lock() = cancel.clone();
        let source = self.handler.open_root(
            seed,
            &ScanContext {
                cancel: cancel.clone(),
                counters: self.counters.clone(),
            },
        )?;

        let (tx, progress_rx) = crossbeam_channel::bounded(self.channel_capacity);
        let ctx = BuildContext {
            cancel: cancel.clone(),
            counters: self.counters.clone(),
            progress: Some(tx.clone()),
            // One slot stays free for the final message.
            error_slots: self.channel_capacity - 1,
        };
        let aggregator = self.aggregator.clone();
        let size_column = self.size_column();
        let heatmap_column = self.heatmap_column();
        let seed_name = seed.display_name.clone();

        let thread = thread::Builder::new()
            .name("vslice-scanner".into())
            .spawn(move || {
                info!(seed = %seed_name, "scan started");
                let started = Instant::now();

                let mut tree =
                    ItemTree::with_capacity(source.name(), source.full_path(), INITIAL_NODE_CAPACITY);
                let root = tree.root();
                let summary = build_tree(&mut tree, root, source, &ctx);

                let recalc = Recalc::new(&size_column, &filters).with_heatmap(heatmap_column.as_deref());
                aggregator.recalculate(&mut tree, root, &recalc);

                let duration = started.elapsed();
                let units = ctx.counters.units();
                info!(
                    seed = %seed_name,
                    nodes = tree.len(),
                    items = tree.record_count(),
                    errors = summary.error_count,
                    cancelled = summary.cancelled,
                    elapsed = ?duration,
                    "scan finished"
                );

                drop(guard);
                let last = if summary.cancelled {
                    ScanProgress::Cancelled
                } else {
                    ScanProgress::Complete {
                        duration,
                        error_count: summary.error_count,
                    }
                };
                let _ = tx.send(last);

                ScanOutcome {
                    tree,
                    cancelled: summary.cancelled,
                    duration,
                    error_count: summary.error_count,
                    units,
                }
            })
            .map_err(ScanError::Spawn)?;

        Ok(ScanHandle {
            progress_rx,
            cancel,
            thread,
        })
    }

    /// Ask the running scan, if any, to stop.
    pub fn cancel_scan(&self) {
        self.cancel.lock().cancel();
    }

    pub fn is_scanning(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn units_scanned_so_far(&self) -> u64 {
        self.counters.units()
    }

    pub fn current_item_label(&self) -> String {
        self.counters.label()
    }

    /// Recalculate a finished tree with the current columns.
    pub fn recalculate(&self, tree: &SharedTree, filters: &FilterSet) {
        let size_column = self.size_column();
        let heatmap_column = self.heatmap_column();
        let recalc = Recalc::new(&size_column, filters).with_heatmap(heatmap_column.as_deref());
        self.aggregator.recalculate_shared(tree, &recalc);
    }

    /// Format a value of the size column for display.
    pub fn format_value(&self, value: f64, root_total: f64) -> String {
        self.handler.format_value(&self.size_column(), value, root_total)
    }
}
