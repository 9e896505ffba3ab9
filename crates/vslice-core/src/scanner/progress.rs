/// Scan progress reporting.
///
/// Two channels of information leave the scan thread:
///
/// - [`ProgressCounters`]: the running unit count and the label of the
///   container being read, written by the scan thread and polled by anyone.
/// - [`ScanProgress`]: discrete events (skipped subtree, completion,
///   cancellation) sent over a bounded crossbeam channel.
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Discrete events sent from the scan thread.
///
/// The finished tree travels through the scan thread's join handle; these
/// messages carry only status.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanProgress {
    /// A container could not be read and was skipped.
    Error { path: String, message: String },
    /// The tree is built and recalculated.
    Complete { duration: Duration, error_count: u64 },
    /// The scan stopped early on request. The partial tree is still
    /// recalculated and returned.
    Cancelled,
}

/// Counters shared between the scan thread and pollers.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    units: AtomicU64,
    label: Mutex<String>,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Units processed so far (bytes for files, rows for spreadsheets).
    #[inline]
    pub fn units(&self) -> u64 {
        self.units.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn add_units(&self, n: u64) {
        self.units.fetch_add(n, Ordering::Relaxed);
    }

    /// Path of the container the scanner is reading.
    pub fn label(&self) -> String {
        self.label.lock().clone()
    }

    pub fn set_label(&self, label: &str) {
        let mut guard = self.label.lock();
        guard.clear();
        guard.push_str(label);
    }

    pub(crate) fn reset(&self) {
        self.units.store(0, Ordering::Relaxed);
        self.label.lock().clear();
    }
}
