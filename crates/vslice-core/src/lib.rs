/// vSlice Core: hierarchical aggregation, filtering, heatmaps and scanning.
///
/// This crate contains all business logic with zero UI dependencies.
/// It is designed to be reusable across different frontends (GUI, CLI, TUI).
///
/// # Modules
///
/// - [`model`]: Arena-allocated item tree, columnar records and formatting.
/// - [`filter`]: Fail-open item filters and immutable filter sets.
/// - [`aggregation`]: Filtered recalculation of node totals and heatmap buckets.
/// - [`scanner`]: Background tree building with progress and cancellation.
/// - [`handlers`]: Data domains (file system, spreadsheet) and their registry.
/// - [`analysis`]: Post-scan queries: detail items and common column values.
/// - [`config`]: Engine configuration loaded from JSON.
/// - [`error`]: Error types.
pub mod aggregation;
pub mod analysis;
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod model;
pub mod scanner;

pub use aggregation::{Aggregator, Recalc};
pub use config::EngineConfig;
pub use filter::{Filter, FilterOperator, FilterSet};
pub use handlers::{HandlerRegistry, Seed, SourceKind, TreeHandler};
pub use model::{ItemRecord, ItemTree, NodeIndex, SharedTree};
pub use scanner::{CancelToken, ScanContext, ScanHandle, ScanOrchestrator, ScanOutcome, ScanProgress};
