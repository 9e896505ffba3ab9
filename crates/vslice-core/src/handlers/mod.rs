/// Tree handlers: one per data domain.
///
/// A handler knows how to find seeds for its domain, validate them, and open
/// the root [`DirectorySource`] a scan walks. Scan lifecycle state (the active
/// flag, cancellation, progress, selected columns) lives in the
/// [`ScanOrchestrator`](crate::scanner::ScanOrchestrator) wrapping the
/// handler, so handlers themselves are shared immutably.
pub mod broken;
pub mod filesystem;
pub mod registry;
pub mod spreadsheet;

pub use broken::BrokenHandler;
pub use filesystem::FileSystemHandler;
pub use registry::{HandlerFactory, HandlerRegistry};
pub use spreadsheet::SpreadsheetHandler;

use crate::error::{ScanError, SeedError};
use crate::model::format::UnitScale;
use crate::model::ColumnLayout;
use crate::scanner::{DirectorySource, ScanContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Data domains with a built-in handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    FileSystem,
    Spreadsheet,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [Self::FileSystem, Self::Spreadsheet];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileSystem => "File System",
            Self::Spreadsheet => "Spreadsheet",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque token identifying the root of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Seed {
    /// Handler-specific identity, usually a path.
    pub id: String,
    pub display_name: String,
    /// Handler the seed belongs to.
    pub kind: SourceKind,
}

impl Seed {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            kind,
        }
    }

    /// Seed whose id and display name are both `path`.
    pub fn from_path(path: &std::path::Path, kind: SourceKind) -> Self {
        let id = path.to_string_lossy().into_owned();
        Self::new(id.clone(), id, kind)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Something dropped onto the application window.
#[derive(Debug, Clone, Default)]
pub struct DropPayload {
    pub paths: Vec<PathBuf>,
    pub text: Option<String>,
}

/// A pluggable data domain.
pub trait TreeHandler: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Name shown in seed pickers.
    fn display_name(&self) -> &str {
        self.kind().as_str()
    }

    /// Stored columns of the records this handler produces.
    fn columns(&self) -> Arc<ColumnLayout>;

    /// Columns that can drive sizes and heatmaps.
    fn value_columns(&self) -> Vec<String> {
        self.columns().value_columns()
    }

    /// Every column a detail view can show.
    fn all_columns(&self) -> Vec<String> {
        self.columns().all_columns()
    }

    fn path_column(&self) -> String {
        self.columns().path_column().to_string()
    }

    /// Size column selected when the handler is first used.
    fn default_size_column(&self) -> String;

    /// Seeds offered before the user picks a location. At least one, so the
    /// handler always shows up in pickers.
    fn default_seeds(&self) -> Vec<Seed>;

    /// Describe why `seed` cannot be scanned, if it cannot.
    fn validate_seed(&self, seed: &Seed) -> Result<(), SeedError>;

    /// Turn a typed location into a seed if this handler understands it.
    fn try_resolve_location(&self, location: &str) -> Option<Seed>;

    /// Turn a drop into a seed if this handler understands it.
    fn try_resolve_drop(&self, payload: &DropPayload) -> Option<Seed> {
        payload
            .paths
            .first()
            .and_then(|p| p.to_str())
            .or(payload.text.as_deref())
            .and_then(|location| self.try_resolve_location(location.trim()))
    }

    /// Prepare for scanning `seed`. `Ok(false)` means the scan should not
    /// proceed.
    fn handle_pre_scan(&self, _seed: &Seed) -> Result<bool, SeedError> {
        Ok(true)
    }

    /// Open the root container for a validated seed. `ctx` carries the
    /// scan's cancellation flag and progress counters.
    fn open_root(&self, seed: &Seed, ctx: &ScanContext) -> Result<Box<dyn DirectorySource>, ScanError>;

    /// Format a value of `column` for display, scaled to a tree whose root
    /// totals `root_total`.
    fn format_value(&self, _column: &str, value: f64, root_total: f64) -> String {
        UnitScale::for_total(root_total).format(value)
    }
}

/// Check that `seed` was produced for `handler`.
pub(crate) fn ensure_kind(handler: &dyn TreeHandler, seed: &Seed) -> Result<(), SeedError> {
    if seed.kind == handler.kind() {
        Ok(())
    } else {
        Err(SeedError::WrongHandler {
            seed: seed.display_name.clone(),
            expected: seed.kind.to_string(),
        })
    }
}
