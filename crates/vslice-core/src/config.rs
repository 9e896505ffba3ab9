/// Engine configuration.
///
/// Every field has a default, so an empty JSON object (or no file at all)
/// yields a working configuration.
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum number of progress messages that may queue up in the channel
/// before the scanner blocks on `send`.
pub const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Top-level configuration shared by the scanner, aggregation and handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for the per-node stat pass. `0` means one per CPU.
    pub aggregation_threads: usize,

    /// Bounded capacity of the scan progress channel.
    pub progress_channel_capacity: usize,

    /// Cap on the detail item list returned for a node.
    pub max_detail_items: usize,

    /// A column with more distinct values than this yields no suggestions.
    pub common_values_limit: usize,

    pub file_system: FileSystemOptions,
    pub spreadsheet: SpreadsheetOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregation_threads: 0,
            progress_channel_capacity: DEFAULT_PROGRESS_CHANNEL_CAPACITY,
            max_detail_items: 1_000,
            common_values_limit: 50,
            file_system: FileSystemOptions::default(),
            spreadsheet: SpreadsheetOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolved worker count for the aggregation pool.
    pub fn effective_aggregation_threads(&self) -> usize {
        if self.aggregation_threads == 0 {
            num_cpus::get()
        } else {
            self.aggregation_threads
        }
    }
}

/// Options for the file system handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSystemOptions {
    /// Recurse into symlinked directories. Off by default to avoid cycles.
    pub follow_symlinks: bool,
    /// Include dot-files and dot-directories.
    pub include_hidden: bool,
}

impl Default for FileSystemOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            include_hidden: true,
        }
    }
}

/// Options for the tab-separated spreadsheet handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetOptions {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Column holding the item path. `None` picks the first text column.
    pub path_column: Option<String>,
    /// Preferred size column. `None` uses the item count.
    pub size_column: Option<String>,
    /// Rows sampled to decide which columns are numeric.
    pub sample_rows: usize,
    /// Rows handed to one parallel parse task.
    pub batch_size: usize,
}

impl Default for SpreadsheetOptions {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            path_column: None,
            size_column: None,
            sample_rows: 100_000,
            batch_size: 2_000,
        }
    }
}
