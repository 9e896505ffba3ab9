/// Error types for the vSlice core.
///
/// Filter evaluation and recalculation never fail, so there is no error type
/// for them. Parsing a filter expression, building a tree, validating a seed,
/// enumerating a source, running a scan and loading configuration each get
/// their own small enum here.
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while constructing the tree or its records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A content key is already taken in the target node.
    #[error("duplicate content '{name}' in '{node_path}'")]
    DuplicateContent { node_path: String, name: String },

    /// The record's layout has no column with this name.
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Standard columns are computed, never stored.
    #[error("column '{0}' is computed and cannot be set")]
    ReadOnlyColumn(String),
}

/// A textual filter expression that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("unknown filter operator '{0}'")]
    UnknownOperator(String),

    /// Expected `<column> <operator> <text>`.
    #[error("malformed filter expression '{0}'")]
    Malformed(String),
}

/// A seed that a handler cannot scan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeedError {
    #[error("directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("file does not exist: {0}")]
    FileNotFound(PathBuf),

    #[error("cannot read {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("{0}")]
    Unsupported(String),

    #[error("handler unavailable: {0}")]
    HandlerUnavailable(String),

    #[error("seed '{seed}' belongs to the {expected} handler")]
    WrongHandler { seed: String, expected: String },
}

/// A handler factory that could not build its handler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} handler failed to initialise: {message}")]
pub struct HandlerInitError {
    pub kind: String,
    pub message: String,
}

/// A failure enumerating one container of a source.
///
/// Cloneable so that a source can cache a failed listing and hand the same
/// error back on every repeated call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("access denied: {path}")]
    AccessDenied { path: String },

    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed data in {path}: {message}")]
    Malformed { path: String, message: String },
}

impl SourceError {
    /// Classify an I/O error for `path`.
    pub fn from_io(path: impl Into<String>, err: &std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            Self::AccessDenied { path }
        } else {
            Self::Io {
                path,
                message: err.to_string(),
            }
        }
    }
}

/// Errors from the scan lifecycle.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Starting a scan while one is active is a usage error.
    #[error("a scan is already in progress for the {0} handler")]
    AlreadyScanning(String),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to spawn scanner thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("scanner thread panicked")]
    WorkerPanicked,

    #[error("failed to build aggregation thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
