/// Placeholder for a handler whose factory failed.
///
/// It keeps the failure visible: the handler still offers a seed, and every
/// attempt to use that seed reports why the handler is unavailable.
use super::{Seed, SourceKind, TreeHandler};
use crate::error::{HandlerInitError, ScanError, SeedError};
use crate::model::{standard, ColumnLayout};
use crate::scanner::{DirectorySource, ScanContext};
use std::sync::Arc;

pub struct BrokenHandler {
    kind: SourceKind,
    name: String,
    reason: String,
    columns: Arc<ColumnLayout>,
}

impl BrokenHandler {
    pub fn new(kind: SourceKind, error: &HandlerInitError) -> Self {
        Self {
            kind,
            name: format!("{kind} (unavailable)"),
            reason: error.to_string(),
            columns: Arc::new(ColumnLayout::new([] as [&str; 0], [] as [&str; 0])),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl TreeHandler for BrokenHandler {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Arc<ColumnLayout> {
        self.columns.clone()
    }

    fn default_size_column(&self) -> String {
        standard::ITEM_COUNT.to_string()
    }

    fn default_seeds(&self) -> Vec<Seed> {
        vec![Seed::new(self.name.clone(), self.name.clone(), self.kind)]
    }

    fn validate_seed(&self, _seed: &Seed) -> Result<(), SeedError> {
        Err(SeedError::HandlerUnavailable(self.reason.clone()))
    }

    fn try_resolve_location(&self, _location: &str) -> Option<Seed> {
        None
    }

    fn open_root(&self, seed: &Seed, _ctx: &ScanContext) -> Result<Box<dyn DirectorySource>, ScanError> {
        self.validate_seed(seed)?;
        Err(SeedError::HandlerUnavailable(self.reason.clone()).into())
    }
}
