/// Explicit handler registry.
///
/// Maps each [`SourceKind`] to a factory. Instantiating the registry never
/// fails: a factory error becomes a [`BrokenHandler`] so the failure is
/// visible wherever the handler would have been.
use super::{BrokenHandler, FileSystemHandler, SourceKind, SpreadsheetHandler, TreeHandler};
use crate::config::EngineConfig;
use crate::error::HandlerInitError;
use std::sync::Arc;
use tracing::warn;

/// Builds a handler from the engine configuration.
pub type HandlerFactory = fn(&EngineConfig) -> Result<Arc<dyn TreeHandler>, HandlerInitError>;

#[derive(Default)]
pub struct HandlerRegistry {
    factories: Vec<(SourceKind, HandlerFactory)>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the file system and spreadsheet handlers.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SourceKind::FileSystem, file_system_factory);
        registry.register(SourceKind::Spreadsheet, spreadsheet_factory);
        registry
    }

    /// Add or replace the factory for `kind`.
    pub fn register(&mut self, kind: SourceKind, factory: HandlerFactory) {
        match self.factories.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = factory,
            None => self.factories.push((kind, factory)),
        }
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        self.factories.iter().map(|(k, _)| *k).collect()
    }

    /// Build the handler for `kind`, or `None` if no factory is registered.
    pub fn create(&self, kind: SourceKind, config: &EngineConfig) -> Option<Arc<dyn TreeHandler>> {
        let (_, factory) = self.factories.iter().find(|(k, _)| *k == kind)?;
        Some(build(kind, *factory, config))
    }

    /// Build every registered handler, in registration order.
    pub fn instantiate(&self, config: &EngineConfig) -> Vec<Arc<dyn TreeHandler>> {
        self.factories
            .iter()
            .map(|(kind, factory)| build(*kind, *factory, config))
            .collect()
    }
}

fn file_system_factory(config: &EngineConfig) -> Result<Arc<dyn TreeHandler>, HandlerInitError> {
    Ok(Arc::new(FileSystemHandler::new(config.file_system.clone())))
}

fn spreadsheet_factory(config: &EngineConfig) -> Result<Arc<dyn TreeHandler>, HandlerInitError> {
    Ok(Arc::new(SpreadsheetHandler::new(config.spreadsheet.clone())))
}

fn build(kind: SourceKind, factory: HandlerFactory, config: &EngineConfig) -> Arc<dyn TreeHandler> {
    match factory(config) {
        Ok(handler) => handler,
        Err(err) => {
            warn!(%kind, error = %err, "handler failed to initialise");
            Arc::new(BrokenHandler::new(kind, &err))
        }
    }
}
