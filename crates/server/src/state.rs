use crate::resources::{CatalogError, ResourceCatalog};
use crate::tools::ToolDispatcher;
use hlmcp_core::{BridgeExecutor, Config};
use std::sync::Arc;

/// Shared state handed to every request handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub executor: Arc<dyn BridgeExecutor>,
    pub resources: ResourceCatalog,
    pub tools: ToolDispatcher,
}

impl AppState {
    pub fn new(config: Arc<Config>, executor: Arc<dyn BridgeExecutor>) -> Result<Self, CatalogError> {
        Ok(Self {
            resources: ResourceCatalog::new()?,
            tools: ToolDispatcher::new(config.clone(), executor.clone()),
            config,
            executor,
        })
    }
}
