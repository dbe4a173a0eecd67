use std::sync::Arc;

use modelchain_capability::CapabilityEngine;
use modelchain_ledger::RecordSink;
use modelchain_memory::MemoryManager;
use modelchain_router::RouterService;
use modelchain_store::ModelStore;

/// Shared handles behind every request handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CapabilityEngine>,
    pub router: Arc<RouterService>,
    pub memory: Arc<MemoryManager>,
    pub sink: Arc<RecordSink>,
    pub models: ModelStore,
}
