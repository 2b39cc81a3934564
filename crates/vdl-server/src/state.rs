use vdl_store::VersionStore;
use vdl_sync::ReplicationEngine;

/// Shared handler state: the store handle, the replication engine over it,
/// and a reusable HTTP client for pulling peers.
///
/// Cloned per request; all clones share the same underlying engine, so
/// tests can build as many independent gateways as they need.
#[derive(Clone)]
pub struct AppState {
    pub store: VersionStore,
    pub engine: ReplicationEngine,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(store: VersionStore) -> Self {
        let engine = ReplicationEngine::new(store.clone());
        Self {
            store,
            engine,
            http: reqwest::Client::new(),
        }
    }
}
