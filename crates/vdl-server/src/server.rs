use tokio::net::TcpListener;
use tracing::info;
use vdl_store::VersionStore;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;

/// The VDL gateway server.
pub struct VdlServer {
    config: ServerConfig,
    state: AppState,
}

impl VdlServer {
    /// Open the store described by `config` and prepare a server.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = match &config.data_path {
            Some(path) => VersionStore::open(path)?,
            None => VersionStore::in_memory(),
        };
        Ok(Self::with_store(config, store))
    }

    /// Build a server over an existing store (tests inject in-memory ones).
    pub fn with_store(config: ServerConfig, store: VersionStore) -> Self {
        Self {
            state: AppState::new(store),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The store this server fronts.
    pub fn store(&self) -> &VersionStore {
        &self.state.store
    }

    /// Build the router (useful for testing without a listener).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), self.config.max_body_bytes)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("vdl gateway listening on {}", self.config.bind_addr);
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = VdlServer::new(ServerConfig::default()).unwrap();
        assert_eq!(
            server.config().bind_addr,
            "127.0.0.1:8516".parse().unwrap()
        );
    }

    #[test]
    fn router_builds() {
        let server = VdlServer::new(ServerConfig::default()).unwrap();
        let _router = server.router();
    }
}
