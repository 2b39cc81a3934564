use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the gateway listens on.
    pub bind_addr: SocketAddr,
    /// Path to the redb database file. `None` runs an in-memory store,
    /// which loses everything on shutdown.
    pub data_path: Option<PathBuf>,
    /// Upper bound on request bodies (document blobs and peer URLs).
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8516".parse().unwrap(),
            data_path: None,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8516".parse::<SocketAddr>().unwrap());
        assert!(c.data_path.is_none());
        assert_eq!(c.max_body_bytes, 16 * 1024 * 1024);
    }
}
