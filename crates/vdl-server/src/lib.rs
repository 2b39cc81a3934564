//! HTTP gateway for VDL.
//!
//! Thin adapter between REST verbs and the store/replication core: routes
//! map onto `create`/`read`/`update`/`del`/`docs`/`history`/`latest` plus
//! the two sync endpoints (stream the full export, pull-and-merge from a
//! peer). All error classification happens in the core; this layer only
//! maps error kinds to status codes and does the user-facing logging.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use router::build_router;
pub use server::VdlServer;
pub use state::AppState;
