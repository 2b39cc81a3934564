//! Versioned document store for VDL.
//!
//! The store is a single ordered key→blob map addressed by encoded
//! [`vdl_keys::VersionKey`]s. Because keys sort by write time, every
//! "newest first" question (history, latest version) is answered with a
//! reverse scan and no secondary index.
//!
//! Two interchangeable engines implement the [`OrderedKv`] trait:
//! [`MemoryKv`] for tests and ephemeral servers, [`RedbKv`] for persistent
//! storage on redb.

pub mod error;
pub mod kv;
pub mod memory;
pub mod redb_kv;
pub mod version_store;

pub use error::{StoreError, StoreResult};
pub use kv::{OrderedKv, ScanIter};
pub use memory::MemoryKv;
pub use redb_kv::RedbKv;
pub use version_store::{Update, VersionStore};
