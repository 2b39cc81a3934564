//! Version key codec for VDL.
//!
//! Every record in a VDL store is addressed by a [`VersionKey`]: a composite
//! of a time-ordered [`VersionToken`], an optional parent token, and the
//! document id. Keys are rendered as a single sortable string, so the
//! storage engine's lexicographic order doubles as write-time order and no
//! secondary index is needed to answer "newest version" queries.
//!
//! # Key Types
//!
//! - [`VersionToken`] — unique, monotonically increasing per-write token
//! - [`TokenClock`] — the generator that issues tokens
//! - [`VersionKey`] — encoded `(token, parent, document id)` triple

pub mod error;
pub mod key;
pub mod token;

pub use error::{KeyError, KeyResult};
pub use key::{document_id_of, VersionKey};
pub use token::{TokenClock, VersionToken};
