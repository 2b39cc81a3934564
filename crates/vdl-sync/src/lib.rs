//! Replication for VDL.
//!
//! Sync between peers is deliberately blunt: a peer exports its entire key
//! space as an ordered stream of records, and the receiver merges every
//! record it does not already hold. No negotiation, no deltas, no
//! reconciliation — version keys embed their parent pointers, so remote
//! branches simply land next to local ones. The merge never overwrites an
//! existing record and is therefore idempotent: re-running a partially
//! failed merge fills in the remainder.
//!
//! The wire format is a JSON array of `{key, value}` records (values
//! base64-encoded), streamed incrementally so the receiver can begin
//! merging before the sender finishes.

pub mod codec;
pub mod engine;
pub mod error;
pub mod record;

pub use codec::{JsonArrayDecoder, JsonArrayEncoder};
pub use engine::{ExportStream, MergeOutcome, MergeState, ReplicationEngine};
pub use error::{SyncError, SyncResult};
pub use record::SyncRecord;
