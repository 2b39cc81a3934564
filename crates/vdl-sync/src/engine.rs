use std::sync::RwLock;

use vdl_keys::VersionKey;
use vdl_store::{ScanIter, VersionStore};

use crate::error::{SyncError, SyncResult};
use crate::record::SyncRecord;

/// Phases of one merge operation.
///
/// `Streaming` is entered when the first record arrives; `Completed` and
/// `Failed` are terminal. No retry happens inside the engine — re-pulling
/// from a peer is the caller's decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl MergeState {
    /// Whether a new merge may start from this state.
    pub fn can_start(&self) -> bool {
        !matches!(self, MergeState::Streaming)
    }

    /// Whether the merge has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MergeState::Completed | MergeState::Failed)
    }
}

/// Counters for a completed merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Records consumed from the remote stream.
    pub received: u64,
    /// Records written locally (keys we did not have).
    pub applied: u64,
    /// Records skipped because the key was already present.
    pub skipped: u64,
}

/// Full-dataset replication over a [`VersionStore`].
///
/// Export produces the entire ordered key space; merge unions a remote
/// export into the local store, key by key, never overwriting. Because a
/// failed merge keeps its applied prefix and merging is idempotent, the
/// recovery story is simply "run it again".
#[derive(Clone)]
pub struct ReplicationEngine {
    store: VersionStore,
    last_state: std::sync::Arc<RwLock<MergeState>>,
}

impl ReplicationEngine {
    pub fn new(store: VersionStore) -> Self {
        Self {
            store,
            last_state: std::sync::Arc::new(RwLock::new(MergeState::Idle)),
        }
    }

    /// State of the most recent merge (or `Idle` if none ran).
    pub fn merge_state(&self) -> MergeState {
        *self.last_state.read().expect("lock poisoned")
    }

    /// Lazy, one-shot export of the whole store in key order.
    ///
    /// A new call starts a new full scan. The stream is safe to run while
    /// writers are active; it sees some interleaving of pre- and
    /// post-write state rather than a snapshot.
    pub fn export_all(&self) -> ExportStream {
        ExportStream {
            inner: self.store.scan(false),
        }
    }

    /// Union-merge a stream of remote records into the local store.
    ///
    /// Each record is written only if its key is absent; existing records
    /// are never overwritten, even when the remote value differs (keys are
    /// content-immutable once assigned). The first record or write error
    /// aborts the merge; records applied so far stay put.
    pub fn merge_from<I>(&self, records: I) -> SyncResult<MergeOutcome>
    where
        I: IntoIterator<Item = SyncResult<SyncRecord>>,
    {
        let mut outcome = MergeOutcome::default();
        self.set_state(MergeState::Idle);
        let mut streaming = false;

        for item in records {
            if !streaming {
                self.set_state(MergeState::Streaming);
                streaming = true;
            }
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    self.set_state(MergeState::Failed);
                    return Err(e);
                }
            };
            outcome.received += 1;

            let key = match VersionKey::parse(&record.key) {
                Ok(key) => key,
                Err(e) => {
                    self.set_state(MergeState::Failed);
                    return Err(SyncError::Key(e));
                }
            };
            match self.store.insert_if_absent(&key, &record.value) {
                Ok(true) => outcome.applied += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    self.set_state(MergeState::Failed);
                    return Err(SyncError::Store(e));
                }
            }
        }

        self.set_state(MergeState::Completed);
        Ok(outcome)
    }

    fn set_state(&self, state: MergeState) {
        *self.last_state.write().expect("lock poisoned") = state;
    }
}

/// One-shot iterator of [`SyncRecord`]s over the full store.
pub struct ExportStream {
    inner: ScanIter,
}

impl Iterator for ExportStream {
    type Item = SyncResult<SyncRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next()? {
            Ok((key, value)) => Some(Ok(SyncRecord::new(key, value))),
            Err(e) => Some(Err(SyncError::Store(e))),
        }
    }
}
