use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use vdl_keys::{document_id_of, TokenClock, VersionKey};

use crate::error::{StoreError, StoreResult};
use crate::kv::{OrderedKv, ScanIter};
use crate::memory::MemoryKv;
use crate::redb_kv::RedbKv;

/// The result of an update: the freshly written key and the parent it
/// branched from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub key: VersionKey,
    pub prev: VersionKey,
}

/// Append-only versioned document store over a single ordered map.
///
/// Cheaply cloneable handle; clones share the engine and the token clock.
/// There is no hidden global: tests instantiate as many independent stores
/// as they like.
///
/// Concurrency is per-key only. In particular, two racing `create` calls
/// for the same document can both succeed and leave two root versions —
/// the store performs no cross-key arbitration. Callers that need strict
/// uniqueness must serialize creates themselves.
#[derive(Clone)]
pub struct VersionStore {
    kv: Arc<dyn OrderedKv>,
    clock: TokenClock,
}

impl VersionStore {
    /// Wrap an existing engine.
    pub fn new(kv: Arc<dyn OrderedKv>) -> Self {
        Self {
            kv,
            clock: TokenClock::new(),
        }
    }

    /// An ephemeral in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryKv::new()))
    }

    /// A persistent store at `path` (redb engine).
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(RedbKv::persistent(path)?)))
    }

    /// Create a document's root version.
    ///
    /// Fails with [`StoreError::DocExists`] if any stored key already
    /// carries this document id. The existence check is a scan and is not
    /// atomic with the write (documented weak guarantee).
    pub fn create(&self, id: &str, value: &[u8]) -> StoreResult<VersionKey> {
        let key = VersionKey::root(id, self.clock.next())?;
        if self.document_exists(id)? {
            return Err(StoreError::DocExists(id.to_owned()));
        }
        self.kv.put(&key.encode(), value)?;
        Ok(key)
    }

    /// Read the blob at `key`.
    pub fn read(&self, key: &VersionKey) -> StoreResult<Vec<u8>> {
        self.kv
            .get(&key.encode())?
            .ok_or_else(|| StoreError::NotFound(key.encode()))
    }

    /// Write a new version of `parent`'s document, with `parent` as its
    /// parent pointer.
    ///
    /// The parent must exist but need not be the current tip — updating an
    /// older version simply opens a sibling branch.
    pub fn update(&self, parent: &VersionKey, value: &[u8]) -> StoreResult<Update> {
        if self.kv.get(&parent.encode())?.is_none() {
            return Err(StoreError::NotFound(parent.encode()));
        }
        let key = VersionKey::child(parent.document_id(), self.clock.next(), parent.token())?;
        self.kv.put(&key.encode(), value)?;
        Ok(Update {
            key,
            prev: parent.clone(),
        })
    }

    /// Delete the record at `key`. Children pointing at it are left in
    /// place (orphaned but readable).
    pub fn del(&self, key: &VersionKey) -> StoreResult<()> {
        if !self.kv.remove(&key.encode())? {
            return Err(StoreError::NotFound(key.encode()));
        }
        Ok(())
    }

    /// All document ids, sorted and deduplicated. Fresh full scan per call.
    pub fn docs(&self) -> StoreResult<Vec<String>> {
        let mut ids = BTreeSet::new();
        for entry in self.scan(false) {
            let (key, _) = entry?;
            ids.insert(document_id_of(&key)?.to_owned());
        }
        Ok(ids.into_iter().collect())
    }

    /// All versions of `id`, newest first.
    ///
    /// Newest-first falls out of a reverse scan because keys sort by write
    /// time. Fails with [`StoreError::NotFound`] when the document has no
    /// versions.
    pub fn history(&self, id: &str) -> StoreResult<Vec<VersionKey>> {
        let mut versions = Vec::new();
        for entry in self.scan(true) {
            let (key, _) = entry?;
            if document_id_of(&key)? == id {
                versions.push(VersionKey::parse(&key)?);
            }
        }
        if versions.is_empty() {
            return Err(StoreError::NotFound(id.to_owned()));
        }
        Ok(versions)
    }

    /// The most recently written version of `id` and its blob.
    ///
    /// Reverse scan, stopping at the first matching key, so the cost is
    /// proportional to how far the document's newest version sits from the
    /// end of the key space. A store dominated by long-untouched documents
    /// degrades this toward a full scan; no latest-pointer index is kept.
    pub fn latest(&self, id: &str) -> StoreResult<(VersionKey, Vec<u8>)> {
        for entry in self.scan(true) {
            let (key, value) = entry?;
            if document_id_of(&key)? == id {
                return Ok((VersionKey::parse(&key)?, value));
            }
        }
        Err(StoreError::NotFound(id.to_owned()))
    }

    /// Write `value` at `key` only if the key is absent. Returns whether
    /// the write happened. Used by replication merges, which must never
    /// overwrite an existing record.
    pub fn insert_if_absent(&self, key: &VersionKey, value: &[u8]) -> StoreResult<bool> {
        self.kv.put_if_absent(&key.encode(), value)
    }

    /// Lazy scan over all raw `(encoded key, blob)` entries.
    pub fn scan(&self, reverse: bool) -> ScanIter {
        ScanIter::new(Arc::clone(&self.kv), reverse)
    }

    /// Number of stored version records.
    pub fn count(&self) -> StoreResult<u64> {
        self.kv.len()
    }

    fn document_exists(&self, id: &str) -> StoreResult<bool> {
        for entry in self.scan(false) {
            let (key, _) = entry?;
            if document_id_of(&key)? == id {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore")
            .field("records", &self.kv.len().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_read() {
        let store = VersionStore::in_memory();
        let key = store.create("doc1", b"a").unwrap();
        assert!(key.is_root());
        assert_eq!(key.document_id(), "doc1");
        assert_eq!(store.read(&key).unwrap(), b"a");
    }

    #[test]
    fn create_twice_fails_doc_exists() {
        let store = VersionStore::in_memory();
        store.create("doc1", b"a").unwrap();
        let err = store.create("doc1", b"b").unwrap_err();
        assert!(matches!(err, StoreError::DocExists(id) if id == "doc1"));
    }

    #[test]
    fn update_links_to_parent() {
        let store = VersionStore::in_memory();
        let k1 = store.create("doc1", b"a").unwrap();
        let up = store.update(&k1, b"b").unwrap();
        assert_eq!(up.prev, k1);
        assert_eq!(up.key.parent(), Some(k1.token()));
        assert_eq!(store.read(&up.key).unwrap(), b"b");
        // Parent still readable; append-only.
        assert_eq!(store.read(&k1).unwrap(), b"a");
    }

    #[test]
    fn update_of_missing_parent_fails() {
        let store = VersionStore::in_memory();
        let k1 = store.create("doc1", b"a").unwrap();
        store.del(&k1).unwrap();
        let err = store.update(&k1, b"b").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn history_is_newest_first() {
        let store = VersionStore::in_memory();
        let k1 = store.create("doc1", b"a").unwrap();
        let k2 = store.update(&k1, b"b").unwrap().key;
        let k3 = store.update(&k2, b"c").unwrap().key;
        assert_eq!(store.history("doc1").unwrap(), vec![k3, k2, k1]);
    }

    #[test]
    fn history_of_unknown_doc_is_not_found() {
        let store = VersionStore::in_memory();
        store.create("other", b"x").unwrap();
        assert!(store.history("doc1").unwrap_err().is_not_found());
    }

    #[test]
    fn latest_returns_newest_value() {
        let store = VersionStore::in_memory();
        let k1 = store.create("doc1", b"a").unwrap();
        let k2 = store.update(&k1, b"b").unwrap().key;
        let k3 = store.update(&k2, b"c").unwrap().key;
        let (key, value) = store.latest("doc1").unwrap();
        assert_eq!(key, k3);
        assert_eq!(value, b"c");
    }

    #[test]
    fn latest_tracks_interleaved_documents() {
        let store = VersionStore::in_memory();
        let a1 = store.create("a", b"a1").unwrap();
        store.create("b", b"b1").unwrap();
        store.update(&a1, b"a2").unwrap();
        assert_eq!(store.latest("a").unwrap().1, b"a2");
        assert_eq!(store.latest("b").unwrap().1, b"b1");
    }

    #[test]
    fn delete_does_not_cascade() {
        let store = VersionStore::in_memory();
        let k1 = store.create("doc1", b"a").unwrap();
        let k2 = store.update(&k1, b"b").unwrap().key;
        let k3 = store.update(&k2, b"c").unwrap().key;
        store.del(&k2).unwrap();
        assert!(store.read(&k2).unwrap_err().is_not_found());
        assert_eq!(store.read(&k1).unwrap(), b"a");
        assert_eq!(store.read(&k3).unwrap(), b"c");
        // The orphaned child still reports k2's token as parent.
        assert_eq!(k3.parent(), Some(k2.token()));
    }

    #[test]
    fn delete_missing_key_is_not_found() {
        let store = VersionStore::in_memory();
        let k1 = store.create("doc1", b"a").unwrap();
        store.del(&k1).unwrap();
        assert!(store.del(&k1).unwrap_err().is_not_found());
    }

    #[test]
    fn docs_is_sorted_and_deduplicated() {
        let store = VersionStore::in_memory();
        let z = store.create("zebra", b"z").unwrap();
        store.create("alpha", b"a").unwrap();
        store.update(&z, b"z2").unwrap();
        assert_eq!(store.docs().unwrap(), vec!["alpha", "zebra"]);
    }

    #[test]
    fn docs_on_empty_store_is_empty() {
        let store = VersionStore::in_memory();
        assert!(store.docs().unwrap().is_empty());
    }

    #[test]
    fn branching_keeps_both_siblings() {
        let store = VersionStore::in_memory();
        let k1 = store.create("doc1", b"a").unwrap();
        let k2 = store.update(&k1, b"b").unwrap().key;
        let k3 = store.update(&k1, b"c").unwrap().key;
        assert_eq!(k2.parent(), Some(k1.token()));
        assert_eq!(k3.parent(), Some(k1.token()));
        let history = store.history("doc1").unwrap();
        assert!(history.contains(&k2));
        assert!(history.contains(&k3));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn clones_share_state() {
        let store = VersionStore::in_memory();
        let other = store.clone();
        let key = store.create("doc1", b"a").unwrap();
        assert_eq!(other.read(&key).unwrap(), b"a");
        assert!(other.create("doc1", b"b").unwrap_err().to_string().contains("exists"));
    }

    #[test]
    fn scans_converge_with_concurrent_writers() {
        let kv: Arc<dyn OrderedKv> = Arc::new(MemoryKv::new());
        let store = VersionStore::new(Arc::clone(&kv));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..50 {
                    store.create(&format!("doc{i:02}"), b"v").unwrap();
                }
            })
        };

        // Paged scans racing the writer see some interleaving of the
        // writes; whatever subset they observe, they must not error and
        // must stay in key order.
        while !writer.is_finished() {
            let keys: Vec<String> = ScanIter::with_page_size(Arc::clone(&kv), false, 4)
                .map(|r| r.unwrap().0)
                .collect();
            assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }
        writer.join().unwrap();

        // Once writes quiesce, a fresh scan observes every one of them.
        assert_eq!(store.count().unwrap(), 50);
        assert_eq!(store.docs().unwrap().len(), 50);
    }

    #[test]
    fn same_suite_passes_on_redb() {
        let store = VersionStore::new(Arc::new(RedbKv::in_memory().unwrap()));
        let k1 = store.create("doc1", b"a").unwrap();
        let k2 = store.update(&k1, b"b").unwrap().key;
        let k3 = store.update(&k2, b"c").unwrap().key;
        assert_eq!(store.history("doc1").unwrap(), vec![k3.clone(), k2.clone(), k1.clone()]);
        assert_eq!(store.latest("doc1").unwrap().0, k3);
        store.del(&k2).unwrap();
        assert!(store.read(&k2).unwrap_err().is_not_found());
        assert_eq!(store.read(&k1).unwrap(), b"a");
    }

    #[test]
    fn persistent_store_reopens_with_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.redb");
        let k1 = {
            let store = VersionStore::open(&path).unwrap();
            store.create("doc1", b"a").unwrap()
        };
        let store = VersionStore::open(&path).unwrap();
        assert_eq!(store.read(&k1).unwrap(), b"a");
        assert_eq!(store.docs().unwrap(), vec!["doc1"]);
    }
}
