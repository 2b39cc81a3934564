use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::StoreResult;

/// Default number of entries a [`ScanIter`] fetches per page.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// An ordered string-keyed byte store.
///
/// All implementations must satisfy these invariants:
/// - Individual reads and writes are atomic per key; no cross-key
///   transaction is offered or assumed.
/// - `scan_page` returns entries in lexicographic key order (or reverse),
///   strictly after `start_after` when given. Each page may observe a
///   different point in time than the previous one — scans are not
///   snapshotted.
/// - `put_if_absent` never replaces an existing value.
/// - All engine errors are propagated, never silently ignored.
pub trait OrderedKv: Send + Sync {
    /// Read the value at `key`, or `None` if absent.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `value` at `key`, replacing any existing value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Write `value` at `key` only if the key is absent.
    ///
    /// Returns `true` if the write happened, `false` if the key was
    /// already present (existing value untouched). The check and write are
    /// atomic within the engine.
    fn put_if_absent(&self, key: &str, value: &[u8]) -> StoreResult<bool>;

    /// Remove the record at `key`. Returns `true` if the key existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;

    /// Fetch up to `limit` entries in key order (reverse order when
    /// `reverse`), starting strictly after `start_after`.
    fn scan_page(
        &self,
        start_after: Option<&str>,
        reverse: bool,
        limit: usize,
    ) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Number of records currently stored.
    fn len(&self) -> StoreResult<u64>;

    /// Whether the store holds no records.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Lazy, cancellable iterator over an [`OrderedKv`].
///
/// Pulls fixed-size pages through [`OrderedKv::scan_page`], tracking the
/// last key seen as a cursor. Dropping the iterator mid-stream releases
/// nothing but the cursor; a fresh iterator restarts the scan from the
/// beginning. Because each page runs in its own engine read, a scan that
/// races concurrent writers may miss or include boundary keys — callers
/// get eventual, not snapshot, consistency.
pub struct ScanIter {
    kv: Arc<dyn OrderedKv>,
    cursor: Option<String>,
    buffered: VecDeque<(String, Vec<u8>)>,
    reverse: bool,
    page_size: usize,
    exhausted: bool,
}

impl ScanIter {
    /// Start a scan in forward (`reverse = false`) or reverse key order.
    pub fn new(kv: Arc<dyn OrderedKv>, reverse: bool) -> Self {
        Self::with_page_size(kv, reverse, DEFAULT_PAGE_SIZE)
    }

    /// Start a scan with an explicit page size (tests use tiny pages to
    /// exercise the cursor logic).
    pub fn with_page_size(kv: Arc<dyn OrderedKv>, reverse: bool, page_size: usize) -> Self {
        Self {
            kv,
            cursor: None,
            buffered: VecDeque::new(),
            reverse,
            page_size: page_size.max(1),
            exhausted: false,
        }
    }

    fn refill(&mut self) -> StoreResult<()> {
        let page = self
            .kv
            .scan_page(self.cursor.as_deref(), self.reverse, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some((last_key, _)) = page.last() {
            self.cursor = Some(last_key.clone());
        }
        self.buffered.extend(page);
        Ok(())
    }
}

impl Iterator for ScanIter {
    type Item = StoreResult<(String, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffered.is_empty() {
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.refill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffered.pop_front().map(Ok)
    }
}
