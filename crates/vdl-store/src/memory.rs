use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::RwLock;

use crate::error::StoreResult;
use crate::kv::OrderedKv;

/// In-memory, BTreeMap-based ordered engine.
///
/// Intended for tests and ephemeral servers. All records are held behind a
/// `RwLock`; entries are cloned on read.
#[derive(Debug, Default)]
pub struct MemoryKv {
    records: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKv {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all records.
    pub fn clear(&self) {
        self.records.write().expect("lock poisoned").clear();
    }
}

impl OrderedKv for MemoryKv {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.records.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut map = self.records.write().expect("lock poisoned");
        map.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let mut map = self.records.write().expect("lock poisoned");
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_owned(), value.to_vec());
        Ok(true)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.records.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    fn scan_page(
        &self,
        start_after: Option<&str>,
        reverse: bool,
        limit: usize,
    ) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let map = self.records.read().expect("lock poisoned");
        let range = match (start_after, reverse) {
            (Some(start), false) => {
                map.range::<str, _>((Bound::Excluded(start), Bound::Unbounded))
            }
            (Some(start), true) => {
                map.range::<str, _>((Bound::Unbounded, Bound::Excluded(start)))
            }
            (None, _) => map.range::<str, _>(..),
        };
        let page: Vec<(String, Vec<u8>)> = if reverse {
            range
                .rev()
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        } else {
            range
                .take(limit)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        Ok(page)
    }

    fn len(&self) -> StoreResult<u64> {
        Ok(self.records.read().expect("lock poisoned").len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let kv = MemoryKv::new();
        assert!(kv.get("a").unwrap().is_none());
        kv.put("a", b"one").unwrap();
        assert_eq!(kv.get("a").unwrap().unwrap(), b"one");
        assert!(kv.remove("a").unwrap());
        assert!(!kv.remove("a").unwrap());
        assert!(kv.is_empty().unwrap());
    }

    #[test]
    fn put_if_absent_never_overwrites() {
        let kv = MemoryKv::new();
        assert!(kv.put_if_absent("k", b"first").unwrap());
        assert!(!kv.put_if_absent("k", b"second").unwrap());
        assert_eq!(kv.get("k").unwrap().unwrap(), b"first");
    }

    #[test]
    fn scan_page_respects_cursor_and_direction() {
        let kv = MemoryKv::new();
        for k in ["a", "b", "c", "d"] {
            kv.put(k, k.as_bytes()).unwrap();
        }
        let forward = kv.scan_page(Some("b"), false, 10).unwrap();
        assert_eq!(
            forward.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            ["c", "d"]
        );
        let backward = kv.scan_page(Some("c"), true, 10).unwrap();
        assert_eq!(
            backward.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            ["b", "a"]
        );
        let limited = kv.scan_page(None, false, 2).unwrap();
        assert_eq!(limited.len(), 2);
    }
}
