use std::ops::Bound;
use std::path::Path;

use redb::{
    backends::InMemoryBackend, Database, ReadableTable, ReadableTableMetadata, TableDefinition,
};

use crate::error::{StoreError, StoreResult};
use crate::kv::OrderedKv;

const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records-v1");

/// Persistent ordered engine on redb.
///
/// One table, keyed by the encoded version key string. redb gives per-write
/// atomicity and ordered range scans; every [`OrderedKv`] call runs in its
/// own transaction, so scans paged through this engine are not snapshotted
/// across pages.
#[derive(Debug)]
pub struct RedbKv {
    db: Database,
}

impl RedbKv {
    /// Open (or create) a database file at `path`.
    pub fn persistent(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::builder().create(path)?;
        Self::open(db)
    }

    /// A redb database backed by memory, for tests.
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        Self::open(db)
    }

    fn open(db: Database) -> StoreResult<Self> {
        // Ensure the table exists so later read transactions can open it.
        let tx = db.begin_write()?;
        {
            let _table = tx.open_table(RECORDS)?;
        }
        tx.commit()?;
        Ok(Self { db })
    }
}

impl OrderedKv for RedbKv {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(RECORDS)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(RECORDS)?;
            table.insert(key, value)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn put_if_absent(&self, key: &str, value: &[u8]) -> StoreResult<bool> {
        let tx = self.db.begin_write()?;
        let inserted = {
            let mut table = tx.open_table(RECORDS)?;
            if table.get(key)?.is_some() {
                false
            } else {
                table.insert(key, value)?;
                true
            }
        };
        if inserted {
            tx.commit()?;
        } else {
            tx.abort()?;
        }
        Ok(inserted)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let tx = self.db.begin_write()?;
        let removed = {
            let mut table = tx.open_table(RECORDS)?;
            let removed = table.remove(key)?.is_some();
            removed
        };
        tx.commit()?;
        Ok(removed)
    }

    fn scan_page(
        &self,
        start_after: Option<&str>,
        reverse: bool,
        limit: usize,
    ) -> StoreResult<Vec<(String, Vec<u8>)>> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(RECORDS)?;
        let range = match (start_after, reverse) {
            (Some(start), false) => {
                table.range::<&str>((Bound::Excluded(start), Bound::Unbounded))?
            }
            (Some(start), true) => {
                table.range::<&str>((Bound::Unbounded, Bound::Excluded(start)))?
            }
            (None, _) => table.range::<&str>(..)?,
        };

        let mut page = Vec::with_capacity(limit.min(1024));
        if reverse {
            for item in range.rev().take(limit) {
                let (key, value) = item?;
                page.push((key.value().to_owned(), value.value().to_vec()));
            }
        } else {
            for item in range.take(limit) {
                let (key, value) = item?;
                page.push((key.value().to_owned(), value.value().to_vec()));
            }
        }
        Ok(page)
    }

    fn len(&self) -> StoreResult<u64> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(RECORDS)?;
        Ok(table.len()?)
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Backend(e.to_string())
    }
}
